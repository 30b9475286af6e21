use std::fs::File;
use std::io::BufReader;
use std::sync::{
    mpsc::{self, RecvTimeoutError, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use log::warn;
use rodio::{Decoder, OutputStream, Sink};
use tokio::sync::oneshot;

/// How often the playback thread checks whether the current clip drained.
const PLAYBACK_POLL: Duration = Duration::from_millis(100);

enum AudioCommand {
    PlayFile {
        path: String,
        done: oneshot::Sender<bool>,
    },
    Stop,
}

/// Plays synthesized audio clips for overlay text objects.
///
/// rodio's output objects are not `Send`, so they live on a dedicated
/// thread fed over a channel. `play_file` resolves its receiver with `true`
/// when the clip drains naturally and `false` when it is stopped or
/// superseded; the host uses that to push the "stopped" state back to the
/// overlay surface.
pub struct AudioPlayerHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl AudioPlayerHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-player".to_string())
            .spawn(move || {
                let mut _stream: Option<OutputStream> = None;
                let mut sink: Option<Sink> = None;
                let mut done: Option<oneshot::Sender<bool>> = None;

                loop {
                    match rx.recv_timeout(PLAYBACK_POLL) {
                        Ok(AudioCommand::PlayFile { path, done: next }) => {
                            // A new clip supersedes whatever was playing.
                            if let Some(prev) = done.take() {
                                let _ = prev.send(false);
                            }
                            if let Some(old) = sink.take() {
                                old.stop();
                            }

                            match start_clip(&mut _stream, &path) {
                                Ok(new_sink) => {
                                    sink = Some(new_sink);
                                    done = Some(next);
                                }
                                Err(err) => {
                                    warn!("audio clip {path} failed to start: {err}");
                                    let _ = next.send(false);
                                }
                            }
                        }
                        Ok(AudioCommand::Stop) => {
                            if let Some(old) = sink.take() {
                                old.stop();
                            }
                            if let Some(prev) = done.take() {
                                let _ = prev.send(false);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {
                            let drained = sink.as_ref().map(|s| s.empty()).unwrap_or(false);
                            if drained {
                                sink = None;
                                if let Some(prev) = done.take() {
                                    let _ = prev.send(true);
                                }
                            }
                        }
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| e.to_string())?;

        let tx_clone = tx.clone();
        *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
        Ok(tx_clone)
    }

    /// Start playing a clip; any current clip is stopped first.
    pub fn play_file(&self, path: String) -> Result<oneshot::Receiver<bool>, String> {
        let tx = self.ensure_thread()?;
        let (done_tx, done_rx) = oneshot::channel();
        tx.send(AudioCommand::PlayFile {
            path,
            done: done_tx,
        })
        .map_err(|e| e.to_string())?;
        Ok(done_rx)
    }

    pub fn stop(&self) {
        if let Ok(Some(tx)) = self.tx.lock().map(|guard| guard.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
    }
}

impl Default for AudioPlayerHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn start_clip(stream: &mut Option<OutputStream>, path: &str) -> Result<Sink, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    let source = Decoder::new(BufReader::new(file)).map_err(|e| e.to_string())?;

    let (new_stream, handle) = OutputStream::try_default()
        .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
    let sink =
        Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
    *stream = Some(new_stream);

    sink.append(source);
    Ok(sink)
}
