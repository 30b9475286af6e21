mod audio;
mod capture;
mod logic;
mod ocr;
mod overlay;
mod settings;
mod utils;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use audio::AudioPlayerHandle;
use capture::frame::MonitorCapturer;
use capture::rect::{WindowBounds, WindowGeometry};
use capture::scheduler::EngineSnapshot;
use capture::CaptureController;
use log::warn;
use logic::{TextObject, TextObjectStore};
use ocr::{HttpOcrBackend, OcrMethod, OcrRouter};
use overlay::bridge::{self, BridgeMessage, SurfacePush};
use overlay::renderer::{OverlayMode, OverlayStyle};
use serde::Serialize;
use settings::{CaptureSettings, SettingsStore};
use tauri::{AppHandle, Emitter, Manager, State};

pub(crate) struct AppState {
    controller: CaptureController,
    store: Arc<TextObjectStore>,
    settings: Arc<SettingsStore>,
    audio: AudioPlayerHandle,
    http_ocr: Arc<HttpOcrBackend>,
    chrome_height: Arc<Mutex<Option<f64>>>,
}

/// Geometry of the main window as the OS reports it, plus the chrome
/// height the frontend measures after each toolbar relayout.
struct TauriWindowGeometry {
    app_handle: AppHandle,
    chrome_height: Arc<Mutex<Option<f64>>>,
}

impl WindowGeometry for TauriWindowGeometry {
    fn window_bounds(&self) -> Option<WindowBounds> {
        let window = self.app_handle.get_webview_window("main")?;
        let position = window.outer_position().ok()?;
        let size = window.outer_size().ok()?;
        Some(WindowBounds {
            x: position.x as f64,
            y: position.y as f64,
            width: size.width as f64,
            height: size.height as f64,
        })
    }

    fn chrome_height(&self) -> Option<f64> {
        *self.chrome_height.lock().unwrap()
    }
}

#[tauri::command]
async fn start_capture(state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .start_continuous()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn stop_capture(state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .stop_continuous()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn trigger_snapshot(state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .trigger_snapshot()
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn set_overlay_mode(mode: OverlayMode, state: State<'_, AppState>) -> Result<(), String> {
    state.controller.set_overlay_mode(mode).await;
    Ok(())
}

#[tauri::command]
async fn set_interactive(interactive: bool, state: State<'_, AppState>) -> Result<(), String> {
    state.controller.set_interactive(interactive).await;
    Ok(())
}

#[tauri::command]
async fn set_source_language(language: String, state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .set_source_language(language)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
async fn get_engine_state(state: State<'_, AppState>) -> Result<EngineSnapshot, String> {
    Ok(state.controller.engine_snapshot().await)
}

#[tauri::command]
fn get_capture_settings(state: State<AppState>) -> CaptureSettings {
    state.settings.capture()
}

#[tauri::command]
fn set_capture_settings(
    settings: CaptureSettings,
    state: State<AppState>,
) -> Result<(), String> {
    state.http_ocr.set_endpoint(settings.ocr_endpoint.clone());
    state
        .settings
        .update_capture(settings)
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn get_overlay_style(state: State<AppState>) -> OverlayStyle {
    state.settings.overlay_style()
}

#[tauri::command]
async fn set_overlay_style(style: OverlayStyle, state: State<'_, AppState>) -> Result<(), String> {
    state
        .settings
        .update_overlay_style(style)
        .map_err(|e| e.to_string())?;
    state.controller.refresh_overlay().await;
    Ok(())
}

#[tauri::command]
fn get_text_objects(state: State<AppState>) -> Vec<TextObject> {
    state.store.text_objects()
}

/// Entry point for the external translation collaborator.
#[tauri::command]
fn set_translation(
    text_object_id: String,
    translated_text: String,
    state: State<AppState>,
) -> Result<(), String> {
    if !state.store.set_translation(&text_object_id, translated_text) {
        return Err(format!("unknown text object {text_object_id}"));
    }
    Ok(())
}

/// Entry point for the external TTS collaborator: a synthesized clip for
/// one side of a text object is ready on disk.
#[tauri::command]
fn mark_audio_ready(
    text_object_id: String,
    target: bool,
    path: String,
    state: State<AppState>,
) -> Result<(), String> {
    if !state
        .store
        .set_audio_state(&text_object_id, target, true, Some(path.clone()))
    {
        return Err(format!("unknown text object {text_object_id}"));
    }
    state.controller.push_to_surface(&SurfacePush::AudioState {
        text_object_id,
        target,
        ready: true,
        path: Some(path),
    });
    Ok(())
}

/// The frontend reports the measured toolbar height after each relayout so
/// the capture region can exclude it exactly.
#[tauri::command]
fn report_chrome_height(height: f64, state: State<AppState>) -> Result<(), String> {
    *state.chrome_height.lock().map_err(|e| e.to_string())? = Some(height);
    Ok(())
}

#[tauri::command]
async fn latest_frame_png(state: State<'_, AppState>) -> Result<String, String> {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let bytes = state
        .controller
        .latest_frame_png()
        .await
        .map_err(|e| e.to_string())?;
    Ok(STANDARD.encode(bytes))
}

#[tauri::command]
async fn export_frame(path: String, state: State<'_, AppState>) -> Result<(), String> {
    state
        .controller
        .export_frame(PathBuf::from(path))
        .await
        .map_err(|e| e.to_string())
}

#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
struct ContextMenuRequest {
    text_object_id: String,
    x: f64,
    y: f64,
    selection: String,
}

/// Single entry point for everything the overlay surface sends back.
#[tauri::command]
async fn overlay_message(
    payload: String,
    app_handle: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    let Some(message) = bridge::parse_message(&payload) else {
        // Malformed input was already logged; nothing to do.
        return Ok(());
    };

    match message {
        BridgeMessage::ContextMenu {
            text_object_id,
            x,
            y,
            selection,
        } => {
            if state.store.get(&text_object_id).is_none() {
                warn!("context menu for unknown text object {text_object_id}");
                return Ok(());
            }
            let (screen_x, screen_y) = state.controller.surface_to_screen(x, y).await;
            let _ = app_handle.emit(
                "context-menu-request",
                ContextMenuRequest {
                    text_object_id,
                    x: screen_x,
                    y: screen_y,
                    selection,
                },
            );
        }
        BridgeMessage::PlayAudio {
            text_object_id,
            path,
            target,
        } => {
            let done = state.audio.play_file(path)?;
            state.controller.push_to_surface(&SurfacePush::Playing {
                text_object_id: text_object_id.clone(),
                target,
                playing: true,
            });

            // Whether the clip drains or is stopped, the surface ends up
            // showing "stopped".
            let controller = state.controller.clone();
            tauri::async_runtime::spawn(async move {
                let _ = done.await;
                controller.push_to_surface(&SurfacePush::Playing {
                    text_object_id,
                    target,
                    playing: false,
                });
            });
        }
        BridgeMessage::StopAudio { text_object_id: _ } => {
            // The play task's receiver resolves with false and pushes the
            // "stopped" state with the right icon coordinates.
            state.audio.stop();
        }
    }

    Ok(())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("overglot starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings_path = app_data_dir.join("settings.json");
                let settings = Arc::new(SettingsStore::new(settings_path)?);

                let store = Arc::new(TextObjectStore::new());

                let http_ocr = Arc::new(HttpOcrBackend::new(settings.capture().ocr_endpoint));
                let mut router = OcrRouter::new();
                // The platform backends (Local, Cloud) are registered here
                // by their adapters when compiled in; Http always is.
                let backend: Arc<dyn ocr::OcrBackend> = http_ocr.clone();
                router.register(OcrMethod::Http, backend);

                let chrome_height = Arc::new(Mutex::new(None));
                let geometry = Arc::new(TauriWindowGeometry {
                    app_handle: app.handle().clone(),
                    chrome_height: Arc::clone(&chrome_height),
                });

                let controller = CaptureController::new(
                    app.handle().clone(),
                    Arc::clone(&store),
                    Arc::clone(&settings),
                    Arc::new(router),
                    Arc::new(MonitorCapturer),
                    geometry,
                    app_data_dir.join("frames"),
                );
                controller.spawn();

                app.manage(AppState {
                    controller,
                    store,
                    settings,
                    audio: AudioPlayerHandle::new(),
                    http_ocr,
                    chrome_height,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            start_capture,
            stop_capture,
            trigger_snapshot,
            set_overlay_mode,
            set_interactive,
            set_source_language,
            get_engine_state,
            get_capture_settings,
            set_capture_settings,
            get_overlay_style,
            set_overlay_style,
            get_text_objects,
            set_translation,
            mark_audio_ready,
            report_chrome_height,
            latest_frame_png,
            export_frame,
            overlay_message,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
