use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::logic::{TextObject, TextObjectStore};
use crate::ocr::{filter_regions, OcrRouter, RecognizedRegion};
use crate::overlay::bridge::SurfacePush;
use crate::overlay::renderer::{self, OverlayMode};
use crate::settings::SettingsStore;

use super::frame::{save_debug_frame, Frame, ScreenCapturer};
use super::gate::OcrGate;
use super::rect::{RectTracker, WindowGeometry, DEFAULT_BORDER_INSETS};
use super::snapshot::{SnapshotState, TriggerDisposition};

// Set to false to silence the per-tick chatter in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Label of the webview window hosting the overlay surface.
pub const OVERLAY_WINDOW: &str = "overlay";

/// Distinguishes routine progress text from snapshot outcomes so the two
/// writers cannot fight over the status label: snapshot outcomes win while
/// the snapshot machine is not idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusKind {
    Routine,
    Snapshot,
}

#[derive(Serialize, Clone)]
struct CaptureStatusEvent {
    kind: StatusKind,
    message: String,
}

/// Engine state surfaced to the frontend.
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub continuous: bool,
    pub snapshot: SnapshotState,
    pub overlay_mode: OverlayMode,
    pub interactive: bool,
}

/// Everything the tick, the snapshot trigger and the bridge handlers share.
/// One lock serializes them all; nothing here is touched off it.
struct EngineState {
    continuous: bool,
    snapshot: SnapshotState,
    gate: OcrGate,
    tracker: RectTracker,
    overlay_mode: OverlayMode,
    interactive: bool,
    /// Render cache: the overlay surface is only rewritten when the fresh
    /// render differs from this.
    last_document: Option<String>,
    /// Most recent pixels, kept for preview/export even while continuous
    /// capture is stopped. Shared, not cloned: frames are large.
    latest_frame: Option<Arc<Frame>>,
    /// Invalidates pending post-cooldown re-enables when a newer clear
    /// arms a newer cooldown.
    reenable_generation: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            continuous: false,
            snapshot: SnapshotState::Idle,
            gate: OcrGate::new(),
            tracker: RectTracker::new(DEFAULT_BORDER_INSETS),
            overlay_mode: OverlayMode::default(),
            interactive: false,
            last_document: None,
            latest_frame: None,
            reenable_generation: 0,
        }
    }
}

/// Drives the fixed-cadence capture loop and owns the OCR admission gate
/// and the snapshot state machine.
#[derive(Clone)]
pub struct CaptureController {
    state: Arc<Mutex<EngineState>>,
    store: Arc<TextObjectStore>,
    settings: Arc<SettingsStore>,
    router: Arc<OcrRouter>,
    capturer: Arc<dyn ScreenCapturer>,
    geometry: Arc<dyn WindowGeometry>,
    app_handle: AppHandle,
    debug_frame_dir: PathBuf,
    cancel: CancellationToken,
}

impl CaptureController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        app_handle: AppHandle,
        store: Arc<TextObjectStore>,
        settings: Arc<SettingsStore>,
        router: Arc<OcrRouter>,
        capturer: Arc<dyn ScreenCapturer>,
        geometry: Arc<dyn WindowGeometry>,
        debug_frame_dir: PathBuf,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::new())),
            store,
            settings,
            router,
            capturer,
            geometry,
            app_handle,
            debug_frame_dir,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the tick loop and the store watcher. Called once at setup
    /// (before the tokio context exists, hence `async_runtime`); both run
    /// for the app's lifetime and stop via `shutdown`.
    pub fn spawn(&self) {
        let controller = self.clone();
        tauri::async_runtime::spawn(async move { controller.run_loop().await });

        let controller = self.clone();
        tauri::async_runtime::spawn(async move { controller.watch_store().await });
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn run_loop(&self) {
        let mut period_ms = self.settings.capture().tick_interval_ms.max(1);
        let mut ticker = time::interval(Duration::from_millis(period_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;

                    let current = self.settings.capture().tick_interval_ms.max(1);
                    if current != period_ms {
                        period_ms = current;
                        ticker = time::interval(Duration::from_millis(period_ms));
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                }
                _ = self.cancel.cancelled() => {
                    log_info!("capture loop shutting down");
                    break;
                }
            }
        }
    }

    /// Re-render the overlay whenever the text-object set changes. Clears
    /// and routine updates arrive through the same channel, so a clear can
    /// never be overtaken by a stale render.
    async fn watch_store(&self) {
        let mut revisions = self.store.subscribe();
        loop {
            tokio::select! {
                changed = revisions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    self.refresh_overlay().await;
                }
                _ = self.cancel.cancelled() => break,
            }
        }
    }

    async fn tick(&self) {
        // Geometry errors skip the tick silently.
        let Some(bounds) = self.geometry.window_bounds() else {
            return;
        };
        let chrome = self.geometry.chrome_height();

        let region = {
            let mut state = self.state.lock().await;
            let update = state
                .tracker
                .recompute(bounds, chrome, !self.store.is_empty());
            if update.dx != 0.0 || update.dy != 0.0 {
                // Rigid translation keeps overlays glued to the window
                // during a drag without re-running OCR.
                self.store.apply_offset(update.dx, update.dy);
            }
            update.region
        };

        if !region.is_capturable() {
            return;
        }

        // Capture unconditionally so preview/export always have a fresh
        // frame, even while continuous mode is stopped.
        let capturer = Arc::clone(&self.capturer);
        let frame = match tokio::task::spawn_blocking(move || capturer.capture(&region)).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(err)) => {
                log_warn!("pixel capture failed, skipping tick: {err:#}");
                return;
            }
            Err(err) => {
                log_error!("capture worker join failed: {err}");
                return;
            }
        };

        let frame = Arc::new(frame);
        let dispatch = {
            let mut state = self.state.lock().await;
            state.latest_frame = Some(Arc::clone(&frame));

            if !state.continuous || !state.gate.is_enabled() {
                None
            } else {
                // Single shot: one OCR dispatch per enable.
                state.gate.request_enable(false);
                Some(frame)
            }
        };

        if let Some(frame) = dispatch {
            self.dispatch(frame, false).await;
        }
    }

    /// Hand a frame to the configured OCR backend. Fire-and-forget: results
    /// come back on a spawned task and flow through the store.
    async fn dispatch(&self, frame: Arc<Frame>, from_snapshot: bool) {
        let settings = self.settings.capture();

        if settings.debug_frames {
            let copy = Arc::clone(&frame);
            let dir = self.debug_frame_dir.clone();
            tokio::task::spawn_blocking(move || {
                if let Err(err) = save_debug_frame(&copy, &dir) {
                    log_warn!("debug frame not saved: {err:#}");
                }
            });
        }

        let backend = match self.router.backend_for(settings.ocr_method) {
            Ok(backend) => backend,
            Err(err) => {
                log_warn!("ocr dispatch unavailable: {err}");
                if from_snapshot {
                    self.complete_snapshot(false).await;
                }
                return;
            }
        };

        let thresholds = self.settings.thresholds().for_method(settings.ocr_method);
        // The capture origin travels with the dispatch so the asynchronous
        // result can be mapped back to screen space.
        let origin = (frame.region.left, frame.region.top);
        let language = settings.source_language.clone();
        let settle = Duration::from_millis(settings.settle_delay_ms);
        let controller = self.clone();

        self.publish_status(StatusKind::Routine, "recognizing").await;

        tokio::spawn(async move {
            match backend.submit(frame.as_ref(), &language).await {
                Ok(regions) => {
                    let objects =
                        build_text_objects(regions, origin, thresholds.min_confidence);
                    controller.store.replace_all(objects);
                    controller
                        .publish_status(StatusKind::Routine, "translating")
                        .await;
                    if from_snapshot {
                        controller.complete_snapshot(true).await;
                    } else {
                        // Let the fresh overlay settle before the gate
                        // re-arms for the next pass.
                        controller.schedule_reenable(settle).await;
                    }
                }
                Err(err) => {
                    log_warn!("ocr dispatch failed: {err:#}");
                    if from_snapshot {
                        controller.complete_snapshot(false).await;
                    } else {
                        controller
                            .publish_status(StatusKind::Routine, "recognition failed")
                            .await;
                        // Backpressure, not retries: re-arm and let the
                        // next tick try again.
                        let mut state = controller.state.lock().await;
                        state.gate.request_enable(true);
                    }
                }
            }
            // frame drops here, at the end of the capture-and-dispatch
            // sequence
        });
    }

    pub async fn start_continuous(&self) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.continuous {
                return Err(anyhow!("continuous capture already started"));
            }
            // A displayed snapshot gives way to continuous mode.
            state.snapshot = SnapshotState::Idle;
            state.continuous = true;
            state.gate.clear_cooldown();
            state.gate.request_enable(true);
        }

        self.store.clear_all();
        self.store.reset_hash();

        self.publish_status(StatusKind::Routine, "capture started")
            .await;
        self.emit_state_changed().await;
        Ok(())
    }

    pub async fn stop_continuous(&self) -> Result<()> {
        let cooldown = Duration::from_secs(self.settings.capture().cooldown_secs);
        {
            let mut state = self.state.lock().await;
            if !state.continuous {
                return Ok(());
            }
            state.continuous = false;
        }

        self.clear_overlay(cooldown).await;
        self.publish_status(StatusKind::Routine, "capture stopped")
            .await;
        self.emit_state_changed().await;
        Ok(())
    }

    /// Manually triggered one-shot capture, independent of the continuous
    /// scheduler.
    pub async fn trigger_snapshot(&self) -> Result<()> {
        let settings = self.settings.capture();

        let disposition = {
            let mut state = self.state.lock().await;

            // Mutual exclusion: a snapshot stops continuous capture first.
            if state.continuous {
                state.continuous = false;
                state.gate.request_enable(false);
            }

            let disposition = state.snapshot.on_trigger(settings.snapshot_toggle_mode);
            match disposition {
                TriggerDisposition::Begin => {
                    state.snapshot = SnapshotState::InProgress;
                    // A snapshot is meant to be immediate: no settle delay,
                    // no cooldown, and any pending re-enable is stale now.
                    state.reenable_generation += 1;
                    state.gate.clear_cooldown();
                    state.gate.request_enable(true);
                }
                TriggerDisposition::Clear => {
                    state.snapshot = SnapshotState::Idle;
                }
                TriggerDisposition::Ignore => {}
            }
            disposition
        };

        match disposition {
            TriggerDisposition::Ignore => Ok(()),
            TriggerDisposition::Clear => {
                self.clear_overlay(Duration::from_secs(settings.cooldown_secs))
                    .await;
                self.publish_status(StatusKind::Snapshot, "snapshot cleared")
                    .await;
                self.emit_state_changed().await;
                Ok(())
            }
            TriggerDisposition::Begin => {
                self.store.clear_all();
                self.store.reset_hash();
                self.emit_state_changed().await;
                self.capture_snapshot_now().await;
                Ok(())
            }
        }
    }

    /// One capture-and-dispatch cycle, same shape as the tick's tail but
    /// synchronous to the trigger.
    async fn capture_snapshot_now(&self) {
        let Some(bounds) = self.geometry.window_bounds() else {
            self.complete_snapshot(false).await;
            return;
        };
        let chrome = self.geometry.chrome_height();

        let region = {
            let mut state = self.state.lock().await;
            state
                .tracker
                .recompute(bounds, chrome, !self.store.is_empty())
                .region
        };

        if !region.is_capturable() {
            self.complete_snapshot(false).await;
            return;
        }

        let capturer = Arc::clone(&self.capturer);
        let frame = match tokio::task::spawn_blocking(move || capturer.capture(&region)).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(err)) => {
                log_warn!("snapshot capture failed: {err:#}");
                self.complete_snapshot(false).await;
                return;
            }
            Err(err) => {
                log_error!("snapshot capture worker join failed: {err}");
                self.complete_snapshot(false).await;
                return;
            }
        };

        let frame = Arc::new(frame);
        {
            let mut state = self.state.lock().await;
            state.latest_frame = Some(Arc::clone(&frame));
            state.gate.request_enable(false);
        }

        self.publish_status(StatusKind::Snapshot, "capturing").await;
        self.dispatch(frame, true).await;
    }

    /// Apply a snapshot completion. Completions that arrive after a cancel
    /// find the machine out of `InProgress` and change nothing.
    async fn complete_snapshot(&self, success: bool) {
        {
            let mut state = self.state.lock().await;
            if state.snapshot != SnapshotState::InProgress {
                return;
            }
            state.snapshot = state.snapshot.on_completion(success);
        }

        let message = if success {
            "snapshot captured"
        } else {
            "snapshot failed"
        };
        self.publish_status(StatusKind::Snapshot, message).await;
        self.emit_state_changed().await;
    }

    /// Shared clear path: arm the gate cooldown, then wipe the overlay.
    /// The dead zone opens first so no tick can re-run OCR against the
    /// not-yet-settled screen.
    async fn clear_overlay(&self, cooldown: Duration) {
        self.schedule_reenable(cooldown).await;
        {
            let mut state = self.state.lock().await;
            state.tracker.reset();
        }
        self.store.clear_all();
        self.store.reset_hash();
    }

    /// Force the gate off for `delay`, then issue the one delayed
    /// `request_enable(true)` that clears the window. A newer cooldown
    /// invalidates an older pending re-enable via the generation counter.
    async fn schedule_reenable(&self, delay: Duration) {
        let generation = {
            let mut state = self.state.lock().await;
            state.gate.arm_cooldown(delay);
            state.reenable_generation += 1;
            state.reenable_generation
        };

        let controller = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let mut state = controller.state.lock().await;
            if state.reenable_generation != generation {
                return;
            }
            state.gate.request_enable(true);
        });
    }

    /// Render the current object set and rewrite the surface only when the
    /// document actually changed.
    pub async fn refresh_overlay(&self) {
        let style = self.settings.overlay_style();
        let vertical_capable =
            renderer::language_supports_vertical(&self.settings.capture().source_language);
        let objects = self.store.text_objects();

        let fresh = {
            let mut state = self.state.lock().await;
            let document = renderer::render(
                &objects,
                state.overlay_mode,
                &style,
                state.interactive,
                vertical_capable,
            );
            if state.last_document.as_deref() == Some(document.as_str()) {
                None
            } else {
                state.last_document = Some(document.clone());
                Some(document)
            }
        };

        if let Some(document) = fresh {
            self.apply_document(&document);
        }
    }

    fn apply_document(&self, document: &str) {
        let Some(window) = self.app_handle.get_webview_window(OVERLAY_WINDOW) else {
            return;
        };
        let literal =
            serde_json::to_string(document).unwrap_or_else(|_| "\"\"".to_string());
        let script = format!("document.open();document.write({literal});document.close();");
        if let Err(err) = window.eval(&script) {
            log_warn!("overlay document update failed: {err}");
        }
    }

    /// Targeted in-place mutation of the overlay surface, bypassing the
    /// full-document path.
    pub fn push_to_surface(&self, push: &SurfacePush) {
        let Some(window) = self.app_handle.get_webview_window(OVERLAY_WINDOW) else {
            return;
        };
        if let Err(err) = window.eval(&push.to_script()) {
            log_warn!("surface push failed: {err}");
        }
    }

    pub async fn set_overlay_mode(&self, mode: OverlayMode) {
        {
            let mut state = self.state.lock().await;
            if state.overlay_mode == mode {
                return;
            }
            state.overlay_mode = mode;
        }
        self.refresh_overlay().await;
        self.emit_state_changed().await;
    }

    pub async fn set_interactive(&self, interactive: bool) {
        {
            let mut state = self.state.lock().await;
            if state.interactive == interactive {
                return;
            }
            state.interactive = interactive;
        }
        self.refresh_overlay().await;
        self.emit_state_changed().await;
    }

    /// Changing the recognition language invalidates everything on screen.
    pub async fn set_source_language(&self, language: String) -> Result<()> {
        let mut capture = self.settings.capture();
        if capture.source_language == language {
            return Ok(());
        }
        capture.source_language = language;
        let cooldown = Duration::from_secs(capture.cooldown_secs);
        self.settings.update_capture(capture)?;
        self.clear_overlay(cooldown).await;
        Ok(())
    }

    /// Map surface-local coordinates (e.g. a context-menu click) to screen
    /// space using the current capture region.
    pub async fn surface_to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        let state = self.state.lock().await;
        match state.tracker.current() {
            Some(region) => (region.left + x, region.top + y),
            None => (x, y),
        }
    }

    pub async fn latest_frame_png(&self) -> Result<Vec<u8>> {
        let state = self.state.lock().await;
        match &state.latest_frame {
            Some(frame) => frame.encode_png(),
            None => Err(anyhow!("no frame captured yet")),
        }
    }

    pub async fn export_frame(&self, path: PathBuf) -> Result<()> {
        let bytes = self.latest_frame_png().await?;
        std::fs::write(&path, bytes)
            .with_context(|| format!("failed to export frame to {}", path.display()))
    }

    pub async fn engine_snapshot(&self) -> EngineSnapshot {
        let state = self.state.lock().await;
        EngineSnapshot {
            continuous: state.continuous,
            snapshot: state.snapshot,
            overlay_mode: state.overlay_mode,
            interactive: state.interactive,
        }
    }

    async fn emit_state_changed(&self) {
        let snapshot = self.engine_snapshot().await;
        let _ = self.app_handle.emit("engine-state-changed", snapshot);
    }

    async fn publish_status(&self, kind: StatusKind, message: &str) {
        if kind == StatusKind::Routine {
            let state = self.state.lock().await;
            // Snapshot outcomes own the label while the machine is active.
            if state.snapshot != SnapshotState::Idle {
                return;
            }
        }
        let _ = self.app_handle.emit(
            "capture-status",
            CaptureStatusEvent {
                kind,
                message: message.to_string(),
            },
        );
    }
}

/// Map recognized regions from capture-local to screen coordinates and
/// drop the ones below the confidence floor.
fn build_text_objects(
    regions: Vec<RecognizedRegion>,
    origin: (f64, f64),
    min_confidence: f32,
) -> Vec<TextObject> {
    filter_regions(regions, min_confidence)
        .into_iter()
        .map(|region| {
            TextObject::new(
                region.text,
                origin.0 + region.x,
                origin.1 + region.y,
                region.width,
                region.height,
                region.orientation,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Orientation;

    fn region(text: &str, x: f64, y: f64, confidence: f32) -> RecognizedRegion {
        RecognizedRegion {
            text: text.to_string(),
            x,
            y,
            width: 40.0,
            height: 16.0,
            confidence,
            orientation: Orientation::Horizontal,
        }
    }

    #[test]
    fn build_text_objects_maps_to_screen_space() {
        let objects = build_text_objects(
            vec![region("hello", 10.0, 20.0, 0.9)],
            (100.0, 200.0),
            0.5,
        );

        assert_eq!(objects.len(), 1);
        assert_eq!((objects[0].x, objects[0].y), (110.0, 220.0));
        assert_eq!(objects[0].source_text, "hello");
        assert!(objects[0].translated_text.is_empty());
    }

    #[test]
    fn build_text_objects_applies_confidence_floor() {
        let objects = build_text_objects(
            vec![region("keep", 0.0, 0.0, 0.9), region("drop", 0.0, 0.0, 0.2)],
            (0.0, 0.0),
            0.5,
        );

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].source_text, "keep");
    }
}
