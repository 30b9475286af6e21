use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::ocr::OcrMethod;
use crate::overlay::renderer::OverlayStyle;

/// Capture, gating and dispatch knobs. Consumed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    /// Scheduler tick period. ~60 Hz by default.
    pub tick_interval_ms: u64,
    /// Dead zone after an overlay clear during which the gate refuses to
    /// re-enable.
    pub cooldown_secs: u64,
    /// Pause after a recognition pass before the gate re-arms, letting the
    /// overlay settle on screen. Snapshots bypass it.
    pub settle_delay_ms: u64,
    /// Repeated snapshot triggers act as an on/off switch.
    pub snapshot_toggle_mode: bool,
    /// Persist a copy of each dispatched frame under the app data dir.
    pub debug_frames: bool,
    pub ocr_method: OcrMethod,
    /// Endpoint for the generic HTTP OCR service.
    pub ocr_endpoint: String,
    pub source_language: String,
    pub target_language: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 16,
            cooldown_secs: 2,
            settle_delay_ms: 500,
            snapshot_toggle_mode: true,
            debug_frames: false,
            ocr_method: OcrMethod::Http,
            ocr_endpoint: "http://127.0.0.1:8765/ocr".to_string(),
            source_language: "ja".to_string(),
            target_language: "en".to_string(),
        }
    }
}

/// Per-OCR-method result filtering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodThresholds {
    pub min_confidence: f32,
    /// Regions closer than this merge into one text object upstream;
    /// carried here so each backend can be tuned independently.
    pub grouping_px: f64,
}

impl Default for MethodThresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            grouping_px: 8.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OcrThresholds {
    pub local: MethodThresholds,
    pub cloud: MethodThresholds,
    pub http: MethodThresholds,
}

impl OcrThresholds {
    pub fn for_method(&self, method: OcrMethod) -> MethodThresholds {
        match method {
            OcrMethod::Local => self.local,
            OcrMethod::Cloud => self.cloud,
            OcrMethod::Http => self.http,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct UserSettings {
    capture: CaptureSettings,
    thresholds: OcrThresholds,
    overlay_style: OverlayStyle,
}

/// JSON-file-backed configuration store. Read-mostly; every update is
/// persisted immediately.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn capture(&self) -> CaptureSettings {
        self.data.read().unwrap().capture.clone()
    }

    pub fn thresholds(&self) -> OcrThresholds {
        self.data.read().unwrap().thresholds.clone()
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        self.data.read().unwrap().overlay_style.clone()
    }

    pub fn update_capture(&self, capture: CaptureSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.capture = capture;
        self.persist(&guard)
    }

    pub fn update_overlay_style(&self, style: OverlayStyle) -> Result<()> {
        let mut guard = self.data.write().unwrap();
        guard.overlay_style = style;
        self.persist(&guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
