pub mod http_backend;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::capture::frame::Frame;
use crate::logic::Orientation;

pub use http_backend::HttpOcrBackend;

/// Configuration-supplied identifier selecting which backend a dispatch
/// goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OcrMethod {
    /// Built-in platform OCR (injected by the host).
    Local,
    /// Cloud vision API (injected by the host).
    Cloud,
    /// Generic HTTP OCR service.
    Http,
}

/// One region of recognized text in capture-local coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognizedRegion {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub confidence: f32,
    #[serde(default)]
    pub orientation: Orientation,
}

/// Uniform contract every OCR backend sits behind. Dispatch is
/// fire-and-forget from the scheduler's point of view; results come back
/// through this future and are applied by the completion path.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    async fn submit(&self, frame: &Frame, source_language: &str) -> Result<Vec<RecognizedRegion>>;
}

/// Holds the registered backends and picks one by method identifier.
/// Backends are injected at construction; asking for an unregistered
/// method is a dispatch error the caller logs and absorbs.
pub struct OcrRouter {
    backends: HashMap<OcrMethod, Arc<dyn OcrBackend>>,
}

impl OcrRouter {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    pub fn register(&mut self, method: OcrMethod, backend: Arc<dyn OcrBackend>) {
        self.backends.insert(method, backend);
    }

    pub fn backend_for(&self, method: OcrMethod) -> Result<Arc<dyn OcrBackend>> {
        match self.backends.get(&method) {
            Some(backend) => Ok(Arc::clone(backend)),
            None => bail!("no OCR backend registered for {:?}", method),
        }
    }
}

impl Default for OcrRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop regions below the configured confidence floor for the active
/// method.
pub fn filter_regions(regions: Vec<RecognizedRegion>, min_confidence: f32) -> Vec<RecognizedRegion> {
    regions
        .into_iter()
        .filter(|region| region.confidence >= min_confidence)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(text: &str, confidence: f32) -> RecognizedRegion {
        RecognizedRegion {
            text: text.to_string(),
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            confidence,
            orientation: Orientation::Horizontal,
        }
    }

    #[test]
    fn filter_drops_low_confidence_regions() {
        let regions = vec![region("keep", 0.9), region("drop", 0.3), region("edge", 0.5)];
        let kept = filter_regions(regions, 0.5);

        let texts: Vec<&str> = kept.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["keep", "edge"]);
    }

    #[test]
    fn router_rejects_unregistered_methods() {
        let router = OcrRouter::new();
        assert!(router.backend_for(OcrMethod::Local).is_err());
    }
}
