use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::capture::frame::Frame;
use crate::logic::Orientation;

use super::{OcrBackend, RecognizedRegion};

/// Generic HTTP OCR service: POSTs a base64 PNG plus a language hint and
/// expects recognized regions back. The service URL comes from
/// configuration and may be repointed at runtime.
pub struct HttpOcrBackend {
    client: reqwest::Client,
    endpoint: std::sync::RwLock<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OcrRequest<'a> {
    image: String,
    language: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OcrResponse {
    #[serde(default)]
    regions: Vec<WireRegion>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRegion {
    text: String,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    vertical: bool,
}

fn default_confidence() -> f32 {
    1.0
}

impl HttpOcrBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: std::sync::RwLock::new(endpoint),
        }
    }

    pub fn set_endpoint(&self, endpoint: String) {
        *self.endpoint.write().unwrap() = endpoint;
    }
}

#[async_trait]
impl OcrBackend for HttpOcrBackend {
    async fn submit(&self, frame: &Frame, source_language: &str) -> Result<Vec<RecognizedRegion>> {
        let png = frame.encode_png()?;
        let request = OcrRequest {
            image: BASE64.encode(&png),
            language: source_language,
        };
        let endpoint = self.endpoint.read().unwrap().clone();

        let response = self
            .client
            .post(&endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("OCR request to {endpoint} failed"))?
            .error_for_status()
            .context("OCR service returned an error status")?
            .json::<OcrResponse>()
            .await
            .context("OCR service returned an unparseable body")?;

        let regions = response
            .regions
            .into_iter()
            .map(|wire| RecognizedRegion {
                text: wire.text,
                x: wire.x,
                y: wire.y,
                width: wire.width,
                height: wire.height,
                confidence: wire.confidence,
                orientation: if wire.vertical {
                    Orientation::Vertical
                } else {
                    Orientation::Horizontal
                },
            })
            .collect();

        Ok(regions)
    }
}
