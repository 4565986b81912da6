//! OCR client boundary.
//!
//! The OCR engine is a black box: image path in, ordered text lines out.
//! [`RemoteOcrEngine`] talks to an OCR sidecar over HTTP; tests and
//! alternative engines plug in behind the [`OcrEngine`] trait.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::VerifyConfig;
use crate::error::OcrError;
use crate::types::ExtractedText;

/// Seam for the OCR engine. Implementations must be safe for concurrent use
/// across tasks.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Run OCR on the image at `image_path`.
    ///
    /// Must return [`OcrError::FileNotFound`] when the path does not
    /// resolve, and any other failure as a generic engine error.
    async fn extract_text(&self, image_path: &str) -> Result<ExtractedText, OcrError>;
}

/// HTTP client for an OCR sidecar accepting `{"file_path": ...}` and
/// returning `{"lines": [...], "text": "..."}`.
#[derive(Debug, Clone)]
pub struct RemoteOcrEngine {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct OcrResponse {
    #[serde(default)]
    lines: Vec<String>,
    #[serde(default)]
    text: Option<String>,
}

impl RemoteOcrEngine {
    pub fn new(config: &VerifyConfig) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.ocr_url.clone(),
        })
    }
}

#[async_trait]
impl OcrEngine for RemoteOcrEngine {
    async fn extract_text(&self, image_path: &str) -> Result<ExtractedText, OcrError> {
        if image_path.trim().is_empty() || !Path::new(image_path).exists() {
            return Err(OcrError::FileNotFound {
                path: image_path.to_string(),
            });
        }

        debug!(path = image_path, "requesting OCR extraction");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "file_path": image_path }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Engine {
                message: format!("OCR sidecar returned status {status}: {body}"),
            });
        }

        let body: OcrResponse = response.json().await.map_err(|err| OcrError::Engine {
            message: format!("malformed OCR payload: {err}"),
        })?;
        let text = match body.text {
            Some(text) => text,
            None => body.lines.join("\n"),
        };
        Ok(ExtractedText {
            lines: body.lines,
            text,
        })
    }
}
