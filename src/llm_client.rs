//! LLM backend boundary.
//!
//! The backend is a single HTTP JSON endpoint (Ollama `/api/generate`
//! compatible): it accepts `{model, prompt, stream: false, format: "json"}`
//! and returns a body whose `response` field is the completion text. An
//! unreachable backend is a first-class outcome, surfaced as
//! [`LlmError::Http`] and absorbed by the assessment layer.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::VerifyConfig;
use crate::error::LlmError;

/// Seam for the LLM backend. Implementations must be safe for concurrent
/// use across tasks.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Request a JSON-formatted completion for `prompt`, returning the raw
    /// completion text.
    async fn generate_json(&self, prompt: &str) -> Result<String, LlmError>;

    fn model_name(&self) -> &str;
}

/// Ollama-compatible HTTP client.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

impl OllamaClient {
    pub fn new(config: &VerifyConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
        let payload = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        debug!(model = %self.model, "sending generate request");
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|err| LlmError::MalformedJson(err.to_string()))?;
        body.response.ok_or(LlmError::MissingKey("response"))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = VerifyConfig {
            ollama_url: "http://localhost:11434/".to_string(),
            ..VerifyConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model_name(), "llama3");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_http_error() {
        let config = VerifyConfig {
            // Discard port: connection refused, not a hang.
            ollama_url: "http://127.0.0.1:9".to_string(),
            request_timeout: std::time::Duration::from_secs(2),
            ..VerifyConfig::default()
        };
        let client = OllamaClient::new(&config).unwrap();
        let err = client.generate_json("{}").await.unwrap_err();
        assert!(matches!(err, LlmError::Http(_)), "got {err:?}");
    }
}
