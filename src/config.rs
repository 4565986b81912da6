//! Environment-driven configuration for the verification pipeline.

use std::time::Duration;

use tracing::warn;

/// Default Ollama endpoint inside the compose network.
const DEFAULT_OLLAMA_URL: &str = "http://ollama:11434";
/// Default OCR sidecar endpoint.
const DEFAULT_OCR_URL: &str = "http://ocr:8000/extract";
/// Default model used for all three assessments.
const DEFAULT_MODEL: &str = "llama3";
/// Fuzzy-score floor below which a `verified` authenticity verdict is
/// downgraded to `manual_review`. Tunable business parameter.
const DEFAULT_MATCH_SCORE_THRESHOLD: f64 = 0.65;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_CONCURRENT_DOCUMENTS: usize = 4;

/// Configuration surface consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Base URL of the LLM backend.
    pub ollama_url: String,
    /// Endpoint of the OCR sidecar.
    pub ocr_url: String,
    /// Model identifier passed to the LLM backend.
    pub model: String,
    /// Downgrade threshold for the deterministic fuzzy score.
    pub match_score_threshold: f64,
    /// Timeout applied to every OCR and LLM request.
    pub request_timeout: Duration,
    /// Upper bound on concurrently evaluated documents per task.
    pub max_concurrent_documents: usize,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            ocr_url: DEFAULT_OCR_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            match_score_threshold: DEFAULT_MATCH_SCORE_THRESHOLD,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_concurrent_documents: DEFAULT_MAX_CONCURRENT_DOCUMENTS,
        }
    }
}

impl VerifyConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults above. Unparseable numeric values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("OLLAMA_URL") {
            if !url.trim().is_empty() {
                config.ollama_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Ok(url) = std::env::var("KYC_OCR_URL") {
            if !url.trim().is_empty() {
                config.ocr_url = url;
            }
        }
        if let Ok(model) = std::env::var("KYC_LLM_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Some(threshold) = parse_env("MATCH_SCORE_THRESHOLD") {
            config.match_score_threshold = f64::clamp(threshold, 0.0, 1.0);
        }
        if let Some(secs) = parse_env::<u64>("KYC_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = parse_env::<usize>("KYC_MAX_CONCURRENT_DOCUMENTS") {
            config.max_concurrent_documents = limit.max(1);
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparseable configuration value");
            None
        }
    }
}
