//! Error types for the OCR and LLM backend boundaries.
//!
//! These errors never escape the pipeline: the document evaluator and the
//! assessment layer convert every variant into a degraded verdict or a
//! sentinel value, keeping the error class as an audit string.

use thiserror::Error;

/// Failures raised by an OCR engine.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The document path does not resolve. Distinguished from engine
    /// failures so the evaluator can flag `document_missing`.
    #[error("OCR input file does not exist: {path}")]
    FileNotFound { path: String },

    #[error("OCR transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR engine failure: {message}")]
    Engine { message: String },
}

/// Failures raised by the LLM backend client.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM backend returned status {code}: {body}")]
    Status { code: u16, body: String },

    #[error("LLM response is not valid JSON: {0}")]
    MalformedJson(String),

    #[error("LLM response missing required key '{0}'")]
    MissingKey(&'static str),
}

impl LlmError {
    /// Short stable identifier retained in sentinel rationale/reason
    /// strings so degraded verdicts remain auditable.
    pub fn class(&self) -> &'static str {
        match self {
            LlmError::Http(err) if err.is_timeout() => "llm_timeout",
            LlmError::Http(_) => "llm_unreachable",
            LlmError::Status { .. } => "llm_bad_status",
            LlmError::MalformedJson(_) => "llm_malformed_json",
            LlmError::MissingKey(_) => "llm_contract_error",
        }
    }
}
