//! Identity-document verification pipeline
//!
//! This crate takes a user-asserted identity (name, address, date of birth)
//! plus one or more scanned identity documents and produces an auditable
//! verification decision (`verified` / `manual_review` / `rejected`) with
//! explainable flags. Two independent signal sources are fused:
//! deterministic fuzzy matching against OCR output, and LLM-derived
//! structured assessments (authenticity, field extraction, field comparison).
//!
//! ## Architecture
//!
//! ```text
//! Request → Document Evaluator ──→ Task Aggregator → Service Facade → Response
//!              │        │   │
//!            OCR   Fuzzy Matcher   LLM Assessments
//! ```
//!
//! The OCR engine and the LLM backend are external collaborators behind the
//! [`OcrEngine`] and [`LlmClient`] traits. Every backend failure degrades to
//! a documented sentinel value; the facade always returns a complete
//! response, never an error.

pub mod aggregator;
pub mod assessments;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod llm_client;
pub mod matching;
pub mod messages;
pub mod ocr;
pub mod service;
pub mod types;

// Re-exports for convenience
pub use aggregator::aggregate;
pub use assessments::Assessor;
pub use config::VerifyConfig;
pub use error::{LlmError, OcrError};
pub use evaluator::DocumentEvaluator;
pub use llm_client::{LlmClient, OllamaClient};
pub use matching::FuzzyMatchResult;
pub use messages::{VerificationRequest, VerificationResponse};
pub use ocr::{OcrEngine, RemoteOcrEngine};
pub use service::VerificationService;
pub use types::{
    AuthenticityAssessment, Document, DocumentVerdict, ExtractedText, FieldComparison,
    FieldStatus, FlagSet, IdentityClaim, TaskVerdict, VerificationStatus,
};
