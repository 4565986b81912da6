//! Domain model for the verification pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User-asserted ground truth for one verification task. Immutable once the
/// task starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityClaim {
    pub full_name: String,
    pub date_of_birth: String,
    pub address: String,
}

impl IdentityClaim {
    /// True when no field carries usable content.
    pub fn is_empty(&self) -> bool {
        self.full_name.trim().is_empty()
            && self.date_of_birth.trim().is_empty()
            && self.address.trim().is_empty()
    }
}

/// One uploaded document: a type label plus an opaque pointer to the image
/// bytes. Owned by the caller, read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "type")]
    pub document_type: String,
    #[serde(rename = "file_path")]
    pub image_reference: String,
}

/// OCR output: recognised lines in reading order plus their concatenation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub lines: Vec<String>,
    pub text: String,
}

impl ExtractedText {
    pub fn from_lines(lines: Vec<String>) -> Self {
        let text = lines.join("\n");
        Self { lines, text }
    }
}

/// Canonical verification statuses, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    ManualReview,
    Rejected,
}

impl VerificationStatus {
    /// Severity rank: `rejected` dominates `manual_review` dominates
    /// `verified`.
    pub fn severity(self) -> u8 {
        match self {
            VerificationStatus::Verified => 0,
            VerificationStatus::ManualReview => 1,
            VerificationStatus::Rejected => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::ManualReview => "manual_review",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Parse a status label coming back from the LLM. Unknown labels return
    /// `None`; callers canonicalize that to `ManualReview`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "verified" => Some(VerificationStatus::Verified),
            "manual_review" => Some(VerificationStatus::ManualReview),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

/// Per-field comparison outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStatus {
    Match,
    Mismatch,
    NotFound,
    Uncertain,
}

impl FieldStatus {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "match" => Some(FieldStatus::Match),
            "mismatch" => Some(FieldStatus::Mismatch),
            "not_found" => Some(FieldStatus::NotFound),
            "uncertain" => Some(FieldStatus::Uncertain),
            _ => None,
        }
    }
}

/// LLM comparison of one extracted field against the claimed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparison {
    pub status: FieldStatus,
    pub ocr_value: String,
    pub confidence: f64,
    pub reason: Option<String>,
}

/// Comparison results for the three identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldComparisons {
    pub name: FieldComparison,
    pub address: FieldComparison,
    pub dob: FieldComparison,
}

/// LLM judgment on whether a document appears genuine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityAssessment {
    pub status: VerificationStatus,
    pub confidence: f64,
    pub rationale: String,
    pub flags: Vec<String>,
}

/// Fields pulled out of the OCR text by the LLM. Empty strings mean the
/// field was not found or extraction failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub name: String,
    pub address: String,
    pub date_of_birth: String,
}

/// Ordered, duplicate-free set of flag strings. Insertion order is
/// preserved so audit output reads in decision order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagSet {
    items: Vec<String>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a flag unless already present.
    pub fn insert(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.items.iter().any(|f| f == &flag) {
            self.items.push(flag);
        }
    }

    pub fn extend<I, S>(&mut self, flags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for flag in flags {
            self.insert(flag);
        }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.items.iter().any(|f| f == flag)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

impl<S: Into<String>> FromIterator<S> for FlagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FlagSet::new();
        set.extend(iter);
        set
    }
}

/// Fused per-document result. Created once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVerdict {
    pub document_type: String,
    pub status: VerificationStatus,
    pub match_score: f64,
    pub flags: FlagSet,
    pub metadata: Map<String, Value>,
}

/// Task-level result over all documents of one verification request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVerdict {
    pub status: VerificationStatus,
    pub match_score: f64,
    pub flags: FlagSet,
    pub per_document: Vec<DocumentVerdict>,
}

/// Clamp a score into `[0,1]`. NaN collapses to 0.0 (signal absent).
pub(crate) fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Round a score to three decimals for reviewer-facing metadata.
pub(crate) fn round3(score: f64) -> f64 {
    (score * 1000.0).round() / 1000.0
}
