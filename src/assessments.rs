//! Structured LLM assessments: authenticity, field extraction, field
//! comparison.
//!
//! All three operations share a uniform robustness contract: they never
//! return an error. Every failure mode (backend unreachable, bad status,
//! malformed JSON, missing keys) degrades to a documented sentinel value
//! carrying the error class, which is what lets the document evaluator
//! compose them safely.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::LlmError;
use crate::llm_client::LlmClient;
use crate::types::{
    clamp_score, AuthenticityAssessment, ExtractedFields, FieldComparison, FieldComparisons,
    FieldStatus, IdentityClaim, VerificationStatus,
};

/// Flag attached whenever the authenticity assessment could not be obtained.
pub const FLAG_LLM_EVALUATION_FAILED: &str = "llm_evaluation_failed";

/// Issues the three independent structured-output requests against one LLM
/// backend. Cheap to clone; safe for concurrent use.
#[derive(Clone)]
pub struct Assessor {
    llm: Arc<dyn LlmClient>,
}

impl Assessor {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    /// Pull name, address, and date of birth out of the OCR text. Returns
    /// all-empty fields on any failure: "extraction failed" is a value, not
    /// an error.
    pub async fn extract_fields(&self, ocr_text: &str) -> ExtractedFields {
        match self.try_extract_fields(ocr_text).await {
            Ok(fields) => fields,
            Err(err) => {
                warn!(error = %err, class = err.class(), "field extraction degraded to empty fields");
                ExtractedFields::default()
            }
        }
    }

    async fn try_extract_fields(&self, ocr_text: &str) -> Result<ExtractedFields, LlmError> {
        let prompt = build_extraction_prompt(ocr_text);
        let raw = self.llm.generate_json(&prompt).await?;
        let value = parse_lenient(&raw)?;
        Ok(ExtractedFields {
            name: string_field(&value, "name"),
            address: string_field(&value, "address"),
            date_of_birth: string_field(&value, "date_of_birth"),
        })
    }

    /// Judge whether the document appears genuine. On any failure returns
    /// `manual_review` with confidence 0.0 and the
    /// [`FLAG_LLM_EVALUATION_FAILED`] flag; never propagates the error.
    pub async fn assess_authenticity(
        &self,
        document_type: &str,
        ocr_text: &str,
        claim: &IdentityClaim,
    ) -> AuthenticityAssessment {
        match self.try_assess_authenticity(document_type, ocr_text, claim).await {
            Ok(assessment) => assessment,
            Err(err) => {
                warn!(error = %err, class = err.class(), "authenticity assessment degraded to manual_review");
                AuthenticityAssessment {
                    status: VerificationStatus::ManualReview,
                    confidence: 0.0,
                    rationale: err.class().to_string(),
                    flags: vec![FLAG_LLM_EVALUATION_FAILED.to_string()],
                }
            }
        }
    }

    async fn try_assess_authenticity(
        &self,
        document_type: &str,
        ocr_text: &str,
        claim: &IdentityClaim,
    ) -> Result<AuthenticityAssessment, LlmError> {
        let prompt = build_authenticity_prompt(document_type, ocr_text, claim);
        let raw = self.llm.generate_json(&prompt).await?;
        let value = parse_lenient(&raw)?;

        // Unknown or missing status labels canonicalize to manual_review.
        let status = value
            .get("status")
            .and_then(Value::as_str)
            .and_then(VerificationStatus::from_label)
            .unwrap_or(VerificationStatus::ManualReview);
        let confidence = clamp_score(value.get("confidence").and_then(Value::as_f64).unwrap_or(0.0));
        let rationale = string_field(&value, "rationale");
        let flags = value
            .get("flags")
            .and_then(Value::as_array)
            .map(|flags| {
                flags
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AuthenticityAssessment {
            status,
            confidence,
            rationale,
            flags,
        })
    }

    /// Compare the extracted fields against the claimed identity. On any
    /// whole-response failure all three comparisons degrade to `uncertain`;
    /// a response missing one field key degrades only that field.
    pub async fn compare_fields(
        &self,
        extracted: &ExtractedFields,
        claim: &IdentityClaim,
    ) -> FieldComparisons {
        let value = match self.try_compare_fields(extracted, claim).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, class = err.class(), "field comparison degraded to uncertain");
                return FieldComparisons {
                    name: uncertain_comparison(err.class()),
                    address: uncertain_comparison(err.class()),
                    dob: uncertain_comparison(err.class()),
                };
            }
        };

        FieldComparisons {
            name: comparison_field(&value, "name_match"),
            address: comparison_field(&value, "address_match"),
            dob: comparison_field(&value, "dob_match"),
        }
    }

    async fn try_compare_fields(
        &self,
        extracted: &ExtractedFields,
        claim: &IdentityClaim,
    ) -> Result<Value, LlmError> {
        let prompt = build_comparison_prompt(extracted, claim);
        let raw = self.llm.generate_json(&prompt).await?;
        parse_lenient(&raw)
    }
}

/// Parse completion text that should be JSON but may be wrapped in prose or
/// code fences: try a direct parse, then reparse the substring between the
/// first `{` and the last `}`.
pub(crate) fn parse_lenient(raw: &str) -> Result<Value, LlmError> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        return Ok(value);
    }
    let start = raw.find('{');
    let end = raw.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&raw[start..=end]) {
                return Ok(value);
            }
        }
    }
    Err(LlmError::MalformedJson(raw.chars().take(200).collect()))
}

fn string_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

fn uncertain_comparison(reason: &str) -> FieldComparison {
    FieldComparison {
        status: FieldStatus::Uncertain,
        ocr_value: String::new(),
        confidence: 0.0,
        reason: Some(reason.to_string()),
    }
}

/// A missing or malformed per-field object is a contract error, treated the
/// same as a backend error for that field only.
fn comparison_field(value: &Value, key: &'static str) -> FieldComparison {
    let Some(field) = value.get(key).filter(|field| field.is_object()) else {
        return uncertain_comparison(LlmError::MissingKey(key).class());
    };
    let status = field
        .get("status")
        .and_then(Value::as_str)
        .and_then(FieldStatus::from_label)
        .unwrap_or(FieldStatus::Uncertain);
    FieldComparison {
        status,
        ocr_value: string_field(field, "ocr_value"),
        confidence: clamp_score(field.get("confidence").and_then(Value::as_f64).unwrap_or(0.0)),
        reason: field
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn build_extraction_prompt(ocr_text: &str) -> String {
    format!(
        r#"You are a document data extraction specialist working for a regulated bank.
Extract ONLY the Name, Address, and Date of Birth from the OCR text of an identity document.

RULES:
1. Ignore all other information (license number, expiry date, restrictions).
2. Name may appear as "LASTNAME, FIRSTNAME" or "FIRSTNAME LASTNAME".
3. Address: street number comes before the street name; include street, city, province/state, postal code.
4. Date of Birth: accept any format (YYYY-MM-DD, YYYY/MM/DD, DD MMM YYYY, "1988 AUG 15") and normalize to YYYY-MM-DD.
5. If a field is not found, use an empty string.

OCR Extracted Text:
{ocr_text}

Return ONLY valid JSON, no explanations or markdown, matching exactly:
{{"name": "...", "address": "...", "date_of_birth": "YYYY-MM-DD"}}"#
    )
}

fn build_authenticity_prompt(document_type: &str, ocr_text: &str, claim: &IdentityClaim) -> String {
    let expected = json!({
        "name": claim.full_name,
        "address": claim.address,
        "date_of_birth": claim.date_of_birth,
    });
    format!(
        r#"You are a document verification expert working for a regulated bank.
Assess the authenticity of an identity document from its OCR-extracted text.

RULES:
1. Look for proper formatting, expected fields, and document structure.
2. Identify suspicious patterns, missing information, or inconsistencies.
3. Status values: "verified" (appears genuine), "manual_review" (uncertain, needs human oversight), "rejected" (appears fraudulent or incorrect).
4. Confidence is a float between 0.0 and 1.0.

Document Type: {document_type}

OCR Extracted Text:
{ocr_text}

Expected User Data:
{expected}

Return ONLY valid JSON, no explanations or markdown, matching exactly:
{{"status": "verified|manual_review|rejected", "confidence": 0.0, "rationale": "brief explanation", "flags": []}}"#
    )
}

fn build_comparison_prompt(extracted: &ExtractedFields, claim: &IdentityClaim) -> String {
    format!(
        r#"You are a data verification specialist working for a regulated bank.
Compare fields extracted from an identity document with the information the user provided.

RULES:
1. Compare each field (name, address, date of birth) independently.
2. Be flexible with formatting: ignore punctuation, spacing, case, and token order for names.
3. Dates match when they represent the same day regardless of format ("1988-08-15" matches "1988 AUG 15" and "1988/08/15").
4. Addresses match when street number, street name, city, province/state, and postal code agree, even if punctuation differs.
5. Only use "mismatch" for genuine discrepancies: different street, different date, different person.
6. Statuses: "match", "mismatch", "not_found", "uncertain" (use sparingly).

Extracted Fields:
- Name: {extracted_name}
- Address: {extracted_address}
- Date of Birth: {extracted_dob}

Provided User Information:
- Name: {claim_name}
- Address: {claim_address}
- Date of Birth: {claim_dob}

Return ONLY valid JSON, no explanations or markdown, matching exactly:
{{"name_match": {{"status": "...", "ocr_value": "...", "confidence": 0.0, "reason": "..."}},
 "address_match": {{"status": "...", "ocr_value": "...", "confidence": 0.0, "reason": "..."}},
 "dob_match": {{"status": "...", "ocr_value": "...", "confidence": 0.0, "reason": "..."}}}}"#,
        extracted_name = extracted.name,
        extracted_address = extracted.address,
        extracted_dob = extracted.date_of_birth,
        claim_name = claim.full_name,
        claim_address = claim.address,
        claim_dob = claim.date_of_birth,
    )
}
