//! Per-document evaluation: fuses OCR output, the deterministic fuzzy
//! matcher, and the LLM assessments into one [`DocumentVerdict`].

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::assessments::{Assessor, FLAG_LLM_EVALUATION_FAILED};
use crate::error::OcrError;
use crate::matching::{self, FuzzyMatchResult};
use crate::ocr::OcrEngine;
use crate::types::{
    round3, AuthenticityAssessment, Document, DocumentVerdict, FieldComparison, FieldComparisons,
    FieldStatus, FlagSet, IdentityClaim, VerificationStatus,
};

pub const FLAG_DOCUMENT_MISSING: &str = "document_missing";
pub const FLAG_OCR_FAILED: &str = "ocr_failed";
pub const FLAG_LOW_MATCH_SCORE: &str = "low_match_score";
pub const FLAG_NAME_NOT_FOUND: &str = "name_not_found";
pub const FLAG_DOB_NOT_FOUND: &str = "dob_not_found";
pub const FLAG_PROCESSING_ERROR: &str = "processing_error";

/// Authenticity confidence below which a `manual_review` verdict gets an
/// explicit failure reason.
const LOW_AUTHENTICITY_CONFIDENCE: f64 = 0.5;
/// Field-comparison confidence below which an `uncertain` field counts as a
/// failure reason.
const UNCERTAIN_CONFIDENCE_BAR: f64 = 0.6;

/// Evaluates one document against one identity claim.
pub struct DocumentEvaluator {
    ocr: Arc<dyn OcrEngine>,
    assessor: Assessor,
    match_score_threshold: f64,
}

impl DocumentEvaluator {
    pub fn new(ocr: Arc<dyn OcrEngine>, assessor: Assessor, match_score_threshold: f64) -> Self {
        Self {
            ocr,
            assessor,
            match_score_threshold,
        }
    }

    /// Produce the fused verdict for `document`. Never returns an error:
    /// every failure mode degrades to a `manual_review` verdict with a
    /// named flag, so a single document can never abort its siblings.
    pub async fn evaluate(&self, claim: &IdentityClaim, document: &Document) -> DocumentVerdict {
        let extracted = match self.ocr.extract_text(&document.image_reference).await {
            Ok(extracted) => extracted,
            Err(OcrError::FileNotFound { path }) => {
                info!(path = %path, "document image missing");
                return degraded_verdict(
                    &document.document_type,
                    FLAG_DOCUMENT_MISSING,
                    &format!("document image not found: {path}"),
                );
            }
            Err(err) => {
                info!(error = %err, "OCR extraction failed");
                return degraded_verdict(&document.document_type, FLAG_OCR_FAILED, &err.to_string());
            }
        };

        if extracted.text.trim().is_empty() {
            return degraded_verdict(
                &document.document_type,
                FLAG_OCR_FAILED,
                "no text could be extracted from the document image",
            );
        }

        let fuzzy = matching::evaluate(&extracted.lines, &claim.full_name, &claim.date_of_birth);
        debug!(
            match_score = fuzzy.match_score,
            name_score = fuzzy.name_score,
            dob_score = fuzzy.dob_score,
            "fuzzy match computed"
        );

        // Authenticity runs concurrently with the extraction → comparison
        // chain; comparison needs the extraction output.
        let (authenticity, (fields, comparisons)) = tokio::join!(
            self.assessor
                .assess_authenticity(&document.document_type, &extracted.text, claim),
            async {
                let fields = self.assessor.extract_fields(&extracted.text).await;
                let comparisons = self.assessor.compare_fields(&fields, claim).await;
                (fields, comparisons)
            }
        );

        let mut flags = FlagSet::new();
        flags.extend(authenticity.flags.iter().cloned());
        if fuzzy.match_score < self.match_score_threshold {
            flags.insert(FLAG_LOW_MATCH_SCORE);
        }
        if fuzzy.name_score == 0.0 {
            flags.insert(FLAG_NAME_NOT_FOUND);
        }
        if fuzzy.dob_score == 0.0 && !claim.date_of_birth.trim().is_empty() {
            flags.insert(FLAG_DOB_NOT_FOUND);
        }

        // Fusion: the deterministic fuzzy signal can veto an optimistic LLM
        // verdict but never upgrade a pessimistic one; `rejected` stands.
        let mut status = authenticity.status;
        if status == VerificationStatus::Verified && fuzzy.match_score < self.match_score_threshold
        {
            status = VerificationStatus::ManualReview;
        }
        if flags.contains(FLAG_LLM_EVALUATION_FAILED) && status != VerificationStatus::Rejected {
            status = VerificationStatus::ManualReview;
        }

        let failure_reasons = build_failure_reasons(claim, &authenticity, &comparisons);
        let metadata = self.build_metadata(
            &extracted.text,
            &fuzzy,
            &authenticity,
            &fields,
            &comparisons,
            &failure_reasons,
        );

        info!(
            document_type = %document.document_type,
            status = status.as_str(),
            match_score = round3(fuzzy.match_score),
            flags = flags.len(),
            "document verdict"
        );

        DocumentVerdict {
            document_type: document.document_type.clone(),
            status,
            match_score: fuzzy.match_score,
            flags,
            metadata,
        }
    }

    fn build_metadata(
        &self,
        ocr_text: &str,
        fuzzy: &FuzzyMatchResult,
        authenticity: &AuthenticityAssessment,
        fields: &crate::types::ExtractedFields,
        comparisons: &FieldComparisons,
        failure_reasons: &[String],
    ) -> Map<String, Value> {
        as_object(json!({
            "fuzzy": {
                "match_score": round3(fuzzy.match_score),
                "name_score": round3(fuzzy.name_score),
                "dob_score": round3(fuzzy.dob_score),
                "best_name_line": fuzzy.best_name_line,
                "best_dob_value": fuzzy.best_dob_value,
            },
            "authenticity": {
                "status": authenticity.status,
                "confidence": round3(authenticity.confidence),
                "rationale": authenticity.rationale,
                "flags": authenticity.flags,
            },
            "model": self.assessor.model_name(),
            "extracted_fields": fields,
            "field_comparison": {
                "name": comparisons.name,
                "address": comparisons.address,
                "dob": comparisons.dob,
            },
            "failure_reasons": failure_reasons,
            "ocr_text": ocr_text,
        }))
    }
}

/// Verdict for a document that could not be evaluated at all.
pub(crate) fn degraded_verdict(document_type: &str, flag: &str, message: &str) -> DocumentVerdict {
    let mut flags = FlagSet::new();
    flags.insert(flag);
    DocumentVerdict {
        document_type: document_type.to_string(),
        status: VerificationStatus::ManualReview,
        match_score: 0.0,
        flags,
        metadata: as_object(json!({
            "error": message,
            "failure_reasons": [message],
        })),
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Reviewer-readable explanations mirroring the verification analysis: why
/// this document is not a clean pass.
fn build_failure_reasons(
    claim: &IdentityClaim,
    authenticity: &AuthenticityAssessment,
    comparisons: &FieldComparisons,
) -> Vec<String> {
    let mut reasons = Vec::new();

    match authenticity.status {
        VerificationStatus::Rejected => {
            let rationale = if authenticity.rationale.is_empty() {
                "document appears fraudulent"
            } else {
                authenticity.rationale.as_str()
            };
            reasons.push(format!("Document authenticity check failed: {rationale}"));
        }
        VerificationStatus::ManualReview
            if authenticity.confidence < LOW_AUTHENTICITY_CONFIDENCE =>
        {
            let rationale = if authenticity.rationale.is_empty() {
                "unable to verify document authenticity"
            } else {
                authenticity.rationale.as_str()
            };
            reasons.push(format!(
                "Low authenticity confidence ({:.2}): {rationale}",
                authenticity.confidence
            ));
        }
        _ => {}
    }
    for flag in &authenticity.flags {
        if flag != FLAG_LLM_EVALUATION_FAILED {
            reasons.push(format!("Authenticity flag: {flag}"));
        }
    }

    field_failure_reasons(&mut reasons, "Name", &claim.full_name, &comparisons.name);
    field_failure_reasons(&mut reasons, "Address", &claim.address, &comparisons.address);
    field_failure_reasons(
        &mut reasons,
        "Date of birth",
        &claim.date_of_birth,
        &comparisons.dob,
    );

    reasons
}

fn field_failure_reasons(
    reasons: &mut Vec<String>,
    label: &str,
    claimed: &str,
    comparison: &FieldComparison,
) {
    match comparison.status {
        FieldStatus::Match => {}
        FieldStatus::Mismatch => {
            let found = if comparison.ocr_value.is_empty() {
                "not found"
            } else {
                comparison.ocr_value.as_str()
            };
            reasons.push(format!(
                "{label} mismatch: expected '{claimed}', found '{found}'"
            ));
        }
        FieldStatus::NotFound => {
            reasons.push(format!("{label} not found in document"));
        }
        FieldStatus::Uncertain if comparison.confidence < UNCERTAIN_CONFIDENCE_BAR => {
            let reason = comparison
                .reason
                .as_deref()
                .unwrap_or("could not verify field");
            reasons.push(format!(
                "{label} verification uncertain (confidence: {:.2}): {reason}",
                comparison.confidence
            ));
        }
        FieldStatus::Uncertain => {}
    }
}
