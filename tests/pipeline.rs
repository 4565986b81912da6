//! End-to-end pipeline test through the public facade: two documents with
//! diverging authenticity verdicts must reject the whole task while keeping
//! both per-document verdicts auditable.

use std::sync::Arc;

use async_trait::async_trait;

use kyc_verify::messages::UserData;
use kyc_verify::{
    Document, ExtractedText, LlmClient, LlmError, OcrEngine, OcrError, VerificationRequest,
    VerificationService, VerificationStatus, VerifyConfig,
};

struct FixtureOcr;

#[async_trait]
impl OcrEngine for FixtureOcr {
    async fn extract_text(&self, image_path: &str) -> Result<ExtractedText, OcrError> {
        if image_path.ends_with("missing.jpg") {
            return Err(OcrError::FileNotFound {
                path: image_path.to_string(),
            });
        }
        Ok(ExtractedText::from_lines(vec![
            "DRIVER'S LICENSE".to_string(),
            "AVERY DOE".to_string(),
            "DOB 1988-08-15".to_string(),
            format!("SOURCE {image_path}"),
        ]))
    }
}

/// Rejects any document whose OCR text mentions `forged`, verifies the rest.
struct SelectiveLlm;

#[async_trait]
impl LlmClient for SelectiveLlm {
    async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.contains("Assess the authenticity") {
            if prompt.contains("forged") {
                return Ok(r#"{"status": "rejected", "confidence": 0.95,
                              "rationale": "layout does not match issuing authority",
                              "flags": ["template_mismatch"]}"#
                    .to_string());
            }
            return Ok(
                r#"{"status": "verified", "confidence": 0.9, "rationale": "ok", "flags": []}"#
                    .to_string(),
            );
        }
        if prompt.contains("Extract ONLY the Name") {
            return Ok(
                r#"{"name": "Avery Doe", "address": "1 Anywhere St", "date_of_birth": "1988-08-15"}"#
                    .to_string(),
            );
        }
        Ok(r#"{"name_match": {"status": "match", "ocr_value": "AVERY DOE", "confidence": 0.95},
               "address_match": {"status": "match", "ocr_value": "1 ANYWHERE ST", "confidence": 0.9},
               "dob_match": {"status": "match", "ocr_value": "1988-08-15", "confidence": 0.95}}"#
            .to_string())
    }

    fn model_name(&self) -> &str {
        "selective"
    }
}

fn request(documents: Vec<Document>) -> VerificationRequest {
    VerificationRequest {
        task_id: "task-42".into(),
        user_id: "user-7".into(),
        user_data: UserData {
            full_name: "Avery Doe".into(),
            dob: "1988-08-15".into(),
            address: "1 Anywhere St".into(),
        },
        documents,
    }
}

fn service() -> VerificationService {
    VerificationService::new(
        &VerifyConfig::default(),
        Arc::new(FixtureOcr),
        Arc::new(SelectiveLlm),
    )
}

#[tokio::test]
async fn rejected_document_rejects_the_task() {
    let response = service()
        .verify(request(vec![
            Document {
                document_type: "driver_license".into(),
                image_reference: "/data/uploads/genuine.jpg".into(),
            },
            Document {
                document_type: "passport".into(),
                image_reference: "/data/uploads/forged.jpg".into(),
            },
        ]))
        .await;

    assert_eq!(response.step, "kyc_done");
    assert_eq!(response.result.status, VerificationStatus::Rejected);
    assert!(response.result.flags.contains("template_mismatch"));

    let documents = response.result.metadata["documents"].as_array().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0]["status"], "verified");
    assert_eq!(documents[1]["status"], "rejected");
    assert_eq!(
        documents[1]["metadata"]["authenticity"]["rationale"],
        "layout does not match issuing authority"
    );
}

#[tokio::test]
async fn missing_document_degrades_but_keeps_siblings() {
    let response = service()
        .verify(request(vec![
            Document {
                document_type: "driver_license".into(),
                image_reference: "/data/uploads/genuine.jpg".into(),
            },
            Document {
                document_type: "utility_bill".into(),
                image_reference: "/data/uploads/missing.jpg".into(),
            },
        ]))
        .await;

    assert_eq!(response.result.status, VerificationStatus::ManualReview);
    assert!(response.result.flags.contains("document_missing"));

    let documents = response.result.metadata["documents"].as_array().unwrap();
    assert_eq!(documents[0]["status"], "verified");
    assert_eq!(documents[1]["status"], "manual_review");
}
