//! Verification service facade.
//!
//! Single entry point consumed by the surrounding messaging/HTTP layer.
//! Owns error containment: a single document failure never aborts the task,
//! and `verify` always returns a complete, well-formed response.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::aggregator::aggregate;
use crate::assessments::Assessor;
use crate::config::VerifyConfig;
use crate::evaluator::{degraded_verdict, DocumentEvaluator, FLAG_PROCESSING_ERROR};
use crate::llm_client::{LlmClient, OllamaClient};
use crate::messages::{VerificationRequest, VerificationResponse, VerificationResult, STEP_KYC_DONE};
use crate::ocr::{OcrEngine, RemoteOcrEngine};
use crate::types::{Document, DocumentVerdict, FlagSet, IdentityClaim, TaskVerdict, VerificationStatus};

/// Flag set when the request carries no usable identity data; no backend is
/// called in that case.
pub const FLAG_EMPTY_CLAIM: &str = "empty_claim";

/// Facade over the whole pipeline. Cheap to clone behind the contained
/// `Arc`s; safe for concurrent use across tasks.
pub struct VerificationService {
    evaluator: Arc<DocumentEvaluator>,
    semaphore: Arc<Semaphore>,
}

impl VerificationService {
    pub fn new(config: &VerifyConfig, ocr: Arc<dyn OcrEngine>, llm: Arc<dyn LlmClient>) -> Self {
        let evaluator = DocumentEvaluator::new(
            ocr,
            Assessor::new(llm),
            config.match_score_threshold,
        );
        Self {
            evaluator: Arc::new(evaluator),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_documents.max(1))),
        }
    }

    /// Wire up the real OCR sidecar and LLM backend clients.
    pub fn from_config(config: &VerifyConfig) -> Result<Self> {
        let ocr = Arc::new(RemoteOcrEngine::new(config)?);
        let llm = Arc::new(OllamaClient::new(config)?);
        Ok(Self::new(config, ocr, llm))
    }

    /// Run one verification task end to end. Infallible by design: every
    /// failure mode is folded into the returned verdict.
    pub async fn verify(&self, request: VerificationRequest) -> VerificationResponse {
        let claim: IdentityClaim = request.user_data.clone().into();
        info!(
            task_id = %request.task_id,
            user_id = %request.user_id,
            documents = request.documents.len(),
            "verification task received"
        );

        let task = if claim.is_empty() {
            let mut flags = FlagSet::new();
            flags.insert(FLAG_EMPTY_CLAIM);
            TaskVerdict {
                status: VerificationStatus::ManualReview,
                match_score: 0.0,
                flags,
                per_document: Vec::new(),
            }
        } else {
            let verdicts = self.evaluate_documents(&claim, &request.documents).await;
            aggregate(verdicts)
        };

        info!(
            task_id = %request.task_id,
            status = task.status.as_str(),
            match_score = task.match_score,
            "verification task complete"
        );
        build_response(request, task)
    }

    /// Evaluate all documents with bounded parallelism. Results re-attach
    /// to their originating document by index, never by completion order.
    /// Dropping the returned future aborts in-flight evaluations.
    async fn evaluate_documents(
        &self,
        claim: &IdentityClaim,
        documents: &[Document],
    ) -> Vec<DocumentVerdict> {
        let mut join_set = JoinSet::new();
        for (index, document) in documents.iter().cloned().enumerate() {
            let evaluator = Arc::clone(&self.evaluator);
            let semaphore = Arc::clone(&self.semaphore);
            let claim = claim.clone();
            join_set.spawn(async move {
                // The semaphore is never closed while the service lives.
                let _permit = semaphore.acquire_owned().await;
                (index, evaluator.evaluate(&claim, &document).await)
            });
        }

        let mut slots: Vec<Option<DocumentVerdict>> = vec![None; documents.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, verdict)) => slots[index] = Some(verdict),
                Err(err) => {
                    // The panicked task's index is unknown; the leftover
                    // empty slots are filled below.
                    error!(error = %err, "document evaluation task failed");
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    degraded_verdict(
                        &documents[index].document_type,
                        FLAG_PROCESSING_ERROR,
                        "document evaluation failed unexpectedly",
                    )
                })
            })
            .collect()
    }
}

fn build_response(request: VerificationRequest, task: TaskVerdict) -> VerificationResponse {
    let metadata = json!({
        "documents": task.per_document,
        "user": {
            "full_name": request.user_data.full_name,
            "dob": request.user_data.dob,
            "address": request.user_data.address,
        },
    });
    VerificationResponse {
        task_id: request.task_id,
        user_id: request.user_id,
        step: STEP_KYC_DONE.to_string(),
        result: VerificationResult {
            status: task.status,
            match_score: task.match_score,
            flags: task.flags,
            metadata,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, OcrError};
    use crate::messages::UserData;
    use crate::types::ExtractedText;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// OCR stub that always recognises the claimed identity; per-document
    /// latency comes from the trailing digit of the file path.
    struct StaggeredOcr;

    #[async_trait]
    impl OcrEngine for StaggeredOcr {
        async fn extract_text(&self, image_path: &str) -> Result<ExtractedText, OcrError> {
            let delay = image_path
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .unwrap_or(0) as u64;
            tokio::time::sleep(Duration::from_millis(delay * 10)).await;
            Ok(ExtractedText::from_lines(vec![
                "AVERY DOE".to_string(),
                "DOB 1988-08-15".to_string(),
            ]))
        }
    }

    /// OCR stub that records how many extractions ran concurrently.
    struct CountingOcr {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl CountingOcr {
        fn new() -> Self {
            Self {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl OcrEngine for CountingOcr {
        async fn extract_text(&self, _image_path: &str) -> Result<ExtractedText, OcrError> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(ExtractedText::from_lines(vec!["AVERY DOE".to_string()]))
        }
    }

    /// OCR stub proving it was never called.
    struct TrackingOcr(AtomicUsize);

    #[async_trait]
    impl OcrEngine for TrackingOcr {
        async fn extract_text(&self, _image_path: &str) -> Result<ExtractedText, OcrError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(ExtractedText::from_lines(vec![]))
        }
    }

    struct VerifiedLlm;

    #[async_trait]
    impl LlmClient for VerifiedLlm {
        async fn generate_json(&self, prompt: &str) -> Result<String, LlmError> {
            if prompt.contains("Assess the authenticity") {
                Ok(r#"{"status": "verified", "confidence": 0.9, "rationale": "ok", "flags": []}"#
                    .to_string())
            } else if prompt.contains("Extract ONLY the Name") {
                Ok(r#"{"name": "Avery Doe", "address": "", "date_of_birth": "1988-08-15"}"#
                    .to_string())
            } else {
                Ok(r#"{"name_match": {"status": "match", "ocr_value": "AVERY DOE", "confidence": 0.9},
                       "address_match": {"status": "match", "ocr_value": "", "confidence": 0.8},
                       "dob_match": {"status": "match", "ocr_value": "1988-08-15", "confidence": 0.9}}"#
                    .to_string())
            }
        }
        fn model_name(&self) -> &str {
            "verified"
        }
    }

    fn request(documents: Vec<Document>) -> VerificationRequest {
        VerificationRequest {
            task_id: "task-1".into(),
            user_id: "user-9".into(),
            user_data: UserData {
                full_name: "Avery Doe".into(),
                dob: "1988-08-15".into(),
                address: "1 Anywhere St".into(),
            },
            documents,
        }
    }

    fn document(document_type: &str, path: &str) -> Document {
        Document {
            document_type: document_type.into(),
            image_reference: path.into(),
        }
    }

    fn service(ocr: Arc<dyn OcrEngine>, config: &VerifyConfig) -> VerificationService {
        VerificationService::new(config, ocr, Arc::new(VerifiedLlm))
    }

    #[tokio::test]
    async fn test_per_document_order_survives_concurrency() {
        let service = service(Arc::new(StaggeredOcr), &VerifyConfig::default());
        // First document is the slowest; it must still come back first.
        let response = service
            .verify(request(vec![
                document("passport", "/data/slow5"),
                document("driver_license", "/data/fast0"),
                document("utility_bill", "/data/mid2"),
            ]))
            .await;
        assert_eq!(response.result.status, VerificationStatus::Verified);
        let documents = response.result.metadata["documents"].as_array().unwrap();
        let types: Vec<&str> = documents
            .iter()
            .map(|doc| doc["document_type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["passport", "driver_license", "utility_bill"]);
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_bound() {
        let ocr = Arc::new(CountingOcr::new());
        let config = VerifyConfig {
            max_concurrent_documents: 2,
            ..VerifyConfig::default()
        };
        let service = service(ocr.clone(), &config);
        service
            .verify(request(
                (0..5)
                    .map(|index| document("passport", &format!("/data/doc{index}")))
                    .collect(),
            ))
            .await;
        assert!(
            ocr.peak.load(Ordering::SeqCst) <= 2,
            "peak concurrency {} exceeded bound",
            ocr.peak.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_empty_document_list_is_manual_review() {
        let service = service(Arc::new(StaggeredOcr), &VerifyConfig::default());
        let response = service.verify(request(vec![])).await;
        assert_eq!(response.step, STEP_KYC_DONE);
        assert_eq!(response.result.status, VerificationStatus::ManualReview);
        assert_eq!(response.result.match_score, 0.0);
    }

    #[tokio::test]
    async fn test_empty_claim_short_circuits_without_backends() {
        let ocr = Arc::new(TrackingOcr(AtomicUsize::new(0)));
        let service = service(ocr.clone(), &VerifyConfig::default());
        let mut request = request(vec![document("passport", "/data/doc")]);
        request.user_data = UserData {
            full_name: "".into(),
            dob: " ".into(),
            address: "".into(),
        };
        let response = service.verify(request).await;
        assert_eq!(response.result.status, VerificationStatus::ManualReview);
        assert!(response.result.flags.contains(FLAG_EMPTY_CLAIM));
        assert_eq!(ocr.0.load(Ordering::SeqCst), 0, "no backend call expected");
    }

    #[tokio::test]
    async fn test_response_envelope_echoes_task_and_user() {
        let service = service(Arc::new(StaggeredOcr), &VerifyConfig::default());
        let response = service
            .verify(request(vec![document("driver_license", "/data/dl0")]))
            .await;
        assert_eq!(response.task_id, "task-1");
        assert_eq!(response.user_id, "user-9");
        assert_eq!(response.step, "kyc_done");
        assert_eq!(
            response.result.metadata["user"]["full_name"],
            serde_json::json!("Avery Doe")
        );
        let documents = response.result.metadata["documents"].as_array().unwrap();
        assert_eq!(documents.len(), 1);
        // The whole response survives a serde round trip unchanged.
        let raw = serde_json::to_string(&response).unwrap();
        let round_trip: VerificationResponse = serde_json::from_str(&raw).unwrap();
        assert_eq!(round_trip, response);
    }
}
