//! Task-level aggregation: fold per-document verdicts into one
//! [`TaskVerdict`].

use crate::types::{DocumentVerdict, FlagSet, TaskVerdict, VerificationStatus};

/// Combine the verdicts of all documents attached to one verification task.
///
/// Severity is monotonic fail-safe: any `rejected` document rejects the
/// task outright; otherwise any `manual_review` document sends the task to
/// manual review. A task with zero documents defaults to `manual_review`,
/// never silently `verified`. Flags union first-seen in document order;
/// `per_document` preserves the request ordering.
pub fn aggregate(per_document: Vec<DocumentVerdict>) -> TaskVerdict {
    let mut status = if per_document.is_empty() {
        VerificationStatus::ManualReview
    } else {
        VerificationStatus::Verified
    };
    let mut flags = FlagSet::new();
    let mut score_sum = 0.0;

    for verdict in &per_document {
        match verdict.status {
            VerificationStatus::Rejected => {
                status = VerificationStatus::Rejected;
            }
            VerificationStatus::ManualReview if status != VerificationStatus::Rejected => {
                status = VerificationStatus::ManualReview;
            }
            _ => {}
        }
        flags.extend(verdict.flags.iter());
        score_sum += verdict.match_score;
    }

    let match_score = if per_document.is_empty() {
        0.0
    } else {
        score_sum / per_document.len() as f64
    };

    TaskVerdict {
        status,
        match_score,
        flags,
        per_document,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn verdict(status: VerificationStatus, match_score: f64, flags: &[&str]) -> DocumentVerdict {
        DocumentVerdict {
            document_type: "driver_license".into(),
            status,
            match_score,
            flags: flags.iter().copied().collect(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_empty_task_is_manual_review() {
        let task = aggregate(vec![]);
        assert_eq!(task.status, VerificationStatus::ManualReview);
        assert_eq!(task.match_score, 0.0);
        assert!(task.flags.is_empty());
        assert!(task.per_document.is_empty());
    }

    #[test]
    fn test_rejected_dominates_verified() {
        let task = aggregate(vec![
            verdict(VerificationStatus::Rejected, 0.2, &["font_inconsistent"]),
            verdict(VerificationStatus::Verified, 0.9, &[]),
        ]);
        assert_eq!(task.status, VerificationStatus::Rejected);
    }

    #[test]
    fn test_rejected_dominates_later_manual_review() {
        let task = aggregate(vec![
            verdict(VerificationStatus::Rejected, 0.1, &[]),
            verdict(VerificationStatus::ManualReview, 0.5, &[]),
        ]);
        assert_eq!(task.status, VerificationStatus::Rejected);
    }

    #[test]
    fn test_manual_review_dominates_verified() {
        let task = aggregate(vec![
            verdict(VerificationStatus::Verified, 1.0, &[]),
            verdict(VerificationStatus::ManualReview, 0.5, &["low_match_score"]),
        ]);
        assert_eq!(task.status, VerificationStatus::ManualReview);
    }

    #[test]
    fn test_all_verified_stays_verified() {
        let task = aggregate(vec![
            verdict(VerificationStatus::Verified, 1.0, &[]),
            verdict(VerificationStatus::Verified, 0.8, &[]),
        ]);
        assert_eq!(task.status, VerificationStatus::Verified);
        assert!((task.match_score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_status_at_least_as_severe_as_worst_document() {
        let statuses = [
            VerificationStatus::Verified,
            VerificationStatus::ManualReview,
            VerificationStatus::Rejected,
        ];
        for a in statuses {
            for b in statuses {
                let task = aggregate(vec![verdict(a, 0.5, &[]), verdict(b, 0.5, &[])]);
                let worst = a.severity().max(b.severity());
                assert!(
                    task.status.severity() >= worst,
                    "{a:?} + {b:?} yielded {:?}",
                    task.status
                );
            }
        }
    }

    #[test]
    fn test_flags_union_first_seen_in_document_order() {
        let task = aggregate(vec![
            verdict(VerificationStatus::ManualReview, 0.4, &["ocr_failed", "low_match_score"]),
            verdict(
                VerificationStatus::ManualReview,
                0.3,
                &["low_match_score", "dob_not_found"],
            ),
        ]);
        let flags: Vec<&str> = task.flags.iter().collect();
        assert_eq!(flags, vec!["ocr_failed", "low_match_score", "dob_not_found"]);
    }

    #[test]
    fn test_per_document_order_preserved() {
        let task = aggregate(vec![
            verdict(VerificationStatus::Verified, 1.0, &[]),
            verdict(VerificationStatus::Rejected, 0.0, &[]),
        ]);
        assert_eq!(task.per_document[0].status, VerificationStatus::Verified);
        assert_eq!(task.per_document[1].status, VerificationStatus::Rejected);
    }
}
