//! Review outcome normalization.
//!
//! Reviewer replies are advisory: scores may be missing and the model's own
//! `approved` flag may disagree with its numbers. The pipeline trusts the
//! derived total against the configured threshold, never the flag alone.

use crate::model::ReviewResult;
use serde_json::Value;

/// Build the canonical outcome of one review attempt.
///
/// An unextractable reply yields a zero-score rejection. When the reviewer
/// omits `total_score`, it is derived as legal x 0.5 + feasibility x 0.5.
/// `approved` is then recomputed from the total against `threshold`,
/// overriding whatever the reviewer claimed.
pub fn finalize_review(extracted: Option<Value>, threshold: f64) -> ReviewResult {
    let mut review: ReviewResult = match extracted {
        Some(value) => serde_json::from_value(value).unwrap_or_default(),
        None => {
            return ReviewResult {
                total_score: Some(0.0),
                overall_assessment: "Review result could not be parsed".into(),
                approved: false,
                ..ReviewResult::default()
            }
        }
    };

    let total = review.total_score.unwrap_or_else(|| {
        review.legal_compliance.score * 0.5 + review.feasibility.score * 0.5
    });
    review.total_score = Some(total);
    review.approved = total >= threshold;
    review
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unparseable_reply_rejects_with_zero() {
        let review = finalize_review(None, 80.0);
        assert!(!review.approved);
        assert_eq!(review.total_score, Some(0.0));
        assert!(review.overall_assessment.contains("could not be parsed"));
    }

    #[test]
    fn test_missing_total_derived_from_dimensions() {
        let review = finalize_review(
            Some(json!({
                "legal_compliance": {"score": 90.0},
                "feasibility": {"score": 70.0}
            })),
            80.0,
        );
        assert_eq!(review.total_score, Some(80.0));
        assert!(review.approved);
    }

    #[test]
    fn test_threshold_overrides_reviewer_flag() {
        // Reviewer claims approval but the numbers fall short.
        let review = finalize_review(
            Some(json!({
                "legal_compliance": {"score": 60.0},
                "feasibility": {"score": 60.0},
                "total_score": 60.0,
                "approved": true
            })),
            80.0,
        );
        assert!(!review.approved);

        // And the inverse: numbers clear the bar despite a false flag.
        let review = finalize_review(
            Some(json!({
                "total_score": 85.0,
                "approved": false
            })),
            80.0,
        );
        assert!(review.approved);
    }

    #[test]
    fn test_explicit_total_wins_over_dimensions() {
        let review = finalize_review(
            Some(json!({
                "legal_compliance": {"score": 100.0},
                "feasibility": {"score": 100.0},
                "total_score": 42.0
            })),
            80.0,
        );
        assert_eq!(review.total_score, Some(42.0));
        assert!(!review.approved);
    }

    #[test]
    fn test_boundary_score_is_approved() {
        let review = finalize_review(Some(json!({"total_score": 80.0})), 80.0);
        assert!(review.approved);
    }
}
