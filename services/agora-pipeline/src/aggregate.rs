//! Aggregation of citizen evaluations.
//!
//! Error-marked records are excluded before averaging. With no usable
//! records every dimension averages to 50, and the effectiveness formula
//! deliberately sums to 0.8 weight (personal 0.5 + family 0.2 + community
//! 0.1), so an empty round scores 40.0 rather than 50.0.

use crate::model::CitizenEvaluation;

/// Per-dimension averages over the scored citizen evaluations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CitizenAverages {
    pub personal: f64,
    pub family: f64,
    pub community: f64,
    pub fairness: f64,
    pub sustainability: f64,
    /// Number of records that contributed to the averages.
    pub scored_count: usize,
}

impl CitizenAverages {
    /// Compute averages over the usable records, defaulting to 50 per
    /// dimension when none are usable.
    pub fn from_evaluations(evaluations: &[CitizenEvaluation]) -> Self {
        let scored: Vec<&CitizenEvaluation> =
            evaluations.iter().filter(|e| e.is_scored()).collect();

        if scored.is_empty() {
            return Self {
                personal: 50.0,
                family: 50.0,
                community: 50.0,
                fairness: 50.0,
                sustainability: 50.0,
                scored_count: 0,
            };
        }

        let n = scored.len() as f64;
        let sum = |f: fn(&CitizenEvaluation) -> f64| scored.iter().map(|e| f(e)).sum::<f64>() / n;

        Self {
            personal: sum(|e| e.personal_impact.score),
            family: sum(|e| e.family_impact.score),
            community: sum(|e| e.community_impact.score),
            fairness: sum(|e| e.fairness.score),
            sustainability: sum(|e| e.sustainability.score),
            scored_count: scored.len(),
        }
    }

    /// Citizen-derived effectiveness anchor for the final assessment.
    pub fn effectiveness_score(&self) -> f64 {
        self.personal * 0.5 + self.family * 0.2 + self.community * 0.1
    }
}

/// Recommendation label for a total score.
pub fn recommendation_label(total_score: f64) -> &'static str {
    if total_score >= 70.0 {
        "Recommended"
    } else if total_score >= 50.0 {
        "Conditionally recommended"
    } else {
        "Reconsideration recommended"
    }
}
