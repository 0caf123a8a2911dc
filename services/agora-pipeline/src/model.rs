//! Data model for the deliberation pipeline.
//!
//! Everything here is produced by persona turns, so parsing is tolerant:
//! missing fields default rather than fail, and the policy proposal keeps
//! its raw JSON shape because a failed draft degrades to `{"raw_text": …}`
//! which downstream stages must still carry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Research
// ============================================================================

/// One precedent policy found during research.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimilarPolicy {
    #[serde(default)]
    pub municipality: String,
    #[serde(default)]
    pub policy_name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub results: String,
}

/// Precedent research over peer jurisdictions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub similar_policies: Vec<SimilarPolicy>,
    #[serde(default)]
    pub has_references: bool,
    #[serde(default)]
    pub search_scope: Option<String>,
}

impl ResearchResult {
    /// Parse from an extracted turn, or fall back to the empty result.
    pub fn from_extracted(value: Option<Value>) -> Self {
        value
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

// ============================================================================
// Demographics
// ============================================================================

/// Estimated composition of the affected population.
///
/// Distribution shapes vary with the model's estimation approach, so the
/// nested breakdowns stay as raw JSON; `data_source` is contractually a
/// plain string (the prompt forbids structured values there).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemographicsProfile {
    #[serde(default)]
    pub target_area: String,
    #[serde(default)]
    pub age_distribution: Value,
    #[serde(default)]
    pub gender_ratio: Value,
    #[serde(default)]
    pub family_types: Value,
    #[serde(default)]
    pub language_distribution: Vec<LanguageShare>,
    #[serde(default)]
    pub language_proficiency_levels: serde_json::Map<String, Value>,
    #[serde(default)]
    pub cultural_considerations: Value,
    #[serde(default)]
    pub priority_services: Vec<String>,
    #[serde(default)]
    pub data_source: String,
    #[serde(default)]
    pub data_scope: String,
}

/// Share of one language among residents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageShare {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub percentage: Value,
    #[serde(default)]
    pub notes: String,
}

impl DemographicsProfile {
    /// Human-readable digest handed to the persona generator.
    pub fn digest(&self) -> String {
        format!(
            "Target area: {}\n\
             Age distribution: {}\n\
             Gender ratio: {}\n\
             Family structure: {}\n\
             Language distribution: {}\n\
             Language proficiency: {}\n\
             Cultural considerations: {}\n\
             Priority services: {}",
            if self.target_area.is_empty() {
                "Unknown"
            } else {
                &self.target_area
            },
            self.age_distribution,
            self.gender_ratio,
            self.family_types,
            serde_json::to_string(&self.language_distribution).unwrap_or_default(),
            serde_json::to_string(&self.language_proficiency_levels).unwrap_or_default(),
            self.cultural_considerations,
            serde_json::to_string(&self.priority_services).unwrap_or_default(),
        )
    }

    /// Short completion summary streamed back to the observer.
    pub fn completion_summary(&self) -> String {
        let languages = self
            .language_distribution
            .iter()
            .take(3)
            .map(|l| format!("{}: {}%", l.language, l.percentage))
            .collect::<Vec<_>>()
            .join(", ");
        let proficiency = self
            .language_proficiency_levels
            .iter()
            .map(|(level, pct)| format!("{}: {}%", level, pct))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "\n\n[Investigation complete] Target area: {}\nAge distribution: {}\nGender ratio: {}\nMain languages: {}\nLanguage proficiency: {}",
            if self.target_area.is_empty() {
                "Unknown"
            } else {
                &self.target_area
            },
            self.age_distribution,
            self.gender_ratio,
            if languages.is_empty() { "Unknown".into() } else { languages },
            if proficiency.is_empty() { "Unknown".into() } else { proficiency },
        )
    }
}

// ============================================================================
// Personas
// ============================================================================

/// A policy-maker persona with an area of expertise.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyMakerPersona {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub system_prompt: String,
}

/// A virtual citizen evaluator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitizenPersona {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub residence: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub values: String,
    #[serde(default)]
    pub stance: String,
    #[serde(default)]
    pub profile: String,
    #[serde(default = "default_true")]
    pub is_directly_affected: bool,
    #[serde(default)]
    pub system_prompt: String,
}

fn default_true() -> bool {
    true
}

/// The legal/feasibility reviewer persona.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewerPersona {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub expertise: String,
    #[serde(default)]
    pub system_prompt: String,
}

/// Full roster produced by the persona generation stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersonaRoster {
    #[serde(default)]
    pub policy_agents: Vec<PolicyMakerPersona>,
    #[serde(default)]
    pub citizen_agents: Vec<CitizenPersona>,
    #[serde(default)]
    pub reviewer_agent: ReviewerPersona,
}

impl PersonaRoster {
    /// Citizen personas outside the policy's direct-benefit group.
    pub fn unaffected_count(&self) -> usize {
        self.citizen_agents
            .iter()
            .filter(|c| !c.is_directly_affected)
            .count()
    }
}

// ============================================================================
// Policy Proposal
// ============================================================================

/// A policy proposal as drafted (and possibly revised) by the policy group.
///
/// Kept as raw JSON: a failed draft degrades to `{"raw_text": …}` and the
/// revision loop replaces the whole value in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyProposal(pub Value);

impl PolicyProposal {
    /// Wrap an unparseable draft verbatim.
    pub fn from_raw_text(text: String) -> Self {
        Self(serde_json::json!({ "raw_text": text }))
    }

    /// Whether the policy is declared temporary. Defaults to permanent
    /// when the field is absent or degraded.
    pub fn is_temporary(&self) -> bool {
        self.0
            .get("is_temporary")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn field(&self, key: &str) -> &str {
        self.0.get(key).and_then(Value::as_str).unwrap_or("N/A")
    }

    /// Text digest of the proposal shown to citizen evaluators.
    pub fn summary_digest(&self) -> String {
        let referenced = self
            .0
            .get("referenced_policies")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        format!(
            "PolicyTitle: {}\nSummary: {}\nProblemAnalysis: {}\nDetailedPolicy: {}\nImplementationPlan: {}\nExpectedEffects: {}\nReferencedPolicies: {}",
            self.field("policy_title"),
            self.field("summary"),
            self.field("problem_analysis"),
            self.field("detailed_policy"),
            self.field("implementation_plan"),
            self.field("expected_effects"),
            referenced,
        )
    }
}

// ============================================================================
// Review
// ============================================================================

/// Scores and findings for one review dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewDimension {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Outcome of one review attempt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewResult {
    #[serde(default)]
    pub legal_compliance: ReviewDimension,
    #[serde(default)]
    pub feasibility: ReviewDimension,
    #[serde(default)]
    pub total_score: Option<f64>,
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub improvement_suggestions: String,
}

// ============================================================================
// Citizen Evaluation
// ============================================================================

/// One scored dimension with the evaluator's reasoning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoredComment {
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub comment: String,
}

/// Present-day evaluation by one citizen persona.
///
/// A persona whose invocation failed still gets a record, with `error` set
/// and the scored dimensions left at defaults; aggregation skips such
/// records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitizenEvaluation {
    #[serde(default)]
    pub evaluator_name: String,
    #[serde(default)]
    pub age: u32,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub occupation: String,
    #[serde(default)]
    pub residence: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub values: String,
    #[serde(default)]
    pub stance: String,
    #[serde(default)]
    pub personal_impact: ScoredComment,
    #[serde(default)]
    pub family_impact: ScoredComment,
    #[serde(default)]
    pub community_impact: ScoredComment,
    #[serde(default)]
    pub fairness: ScoredComment,
    #[serde(default)]
    pub sustainability: ScoredComment,
    #[serde(default)]
    pub overall_rating: f64,
    #[serde(default)]
    pub expectations: String,
    #[serde(default)]
    pub concerns: String,
    #[serde(default)]
    pub recommendations: String,
    #[serde(default = "default_true")]
    pub is_directly_affected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CitizenEvaluation {
    /// Error-marked record for a persona whose invocation failed.
    pub fn failed(name: &str, error: String, is_directly_affected: bool) -> Self {
        Self {
            evaluator_name: name.to_string(),
            is_directly_affected,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Whether this record carries usable scores.
    pub fn is_scored(&self) -> bool {
        self.error.is_none()
    }
}

/// Ten-years-later projection by one citizen persona.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FutureEvaluation {
    #[serde(default)]
    pub evaluator_name: String,
    #[serde(default)]
    pub age_now: u32,
    #[serde(default)]
    pub ten_year_rating: f64,
    #[serde(default)]
    pub changes_observed: String,
    #[serde(default)]
    pub long_term_impact: String,
    #[serde(default)]
    pub unexpected_outcomes: String,
    #[serde(default)]
    pub current_opinion: String,
}

// ============================================================================
// Final Assessment
// ============================================================================

/// Holistic policy assessment across the five weighted dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FinalAssessment {
    #[serde(default)]
    pub equity: ScoredComment,
    #[serde(default)]
    pub effectiveness: ScoredComment,
    #[serde(default)]
    pub transparency: ScoredComment,
    #[serde(default)]
    pub sustainability: ScoredComment,
    #[serde(default)]
    pub ethical_acceptability: ScoredComment,
    #[serde(default)]
    pub total_score: f64,
    #[serde(default)]
    pub overall_comment: String,
    #[serde(default)]
    pub recommendation: String,
}

// ============================================================================
// Full Run Result
// ============================================================================

/// Roster summary carried in the final result (prompts omitted).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterSummary {
    pub policy_agents: Vec<PolicyAgentSummary>,
    pub citizen_agents: Vec<CitizenAgentSummary>,
    pub reviewer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyAgentSummary {
    pub name: String,
    pub expertise: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitizenAgentSummary {
    pub name: String,
    pub age: u32,
    pub profile: String,
    pub is_directly_affected: bool,
}

impl RosterSummary {
    pub fn from_roster(roster: &PersonaRoster) -> Self {
        Self {
            policy_agents: roster
                .policy_agents
                .iter()
                .map(|a| PolicyAgentSummary {
                    name: a.name.clone(),
                    expertise: a.expertise.clone(),
                })
                .collect(),
            citizen_agents: roster
                .citizen_agents
                .iter()
                .map(|c| CitizenAgentSummary {
                    name: c.name.clone(),
                    age: c.age,
                    profile: c.profile.clone(),
                    is_directly_affected: c.is_directly_affected,
                })
                .collect(),
            reviewer: if roster.reviewer_agent.name.is_empty() {
                "Reviewer".to_string()
            } else {
                roster.reviewer_agent.name.clone()
            },
        }
    }
}

/// Execution metadata attached to the closing event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionStatus {
    pub completed: bool,
    pub policy_agents_count: usize,
    pub citizen_agents_count: usize,
    pub has_future_evaluation: bool,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineResult {
    pub status: String,
    pub user_message: String,
    pub research_result: ResearchResult,
    pub demographics_data: DemographicsProfile,
    pub generated_agents: RosterSummary,
    pub policy_proposal: Option<PolicyProposal>,
    pub review_result: Option<ReviewResult>,
    pub citizen_evaluations: Vec<CitizenEvaluation>,
    pub future_evaluations: Vec<FutureEvaluation>,
    pub final_assessment: FinalAssessment,
    pub execution_status: ExecutionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_research_from_extracted_tolerates_absence() {
        let result = ResearchResult::from_extracted(None);
        assert!(!result.has_references);
        assert!(result.similar_policies.is_empty());
    }

    #[test]
    fn test_research_from_extracted_partial() {
        let result = ResearchResult::from_extracted(Some(json!({
            "similar_policies": [{"municipality": "Oakdale"}],
            "has_references": true
        })));
        assert!(result.has_references);
        assert_eq!(result.similar_policies[0].municipality, "Oakdale");
        assert!(result.similar_policies[0].summary.is_empty());
    }

    #[test]
    fn test_proposal_is_temporary_defaults_false() {
        let degraded = PolicyProposal::from_raw_text("freeform draft".into());
        assert!(!degraded.is_temporary());

        let temporary = PolicyProposal(json!({"is_temporary": true}));
        assert!(temporary.is_temporary());
    }

    #[test]
    fn test_proposal_summary_digest() {
        let proposal = PolicyProposal(json!({
            "policy_title": "Brighter Streets Initiative",
            "summary": "Upgrade residential streetlights.",
            "referenced_policies": ["Oakdale Night Safety Plan"]
        }));
        let digest = proposal.summary_digest();
        assert!(digest.contains("PolicyTitle: Brighter Streets Initiative"));
        assert!(digest.contains("Oakdale Night Safety Plan"));
        assert!(digest.contains("ProblemAnalysis: N/A"));
    }

    #[test]
    fn test_citizen_persona_affected_default() {
        let persona: CitizenPersona = serde_json::from_value(json!({"name": "Dana"})).unwrap();
        assert!(persona.is_directly_affected);
    }

    #[test]
    fn test_roster_unaffected_count() {
        let roster = PersonaRoster {
            citizen_agents: vec![
                CitizenPersona {
                    is_directly_affected: true,
                    ..Default::default()
                },
                CitizenPersona {
                    is_directly_affected: false,
                    ..Default::default()
                },
                CitizenPersona {
                    is_directly_affected: false,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        assert_eq!(roster.unaffected_count(), 2);
    }

    #[test]
    fn test_failed_evaluation_is_not_scored() {
        let eval = CitizenEvaluation::failed("Dana", "timeout".into(), false);
        assert!(!eval.is_scored());
        assert_eq!(eval.evaluator_name, "Dana");
        assert!(!eval.is_directly_affected);
    }

    #[test]
    fn test_evaluation_error_omitted_when_none() {
        let eval = CitizenEvaluation::default();
        let json = serde_json::to_value(&eval).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_demographics_digest_mentions_area() {
        let profile: DemographicsProfile = serde_json::from_value(json!({
            "target_area": "Riverside District",
            "age_distribution": {"20s": 10, "30s": 20},
            "priority_services": ["Multilingual counters"]
        }))
        .unwrap();
        let digest = profile.digest();
        assert!(digest.contains("Riverside District"));
        assert!(digest.contains("Multilingual counters"));
    }
}
