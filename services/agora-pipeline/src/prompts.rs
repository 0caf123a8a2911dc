//! Persona instructions and per-turn message builders.
//!
//! The wording here is the behavior of the system: output contracts, score
//! formulas, and naming rules all live in these templates. Builders take
//! the primary jurisdiction from configuration rather than hardcoding it.

use crate::model::{CitizenPersona, PolicyMakerPersona, PolicyProposal, ResearchResult, ReviewResult};
use serde_json::Value;

// ============================================================================
// Research
// ============================================================================

pub fn research_system(jurisdiction: &str) -> String {
    format!(
        r#"You are a research expert specializing in municipal policies.
Investigate existing cases of policies related to citizen opinions and present relevant examples as references.

IMPORTANT: Respond entirely in English.

Research Priority:
1. Give top priority to examples from {j}.
2. If there are no examples from {j}, refer to peer municipalities.
3. If none are found, refer to nationwide cases.

Output Format:
```json
{{
  "similar_policies": [
    {{"municipality": "Municipality name", "policy_name": "Policy name", "summary": "Summary", "results": "Results"}}
  ],
  "has_references": true/false,
  "search_scope": "{j} / Other municipalities / Nationwide"
}}
```"#,
        j = jurisdiction
    )
}

pub fn research_message(complaint: &str, jurisdiction: &str) -> String {
    format!(
        "Citizen opinions: {complaint}\n\nFirst, investigate similar policy cases in {jurisdiction}. If there are none, investigate about three cases from other municipalities or nationwide."
    )
}

// ============================================================================
// Demographics
// ============================================================================

pub fn demographics_system(jurisdiction: &str) -> String {
    format!(
        r#"You are a demographic statistics expert.
Identify the target area based on citizen opinions and investigate the demographic trends of that area.

IMPORTANT: Respond entirely in English.

Research Priority:
1. Give top priority to demographic trends in {j}.
2. If a specific area is clearly mentioned in citizen opinions, target that area.
3. If {j} data is unavailable, use statistics from peer municipalities or nationwide data.

Important: If data does not exist, use Fermi estimation.
- Infer from data of similar cities
- Adjust nationwide statistics considering local characteristics
- Estimate based on population size, industrial structure, and geographical features
- Clearly specify the estimation method in the data_source field

Output format:
```json
{{
  "target_area": "Target area name",
  "age_distribution": {{"20s": 10, "30s": 15, "40s": 15, "50s": 20, "60s+": 40}},
  "gender_ratio": {{"male": 48, "female": 52}},
  "family_types": [
    {{"type": "Single-person households", "percentage": 35}},
    {{"type": "Households with children", "percentage": 25}}
  ],
  "language_distribution": [
    {{"language": "Primary language", "percentage": 60, "notes": "Remarks"}}
  ],
  "language_proficiency_levels": {{
    "fluent": 30,
    "conversational": 40,
    "basic": 20,
    "needs_support": 10
  }},
  "cultural_considerations": [
    {{"group": "Region / Cultural sphere", "key_points": ["Considerations"]}}
  ],
  "priority_services": ["Priority administrative services"],
  "data_source": "Data source (describe as a string, e.g. census 2022, Fermi estimation)",
  "data_scope": "{j} / Other municipalities / Nationwide"
}}
```

Note: data_source must be a string. Do not use objects or arrays."#,
        j = jurisdiction
    )
}

pub fn demographics_message(complaint: &str, jurisdiction: &str) -> String {
    format!(
        "Citizen opinion: {complaint}\n\nFirst, investigate the demographic trends of {jurisdiction}. If data is unavailable, use statistics from other municipalities or nationwide. If no data exists, calculate a reasonable estimate using Fermi estimation and clearly specify the estimation method in data_source."
    )
}

// ============================================================================
// Persona Generation
// ============================================================================

pub fn persona_system(jurisdiction: &str) -> String {
    format!(
        r#"Analyze citizen opinions and design the personas necessary for policy consideration.

IMPORTANT: Respond entirely in English.

Your role:
1. Analyze the content of citizen opinions.
2. Decide on the number and areas of expertise for the required policy-making personas (guideline: 2-4).
   - Include at least one persona with the perspective of {j} administration.
   - However, do not include "{j}'s" in the name field; use only general job titles or areas of expertise.
3. Design at least 10 citizen evaluation personas based on the provided demographic data.

Naming rules for policy-making personas:
- Good examples: "Policy Planning Officer", "Welfare Policy Specialist", "Urban Planning Consultant"
- Bad examples: department names tied to a specific administration

Citizen persona design rules:
- Refer to demographic trends and compose personas balanced across all ages and groups
- Include 30-50% of the main target group for the policy
- Include groups indirectly involved or not targeted by the policy
- Appropriately include residents with diverse backgrounds (foreign residents, the elderly, people with disabilities, households with children)
- Avoid stereotypes; design realistic backgrounds and opinions
- Distribute attitudes towards the policy (support/neutral/concern) evenly

Output format:
```json
{{
  "policy_agents": [
    {{"name": "Policy Planning Officer", "expertise": "Policy Planning & Administrative Operations", "system_prompt": "Detailed prompt"}}
  ],
  "citizen_agents": [
    {{
      "name": "Full name",
      "age": 30,
      "gender": "Female",
      "occupation": "Occupation",
      "residence": "District",
      "family": "Family composition",
      "values": "What they prioritize",
      "stance": "Stance towards the policy",
      "profile": "Detailed profile",
      "is_directly_affected": true,
      "system_prompt": "Evaluation prompt"
    }}
  ],
  "reviewer_agent": {{
    "name": "Legal & Feasibility Reviewer",
    "expertise": "Law & Feasibility",
    "system_prompt": "Review prompt"
  }}
}}
```

Notes:
- In system_prompt, state the specific viewpoint, such as "from the standpoint of {j}".
- is_directly_affected indicates whether the persona receives direct benefits from the policy."#,
        j = jurisdiction
    )
}

pub fn persona_message(complaint: &str, demographics_digest: &str) -> String {
    format!("Citizen opinions: {complaint}\n\nDemographic data:\n{demographics_digest}")
}

// ============================================================================
// Policy Drafting
// ============================================================================

pub fn drafting_message(
    complaint: &str,
    policy_agents: &[PolicyMakerPersona],
    research: &ResearchResult,
) -> String {
    let agents_json =
        serde_json::to_string_pretty(policy_agents).unwrap_or_else(|_| "[]".to_string());

    let reference_text = if research.has_references {
        let precedents = serde_json::to_string_pretty(&research.similar_policies)
            .unwrap_or_else(|_| "[]".to_string());
        format!("\n\nReference cases:\n{precedents}\nPlease refer to the above cases.")
    } else {
        String::new()
    };

    format!(
        r#"Based on the following persona definitions, deliberate jointly and generate a policy proposal in JSON format in response to the citizen opinion "{complaint}".

Persona definitions:
{agents_json}{reference_text}

Output format:
```json
{{
  "policy_title": "Policy title (concise and clear, within 50 characters)",
  "summary": "Policy summary (purpose and target, 300-500 characters)",
  "referenced_policies": ["Names of referenced municipal policies"],
  "problem_analysis": "Problem analysis (current issues, why this policy is needed, 500-700 characters)",
  "detailed_policy": "Policy details (specific contents, eligibility, methods, budget scale, legal considerations, 800-1000 characters)",
  "implementation_plan": "Implementation plan (phases, duration, rollout method, 500-700 characters)",
  "expected_effects": "Expected effects (quantitative and qualitative, 400-600 characters)",
  "is_temporary": true/false (true for temporary policies, false for permanent policies)
}}
```

Required: include all of the above items with specific, detailed descriptions.
IMPORTANT: Write all content in English."#
    )
}

// ============================================================================
// Review
// ============================================================================

pub const DEFAULT_REVIEWER_SYSTEM: &str =
    "Please review from the perspective of law and feasibility.";

pub fn review_message(proposal: &PolicyProposal) -> String {
    let proposal_json =
        serde_json::to_string_pretty(&proposal.0).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Please review the following policy proposal from the perspective of law and feasibility.

Policy proposal:
{proposal_json}

Output format:
```json
{{
  "legal_compliance": {{"score": 85, "issues": ["Problems"], "recommendations": ["Recommendations"]}},
  "feasibility": {{"score": 80, "issues": ["Problems"], "recommendations": ["Recommendations"]}},
  "total_score": 82.5,
  "overall_assessment": "Overall evaluation",
  "approved": true/false,
  "improvement_suggestions": "Improvement suggestions (if not approved)"
}}
```

Overall Score = Legal Compliance x 0.5 + Feasibility x 0.5
Approval Criteria: Approved if score is 80 or higher"#
    )
}

pub fn revision_message(proposal: &PolicyProposal, review: &ReviewResult) -> String {
    let proposal_json =
        serde_json::to_string_pretty(&proposal.0).unwrap_or_else(|_| "{}".to_string());
    let review_json = serde_json::to_string_pretty(review).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"The following policy proposal was not approved in the review.

Original policy proposal:
{proposal_json}

Review results:
{review_json}

Please revise the policy proposal based on the improvement suggestions.
The output format should be the same JSON format as the original policy proposal."#
    )
}

// ============================================================================
// Citizen Evaluation
// ============================================================================

pub fn citizen_eval_message(policy_summary: &str, persona: &CitizenPersona) -> String {
    format!(
        r#"{policy_summary}

Your position: {profile}
Age: {age}, Gender: {gender}, Family: {family}

Please evaluate the above policy proposal from the following five perspectives, using a scale of 0 to 100 points for each.
For each item, provide both a score and comments (specific reasons and explanation of impact).

Output format:
```json
{{
  "evaluator_name": "{name}",
  "age": {age},
  "gender": "{gender}",
  "occupation": "{occupation}",
  "residence": "{residence}",
  "family": "{family}",
  "values": "{values}",
  "stance": "{stance}",
  "personal_impact": {{"score": 75, "comment": "Effect on your daily life (around 150 characters)"}},
  "family_impact": {{"score": 80, "comment": "Effect on your family (around 150 characters)"}},
  "community_impact": {{"score": 70, "comment": "Effect on your community (around 150 characters)"}},
  "fairness": {{"score": 65, "comment": "Fairness of this policy (around 150 characters)"}},
  "sustainability": {{"score": 60, "comment": "Sustainability of this policy (around 150 characters)"}},
  "overall_rating": 72.5,
  "expectations": "Expectations (around 100 characters)",
  "concerns": "Concerns (around 100 characters)",
  "recommendations": "Suggestions (around 100 characters)"
}}
```

Important: Be sure to output all of the above items.
IMPORTANT: Write all content in English.

Overall Evaluation = Personal Impact x 0.5 + Family Impact x 0.2 + Community Impact x 0.1 + Fairness x 0.1 + Sustainability x 0.1"#,
        profile = persona.profile,
        name = persona.name,
        age = persona.age,
        gender = persona.gender,
        occupation = persona.occupation,
        residence = persona.residence,
        family = persona.family,
        values = persona.values,
        stance = persona.stance,
    )
}

// ============================================================================
// Future Evaluation
// ============================================================================

pub fn future_eval_message(policy_summary: &str, persona: &CitizenPersona) -> String {
    let future_family_note = if persona.family.is_empty() {
        String::new()
    } else {
        format!(
            "\n\nCurrent family structure: {}\nPlease estimate the family structure 10 years from now (children become adults, move out, get married, etc.). Assume natural changes based on current age and circumstances.",
            persona.family
        )
    };

    format!(
        r#"{policy_summary}

You are now {future_age} years old, 10 years have passed since the implementation of this policy.{future_family_note}

Please describe the changes over the past 10 years and your current evaluation.

Output format:
```json
{{
  "evaluator_name": "{name} (10 years later)",
  "age_now": {future_age},
  "ten_year_rating": 75,
  "changes_observed": "Changes observed over 10 years (including changes in family structure)",
  "long_term_impact": "Assessment of long-term impact",
  "unexpected_outcomes": "Unexpected outcomes",
  "current_opinion": "Current opinion"
}}
```

Important:
- ten_year_rating should be evaluated on a 100-point scale.
- In changes_observed, include natural changes over 10 years in the family.
- IMPORTANT: Write all content in English."#,
        name = persona.name,
        future_age = persona.age + 10,
    )
}

// ============================================================================
// Final Assessment
// ============================================================================

pub const FINAL_ASSESSOR_SYSTEM: &str = r#"You are a policy evaluation specialist.
Please evaluate the policy from the following five perspectives:

1. Transparency & Accountability - Weight: 20%
2. Ethical Acceptability & Social Acceptance - Weight: 10%
3. Effectiveness & Results - Weight: 25% (directly reflect citizen evaluation: 50% personal impact, 20% family impact, 10% community impact)
4. Equity - Weight: 25% (50% of this is directly reflected from citizen evaluation of fairness)
5. Sustainability & Cost Efficiency - Weight: 15% (50% of this is directly reflected from citizen evaluation of sustainability)

Output format:
```json
{
  "equity": {"score": 75, "comment": "Evaluation comment"},
  "effectiveness": {"score": 80, "comment": "Evaluation comment"},
  "transparency": {"score": 70, "comment": "Evaluation comment"},
  "sustainability": {"score": 65, "comment": "Evaluation comment"},
  "ethical_acceptability": {"score": 85, "comment": "Evaluation comment"},
  "total_score": 75.5,
  "overall_comment": "Overall evaluation comment",
  "recommendation": "Recommended / Conditionally recommended / Reconsideration recommended"
}
```

Important: Be sure to calculate total_score using the following formula:
total_score = equity.score x 0.25 + effectiveness.score x 0.25 + transparency.score x 0.20 + sustainability.score x 0.15 + ethical_acceptability.score x 0.10

IMPORTANT: Write all content in English."#;

/// Averages handed to the final assessor as fixed numeric anchors.
pub struct FinalAnchors {
    pub personal: f64,
    pub family: f64,
    pub community: f64,
    pub fairness: f64,
    pub sustainability: f64,
    pub effectiveness: f64,
}

pub fn final_assessment_message(
    proposal: &PolicyProposal,
    evaluations_json: &Value,
    evaluation_count: usize,
    anchors: &FinalAnchors,
) -> String {
    let proposal_json =
        serde_json::to_string_pretty(&proposal.0).unwrap_or_else(|_| "{}".to_string());
    let evaluations =
        serde_json::to_string_pretty(evaluations_json).unwrap_or_else(|_| "[]".to_string());

    format!(
        r#"Policy proposal:
{proposal_json}

Number of citizen evaluations: {evaluation_count}
Citizen evaluation data:
{evaluations}

Aggregated data from citizen evaluations:
- Average personal impact: {personal:.1} points
- Average family impact: {family:.1} points
- Average community impact: {community:.1} points
- Average fairness: {fairness:.1} points
- Average sustainability: {sustainability:.1} points

Please evaluate the policy proposal from the following five perspectives:

1. Transparency & Accountability - Weight: 20%
   - Is the basis and process of decision-making clearly presented?

2. Ethical Acceptability & Social Acceptance - Weight: 10%
   - Is it appropriate from the viewpoints of human rights, privacy, and ethics?

3. Effectiveness & Results - Weight: 25%
   - Directly reflect citizen evaluation: {effectiveness:.1} points
   - Breakdown: Personal impact ({personal:.1}) x 50% + Family impact ({family:.1}) x 20% + Community impact ({community:.1}) x 10%
   - Use this score as is: {effectiveness:.1} points

4. Equity - Weight: 25%
   - Average citizen fairness evaluation: {fairness:.1} points (this accounts for 50%)
   - Does the policy provide benefits fairly across groups without bias? (remaining 50%)

5. Sustainability & Cost Efficiency - Weight: 15%
   - Average citizen sustainability evaluation: {sustainability:.1} points (this accounts for 50%)
   - Is it sustainable from financial and human resource perspectives? (remaining 50%)

Total Score = Transparency x 0.20 + Ethical Acceptability x 0.10 + Effectiveness x 0.25 + Equity x 0.25 + Sustainability x 0.15

Recommendation criteria:
- 70 points or higher: Recommended
- 50-69 points: Conditionally recommended
- Below 50 points: Reconsideration recommended"#,
        personal = anchors.personal,
        family = anchors.family,
        community = anchors.community,
        fairness = anchors.fairness,
        sustainability = anchors.sustainability,
        effectiveness = anchors.effectiveness,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_research_system_prioritizes_jurisdiction() {
        let system = research_system("Oakdale");
        assert!(system.contains("top priority to examples from Oakdale"));
        assert!(system.contains("has_references"));
    }

    #[test]
    fn test_demographics_system_forbids_structured_source() {
        let system = demographics_system("Oakdale");
        assert!(system.contains("Fermi estimation"));
        assert!(system.contains("data_source must be a string"));
    }

    #[test]
    fn test_persona_system_excludes_jurisdiction_name() {
        let system = persona_system("Oakdale");
        assert!(system.contains("do not include \"Oakdale's\" in the name field"));
        assert!(system.contains("at least 10 citizen"));
    }

    #[test]
    fn test_drafting_message_includes_precedents_only_with_references() {
        let agents = vec![PolicyMakerPersona {
            name: "Policy Planning Officer".into(),
            ..Default::default()
        }];

        let without = drafting_message("dim lights", &agents, &ResearchResult::default());
        assert!(!without.contains("Reference cases:"));

        let with = drafting_message(
            "dim lights",
            &agents,
            &ResearchResult {
                has_references: true,
                similar_policies: vec![crate::model::SimilarPolicy {
                    municipality: "Oakdale".into(),
                    ..Default::default()
                }],
                search_scope: None,
            },
        );
        assert!(with.contains("Reference cases:"));
        assert!(with.contains("Oakdale"));
    }

    #[test]
    fn test_citizen_eval_message_embeds_identity() {
        let persona = CitizenPersona {
            name: "Dana Reyes".into(),
            age: 34,
            gender: "Female".into(),
            occupation: "Nurse".into(),
            ..Default::default()
        };
        let message = citizen_eval_message("PolicyTitle: Brighter Streets", &persona);
        assert!(message.contains("\"evaluator_name\": \"Dana Reyes\""));
        assert!(message.contains("\"age\": 34"));
        assert!(message.contains("Personal Impact x 0.5"));
    }

    #[test]
    fn test_future_eval_message_ages_persona() {
        let persona = CitizenPersona {
            name: "Dana Reyes".into(),
            age: 34,
            family: "Two children".into(),
            ..Default::default()
        };
        let message = future_eval_message("summary", &persona);
        assert!(message.contains("now 44 years old"));
        assert!(message.contains("Current family structure: Two children"));
    }

    #[test]
    fn test_final_assessment_message_embeds_anchors() {
        let anchors = FinalAnchors {
            personal: 80.0,
            family: 70.0,
            community: 60.0,
            fairness: 75.0,
            sustainability: 65.0,
            effectiveness: 80.0 * 0.5 + 70.0 * 0.2 + 60.0 * 0.1,
        };
        let message = final_assessment_message(
            &PolicyProposal(json!({"policy_title": "Brighter Streets"})),
            &json!([]),
            0,
            &anchors,
        );
        assert!(message.contains("Average fairness: 75.0"));
        assert!(message.contains("Use this score as is: 60.0"));
    }
}
