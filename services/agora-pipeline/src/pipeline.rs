//! The deliberation pipeline.
//!
//! One run walks a fixed stage order: precedent research, demographics
//! estimation, persona generation, policy drafting, a bounded review loop,
//! per-citizen evaluations (plus ten-year projections for permanent
//! policies), and the final weighted assessment. Every model turn is
//! forwarded fragment-by-fragment as `stream` events while the stage
//! accumulates the full reply for parsing.

use crate::aggregate::{recommendation_label, CitizenAverages};
use crate::event::{EventSender, PipelineEvent};
use crate::extract::extract_json;
use crate::model::{
    CitizenEvaluation, DemographicsProfile, ExecutionStatus, FinalAssessment, FutureEvaluation,
    PersonaRoster, PipelineResult, PolicyProposal, ResearchResult, ReviewResult, RosterSummary,
};
use crate::prompts::{self, FinalAnchors};
use crate::provider::AgentProvider;
use crate::review::finalize_review;
use agora_common::config::DeliberationConfig;
use anyhow::{anyhow, bail, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates one deliberation run, emitting events as it goes.
pub struct Pipeline {
    provider: Arc<dyn AgentProvider>,
    config: DeliberationConfig,
    events: EventSender,
}

impl Pipeline {
    pub fn new(
        provider: Arc<dyn AgentProvider>,
        config: DeliberationConfig,
        events: EventSender,
    ) -> Self {
        Self {
            provider,
            config,
            events,
        }
    }

    /// Run the full pipeline for one citizen opinion.
    ///
    /// Always ends the event sequence with exactly one terminal event:
    /// `complete` on success, `error` on any fatal condition.
    pub async fn run(&self, complaint: &str) {
        let complaint = complaint.trim();
        if complaint.is_empty() {
            self.emit(PipelineEvent::Error {
                data: "Please enter a citizen opinion.".into(),
            })
            .await;
            return;
        }

        match self.execute(complaint).await {
            Ok(result) => {
                info!(
                    citizen_count = result.execution_status.citizen_agents_count,
                    total_score = result.final_assessment.total_score,
                    "Deliberation run complete"
                );
                self.emit(PipelineEvent::Complete {
                    data: Box::new(result),
                })
                .await;
            }
            Err(e) => {
                warn!(error = %e, "Deliberation run failed");
                self.emit(PipelineEvent::Error {
                    data: format!("An error occurred: {}", e),
                })
                .await;
            }
        }
    }

    async fn execute(&self, complaint: &str) -> Result<PipelineResult> {
        let jurisdiction = self.config.primary_jurisdiction.as_str();

        // Step 0: precedent research. Non-fatal: an unparseable reply
        // degrades to the empty result and drafting proceeds unreferenced.
        self.status("[Step 0] Investigating similar policy cases...")
            .await;
        let reply = self
            .collect_turn(
                "research",
                Some(&prompts::research_system(jurisdiction)),
                &prompts::research_message(complaint, jurisdiction),
            )
            .await?;
        let research = ResearchResult::from_extracted(extract_json(&reply));
        self.emit(PipelineEvent::Research {
            data: research.clone(),
        })
        .await;

        // Step 1: demographics. Fatal when unparseable: persona generation
        // has nothing to balance against without it.
        self.status("[Step 1] Investigating demographics of the target area...")
            .await;
        let reply = self
            .collect_turn(
                "demographics",
                Some(&prompts::demographics_system(jurisdiction)),
                &prompts::demographics_message(complaint, jurisdiction),
            )
            .await?;
        let demographics: DemographicsProfile = extract_json(&reply)
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| anyhow!("Failed to parse demographic data"))?;
        self.emit(PipelineEvent::Stream {
            step: "demographics".into(),
            data: demographics.completion_summary(),
        })
        .await;
        self.emit(PipelineEvent::Demographics {
            data: demographics.clone(),
        })
        .await;

        // Step 2: persona generation. Fatal below the citizen minimum.
        self.status("[Step 2] Analyzing the opinion and designing personas...")
            .await;
        let reply = self
            .collect_turn(
                "agent_generation",
                Some(&prompts::persona_system(jurisdiction)),
                &prompts::persona_message(complaint, &demographics.digest()),
            )
            .await?;
        let roster: PersonaRoster = extract_json(&reply)
            .and_then(|v| serde_json::from_value(v).ok())
            .ok_or_else(|| anyhow!("Failed to parse persona definitions"))?;
        if roster.citizen_agents.len() < self.config.min_citizen_personas {
            bail!(
                "Persona generation produced {} citizen personas; at least {} are required",
                roster.citizen_agents.len(),
                self.config.min_citizen_personas
            );
        }
        info!(
            policy_agents = roster.policy_agents.len(),
            citizen_agents = roster.citizen_agents.len(),
            unaffected = roster.unaffected_count(),
            "Persona roster generated"
        );
        self.status(&format!(
            "[Step 2] Generated {} policy makers and {} citizens ({} not directly affected).",
            roster.policy_agents.len(),
            roster.citizen_agents.len(),
            roster.unaffected_count()
        ))
        .await;
        self.emit(PipelineEvent::AgentDefs {
            data: roster.clone(),
        })
        .await;

        // Step 3: policy drafting. An unextractable draft is kept verbatim
        // as `{"raw_text": …}` rather than dropped.
        self.status("[Step 3] Policy makers are drafting a proposal...")
            .await;
        let reply = self
            .collect_turn(
                "policy_drafting",
                None,
                &prompts::drafting_message(complaint, &roster.policy_agents, &research),
            )
            .await?;
        let mut proposal = match extract_json(&reply) {
            Some(value) => PolicyProposal(value),
            None => PolicyProposal::from_raw_text(reply),
        };
        self.emit(PipelineEvent::Policy {
            data: proposal.0.clone(),
        })
        .await;

        // Step 4: bounded review loop.
        let review = self.review_loop(&mut proposal, &roster).await?;
        self.emit(PipelineEvent::ReviewFinal {
            data: review.clone(),
        })
        .await;

        // Step 5: citizen evaluations.
        let policy_summary = proposal.summary_digest();
        let evaluations = self.evaluate_citizens(&roster, &policy_summary).await;

        // Step 6: ten-year projections, permanent policies only.
        let future_evaluations = if proposal.is_temporary() {
            self.status("[Step 6] Temporary policy; skipping the 10-year projection.")
                .await;
            Vec::new()
        } else {
            self.evaluate_future(&roster, &policy_summary).await
        };

        // Step 7: final weighted assessment.
        let final_assessment = self
            .final_assessment(&proposal, &evaluations)
            .await?;
        self.emit(PipelineEvent::FinalAssessment {
            data: final_assessment.clone(),
        })
        .await;

        let execution_status = ExecutionStatus {
            completed: true,
            policy_agents_count: roster.policy_agents.len(),
            citizen_agents_count: roster.citizen_agents.len(),
            has_future_evaluation: !future_evaluations.is_empty(),
        };

        Ok(PipelineResult {
            status: "success".into(),
            user_message: complaint.to_string(),
            research_result: research,
            demographics_data: demographics,
            generated_agents: RosterSummary::from_roster(&roster),
            policy_proposal: Some(proposal),
            review_result: Some(review),
            citizen_evaluations: evaluations,
            future_evaluations,
            final_assessment,
            execution_status,
        })
    }

    /// Review/revise up to the configured attempt budget.
    ///
    /// Each attempt reviews the current proposal; an unapproved review with
    /// budget remaining triggers a revision turn. A revision whose reply
    /// cannot be extracted keeps the previous proposal for the next attempt.
    async fn review_loop(
        &self,
        proposal: &mut PolicyProposal,
        roster: &PersonaRoster,
    ) -> Result<ReviewResult> {
        let reviewer_system = if roster.reviewer_agent.system_prompt.is_empty() {
            prompts::DEFAULT_REVIEWER_SYSTEM.to_string()
        } else {
            roster.reviewer_agent.system_prompt.clone()
        };

        let max_attempts = self.config.review_max_attempts.max(1);
        let mut review = ReviewResult::default();

        for attempt in 1..=max_attempts {
            self.status(&format!(
                "[Step 4] Legal and feasibility review (attempt {}/{})...",
                attempt, max_attempts
            ))
            .await;

            let reply = self
                .collect_turn("review", Some(&reviewer_system), &prompts::review_message(proposal))
                .await?;
            review = finalize_review(extract_json(&reply), self.config.approval_threshold);
            let mut attempt_payload = serde_json::to_value(&review)?;
            attempt_payload["attempt"] = json!(attempt);
            self.emit(PipelineEvent::Review {
                data: attempt_payload,
            })
            .await;

            if review.approved {
                info!(attempt, total_score = ?review.total_score, "Proposal approved");
                break;
            }
            if attempt == max_attempts {
                warn!(
                    attempts = max_attempts,
                    "Review budget exhausted; proceeding with the unapproved proposal"
                );
                self.status(&format!(
                    "[Step 4] Not approved after {} attempts; proceeding with the current proposal.",
                    max_attempts
                ))
                .await;
                break;
            }

            self.status(&format!(
                "[Step 4] Not approved; revising the proposal (attempt {}/{})...",
                attempt, max_attempts
            ))
            .await;
            let reply = self
                .collect_turn(
                    "policy_revision",
                    None,
                    &prompts::revision_message(proposal, &review),
                )
                .await?;
            match extract_json(&reply) {
                Some(value) => {
                    *proposal = PolicyProposal(value);
                    let mut revised = proposal.0.clone();
                    if let Value::Object(map) = &mut revised {
                        map.insert("improved".into(), json!(true));
                        map.insert("attempt".into(), json!(attempt));
                    }
                    self.emit(PipelineEvent::Policy { data: revised }).await;
                }
                None => {
                    // Keep the previous proposal for the next attempt.
                    warn!(attempt, "Revision reply was not parseable; keeping prior draft");
                }
            }
        }

        Ok(review)
    }

    /// One present-day evaluation per citizen persona.
    ///
    /// A failed turn or unextractable reply yields an error-marked record
    /// so the roster and the evaluation list stay the same length.
    async fn evaluate_citizens(
        &self,
        roster: &PersonaRoster,
        policy_summary: &str,
    ) -> Vec<CitizenEvaluation> {
        let total = roster.citizen_agents.len();
        let mut evaluations = Vec::with_capacity(total);

        for (index, persona) in roster.citizen_agents.iter().enumerate() {
            self.status(&format!(
                "[Step 5] Citizen evaluation ({}/{}): {}",
                index + 1,
                total,
                persona.name
            ))
            .await;

            let step = format!("citizen_{}", index + 1);
            let message = prompts::citizen_eval_message(policy_summary, persona);
            let system = if persona.system_prompt.is_empty() {
                None
            } else {
                Some(persona.system_prompt.as_str())
            };

            let mut evaluation = match self.collect_turn(&step, system, &message).await {
                Ok(reply) => match extract_json(&reply)
                    .and_then(|v| serde_json::from_value::<CitizenEvaluation>(v).ok())
                {
                    Some(parsed) => parsed,
                    None => CitizenEvaluation::failed(
                        &persona.name,
                        "Evaluation reply could not be parsed".into(),
                        persona.is_directly_affected,
                    ),
                },
                Err(e) => CitizenEvaluation::failed(
                    &persona.name,
                    e.to_string(),
                    persona.is_directly_affected,
                ),
            };

            // The persona definition is authoritative for identity fields.
            if evaluation.evaluator_name.is_empty() {
                evaluation.evaluator_name = persona.name.clone();
            }
            evaluation.is_directly_affected = persona.is_directly_affected;

            // Error-marked records go into the closing result but are not
            // broadcast as evaluation events.
            if evaluation.is_scored() {
                self.emit(PipelineEvent::Evaluation {
                    data: evaluation.clone(),
                })
                .await;
            }
            evaluations.push(evaluation);
        }

        evaluations
    }

    /// Ten-year projections; failed personas are skipped without a record.
    async fn evaluate_future(
        &self,
        roster: &PersonaRoster,
        policy_summary: &str,
    ) -> Vec<FutureEvaluation> {
        let total = roster.citizen_agents.len();
        let mut projections = Vec::new();

        for (index, persona) in roster.citizen_agents.iter().enumerate() {
            self.status(&format!(
                "[Step 6] 10-year projection ({}/{}): {}",
                index + 1,
                total,
                persona.name
            ))
            .await;

            let step = format!("future_{}", index + 1);
            let message = prompts::future_eval_message(policy_summary, persona);
            let system = if persona.system_prompt.is_empty() {
                None
            } else {
                Some(persona.system_prompt.as_str())
            };

            let reply = match self.collect_turn(&step, system, &message).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(persona = %persona.name, error = %e, "Projection turn failed; skipping");
                    continue;
                }
            };
            let Some(projection) = extract_json(&reply)
                .and_then(|v| serde_json::from_value::<FutureEvaluation>(v).ok())
            else {
                warn!(persona = %persona.name, "Projection reply was not parseable; skipping");
                continue;
            };

            self.emit(PipelineEvent::FutureEvaluation {
                data: projection.clone(),
            })
            .await;
            projections.push(projection);
        }

        projections
    }

    /// Weighted final assessment with citizen-derived anchors.
    ///
    /// The total and the recommendation label are recomputed locally from
    /// the dimension scores; the assessor's own arithmetic is not trusted.
    async fn final_assessment(
        &self,
        proposal: &PolicyProposal,
        evaluations: &[CitizenEvaluation],
    ) -> Result<FinalAssessment> {
        self.status("[Step 7] Generating the final assessment...").await;

        let averages = CitizenAverages::from_evaluations(evaluations);
        let anchors = FinalAnchors {
            personal: averages.personal,
            family: averages.family,
            community: averages.community,
            fairness: averages.fairness,
            sustainability: averages.sustainability,
            effectiveness: averages.effectiveness_score(),
        };

        let evaluations_json = serde_json::to_value(evaluations)?;
        let reply = self
            .collect_turn(
                "final_assessment",
                Some(prompts::FINAL_ASSESSOR_SYSTEM),
                &prompts::final_assessment_message(
                    proposal,
                    &evaluations_json,
                    averages.scored_count,
                    &anchors,
                ),
            )
            .await?;

        let mut assessment: FinalAssessment = extract_json(&reply)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        assessment.total_score = assessment.equity.score * 0.25
            + assessment.effectiveness.score * 0.25
            + assessment.transparency.score * 0.20
            + assessment.sustainability.score * 0.15
            + assessment.ethical_acceptability.score * 0.10;
        assessment.recommendation = recommendation_label(assessment.total_score).to_string();

        Ok(assessment)
    }

    /// Run one model turn, forwarding fragments as `stream` events while
    /// accumulating the full reply.
    async fn collect_turn(
        &self,
        step: &str,
        system: Option<&str>,
        message: &str,
    ) -> Result<String> {
        let mut stream = self
            .provider
            .stream_turn(system, message)
            .await
            .map_err(|e| anyhow!("{}", e))?;

        let mut full = String::new();
        while let Some(item) = stream.recv().await {
            let fragment = item.map_err(|e| anyhow!("{}", e))?;
            self.emit(PipelineEvent::Stream {
                step: step.to_string(),
                data: fragment.clone(),
            })
            .await;
            full.push_str(&fragment);
        }
        Ok(full)
    }

    async fn status(&self, text: &str) {
        self.emit(PipelineEvent::Status {
            data: text.to_string(),
        })
        .await;
    }

    async fn emit(&self, event: PipelineEvent) {
        // A dropped receiver means the client went away; stages notice on
        // their next turn, so the send error itself is not fatal.
        if self.events.send(event).await.is_err() {
            warn!("Event receiver dropped mid-run");
        }
    }
}
