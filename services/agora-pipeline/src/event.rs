//! Events emitted during a deliberation run.
//!
//! A run produces a finite, ordered, non-restartable sequence of tagged
//! events over an mpsc channel. The sequence ends after `complete`, or
//! after the first `error` — consumers must treat a missing `complete` as
//! run failure regardless of how many intermediate events they saw.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::model::{
    CitizenEvaluation, DemographicsProfile, FinalAssessment, FutureEvaluation, PersonaRoster,
    PipelineResult, ResearchResult, ReviewResult,
};

/// Event types emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Human-readable progress text
    Status { data: String },

    /// Incremental model-output fragment, tagged with a step identifier
    Stream { step: String, data: String },

    /// Precedent research finished
    Research { data: ResearchResult },

    /// Demographics estimation finished
    Demographics { data: DemographicsProfile },

    /// Persona roster generated
    AgentDefs { data: PersonaRoster },

    /// A policy proposal draft (initial or revised)
    Policy { data: Value },

    /// One review attempt's outcome
    Review { data: Value },

    /// The review loop's canonical outcome
    ReviewFinal { data: ReviewResult },

    /// One citizen persona's present-day evaluation
    Evaluation { data: CitizenEvaluation },

    /// One citizen persona's ten-years-later projection
    FutureEvaluation { data: FutureEvaluation },

    /// The holistic final assessment
    FinalAssessment { data: FinalAssessment },

    /// Terminal: the full aggregated result
    Complete { data: Box<PipelineResult> },

    /// Terminal: fatal condition, no further events follow
    Error { data: String },
}

impl PipelineEvent {
    /// Whether this event terminates the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

/// Sending half of a run's event channel.
pub type EventSender = mpsc::Sender<PipelineEvent>;

/// Receiving half of a run's event channel.
pub type EventReceiver = mpsc::Receiver<PipelineEvent>;

/// Create an event channel for one run.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_event_shape() {
        let event = PipelineEvent::Status {
            data: "[Step 0] Investigating similar policies...".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "status");
        assert!(json["data"].as_str().unwrap().contains("Step 0"));
    }

    #[test]
    fn test_stream_event_carries_step() {
        let event = PipelineEvent::Stream {
            step: "research".into(),
            data: "Looking at".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "stream");
        assert_eq!(json["step"], "research");
        assert_eq!(json["data"], "Looking at");
    }

    #[test]
    fn test_snake_case_tags() {
        let event = PipelineEvent::ReviewFinal {
            data: ReviewResult::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "review_final");

        let event = PipelineEvent::FutureEvaluation {
            data: FutureEvaluation::default(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "future_evaluation");
    }

    #[test]
    fn test_terminal_events() {
        assert!(PipelineEvent::Error { data: "x".into() }.is_terminal());
        assert!(PipelineEvent::Complete {
            data: Box::default()
        }
        .is_terminal());
        assert!(!PipelineEvent::Status { data: "x".into() }.is_terminal());
    }

    #[test]
    fn test_event_roundtrip() {
        let event = PipelineEvent::Stream {
            step: "citizen_3".into(),
            data: "chunk".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PipelineEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PipelineEvent::Stream { step, .. } if step == "citizen_3"));
    }
}
