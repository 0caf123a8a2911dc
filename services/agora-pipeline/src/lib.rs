//! Agora deliberation pipeline.
//!
//! Sequences persona turns against a hosted model runtime to simulate
//! multi-stakeholder policy deliberation over a single citizen complaint:
//! precedent research, demographics estimation, persona synthesis, policy
//! drafting, a bounded legal/feasibility review loop, per-citizen
//! evaluations (present-day and an optional ten-years-later projection),
//! and a weighted final assessment.
//!
//! Every stage emits progress over an ordered event channel; the sequence
//! ends with a single `complete` event or the first `error`.

pub mod aggregate;
pub mod event;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod review;
pub mod routes;

pub use event::PipelineEvent;
pub use pipeline::Pipeline;
pub use provider::{AgentProvider, AnthropicProvider, ProviderError, TurnStream};
