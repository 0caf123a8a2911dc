//! Model invocation adapter.
//!
//! Every persona turn goes through the [`AgentProvider`] trait: given a
//! system instruction (the persona definition) and a user message, the
//! provider returns a finite, forward-only stream of text fragments ending
//! when the model finishes its turn. The stream is a channel rather than a
//! callback so stages can forward fragments upstream while accumulating
//! the full response.

mod anthropic;

pub use anthropic::AnthropicProvider;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Error from a provider call.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
            status_code: None,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.provider, self.message)
    }
}

impl std::error::Error for ProviderError {}

/// One model turn as an ordered sequence of text fragments.
///
/// The channel closes when the model ends its turn; a mid-stream failure
/// is delivered as a final `Err` item before closing.
pub type TurnStream = mpsc::Receiver<Result<String, ProviderError>>;

/// Unified interface for persona invocations.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    /// Provider name (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Start one model turn with a fresh invocation context.
    ///
    /// # Arguments
    /// - `system`: Optional persona/behavior definition
    /// - `message`: User instruction for this turn
    async fn stream_turn(
        &self,
        system: Option<&str>,
        message: &str,
    ) -> Result<TurnStream, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoProvider;

    #[async_trait]
    impl AgentProvider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn stream_turn(
            &self,
            _system: Option<&str>,
            message: &str,
        ) -> Result<TurnStream, ProviderError> {
            let (tx, rx) = mpsc::channel(8);
            // Two fragments, then end of turn
            tx.send(Ok("Echo: ".to_string())).await.ok();
            tx.send(Ok(message.to_string())).await.ok();
            Ok(rx)
        }
    }

    #[tokio::test]
    async fn echo_provider_streams_in_order() {
        let provider = EchoProvider;
        assert_eq!(provider.name(), "echo");

        let mut stream = provider.stream_turn(Some("persona"), "hello").await.unwrap();
        let mut full = String::new();
        while let Some(fragment) = stream.recv().await {
            full.push_str(&fragment.unwrap());
        }
        assert_eq!(full, "Echo: hello");
    }

    #[test]
    fn provider_error_display() {
        let err = ProviderError::new("anthropic", "connection reset");
        assert_eq!(err.to_string(), "[anthropic] connection reset");
    }
}
