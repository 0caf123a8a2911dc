//! Anthropic Messages API provider with streaming turns.

use super::{AgentProvider, ProviderError, TurnStream};
use agora_common::config::RuntimeConfig;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

/// Anthropic API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    max_tokens: i64,
}

impl AnthropicProvider {
    /// Create a provider from runtime configuration.
    ///
    /// The api key and endpoint come from config; nothing is read from the
    /// ambient environment here.
    pub fn new(runtime: &RuntimeConfig) -> anyhow::Result<Self> {
        let api_key = runtime
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Anthropic api key is not configured"))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| anyhow::anyhow!("Anthropic api key contains invalid characters"))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(runtime.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            base_url: runtime.endpoint.trim_end_matches('/').to_string(),
            model: runtime.model.clone(),
            max_tokens: runtime.max_tokens,
        })
    }

    /// Create with an explicit base URL (tests point this at a stub server).
    #[doc(hidden)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl AgentProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn stream_turn(
        &self,
        system: Option<&str>,
        message: &str,
    ) -> Result<TurnStream, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        let request = MessagesRequest {
            model: self.model.clone(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: message.into(),
            }],
            max_tokens: self.max_tokens,
            system: system.map(String::from),
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::new("anthropic", format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError {
                provider: "anthropic".into(),
                message: format!("API error: {}", body),
                status_code: Some(status.as_u16()),
            });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(pump_sse(response, tx));
        Ok(rx)
    }
}

/// Drain the API's SSE body into the turn channel.
///
/// Text deltas become fragments; `message_stop` ends the turn; anything
/// that breaks mid-stream is delivered as a final `Err` item.
async fn pump_sse(response: reqwest::Response, tx: mpsc::Sender<Result<String, ProviderError>>) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx
                    .send(Err(ProviderError::new(
                        "anthropic",
                        format!("Stream error: {}", e),
                    )))
                    .await;
                return;
            }
        };

        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find("\n\n") {
            let frame = buffer[..pos].to_string();
            buffer.drain(..pos + 2);

            match parse_sse_frame(&frame) {
                Some(StreamItem::Text(text)) => {
                    if tx.send(Ok(text)).await.is_err() {
                        // Receiver dropped; stop pumping
                        return;
                    }
                }
                Some(StreamItem::Stop) => return,
                Some(StreamItem::Error(message)) => {
                    let _ = tx.send(Err(ProviderError::new("anthropic", message))).await;
                    return;
                }
                None => {}
            }
        }
    }
}

enum StreamItem {
    Text(String),
    Stop,
    Error(String),
}

/// Parse one SSE frame from the Messages stream.
fn parse_sse_frame(frame: &str) -> Option<StreamItem> {
    let data = frame
        .lines()
        .find_map(|line| line.strip_prefix("data: "))?;

    let event: StreamEvent = serde_json::from_str(data).ok()?;
    match event.event_type.as_str() {
        "content_block_delta" => {
            let delta = event.delta?;
            if delta.delta_type == "text_delta" {
                Some(StreamItem::Text(delta.text))
            } else {
                None
            }
        }
        "message_stop" => Some(StreamItem::Stop),
        "error" => Some(StreamItem::Error(
            event
                .error
                .map(|e| e.message)
                .unwrap_or_else(|| "unknown stream error".into()),
        )),
        _ => None,
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(rename = "type")]
    delta_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text_delta_frame() {
        let frame = "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello\"}}";
        match parse_sse_frame(frame) {
            Some(StreamItem::Text(text)) => assert_eq!(text, "Hello"),
            _ => panic!("Expected text fragment"),
        }
    }

    #[test]
    fn test_parse_message_stop_frame() {
        let frame = "event: message_stop\ndata: {\"type\":\"message_stop\"}";
        assert!(matches!(parse_sse_frame(frame), Some(StreamItem::Stop)));
    }

    #[test]
    fn test_parse_error_frame() {
        let frame = "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}";
        match parse_sse_frame(frame) {
            Some(StreamItem::Error(message)) => assert_eq!(message, "Overloaded"),
            _ => panic!("Expected error item"),
        }
    }

    #[test]
    fn test_ignores_ping_and_comment_frames() {
        assert!(parse_sse_frame("event: ping\ndata: {\"type\":\"ping\"}").is_none());
        assert!(parse_sse_frame(": keepalive").is_none());
    }

    #[test]
    fn test_request_serialization() {
        let request = MessagesRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Citizen opinions: dim streetlights".into(),
            }],
            max_tokens: 4096,
            system: Some("You are a research expert.".into()),
            stream: true,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"stream\":true"));
        assert!(json.contains("research expert"));
    }

    #[tokio::test]
    async fn test_stream_turn_against_stub_server() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let body = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hello \"}}\n\n",
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"world\"}}\n\n",
            "event: message_stop\n",
            "data: {\"type\":\"message_stop\"}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let runtime = RuntimeConfig {
            api_key: Some("sk-test".into()),
            ..RuntimeConfig::default()
        };
        let provider = AnthropicProvider::new(&runtime)
            .unwrap()
            .with_base_url(server.uri());

        let mut stream = provider
            .stream_turn(Some("You are a research expert."), "hi")
            .await
            .unwrap();
        let mut full = String::new();
        while let Some(item) = stream.recv().await {
            full.push_str(&item.unwrap());
        }
        assert_eq!(full, "Hello world");
    }

    #[tokio::test]
    async fn test_api_error_status_is_surfaced() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let runtime = RuntimeConfig {
            api_key: Some("sk-test".into()),
            ..RuntimeConfig::default()
        };
        let provider = AnthropicProvider::new(&runtime)
            .unwrap()
            .with_base_url(server.uri());

        let err = provider.stream_turn(None, "hi").await.unwrap_err();
        assert_eq!(err.status_code, Some(429));
        assert!(err.message.contains("rate limited"));
    }

    #[test]
    fn test_new_requires_api_key() {
        let runtime = RuntimeConfig::default();
        assert!(AnthropicProvider::new(&runtime).is_err());

        let runtime = RuntimeConfig {
            api_key: Some("sk-test".into()),
            ..RuntimeConfig::default()
        };
        assert!(AnthropicProvider::new(&runtime).is_ok());
    }
}
