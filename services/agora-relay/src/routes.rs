//! Relay HTTP surface.
//!
//! `POST /api/evaluate` takes `{"prompt": …}` and answers with SSE. The
//! upstream pipeline may answer with a live `text/event-stream` or with a
//! single buffered JSON body (some hosting modes do not stream); both are
//! normalized to the same `data: {event}` frames, and every failure mode
//! becomes an in-stream `{"type":"error"}` frame so the browser handles
//! one shape.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the relay handlers.
pub struct RelayState {
    pub client: reqwest::Client,
    /// Base URL of the pipeline service.
    pub upstream: String,
}

/// Build the relay router.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/evaluate", post(evaluate))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "agora-relay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    #[serde(default)]
    prompt: Option<String>,
}

async fn evaluate(
    State(state): State<Arc<RelayState>>,
    Json(request): Json<EvaluateRequest>,
) -> Response {
    let prompt = request.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        let err = agora_common::Error::InvalidInput("prompt is required".into());
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
        return (status, Json(json!({"error": err.to_string()}))).into_response();
    }

    info!(prompt_len = prompt.len(), "Relaying evaluation request");

    let (tx, rx) = mpsc::channel::<String>(64);
    tokio::spawn(pump_upstream(state, prompt, tx));

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let payload = rx.recv().await?;
        Some((Ok::<_, Infallible>(Event::default().data(payload)), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

fn error_frame(message: &str) -> String {
    json!({"type": "error", "data": message}).to_string()
}

/// Forward the upstream response into the client's SSE channel.
async fn pump_upstream(state: Arc<RelayState>, prompt: String, tx: mpsc::Sender<String>) {
    let url = format!("{}/invocations", state.upstream);
    let response = match state
        .client
        .post(&url)
        .json(&json!({ "prompt": prompt }))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Upstream request failed");
            let _ = tx.send(error_frame(&format!("Upstream request failed: {}", e))).await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Upstream returned an error");
        let _ = tx
            .send(error_frame(&format!("Upstream error ({}): {}", status, body)))
            .await;
        return;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("text/event-stream") {
        relay_event_stream(response, tx).await;
    } else {
        relay_buffered(response, tx).await;
    }
}

/// Re-emit `data:` lines from a live upstream stream.
async fn relay_event_stream(response: reqwest::Response, tx: mpsc::Sender<String>) {
    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(error_frame(&format!("Stream error: {}", e))).await;
                return;
            }
        };
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim_end_matches('\r').to_string();
            buffer.drain(..pos + 1);
            if let Some(data) = line.strip_prefix("data: ") {
                if tx.send(data.to_string()).await.is_err() {
                    return;
                }
            }
        }
    }

    // A final frame without a trailing newline still counts.
    if let Some(data) = buffer.trim_end().strip_prefix("data: ") {
        let _ = tx.send(data.to_string()).await;
    }
}

/// Unpack a buffered JSON body into individual event frames.
///
/// An array is replayed element by element; a single object is forwarded
/// as one frame.
async fn relay_buffered(response: reqwest::Response, tx: mpsc::Sender<String>) {
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            let _ = tx.send(error_frame(&format!("Failed to read upstream body: {}", e))).await;
            return;
        }
    };

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(items)) => {
            for item in items {
                if tx.send(item.to_string()).await.is_err() {
                    return;
                }
            }
        }
        Ok(value) => {
            let _ = tx.send(value.to_string()).await;
        }
        Err(_) => {
            let _ = tx.send(error_frame("Upstream returned a non-JSON body")).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_router(upstream: &str) -> Router {
        router(Arc::new(RelayState {
            client: reqwest::Client::new(),
            upstream: upstream.to_string(),
        }))
    }

    async fn post_evaluate(router: Router, body: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(
                Request::post("/api/evaluate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    #[tokio::test]
    async fn test_missing_prompt_is_rejected() {
        let (status, body) = post_evaluate(test_router("http://unused"), "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("prompt is required"));

        let (status, _) =
            post_evaluate(test_router("http://unused"), r#"{"prompt": "  "}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_event_stream_upstream_is_passed_through() {
        let server = MockServer::start().await;
        let upstream_body = concat!(
            "data: {\"type\":\"status\",\"data\":\"[Step 0] Investigating...\"}\n\n",
            "data: {\"type\":\"complete\",\"data\":{}}\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/invocations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(upstream_body, "text/event-stream"),
            )
            .mount(&server)
            .await;

        let (status, body) =
            post_evaluate(test_router(&server.uri()), r#"{"prompt": "dim lights"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"data: {"type":"status""#));
        assert!(body.contains(r#"data: {"type":"complete""#));
    }

    #[tokio::test]
    async fn test_buffered_json_array_is_replayed_as_frames() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"type": "status", "data": "[Step 0] Investigating..."},
                {"type": "complete", "data": {}}
            ])))
            .mount(&server)
            .await;

        let (status, body) =
            post_evaluate(test_router(&server.uri()), r#"{"prompt": "dim lights"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"data: {"type":"status""#));
        assert!(body.contains(r#"data: {"type":"complete""#));
    }

    #[tokio::test]
    async fn test_upstream_error_becomes_error_frame() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invocations"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let (status, body) =
            post_evaluate(test_router(&server.uri()), r#"{"prompt": "dim lights"}"#).await;
        // Stream opens successfully; the failure is delivered in-band.
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""type":"error""#));
        assert!(body.contains("Upstream error"));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_becomes_error_frame() {
        let (status, body) = post_evaluate(
            test_router("http://127.0.0.1:1"),
            r#"{"prompt": "dim lights"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Upstream request failed"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = test_router("http://unused")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
