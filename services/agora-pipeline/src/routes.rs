//! HTTP surface of the pipeline service.
//!
//! One invocation endpoint: `POST /invocations` takes `{"prompt": …}` and
//! answers with an SSE stream of pipeline events, ending after the
//! terminal `complete` or `error` frame. `GET /health` reports liveness.

use crate::event::{event_channel, PipelineEvent};
use crate::pipeline::Pipeline;
use crate::provider::AgentProvider;
use agora_common::config::DeliberationConfig;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the invocation handlers.
pub struct PipelineState {
    pub provider: Arc<dyn AgentProvider>,
    pub deliberation: DeliberationConfig,
}

/// Build the service router.
pub fn router(state: Arc<PipelineState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/invocations", post(invoke))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "agora-pipeline",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Debug, Deserialize)]
struct InvocationRequest {
    #[serde(default)]
    prompt: String,
}

async fn invoke(
    State(state): State<Arc<PipelineState>>,
    Json(request): Json<InvocationRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let trace_id = agora_common::logging::generate_trace_id();
    info!(%trace_id, prompt_len = request.prompt.len(), "Invocation received");

    let (tx, rx) = event_channel();
    let pipeline = Pipeline::new(
        Arc::clone(&state.provider),
        state.deliberation.clone(),
        tx,
    );
    tokio::spawn(async move {
        pipeline.run(&request.prompt).await;
    });

    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok(to_sse_frame(&event)), rx))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_frame(event: &PipelineEvent) -> Event {
    Event::default().json_data(event).unwrap_or_else(|_| {
        Event::default().data(r#"{"type":"error","data":"Event serialization failed"}"#)
    })
}
