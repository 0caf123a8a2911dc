//! Pipeline service entry point.

use agora_common::config::Config;
use agora_common::logging::init_logging;
use agora_pipeline::routes::{router, PipelineState};
use agora_pipeline::AnthropicProvider;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    let provider =
        AnthropicProvider::new(&config.runtime).context("Failed to initialize model provider")?;

    let state = Arc::new(PipelineState {
        provider: Arc::new(provider),
        deliberation: config.deliberation.clone(),
    });

    let addr = config.pipeline_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, model = %config.runtime.model, "Pipeline service listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
