//! Relay service entry point.

use agora_common::config::Config;
use agora_common::logging::init_logging;
use agora_relay::routes::{router, RelayState};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    // No total timeout: a deliberation run legitimately takes minutes.
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let state = Arc::new(RelayState {
        client,
        upstream: config.pipeline_endpoint(),
    });

    let addr = config.relay_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, upstream = %state.upstream, "Relay service listening");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;
    Ok(())
}
