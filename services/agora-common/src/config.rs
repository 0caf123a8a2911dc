//! Configuration management for Agora services.
//!
//! Both services share a unified configuration file at `~/.agora/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Explicit config file values
//! 2. Environment variables
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `AGORA_BIND_ADDRESS` → network.bind
//! - `AGORA_PIPELINE_PORT` → services.pipeline.port
//! - `AGORA_RELAY_PORT` → services.relay.port
//! - `AGORA_RUNTIME_ENDPOINT` → runtime.endpoint
//! - `AGORA_MODEL` → runtime.model
//! - `ANTHROPIC_API_KEY` → runtime.api_key

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".agora"),
        |dirs| dirs.home_dir().join(".agora"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Global network configuration.
///
/// Controls the bind address for both services. Default is `127.0.0.1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

// ============================================================================
// Service Ports
// ============================================================================

/// Port configuration for one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePortConfig {
    pub port: u16,
}

/// Port configuration for both services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Pipeline service (runs deliberations)
    #[serde(default = "default_pipeline_port")]
    pub pipeline: ServicePortConfig,
    /// Relay service (browser-facing SSE frontend)
    #[serde(default = "default_relay_port")]
    pub relay: ServicePortConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline_port(),
            relay: default_relay_port(),
        }
    }
}

fn default_pipeline_port() -> ServicePortConfig {
    ServicePortConfig { port: 4500 }
}

fn default_relay_port() -> ServicePortConfig {
    ServicePortConfig { port: 5000 }
}

// ============================================================================
// Model Runtime
// ============================================================================

/// Hosted model runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model API base endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model identifier used for every persona invocation
    #[serde(default = "default_model")]
    pub model: String,
    /// API key (usually supplied via `ANTHROPIC_API_KEY`)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-turn request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum tokens per model turn
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.anthropic.com".into()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_tokens() -> i64 {
    4096
}

// ============================================================================
// Deliberation Knobs
// ============================================================================

/// Pipeline thresholds and budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliberationConfig {
    /// Review loop attempt budget
    #[serde(default = "default_review_attempts")]
    pub review_max_attempts: u32,
    /// Minimum citizen personas required to proceed
    #[serde(default = "default_min_citizens")]
    pub min_citizen_personas: usize,
    /// Review approval threshold (0-100)
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: f64,
    /// Jurisdiction given research priority and the administrative viewpoint
    #[serde(default = "default_jurisdiction")]
    pub primary_jurisdiction: String,
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            review_max_attempts: default_review_attempts(),
            min_citizen_personas: default_min_citizens(),
            approval_threshold: default_approval_threshold(),
            primary_jurisdiction: default_jurisdiction(),
        }
    }
}

fn default_jurisdiction() -> String {
    "Tokyo".into()
}

fn default_review_attempts() -> u32 {
    3
}

fn default_min_citizens() -> usize {
    10
}

fn default_approval_threshold() -> f64 {
    80.0
}

// ============================================================================
// Observability
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Output format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Config
// ============================================================================

/// Unified configuration for all Agora services.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub deliberation: DeliberationConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path, applying env overrides.
    ///
    /// A missing config file is not an error; defaults are used.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file(&config_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit path, applying env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("AGORA_BIND_ADDRESS") {
            if !bind.is_empty() {
                self.network.bind = bind;
            }
        }
        if let Some(port) = env_port("AGORA_PIPELINE_PORT") {
            self.services.pipeline.port = port;
        }
        if let Some(port) = env_port("AGORA_RELAY_PORT") {
            self.services.relay.port = port;
        }
        if let Ok(endpoint) = std::env::var("AGORA_RUNTIME_ENDPOINT") {
            if !endpoint.is_empty() {
                self.runtime.endpoint = endpoint;
            }
        }
        if let Ok(model) = std::env::var("AGORA_MODEL") {
            if !model.is_empty() {
                self.runtime.model = model;
            }
        }
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            if !key.is_empty() {
                self.runtime.api_key = Some(key);
            }
        }
    }

    /// Address the pipeline service listens on.
    pub fn pipeline_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.services.pipeline.port)
    }

    /// Address the relay service listens on.
    pub fn relay_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.services.relay.port)
    }

    /// URL the relay uses to reach the pipeline service.
    pub fn pipeline_endpoint(&self) -> String {
        format!("http://{}", self.pipeline_addr())
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind, "127.0.0.1");
        assert_eq!(config.services.pipeline.port, 4500);
        assert_eq!(config.services.relay.port, 5000);
        assert_eq!(config.deliberation.review_max_attempts, 3);
        assert_eq!(config.deliberation.min_citizen_personas, 10);
        assert!((config.deliberation.approval_threshold - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_file(Path::new("/nonexistent/agora.json")).unwrap();
        assert_eq!(config.runtime.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_partial_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"services": {"pipeline": {"port": 9000}}, "runtime": {"model": "claude-opus-4"}}"#,
        )
        .unwrap();

        let config = Config::load_file(&path).unwrap();
        assert_eq!(config.services.pipeline.port, 9000);
        assert_eq!(config.services.relay.port, 5000);
        assert_eq!(config.runtime.model, "claude-opus-4");
    }

    #[test]
    fn test_addresses() {
        let config = Config::default();
        assert_eq!(config.pipeline_addr(), "127.0.0.1:4500");
        assert_eq!(config.pipeline_endpoint(), "http://127.0.0.1:4500");
    }
}
