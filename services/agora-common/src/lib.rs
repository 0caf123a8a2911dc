//! Shared foundation for the Agora deliberation services.
//!
//! Provides the unified configuration file, the service error type, and
//! logging initialization used by `agora-pipeline` and `agora-relay`.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
