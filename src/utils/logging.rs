//! Structured logging configuration.
//!
//! One-shot tracing setup driven by [`LoggingConfig`]; the environment
//! filter still wins when `RUST_LOG` is set, so deployments can raise
//! verbosity without a config change.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

/// Install the global tracing subscriber.
///
/// # Errors
/// `ConfigError` if a subscriber is already installed or the level string
/// does not parse.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ProtocolError::ConfigError(format!("Invalid log level: {e}")))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to init logging: {e}")))
}
