//! # Configuration Management
//!
//! Centralized configuration for the protocol layer.
//!
//! This module provides structured configuration for frame limits, the
//! handshake, and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides
//!
//! ## Security Considerations
//! - The default inbound frame cap (2 KB) bounds reassembly memory per
//!   connection; inbound sizes are attacker-controlled
//! - The RSA key size default (2048) is a floor, not a ceiling

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ProtocolError, Result};

/// Default cap on one outbound stream frame, bytes.
pub const DEFAULT_MAX_STREAM_FRAME: usize = 2048;

/// Default cap on one outbound datagram frame, bytes.
pub const DEFAULT_MAX_DATAGRAM_FRAME: usize = 1024;

/// Default cap on one inbound frame including header and checksum, bytes.
pub const DEFAULT_MAX_INBOUND_FRAME: usize = 2048;

/// Default RSA key size for the handshake, bits.
pub const DEFAULT_RSA_KEY_BITS: usize = 2048;

/// Main configuration structure containing all configurable settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Frame size limits.
    #[serde(default)]
    pub frames: FrameLimits,

    /// Handshake settings.
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(limit) = std::env::var("REALM_PROTOCOL_MAX_STREAM_FRAME") {
            if let Ok(val) = limit.parse::<usize>() {
                config.frames.max_stream_frame = val;
            }
        }

        if let Ok(limit) = std::env::var("REALM_PROTOCOL_MAX_DATAGRAM_FRAME") {
            if let Ok(val) = limit.parse::<usize>() {
                config.frames.max_datagram_frame = val;
            }
        }

        if let Ok(limit) = std::env::var("REALM_PROTOCOL_MAX_INBOUND_FRAME") {
            if let Ok(val) = limit.parse::<usize>() {
                config.frames.max_inbound_frame = val;
            }
        }

        if let Ok(bits) = std::env::var("REALM_PROTOCOL_RSA_KEY_BITS") {
            if let Ok(val) = bits.parse::<usize>() {
                config.handshake.rsa_key_bits = val;
            }
        }

        if let Ok(level) = std::env::var("REALM_PROTOCOL_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration.
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content.
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.frames.max_stream_frame < 8 {
            errors.push("frames.max_stream_frame is smaller than a minimal frame".to_string());
        }
        if self.frames.max_datagram_frame < 8 {
            errors.push("frames.max_datagram_frame is smaller than a minimal frame".to_string());
        }
        // header (8) + checksum (2) leaves no payload room below 12
        if self.frames.max_inbound_frame < 12 {
            errors.push("frames.max_inbound_frame cannot hold a header and checksum".to_string());
        }
        if self.frames.max_stream_frame > u16::MAX as usize + 2 {
            errors.push("frames.max_stream_frame exceeds the wire size field".to_string());
        }
        if self.handshake.rsa_key_bits < 1024 {
            errors.push("handshake.rsa_key_bits below 1024 is not acceptable".to_string());
        }

        errors
    }
}

/// Frame size limits, enforced on both directions.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FrameLimits {
    /// Largest outbound stream frame, total bytes on the wire.
    #[serde(default = "default_max_stream_frame")]
    pub max_stream_frame: usize,

    /// Largest outbound datagram frame, total bytes on the wire.
    #[serde(default = "default_max_datagram_frame")]
    pub max_datagram_frame: usize,

    /// Largest inbound frame accepted, header and checksum included.
    #[serde(default = "default_max_inbound_frame")]
    pub max_inbound_frame: usize,
}

impl Default for FrameLimits {
    fn default() -> Self {
        Self {
            max_stream_frame: DEFAULT_MAX_STREAM_FRAME,
            max_datagram_frame: DEFAULT_MAX_DATAGRAM_FRAME,
            max_inbound_frame: DEFAULT_MAX_INBOUND_FRAME,
        }
    }
}

fn default_max_stream_frame() -> usize {
    DEFAULT_MAX_STREAM_FRAME
}

fn default_max_datagram_frame() -> usize {
    DEFAULT_MAX_DATAGRAM_FRAME
}

fn default_max_inbound_frame() -> usize {
    DEFAULT_MAX_INBOUND_FRAME
}

/// Handshake settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// RSA key size in bits for the key exchange.
    #[serde(default = "default_rsa_key_bits")]
    pub rsa_key_bits: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            rsa_key_bits: DEFAULT_RSA_KEY_BITS,
        }
    }
}

fn default_rsa_key_bits() -> usize {
    DEFAULT_RSA_KEY_BITS
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", or "trace".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log inbound frame hexdumps at trace level.
    #[serde(default)]
    pub trace_frames: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            trace_frames: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
