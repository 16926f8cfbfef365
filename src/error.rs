//! # Error Types
//!
//! Error handling for the wire-protocol core.
//!
//! This module defines all error variants that can occur while building,
//! ciphering, or dispatching frames, from framing arithmetic failures to
//! version-negotiation refusals.
//!
//! ## Error Categories
//! - **Framing Errors**: size fields that no longer fit, oversized strings
//! - **Cipher Errors**: regions that fall outside the buffer
//! - **Dispatch Errors**: unknown client versions, unregistered opcodes
//! - **Gate Errors**: precondition ids with no registered predicate
//! - **Handshake Errors**: key-exchange and negotiation failures
//!
//! Errors on the outbound (encode) path are programmer errors and are
//! surfaced as hard failures; errors on the inbound (decode) path are
//! attacker-reachable and are handled by dropping the offending frame.
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Registration lifecycle errors
    pub const ERR_GATE_SEALED: &str = "Precondition gate is sealed; registration is closed";
    pub const ERR_REGISTRY_SEALED: &str = "Version registry is sealed; registration is closed";

    /// Handshake errors
    pub const ERR_VERSION_BEFORE_MESSAGES: &str =
        "Client sent a message before announcing its protocol version";
    pub const ERR_KEY_ALREADY_SET: &str = "Session key may only be installed once";
    pub const ERR_EMPTY_SESSION_KEY: &str = "Session key must not be empty";
    pub const ERR_CODEC_ALREADY_ASSIGNED: &str = "Session codec may only be assigned once";

    /// Transport errors
    pub const ERR_OVERSIZE_FRAME: &str = "Outbound frame exceeds the configured size limit";
}

/// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame too large: {length} bytes does not fit the size field")]
    FrameTooLarge { length: usize },

    #[error("Pascal string too long: {0} bytes (max 255)")]
    StringTooLong(usize),

    #[error("Buffer too short: need {needed} bytes, have {actual}")]
    BufferTooShort { needed: usize, actual: usize },

    #[error("Checksum mismatch: packet 0x{received:04X}, calculated 0x{calculated:04X}")]
    ChecksumMismatch { received: u16, calculated: u16 },

    #[error("Unknown raw protocol version: {0}")]
    UnknownRawVersion(i32),

    #[error("Unregistered opcode: 0x{0:02X}")]
    UnregisteredOpcode(u8),

    #[error("Unknown precondition id: {0}")]
    UnknownPrecondition(u8),

    #[error("Handshake failed: {0}")]
    HandshakeError(String),

    #[error("Key exchange error: {0}")]
    KeyExchange(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
