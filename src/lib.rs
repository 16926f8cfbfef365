//! # Realm Protocol
//!
//! Wire-protocol core for a multiplayer game server: length-prefixed
//! framing over stream and datagram transports, a keyed session cipher,
//! per-client-version codec dispatch, and opcode admission control.
//!
//! ## Architecture
//! ```text
//! handlers ── gate ── processor ── transport
//!                        │
//!            session ── codec variant chain
//!                        │
//!                 frames + cipher
//! ```
//!
//! The [`protocol::PacketProcessor`] is the per-connection entry point: feed
//! it inbound bytes, hand it finalized frames to send. Frame layout lives in
//! [`core::frame`], the cipher in [`core::cipher`], and every
//! version-dependent encoding in [`protocol::variant`].
//!
//! ## Security
//! - Inbound sizes are attacker-controlled and bounds-checked everywhere
//! - The session key travels only under the asymmetric key exchange
//! - Unknown opcodes are denied by default, never silently admitted

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::ProtocolConfig;
pub use error::{ProtocolError, Result};
pub use protocol::{
    HandlerTable, InboundFrame, PacketHandler, PacketProcessor, Session, VersionRegistry,
};
