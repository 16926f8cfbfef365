//! # Protocol Layer
//!
//! Everything above raw frames: sessions, version negotiation, codec
//! variants, opcode admission, and the per-connection processor.
//!
//! ## Components
//! - **Session**: per-connection state and the set-once handshake lifecycle
//! - **Registry**: raw client version to codec variant resolution
//! - **Variant**: per-revision encoders linked into a delegation chain
//! - **Gate**: precondition checks for inbound opcodes, fail-closed
//! - **Handshake**: version negotiation and the asymmetric key exchange
//! - **Processor**: send/receive pump tying all of it to a transport
//! - **Model**: read-only snapshots of the game objects codecs serialize

pub mod gate;
pub mod handshake;
pub mod model;
pub mod processor;
pub mod registry;
pub mod session;
pub mod variant;

pub use processor::{HandlerTable, InboundFrame, PacketHandler, PacketProcessor};
pub use registry::VersionRegistry;
pub use session::Session;
pub use variant::CodecVariant;
