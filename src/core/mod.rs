//! # Core Wire Components
//!
//! Frame assembly and the session stream cipher.
//!
//! This module owns the exact byte geometry of the protocol: length-prefixed
//! frames for the two transports and the keyed feedback cipher that obscures
//! them.
//!
//! ## Components
//! - **Frame**: length-prefixed builders, readers, and the inbound checksum
//! - **Cipher**: key schedule and halves-reversed feedback keystream
//!
//! ## Wire Format
//! ```text
//! stream:   [Size(2)] [Opcode(1)] [Payload(N)]
//! datagram: [Size(2)] [Counter(2)] [Opcode(1)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Size fields validated before use on both paths
//! - Cipher region bounds checked against attacker-influenced lengths

pub mod cipher;
pub mod frame;
