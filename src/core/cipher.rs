//! # Session Stream Cipher
//!
//! Keyed obfuscation of the mutable region of a frame.
//!
//! The cipher derives a 256-byte permutation from the shared session key
//! (classic key schedule), but the keystream is *not* a context-free RC4
//! stream: the region is split in half and the **second half is ciphered
//! first**, and the `j` accumulator advances by the **plaintext** byte on
//! both encode and decode. That makes the keystream depend on the data being
//! processed - peers stay in sync only because both feed the same plaintext
//! values into `j`. The wire format depends on this exact behavior; do not
//! normalize it toward textbook RC4.
//!
//! Every call works on a disposable copy of the derived permutation, so
//! frames are independent of each other and the stored state is never
//! mutated by encode/decode.
//!
//! ## Security
//! - This is traffic obscurement for a game protocol, not authenticated
//!   encryption; session establishment is protected separately by the
//!   asymmetric key exchange
//! - Region bounds are validated before any indexing, because the length
//!   field is attacker-influenced on the decode path

use crate::error::{constants, ProtocolError, Result};

/// Header slack on inbound stream frames: eight header bytes after the size
/// field plus the two trailing checksum bytes, none of which the declared
/// size covers.
const INBOUND_STREAM_SLACK: usize = 10;

/// Byte region of a frame the cipher operates on.
///
/// Outbound geometries start after the transport header fields (the datagram
/// sequence counter is never ciphered); the inbound geometry extends past the
/// declared size to cover the client's header and checksum bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameGeometry {
    /// Outbound stream frame: region is opcode + payload.
    Stream,
    /// Outbound datagram frame: region is opcode + payload, counter excluded.
    Datagram,
    /// Inbound stream frame: region is everything after the size field.
    InboundStream,
}

impl FrameGeometry {
    /// Compute `(start, mid, end)` for `buf`, validating bounds.
    fn region(self, buf: &[u8]) -> Result<(usize, usize, usize)> {
        if buf.len() < 2 {
            return Err(ProtocolError::BufferTooShort {
                needed: 2,
                actual: buf.len(),
            });
        }
        let declared = ((buf[0] as usize) << 8) | buf[1] as usize;
        let (start, len) = match self {
            FrameGeometry::Stream => (2, declared),
            FrameGeometry::Datagram => (4, declared),
            FrameGeometry::InboundStream => (2, declared + INBOUND_STREAM_SLACK),
        };
        let end = start + len;
        if end > buf.len() {
            return Err(ProtocolError::BufferTooShort {
                needed: end,
                actual: buf.len(),
            });
        }
        Ok((start, start + len / 2, end))
    }
}

/// A derived 256-byte permutation. Bijection on `0..=255` by construction.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherState {
    permutation: [u8; 256],
}

impl CipherState {
    /// Derive the permutation from a session key.
    ///
    /// Pure and deterministic: identical keys always yield identical
    /// permutations. Keys may be any non-empty length; bytes are consumed
    /// cyclically.
    ///
    /// # Errors
    /// `HandshakeError` for an empty key.
    pub fn derive(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(ProtocolError::HandshakeError(
                constants::ERR_EMPTY_SESSION_KEY.into(),
            ));
        }
        let mut perm = [0u8; 256];
        for (x, slot) in perm.iter_mut().enumerate() {
            *slot = x as u8;
        }
        let mut y: u8 = 0;
        for x in 0..256 {
            y = y
                .wrapping_add(perm[x])
                .wrapping_add(key[x % key.len()]);
            perm.swap(x, y as usize);
        }
        Ok(Self { permutation: perm })
    }

    /// Borrow the raw permutation table.
    pub fn permutation(&self) -> &[u8; 256] {
        &self.permutation
    }
}

impl std::fmt::Debug for CipherState {
    // never log key material
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CipherState(..)")
    }
}

/// Per-session symmetric cipher.
///
/// Keyless ciphers pass frames through unchanged; the processor only engages
/// the cipher once the session reaches the symmetric-encrypted state.
#[derive(Debug, Default)]
pub struct StreamCipher {
    state: Option<CipherState>,
}

impl StreamCipher {
    /// A cipher with no key installed; encode/decode are no-ops.
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Install the session key, replacing any previous derivation.
    ///
    /// # Errors
    /// `HandshakeError` for an empty key.
    pub fn set_key(&mut self, key: &[u8]) -> Result<()> {
        self.state = Some(CipherState::derive(key)?);
        Ok(())
    }

    /// True once a key has been derived.
    pub fn has_key(&self) -> bool {
        self.state.is_some()
    }

    /// Cipher an outbound frame in place.
    ///
    /// # Errors
    /// `BufferTooShort` if the declared region exceeds the buffer.
    pub fn encode(&self, buf: &mut [u8], geometry: FrameGeometry) -> Result<()> {
        self.apply(buf, geometry, false)
    }

    /// Decipher an inbound frame in place.
    ///
    /// # Errors
    /// `BufferTooShort` if the declared region exceeds the buffer; on the
    /// inbound path the caller must treat that as a dropped frame, not a
    /// fault.
    pub fn decode(&self, buf: &mut [u8], geometry: FrameGeometry) -> Result<()> {
        self.apply(buf, geometry, true)
    }

    fn apply(&self, buf: &mut [u8], geometry: FrameGeometry, decode: bool) -> Result<()> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        let (start, mid, end) = geometry.region(buf)?;

        // Disposable working copy; the derived state survives untouched.
        let mut sbox = state.permutation;
        let mut i: u8 = 0;
        let mut j: u8 = 0;

        // Second half first, then the first half, with i/j running across
        // both. Strictly serial: each byte's swap depends on the previous
        // plaintext byte.
        for k in (mid..end).chain(start..mid) {
            i = i.wrapping_add(1);
            let tmp = sbox[i as usize];
            j = j.wrapping_add(tmp);
            sbox.swap(i as usize, j as usize);
            let ks = sbox[sbox[i as usize].wrapping_add(sbox[j as usize]) as usize];
            if decode {
                buf[k] ^= ks;
                j = j.wrapping_add(buf[k]); // plaintext, post-XOR
            } else {
                j = j.wrapping_add(buf[k]); // plaintext, pre-XOR
                buf[k] ^= ks;
            }
        }
        Ok(())
    }
}
