//! # Transport Seam
//!
//! The boundary between the protocol layer and whatever actually moves
//! bytes.
//!
//! The processor only ever hands fully-framed, fully-encrypted byte buffers
//! across this seam; nothing below it knows about opcodes, ciphers, or
//! versions. A datagram send is allowed to fail without failing the frame -
//! the processor falls back to the stream path - so the trait reports the
//! two paths separately.

use bytes::Bytes;
use tracing::debug;

use crate::error::{ProtocolError, Result};

/// Byte-moving backend for one connection.
pub trait Transport {
    /// Send a frame on the reliable stream path.
    fn send_stream(&mut self, frame: Bytes) -> Result<()>;

    /// Send a frame on the datagram path.
    ///
    /// An error here is not fatal to the frame; the caller reroutes it over
    /// the stream path.
    fn send_datagram(&mut self, frame: Bytes) -> Result<()>;

    /// True while the datagram path is usable. The processor skips straight
    /// to the stream fallback when it is not.
    fn datagram_available(&self) -> bool;
}

/// In-process transport that records every frame it is given. Backs the
/// protocol tests and local tooling; never touches a socket.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    stream_frames: Vec<Bytes>,
    datagram_frames: Vec<Bytes>,
    datagram_enabled: bool,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self {
            stream_frames: Vec::new(),
            datagram_frames: Vec::new(),
            datagram_enabled: true,
        }
    }

    /// Disable the datagram path to exercise stream fallback.
    pub fn set_datagram_enabled(&mut self, enabled: bool) {
        self.datagram_enabled = enabled;
    }

    /// Frames sent on the stream path, oldest first.
    pub fn stream_frames(&self) -> &[Bytes] {
        &self.stream_frames
    }

    /// Frames sent on the datagram path, oldest first.
    pub fn datagram_frames(&self) -> &[Bytes] {
        &self.datagram_frames
    }

    /// Drop all recorded frames.
    pub fn clear(&mut self) {
        self.stream_frames.clear();
        self.datagram_frames.clear();
    }
}

impl Transport for LoopbackTransport {
    fn send_stream(&mut self, frame: Bytes) -> Result<()> {
        debug!(len = frame.len(), "loopback stream frame");
        self.stream_frames.push(frame);
        Ok(())
    }

    fn send_datagram(&mut self, frame: Bytes) -> Result<()> {
        if !self.datagram_enabled {
            return Err(ProtocolError::TransportError(
                "datagram path disabled".into(),
            ));
        }
        debug!(len = frame.len(), "loopback datagram frame");
        self.datagram_frames.push(frame);
        Ok(())
    }

    fn datagram_available(&self) -> bool {
        self.datagram_enabled
    }
}
