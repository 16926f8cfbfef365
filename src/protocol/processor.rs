//! # Packet Processor
//!
//! Per-connection send and receive pump: the only place where frames,
//! cipher, gate, and handlers meet.
//!
//! Outbound, the processor enforces the configured size caps, runs the
//! stream cipher once the session is symmetric, stamps the datagram
//! counter, and reroutes datagrams over the stream path when the datagram
//! path is down. Inbound, it reassembles stream bytes into whole frames,
//! decrypts, verifies the trailing checksum, asks the precondition gate,
//! and dispatches to the registered handler.
//!
//! ## Error policy
//! A checksum mismatch or an oversize frame poisons the byte stream and is
//! returned to the caller, which should drop the connection. Everything
//! else - gate denials, unknown opcodes, handler failures - affects only
//! the one frame: it is logged, counted, and swallowed.
//!
//! ## Wire Format
//! ```text
//! inbound: [Size(2)] [Seq(2)] [Session(2)] [Param(2)] [Code(2)]
//!          [Payload(Size)] [Checksum(2)]
//! ```

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::config::ProtocolConfig;
use crate::core::cipher::FrameGeometry;
use crate::core::frame::{checksum, stamp_datagram_counter, FrameReader};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::gate::PreconditionGate;
use crate::protocol::session::Session;
use crate::transport::Transport;
use crate::utils::hexdump::hexdump;
use crate::utils::Metrics;

/// Inbound bytes that are not payload: size, four header words, checksum.
const INBOUND_OVERHEAD: usize = 12;
/// Offset of the payload within an inbound frame.
const INBOUND_PAYLOAD_AT: usize = 10;

/// One parsed inbound frame.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    sequence: u16,
    session_id: u16,
    parameter: u16,
    code: u16,
    payload: Bytes,
}

impl InboundFrame {
    /// Parse a complete, decrypted, checksum-verified frame buffer.
    ///
    /// # Errors
    /// `BufferTooShort` if the buffer disagrees with its own size field.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < INBOUND_OVERHEAD {
            return Err(ProtocolError::BufferTooShort {
                needed: INBOUND_OVERHEAD,
                actual: frame.len(),
            });
        }
        let mut rd = FrameReader::new(frame);
        let declared = rd.read_u16()? as usize;
        if frame.len() != declared + INBOUND_OVERHEAD {
            return Err(ProtocolError::BufferTooShort {
                needed: declared + INBOUND_OVERHEAD,
                actual: frame.len(),
            });
        }
        let sequence = rd.read_u16()?;
        let session_id = rd.read_u16()?;
        let parameter = rd.read_u16()?;
        let code = rd.read_u16()?;
        let payload = Bytes::copy_from_slice(
            &frame[INBOUND_PAYLOAD_AT..INBOUND_PAYLOAD_AT + declared],
        );
        Ok(Self {
            sequence,
            session_id,
            parameter,
            code,
            payload,
        })
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn session_id(&self) -> u16 {
        self.session_id
    }

    pub fn parameter(&self) -> u16 {
        self.parameter
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    /// Handler-table opcode: the low byte of the code word.
    pub fn opcode(&self) -> u8 {
        (self.code & 0xFF) as u8
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Bounds-checked cursor over the payload.
    pub fn reader(&self) -> FrameReader<'_> {
        FrameReader::new(&self.payload)
    }
}

/// One inbound message handler. Implementations are shared across sessions
/// and must not hold per-session state.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, session: &mut Session, frame: &InboundFrame) -> Result<()>;
}

/// Opcode-indexed handler table, assembled at startup and shared read-only.
#[derive(Default)]
pub struct HandlerTable {
    slots: Vec<Option<Arc<dyn PacketHandler>>>,
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerTable")
            .field(
                "registered",
                &self.slots.iter().filter(|s| s.is_some()).count(),
            )
            .finish()
    }
}

impl HandlerTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; 256],
        }
    }

    /// Register a handler for an opcode. Re-registering replaces the old
    /// handler; the last registration wins.
    pub fn register(&mut self, opcode: u8, handler: Arc<dyn PacketHandler>) {
        if self.slots[opcode as usize].is_some() {
            debug!(opcode, "replacing packet handler");
        }
        self.slots[opcode as usize] = Some(handler);
    }

    pub fn get(&self, opcode: u8) -> Option<&Arc<dyn PacketHandler>> {
        self.slots[opcode as usize].as_ref()
    }
}

/// Per-connection send/receive pump over one transport.
pub struct PacketProcessor<T: Transport> {
    transport: T,
    session: Session,
    gate: Arc<PreconditionGate>,
    handlers: Arc<HandlerTable>,
    metrics: Arc<Metrics>,
    max_stream_frame: usize,
    max_datagram_frame: usize,
    max_inbound_frame: usize,
    trace_frames: bool,
    datagram_counter: u16,
    inbound: BytesMut,
}

impl<T: Transport> PacketProcessor<T> {
    pub fn new(
        transport: T,
        config: &ProtocolConfig,
        gate: Arc<PreconditionGate>,
        handlers: Arc<HandlerTable>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            transport,
            session: Session::new(),
            gate,
            handlers,
            metrics,
            max_stream_frame: config.frames.max_stream_frame,
            max_datagram_frame: config.frames.max_datagram_frame,
            max_inbound_frame: config.frames.max_inbound_frame,
            trace_frames: config.logging.trace_frames,
            datagram_counter: 0,
            inbound: BytesMut::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send a finalized stream frame.
    ///
    /// # Errors
    /// `FrameTooLarge` when the frame exceeds the configured stream cap; an
    /// oversize frame is a server bug, never something to truncate quietly.
    pub fn send_stream(&mut self, frame: Bytes) -> Result<()> {
        if frame.len() > self.max_stream_frame {
            warn!(
                len = frame.len(),
                cap = self.max_stream_frame,
                "{}",
                constants::ERR_OVERSIZE_FRAME
            );
            return Err(ProtocolError::FrameTooLarge { length: frame.len() });
        }
        let frame = self.seal(frame, FrameGeometry::Stream)?;
        self.metrics.stream_frame_sent(frame.len() as u64);
        self.transport.send_stream(frame)
    }

    /// Send a finalized datagram frame, stamping the sequence counter.
    ///
    /// When `force_stream` is set, or the datagram path is unavailable, or
    /// the datagram send itself fails, the frame is rewritten for the stream
    /// path and sent there instead.
    pub fn send_datagram(&mut self, frame: Bytes, force_stream: bool) -> Result<()> {
        if frame.len() > self.max_datagram_frame {
            warn!(
                len = frame.len(),
                cap = self.max_datagram_frame,
                "{}",
                constants::ERR_OVERSIZE_FRAME
            );
            return Err(ProtocolError::FrameTooLarge { length: frame.len() });
        }

        if force_stream || !self.transport.datagram_available() {
            self.metrics.datagram_fallback();
            return self.send_stream(rewrite_for_stream(&frame));
        }

        self.datagram_counter = self.datagram_counter.wrapping_add(1);
        let mut buf = frame.to_vec();
        stamp_datagram_counter(&mut buf, self.datagram_counter)?;
        let sealed = self.seal(Bytes::from(buf), FrameGeometry::Datagram)?;

        match self.transport.send_datagram(sealed) {
            Ok(()) => {
                self.metrics.datagram_frame_sent(frame.len() as u64);
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "datagram send failed, rerouting over stream");
                self.metrics.datagram_fallback();
                self.send_stream(rewrite_for_stream(&frame))
            }
        }
    }

    /// Run the cipher over an outbound frame once the session is symmetric.
    fn seal(&self, frame: Bytes, geometry: FrameGeometry) -> Result<Bytes> {
        if !self.session.is_symmetric_encrypted() {
            return Ok(frame);
        }
        let mut buf = frame.to_vec();
        self.session.cipher().encode(&mut buf, geometry)?;
        Ok(Bytes::from(buf))
    }

    /// Feed raw stream bytes into reassembly and process every complete
    /// frame they yield.
    ///
    /// # Errors
    /// `FrameTooLarge` for a declared size beyond the inbound cap and
    /// `ChecksumMismatch` for a corrupt frame; both poison the stream and
    /// the caller should disconnect.
    pub fn receive(&mut self, data: &[u8]) -> Result<()> {
        self.inbound.extend_from_slice(data);
        loop {
            if self.inbound.len() < 2 {
                return Ok(());
            }
            let declared = ((self.inbound[0] as usize) << 8) | self.inbound[1] as usize;
            let total = declared + INBOUND_OVERHEAD;
            if total > self.max_inbound_frame {
                return Err(ProtocolError::FrameTooLarge { length: total });
            }
            if self.inbound.len() < total {
                return Ok(());
            }
            let frame = self.inbound.split_to(total);
            self.process_frame(frame.to_vec())?;
        }
    }

    fn process_frame(&mut self, mut frame: Vec<u8>) -> Result<()> {
        if self.session.is_symmetric_encrypted() {
            self.session
                .cipher()
                .decode(&mut frame, FrameGeometry::InboundStream)?;
        }

        let received = u16::from_be_bytes([frame[frame.len() - 2], frame[frame.len() - 1]]);
        let calculated = checksum(&frame[..frame.len() - 2]);
        if received != calculated {
            self.metrics.checksum_failure();
            return Err(ProtocolError::ChecksumMismatch {
                received,
                calculated,
            });
        }

        if self.trace_frames {
            trace!(dump = %hexdump(&frame), "inbound frame");
        }

        let parsed = InboundFrame::parse(&frame)?;
        self.metrics.frame_received(frame.len() as u64);

        match self.gate.check(parsed.opcode(), &self.session) {
            Ok(true) => {}
            Ok(false) => {
                warn!(opcode = parsed.opcode(), "frame denied by precondition");
                self.metrics.frame_gated();
                return Ok(());
            }
            Err(e) => {
                warn!(opcode = parsed.opcode(), error = %e, "frame rejected by gate");
                self.metrics.frame_gated();
                return Ok(());
            }
        }

        let Some(handler) = self.handlers.get(parsed.opcode()) else {
            debug!(opcode = parsed.opcode(), "no handler registered, dropping");
            return Ok(());
        };
        let handler = Arc::clone(handler);
        if let Err(e) = handler.handle(&mut self.session, &parsed) {
            // one bad message does not take the connection down
            warn!(opcode = parsed.opcode(), error = %e, "handler failed");
            self.metrics.handler_error();
        }
        Ok(())
    }
}

/// Rewrite a datagram frame for the stream path: same size field and body,
/// sequence counter dropped.
fn rewrite_for_stream(frame: &Bytes) -> Bytes {
    let mut buf = Vec::with_capacity(frame.len() - 2);
    buf.extend_from_slice(&frame[..2]);
    buf.extend_from_slice(&frame[4..]);
    Bytes::from(buf)
}
