//! # Frame Assembly
//!
//! Length-prefixed frame building for the two game transports.
//!
//! This module owns the exact byte geometry of outbound frames and the cursor
//! primitives used to fill them. Every multi-byte integer is big-endian unless
//! a message explicitly asks for the legacy little-endian writers; that choice
//! is per field, never global.
//!
//! ## Wire Format
//! ```text
//! stream:   [Size(2)] [Opcode(1)] [Payload(N)]            Size = N + 1
//! datagram: [Size(2)] [Counter(2)] [Opcode(1)] [Payload(N)]  Size = N + 1
//! ```
//! The size field counts the opcode byte but never the size or counter
//! fields. The datagram counter is stamped by the send path, not here.
//!
//! ## Security
//! - Size fields are validated on finalize; a frame that no longer fits its
//!   u16 size field is a hard error, never a silent wrap
//! - Pascal strings longer than 255 bytes are rejected; callers that want
//!   truncation must truncate before writing
//! - `FrameReader` bounds-checks every read, since inbound lengths are
//!   attacker-influenced

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtocolError, Result};

/// Header length of a stream frame: size field plus opcode.
pub const STREAM_HEADER_SIZE: usize = 3;

/// Header length of a datagram frame: size field, sequence counter, opcode.
pub const DATAGRAM_HEADER_SIZE: usize = 5;

/// Trailing checksum length on inbound stream frames.
pub const CHECKSUM_SIZE: usize = 2;

/// Transport a frame is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTransport {
    /// Reliable ordered byte stream (TCP).
    Stream,
    /// Unreliable datagram with a 16-bit sequence counter (UDP).
    Datagram,
}

/// Builder for one outbound frame.
///
/// Construct with [`FrameBuilder::stream`] or [`FrameBuilder::datagram`],
/// fill the body with the writer methods, then call [`FrameBuilder::finalize`]
/// to fix up the size field and take the bytes. A finalized frame is never
/// mutated again except for the datagram counter stamp on the send path.
pub struct FrameBuilder {
    buf: BytesMut,
    transport: FrameTransport,
    opcode: u8,
}

impl FrameBuilder {
    /// Begin a stream frame: reserves the size field and writes the opcode.
    pub fn stream(opcode: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u16(0); // size placeholder
        buf.put_u8(opcode);
        Self {
            buf,
            transport: FrameTransport::Stream,
            opcode,
        }
    }

    /// Begin a datagram frame: reserves the size and counter fields and
    /// writes the opcode.
    pub fn datagram(opcode: u8) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u16(0); // size placeholder
        buf.put_u16(0); // sequence counter placeholder
        buf.put_u8(opcode);
        Self {
            buf,
            transport: FrameTransport::Datagram,
            opcode,
        }
    }

    /// The opcode this frame was begun with.
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// The transport this frame targets.
    pub fn transport(&self) -> FrameTransport {
        self.transport
    }

    /// Bytes written so far, header included.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if only the header has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.len()
            == match self.transport {
                FrameTransport::Stream => STREAM_HEADER_SIZE,
                FrameTransport::Datagram => DATAGRAM_HEADER_SIZE,
            }
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a 16-bit integer, big-endian.
    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Write a 32-bit integer, big-endian.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Write a 16-bit integer, little-endian. Legacy fields only.
    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    /// Write a 32-bit integer, little-endian. Legacy fields only.
    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    /// Write a single zero terminator byte.
    pub fn write_terminator(&mut self) {
        self.buf.put_u8(0);
    }

    /// Write `count` copies of `value`.
    pub fn fill(&mut self, value: u8, count: usize) {
        self.buf.put_bytes(value, count);
    }

    /// Write a Pascal string: 1-byte length prefix, raw bytes, no terminator.
    ///
    /// # Errors
    /// `StringTooLong` if the string body exceeds 255 bytes. Truncation is a
    /// caller policy, not something the frame layer does silently.
    pub fn write_pascal_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() > u8::MAX as usize {
            return Err(ProtocolError::StringTooLong(bytes.len()));
        }
        self.buf.put_u8(bytes.len() as u8);
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write a raw byte slice as-is.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Overwrite one already-written byte, e.g. a count field whose value is
    /// only known after the entries are written.
    ///
    /// # Errors
    /// `BufferTooShort` if `offset` has not been written yet.
    pub fn patch_u8(&mut self, offset: usize, value: u8) -> Result<()> {
        if offset >= self.buf.len() {
            return Err(ProtocolError::BufferTooShort {
                needed: offset + 1,
                actual: self.buf.len(),
            });
        }
        self.buf[offset] = value;
        Ok(())
    }

    /// Write a fixed-width field: the string bytes followed by zero padding
    /// up to `width`. Overlong input is cut at the field width.
    pub fn write_fill_string(&mut self, value: &str, width: usize) {
        let bytes = value.as_bytes();
        let used = bytes.len().min(width);
        self.buf.put_slice(&bytes[..used]);
        self.buf.put_bytes(0, width - used);
    }

    /// Fix up the size field and hand over the frame bytes.
    ///
    /// The declared size counts the opcode byte and the payload; the size
    /// field itself and the datagram counter are excluded. The returned
    /// buffer is exactly the written length; over-allocated capacity is never
    /// visible to the transport.
    ///
    /// # Errors
    /// `FrameTooLarge` if the declared size does not fit a u16.
    pub fn finalize(self) -> Result<Bytes> {
        let total = self.buf.len();
        let excluded = match self.transport {
            FrameTransport::Stream => 2,
            FrameTransport::Datagram => 4,
        };
        let declared = total - excluded;
        if declared > u16::MAX as usize {
            return Err(ProtocolError::FrameTooLarge { length: total });
        }
        let mut buf = self.buf;
        buf[0] = (declared >> 8) as u8;
        buf[1] = declared as u8;
        buf.truncate(total);
        Ok(buf.freeze())
    }
}

/// Stamp the sequence counter into a finalized datagram frame.
///
/// # Errors
/// `BufferTooShort` if the buffer cannot hold a datagram header.
pub fn stamp_datagram_counter(frame: &mut [u8], counter: u16) -> Result<()> {
    if frame.len() < DATAGRAM_HEADER_SIZE {
        return Err(ProtocolError::BufferTooShort {
            needed: DATAGRAM_HEADER_SIZE,
            actual: frame.len(),
        });
    }
    frame[2] = (counter >> 8) as u8;
    frame[3] = counter as u8;
    Ok(())
}

/// Running two-accumulator checksum carried on inbound stream frames.
///
/// Both accumulators are seeded with `0x7E`; the first sums the data bytes,
/// the second sums the first. The reported value folds both together the way
/// the client does, so it must not be "simplified".
pub fn checksum(data: &[u8]) -> u16 {
    let mut val1: u8 = 0x7E;
    let mut val2: u8 = 0x7E;
    for &b in data {
        val1 = val1.wrapping_add(b);
        val2 = val2.wrapping_add(val1);
    }
    (val2 as u16).wrapping_sub((val1 as u16).wrapping_add(val2 as u16) << 8)
}

/// Bounds-checked cursor over an inbound frame body.
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader over `buf`, starting at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::BufferTooShort {
                needed: self.pos + n,
                actual: self.buf.len(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Skip `n` bytes.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.take(n).map(|_| ())
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a big-endian 16-bit integer.
    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    /// Read a little-endian 16-bit integer. Legacy fields only.
    pub fn read_u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a big-endian 32-bit integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a Pascal string: 1-byte length prefix then raw bytes.
    /// Invalid UTF-8 is replaced, never rejected; the client is not trusted
    /// to send clean text.
    pub fn read_pascal_string(&mut self) -> Result<String> {
        let len = self.read_u8()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}
