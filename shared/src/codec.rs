//! Little-endian payload reader/writer used by every packet layout
//!
//! Fixed-size numeric fields are packed back to back; variable-length fields
//! (strings, lists) carry a 4-byte little-endian length or count in front.
//! The reader never panics on short input: every read is bounds-checked and
//! reports a [`CodecError`] instead.

use thiserror::Error;

/// Errors produced while decoding frames and payloads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("frame too short: {len} bytes (minimum 5)")]
    FrameTooShort { len: usize },

    #[error("frame declares {declared} payload bytes but only {available} are present")]
    TruncatedFrame { declared: usize, available: usize },

    #[error("unknown packet type tag {0}")]
    UnknownPacketType(u8),

    #[error("packet type {0} has no payload layout")]
    UnsupportedPacket(u8),

    #[error("payload ended early: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },

    #[error("list of {count} records cannot fit in {remaining} remaining bytes")]
    ImplausibleCount { count: usize, remaining: usize },

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
}

/// Appends little-endian fields to a growable buffer
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: Vec<u8>,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a count prefix for a list of `len` records
    pub fn write_count(&mut self, len: usize) {
        self.write_u32(len as u32);
    }

    /// Writes a length-prefixed UTF-8 string
    pub fn write_str(&mut self, value: &str) {
        self.write_count(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Writes raw bytes with no prefix
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Bounds-checked cursor over a payload
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::UnexpectedEof {
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    /// Reads a list count and checks that `count` records of at least
    /// `min_record_size` bytes can still fit in the payload
    pub fn read_count(&mut self, min_record_size: usize) -> Result<usize, CodecError> {
        let count = self.read_u32()? as usize;
        let remaining = self.remaining();
        if count.saturating_mul(min_record_size.max(1)) > remaining {
            return Err(CodecError::ImplausibleCount { count, remaining });
        }
        Ok(count)
    }

    /// Reads a length-prefixed UTF-8 string
    pub fn read_str(&mut self) -> Result<String, CodecError> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Consumes everything left as a UTF-8 string
    pub fn read_remaining_str(&mut self) -> Result<String, CodecError> {
        let bytes = self.take(self.remaining())?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}
