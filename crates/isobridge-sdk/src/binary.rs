//! Byte buffers for marshalled values
//!
//! All multi-byte integers are little-endian. Strings and byte blobs are
//! length-prefixed with a `u32`. The layout of a complete value is defined by
//! the marshaller that writes it; these types only provide the primitives.

use crate::error::{MarshalError, MarshalResult};

/// Growable output buffer, pre-sized from a marshaller's size hint
///
/// An output may carry a byte limit. A write that would cross it, or a blob
/// too long for its length prefix, appends nothing and leaves the output
/// failed: every later write is dropped and [`BinaryOutput::status`] reports
/// the first error. Memory use never exceeds the limit.
#[derive(Debug)]
pub struct BinaryOutput {
    buf: Vec<u8>,
    limit: usize,
    error: Option<MarshalError>,
}

impl Default for BinaryOutput {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

impl BinaryOutput {
    /// Create an unbounded output buffer with the given initial capacity
    pub fn with_capacity(size_hint: usize) -> Self {
        Self::with_limit(size_hint, usize::MAX)
    }

    /// Create an output buffer that never holds more than `limit` bytes
    pub fn with_limit(size_hint: usize, limit: usize) -> Self {
        Self {
            buf: Vec::with_capacity(size_hint.min(limit)),
            limit,
            error: None,
        }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Byte limit of this output
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// First write failure, if any
    pub fn status(&self) -> MarshalResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Check whether a write has failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    fn fail(&mut self, err: MarshalError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn has_room(&mut self, len: usize) -> bool {
        if self.error.is_some() {
            return false;
        }
        if len > self.limit - self.buf.len() {
            self.fail(MarshalError::LimitExceeded { limit: self.limit });
            return false;
        }
        true
    }

    fn push(&mut self, bytes: &[u8]) {
        if self.has_room(bytes.len()) {
            self.buf.extend_from_slice(bytes);
        }
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.push(&[value]);
    }

    /// Write a boolean as one byte
    pub fn write_bool(&mut self, value: bool) {
        self.push(&[value as u8]);
    }

    /// Write a little-endian u32
    pub fn write_u32(&mut self, value: u32) {
        self.push(&value.to_le_bytes());
    }

    /// Write a little-endian i32
    pub fn write_i32(&mut self, value: i32) {
        self.push(&value.to_le_bytes());
    }

    /// Write a little-endian u64
    pub fn write_u64(&mut self, value: u64) {
        self.push(&value.to_le_bytes());
    }

    /// Write a little-endian i64
    pub fn write_i64(&mut self, value: i64) {
        self.push(&value.to_le_bytes());
    }

    /// Write a little-endian f64
    pub fn write_f64(&mut self, value: f64) {
        self.push(&value.to_bits().to_le_bytes());
    }

    fn write_len(&mut self, len: usize) -> bool {
        match u32::try_from(len) {
            Ok(prefix) => {
                self.write_u32(prefix);
                true
            }
            Err(_) => {
                self.fail(MarshalError::BlobTooLarge { len });
                false
            }
        }
    }

    /// Write a length-prefixed byte blob
    ///
    /// The prefix and the blob are written together or not at all.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if !self.has_room(bytes.len().saturating_add(4)) {
            return;
        }
        if self.write_len(bytes.len()) {
            self.buf.extend_from_slice(bytes);
        }
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_utf(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    /// Write an optional string as a presence byte followed by the string
    pub fn write_opt_utf(&mut self, value: Option<&str>) {
        match value {
            Some(s) => {
                self.write_bool(true);
                self.write_utf(s);
            }
            None => self.write_bool(false),
        }
    }

    /// Borrow the written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received byte buffer
#[derive(Debug, Clone)]
pub struct BinaryInput<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BinaryInput<'a> {
    /// Create an input over the given bytes
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> MarshalResult<&'a [u8]> {
        if self.remaining() < needed {
            return Err(MarshalError::Truncated {
                needed,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> MarshalResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> MarshalResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a boolean byte
    pub fn read_bool(&mut self) -> MarshalResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            tag => Err(MarshalError::InvalidTag { what: "bool", tag }),
        }
    }

    /// Read a little-endian u32
    pub fn read_u32(&mut self) -> MarshalResult<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian i32
    pub fn read_i32(&mut self) -> MarshalResult<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian u64
    pub fn read_u64(&mut self) -> MarshalResult<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian i64
    pub fn read_i64(&mut self) -> MarshalResult<i64> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a little-endian f64
    pub fn read_f64(&mut self) -> MarshalResult<f64> {
        Ok(f64::from_bits(u64::from_le_bytes(self.take_array()?)))
    }

    /// Read a length-prefixed byte blob
    pub fn read_bytes(&mut self) -> MarshalResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_utf(&mut self) -> MarshalResult<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| MarshalError::InvalidUtf8)
    }

    /// Read an optional string written by [`BinaryOutput::write_opt_utf`]
    pub fn read_opt_utf(&mut self) -> MarshalResult<Option<String>> {
        if self.read_bool()? {
            self.read_utf().map(Some)
        } else {
            Ok(None)
        }
    }
}
