//! Fixed-capacity byte cursor
//!
//! Every wire value is written into and read out of a [`Buffer`]. The
//! capacity is decided up front (usually from `size_of`) and never changes;
//! crossing it is a framing bug and surfaces as
//! [`ProtocolError::AllocationExhausted`].

use std::fmt;

use crate::error::{ProtocolError, Result};

const BYTE_RANGE: (i64, i64) = (i8::MIN as i64, i8::MAX as i64);
const SHORT_RANGE: (i64, i64) = (i16::MIN as i64, i16::MAX as i64);
const INT_RANGE: (i64, i64) = (i32::MIN as i64, i32::MAX as i64);
const UINT_RANGE: (i64, i64) = (0, u32::MAX as i64);

/// Big-endian byte cursor over a fixed allocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Buffer {
    bytes: Box<[u8]>,
    position: usize,
}

impl Buffer {
    /// Zero-filled buffer of `length` bytes.
    pub fn allocate(length: usize) -> Self {
        Self {
            bytes: vec![0u8; length].into_boxed_slice(),
            position: 0,
        }
    }

    /// Buffer wrapping existing content, cursor at the start.
    pub fn from_content(content: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: content.into().into_boxed_slice(),
            position: 0,
        }
    }

    /// All bytes, regardless of the cursor.
    #[inline(always)]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    #[inline(always)]
    pub fn length(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Rewinds the cursor; content is untouched.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Claims `length` bytes from the cursor and returns where they start.
    #[inline(always)]
    fn next_index(&mut self, length: usize) -> Result<usize> {
        if self.remaining() < length {
            return Err(ProtocolError::AllocationExhausted { length });
        }

        let start = self.position;
        self.position += length;
        Ok(start)
    }

    /// Overwrites bytes at the cursor and advances it.
    pub fn write(&mut self, value: &[u8]) -> Result<()> {
        let start = self.next_index(value.len())?;
        self.bytes[start..start + value.len()].copy_from_slice(value);
        Ok(())
    }

    /// Reads `length` bytes at the cursor and advances it.
    pub fn read(&mut self, length: usize) -> Result<&[u8]> {
        let start = self.next_index(length)?;
        Ok(&self.bytes[start..start + length])
    }

    /// Reads `length` bytes at `offset` without moving the cursor.
    pub fn get(&self, offset: usize, length: usize) -> Result<&[u8]> {
        match offset.checked_add(length) {
            Some(end) if end <= self.bytes.len() => Ok(&self.bytes[offset..end]),
            _ => Err(ProtocolError::AllocationExhausted { length }),
        }
    }

    /// The bytes between the cursor and the end, cursor untouched.
    pub fn remaining_bytes(&self) -> &[u8] {
        &self.bytes[self.position..]
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let start = self.next_index(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[start..start + N]);
        Ok(out)
    }

    /// Writes a signed byte in `[-128, 127]`.
    pub fn write_byte(&mut self, value: i64) -> Result<()> {
        guard_bounds(value, BYTE_RANGE)?;
        self.write(&(value as i8).to_be_bytes())
    }

    pub fn read_byte(&mut self) -> Result<i8> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    /// Writes a signed short in `[-32768, 32767]`.
    pub fn write_short(&mut self, value: i64) -> Result<()> {
        guard_bounds(value, SHORT_RANGE)?;
        self.write(&(value as i16).to_be_bytes())
    }

    pub fn read_short(&mut self) -> Result<i16> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    /// Writes a signed 32-bit integer.
    pub fn write_int(&mut self, value: i64) -> Result<()> {
        guard_bounds(value, INT_RANGE)?;
        self.write(&(value as i32).to_be_bytes())
    }

    pub fn read_int(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    /// Writes an unsigned 32-bit integer in `[0, 2^32 - 1]`.
    pub fn write_unsigned_int(&mut self, value: i64) -> Result<()> {
        guard_bounds(value, UINT_RANGE)?;
        self.write(&(value as u32).to_be_bytes())
    }

    pub fn read_unsigned_int(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Writes a signed 64-bit integer; every `i64` fits, so no range check.
    pub fn write_long(&mut self, value: i64) -> Result<()> {
        self.write(&value.to_be_bytes())
    }

    pub fn read_long(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }
}

#[inline(always)]
fn guard_bounds(value: i64, (lower, upper): (i64, i64)) -> Result<()> {
    if value < lower || value > upper {
        return Err(ProtocolError::OutOfRange {
            value,
            lower,
            upper,
        });
    }
    Ok(())
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("length", &self.length())
            .field("position", &self.position)
            .field("bytes", &format_args!("{:02x?}", &self.bytes))
            .finish()
    }
}
