//! Growable native-endian frame buffer with cursor semantics.
//!
//! [`FrameBuffer`] is the single staging area a client owns: requests are
//! encoded into it, responses are received into it. It keeps classic
//! byte-buffer cursors (`0 <= position <= limit <= capacity`) over one
//! contiguous allocation. Writes that would cross the capacity return
//! [`OutOfSpace`] so the request builder can grow the buffer and retry the
//! write from its anchor; reads that would cross the limit return
//! [`MapError::Truncated`].

use bytes::BytesMut;
use std::fmt;

use crate::error::{MapError, Result};

/// Minimum backing capacity; smaller hints are rounded up.
pub const MIN_CAPACITY: usize = 128;

/// Signal that a write did not fit the remaining capacity.
///
/// This is the grow-and-retry feedback of the request builder, not a
/// user-facing failure; it never escapes the encoding loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfSpace {
    /// Total byte count of the failed write attempt, when the writer knows
    /// it. Sized signals let the builder grow by exactly what is missing.
    pub required: Option<usize>,
}

impl OutOfSpace {
    /// A signal carrying the size of the attempted write.
    pub fn sized(required: usize) -> Self {
        Self {
            required: Some(required),
        }
    }

    /// A signal from a writer that cannot tell how much room it needs.
    pub fn unknown() -> Self {
        Self { required: None }
    }
}

impl fmt::Display for OutOfSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.required {
            Some(n) => write!(f, "attempt to write {} bytes past capacity", n),
            None => write!(f, "write past capacity"),
        }
    }
}

/// A growable, contiguous, native-endian byte buffer with cursors.
#[derive(Debug)]
pub struct FrameBuffer {
    data: BytesMut,
    position: usize,
    limit: usize,
}

impl FrameBuffer {
    /// Creates a buffer with at least [`MIN_CAPACITY`] bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY);
        let mut data = BytesMut::with_capacity(capacity);
        data.resize(capacity, 0);
        Self {
            data,
            position: 0,
            limit: capacity,
        }
    }

    /// Total capacity of the backing allocation.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current cursor position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// End of the valid region (capacity in write mode, received-data end
    /// in read mode).
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Write headroom left before the capacity.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.position
    }

    /// Bytes left to read before the limit.
    pub fn readable(&self) -> usize {
        self.limit.saturating_sub(self.position)
    }

    /// Resets for writing: position to zero, limit to capacity.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.capacity();
    }

    /// Flips from write mode to read mode: limit to the current position,
    /// position to zero.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// Moves the cursor to `p`, which must not pass the limit.
    pub fn set_position(&mut self, p: usize) {
        assert!(p <= self.limit, "position {} past limit {}", p, self.limit);
        self.position = p;
    }

    /// Advances the cursor by `n` bytes without writing, reserving room.
    pub fn skip(&mut self, n: usize) -> std::result::Result<(), OutOfSpace> {
        self.ensure_writable(n)?;
        self.position += n;
        Ok(())
    }

    /// The encoded region `[0, position)`, as staged for transmission.
    pub fn written(&self) -> &[u8] {
        &self.data[..self.position]
    }

    fn ensure_writable(&self, n: usize) -> std::result::Result<(), OutOfSpace> {
        if self.position + n > self.capacity() {
            Err(OutOfSpace::sized(n))
        } else {
            Ok(())
        }
    }

    fn ensure_readable(&self, n: usize) -> Result<()> {
        if self.position + n > self.limit {
            Err(MapError::Truncated {
                needed: n,
                available: self.readable(),
            })
        } else {
            Ok(())
        }
    }

    /// Writes one byte.
    pub fn write_u8(&mut self, v: u8) -> std::result::Result<(), OutOfSpace> {
        self.ensure_writable(1)?;
        self.data[self.position] = v;
        self.position += 1;
        Ok(())
    }

    /// Writes a boolean as one byte (`0` / `1`).
    pub fn write_bool(&mut self, v: bool) -> std::result::Result<(), OutOfSpace> {
        self.write_u8(u8::from(v))
    }

    /// Writes a 32-bit unsigned integer in native byte order.
    pub fn write_u32(&mut self, v: u32) -> std::result::Result<(), OutOfSpace> {
        self.write_bytes(&v.to_ne_bytes())
    }

    /// Writes a 32-bit signed integer in native byte order.
    pub fn write_i32(&mut self, v: i32) -> std::result::Result<(), OutOfSpace> {
        self.write_bytes(&v.to_ne_bytes())
    }

    /// Writes a 64-bit unsigned integer in native byte order.
    pub fn write_u64(&mut self, v: u64) -> std::result::Result<(), OutOfSpace> {
        self.write_bytes(&v.to_ne_bytes())
    }

    /// Writes a 64-bit signed integer in native byte order.
    pub fn write_i64(&mut self, v: i64) -> std::result::Result<(), OutOfSpace> {
        self.write_bytes(&v.to_ne_bytes())
    }

    /// Writes raw bytes without a length prefix.
    pub fn write_bytes(&mut self, v: &[u8]) -> std::result::Result<(), OutOfSpace> {
        self.ensure_writable(v.len())?;
        self.data[self.position..self.position + v.len()].copy_from_slice(v);
        self.position += v.len();
        Ok(())
    }

    /// Patches a 32-bit unsigned integer at `offset` without moving the
    /// cursor. The slot must have been reserved.
    pub fn write_u32_at(&mut self, offset: usize, v: u32) {
        assert!(offset + 4 <= self.capacity(), "patch past capacity");
        self.data[offset..offset + 4].copy_from_slice(&v.to_ne_bytes());
    }

    /// Patches a 64-bit unsigned integer at `offset` without moving the
    /// cursor. The slot must have been reserved.
    pub fn write_u64_at(&mut self, offset: usize, v: u64) {
        assert!(offset + 8 <= self.capacity(), "patch past capacity");
        self.data[offset..offset + 8].copy_from_slice(&v.to_ne_bytes());
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure_readable(1)?;
        let v = self.data[self.position];
        self.position += 1;
        Ok(v)
    }

    /// Reads a boolean from one byte; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Reads a 32-bit unsigned integer in native byte order.
    pub fn read_u32(&mut self) -> Result<u32> {
        self.ensure_readable(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[self.position..self.position + 4]);
        self.position += 4;
        Ok(u32::from_ne_bytes(raw))
    }

    /// Reads a 32-bit signed integer in native byte order.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a 64-bit unsigned integer in native byte order.
    pub fn read_u64(&mut self) -> Result<u64> {
        self.ensure_readable(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        Ok(u64::from_ne_bytes(raw))
    }

    /// Reads a 64-bit signed integer in native byte order.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.read_u64()? as i64)
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.ensure_readable(len)?;
        let v = self.data[self.position..self.position + len].to_vec();
        self.position += len;
        Ok(v)
    }

    /// Grows the backing allocation to at least `new_capacity`, preserving
    /// the entire previously backed region, and restores the cursor to
    /// `anchor` (the offset where the interrupted encoding attempt began).
    ///
    /// The limit is left where it was: received data keeps its extent, and
    /// writes run against the capacity until the next `clear`.
    pub fn grow(&mut self, new_capacity: usize, anchor: usize) {
        let old_capacity = self.capacity();
        assert!(
            new_capacity > old_capacity,
            "buffer can only grow: {} -> {}",
            old_capacity,
            new_capacity
        );
        assert!(anchor <= old_capacity, "anchor past old capacity");

        self.data.resize(new_capacity, 0);
        self.position = anchor;
    }

    /// Region available for socket fills, after the received data.
    pub fn unfilled_mut(&mut self) -> &mut [u8] {
        let capacity = self.capacity();
        &mut self.data[self.limit..capacity]
    }

    /// Records `n` freshly received bytes, extending the valid region.
    pub fn advance_limit(&mut self, n: usize) {
        assert!(self.limit + n <= self.capacity(), "fill past capacity");
        self.limit += n;
    }

    /// Compacts after a consumed chunk: an empty unread region resets both
    /// cursors; otherwise the unread bytes `[position, limit)` move to the
    /// front, ready to be parsed as the start of the next frame.
    pub fn compact(&mut self) {
        if self.position >= self.limit {
            self.position = 0;
            self.limit = 0;
        } else {
            let unread = self.limit - self.position;
            self.data.copy_within(self.position..self.limit, 0);
            self.position = 0;
            self.limit = unread;
        }
    }
}
