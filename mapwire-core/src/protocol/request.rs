//! Request staging: header slots, grow-and-retry payload encoding, and
//! size/transaction-id patching.

use crate::buffer::{FrameBuffer, OutOfSpace};
use crate::error::{MapError, Result};
use crate::protocol::event::EventId;
use crate::protocol::{SIZE_OF_SIZE, SIZE_OF_TRANSACTION_ID};
use crate::serialization::WriteError;

/// Stages one request frame in a [`FrameBuffer`].
///
/// Construction clears the buffer, writes the event tag, and reserves the
/// size slot (plus the transaction-id slot unless the event is
/// fire-and-forget). Payload writes run through a grow-and-retry loop:
/// an [`OutOfSpace`] signal grows the buffer and restarts the failed write
/// at its anchor, so a too-small buffer is never a user-visible failure.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    buf: &'a mut FrameBuffer,
    max_entry_size: &'a mut usize,
    size_slot: usize,
    event: EventId,
}

impl<'a> RequestBuilder<'a> {
    /// Begins a request for `event`, reserving its header slots.
    ///
    /// `max_entry_size` is the growth quantum for writers that cannot size
    /// their needs; it must be positive and is raised by
    /// [`record_entry_len`](Self::record_entry_len) during bulk inserts.
    pub fn new(
        buf: &'a mut FrameBuffer,
        max_entry_size: &'a mut usize,
        event: EventId,
    ) -> Self {
        debug_assert!(*max_entry_size > 0, "max_entry_size must be positive");
        buf.clear();
        Self::retry_write(buf, max_entry_size, |b| b.write_u8(event.ordinal()));
        let size_slot = buf.position();
        Self::retry_write(buf, max_entry_size, |b| b.skip(SIZE_OF_SIZE));
        if !event.is_fire_and_forget() {
            Self::retry_write(buf, max_entry_size, |b| b.skip(SIZE_OF_TRANSACTION_ID));
        }
        Self {
            buf,
            max_entry_size,
            size_slot,
            event,
        }
    }

    /// The event this request is for.
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Current encoding position, used to measure entry sizes.
    pub fn position(&self) -> usize {
        self.buf.position()
    }

    /// Encodes one payload field, growing the buffer and retrying from the
    /// field's anchor for as long as the writer signals [`OutOfSpace`].
    pub fn write<F>(&mut self, mut encode: F) -> Result<()>
    where
        F: FnMut(&mut FrameBuffer) -> std::result::Result<(), WriteError>,
    {
        let anchor = self.buf.position();
        loop {
            match encode(self.buf) {
                Ok(()) => return Ok(()),
                Err(WriteError::OutOfSpace(signal)) => {
                    Self::grow_for(self.buf, self.max_entry_size, signal, anchor);
                }
                Err(WriteError::Encode(message)) => {
                    return Err(MapError::Serialization(message));
                }
            }
        }
    }

    /// Pre-grows ahead of a bulk-insert entry when headroom has dropped
    /// below one maximum entry, estimating the remaining need from the
    /// bytes written so far: `position × entries_total ÷ entries_done`.
    pub fn reserve_entry_room(&mut self, entries_total: usize, entries_done: usize) {
        debug_assert!(entries_done > 0);
        if self.buf.remaining() >= *self.max_entry_size {
            return;
        }
        let estimated =
            (self.buf.position() as u64 * entries_total as u64 / entries_done as u64) as usize;
        let target = estimated + *self.max_entry_size;
        if target > self.buf.capacity() {
            let anchor = self.buf.position();
            self.buf.grow(target, anchor);
        }
    }

    /// Records an observed single-entry size, raising the growth quantum
    /// to the largest entry ever written.
    pub fn record_entry_len(&mut self, len: usize) {
        if len > *self.max_entry_size {
            *self.max_entry_size = len;
        }
    }

    /// Patches the reserved header slots and returns the frame bytes.
    ///
    /// `txn` must be present exactly when the event expects a response; the
    /// size field counts every byte after itself (transaction id included).
    pub fn finish(self, txn: Option<u64>) -> &'a [u8] {
        let RequestBuilder {
            buf,
            size_slot,
            event,
            ..
        } = self;
        debug_assert_eq!(txn.is_some(), !event.is_fire_and_forget());
        if let Some(txn) = txn {
            buf.write_u64_at(size_slot + SIZE_OF_SIZE, txn);
        }
        let size = buf.position() - size_slot - SIZE_OF_SIZE;
        buf.write_u32_at(size_slot, size as u32);
        buf.written()
    }

    fn retry_write<F>(buf: &mut FrameBuffer, max_entry_size: &mut usize, mut write: F)
    where
        F: FnMut(&mut FrameBuffer) -> std::result::Result<(), OutOfSpace>,
    {
        let anchor = buf.position();
        while let Err(signal) = write(buf) {
            Self::grow_for(buf, max_entry_size, signal, anchor);
        }
    }

    fn grow_for(
        buf: &mut FrameBuffer,
        max_entry_size: &mut usize,
        signal: OutOfSpace,
        anchor: usize,
    ) {
        let grow_by = match signal.required {
            Some(required) => required
                .saturating_sub(buf.remaining())
                .max(*max_entry_size),
            None => *max_entry_size,
        };
        let new_capacity = buf.capacity() + grow_by.max(1);
        buf.grow(new_capacity, anchor);
    }
}
