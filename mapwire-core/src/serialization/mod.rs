//! Serialization seams: the key/value codec collaborator, the per-type
//! wire traits for object payloads, and the provided codecs.
//!
//! The client never interprets key or value bytes itself; everything goes
//! through a [`KeyValueCodec`] supplied at construction. Object payloads —
//! function arguments for the compute operations, the server-rendered
//! string, and marshalled remote failures — use the [`WireWrite`] /
//! [`WireRead`] traits instead, which are implemented here for the
//! primitives the protocol needs.

pub mod serde;

use crate::buffer::{FrameBuffer, OutOfSpace};
use crate::error::{MapError, RemoteException, RemoteFrame, Result};
use crate::protocol::codec::{read_stop_bit, write_stop_bit};

pub use self::serde::SerdeCodec;

/// Why a payload write did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The buffer is too small. Caught by the request builder, which grows
    /// the buffer and retries the write; never user-visible.
    OutOfSpace(OutOfSpace),
    /// The value itself cannot be encoded. Aborts the operation.
    Encode(String),
}

impl From<OutOfSpace> for WriteError {
    fn from(signal: OutOfSpace) -> Self {
        WriteError::OutOfSpace(signal)
    }
}

/// Encodes and decodes one map's keys and values.
///
/// Implementations take `&mut self` so they can keep reusable scratch
/// space across calls; the client serializes access through its operation
/// lock.
pub trait KeyValueCodec<K, V> {
    /// Writes a key into the request buffer.
    fn write_key(&mut self, key: &K, buf: &mut FrameBuffer)
        -> std::result::Result<(), WriteError>;

    /// Writes a value into the request buffer.
    fn write_value(
        &mut self,
        value: &V,
        buf: &mut FrameBuffer,
    ) -> std::result::Result<(), WriteError>;

    /// Reads a key from a response payload.
    fn read_key(&mut self, buf: &mut FrameBuffer) -> Result<K>;

    /// Reads a value from a response payload.
    fn read_value(&mut self, buf: &mut FrameBuffer) -> Result<V>;
}

/// A type that can write itself into a frame buffer.
pub trait WireWrite {
    /// Writes `self`, signalling [`OutOfSpace`] through the error when the
    /// buffer is too small.
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError>;
}

/// A type that can read itself from a frame buffer.
pub trait WireRead: Sized {
    /// Reads one value, failing with `Truncated` past the valid region.
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self>;
}

impl WireWrite for bool {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        Ok(buf.write_bool(*self)?)
    }
}

impl WireRead for bool {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        buf.read_bool()
    }
}

impl WireWrite for i32 {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        Ok(buf.write_i32(*self)?)
    }
}

impl WireRead for i32 {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        buf.read_i32()
    }
}

impl WireWrite for i64 {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        Ok(buf.write_i64(*self)?)
    }
}

impl WireRead for i64 {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        buf.read_i64()
    }
}

impl WireWrite for u64 {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        Ok(buf.write_u64(*self)?)
    }
}

impl WireRead for u64 {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        buf.read_u64()
    }
}

/// Strings travel as a 32-bit length prefix followed by UTF-8 bytes.
impl WireWrite for String {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        write_blob(buf, self.as_bytes())
    }
}

impl WireRead for String {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        let raw = read_blob(buf)?;
        String::from_utf8(raw)
            .map_err(|e| MapError::Serialization(format!("invalid UTF-8 string: {e}")))
    }
}

/// Byte blobs travel as a 32-bit length prefix followed by the raw bytes.
impl WireWrite for Vec<u8> {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        write_blob(buf, self)
    }
}

impl WireRead for Vec<u8> {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        read_blob(buf)
    }
}

/// Writes a length-prefixed blob, sizing the [`OutOfSpace`] signal to the
/// whole field so one grow is always enough.
pub(crate) fn write_blob(
    buf: &mut FrameBuffer,
    raw: &[u8],
) -> std::result::Result<(), WriteError> {
    let needed = 4 + raw.len();
    if buf.remaining() < needed {
        return Err(OutOfSpace::sized(needed).into());
    }
    buf.write_i32(raw.len() as i32)?;
    buf.write_bytes(raw)?;
    Ok(())
}

/// Reads a length-prefixed blob.
pub(crate) fn read_blob(buf: &mut FrameBuffer) -> Result<Vec<u8>> {
    let len = buf.read_i32()?;
    if len < 0 {
        return Err(MapError::Serialization(format!(
            "negative blob length {len}"
        )));
    }
    buf.read_bytes(len as usize)
}

/// Remote failures travel as class name, message, and a stop-bit-counted
/// list of stack frames.
impl WireWrite for RemoteException {
    fn wire_write(&self, buf: &mut FrameBuffer) -> std::result::Result<(), WriteError> {
        self.class_name.wire_write(buf)?;
        self.message.wire_write(buf)?;
        write_stop_bit(buf, self.frames.len() as u64)?;
        for frame in &self.frames {
            frame.class_name.wire_write(buf)?;
            frame.method.wire_write(buf)?;
            frame.file.wire_write(buf)?;
            buf.write_i32(frame.line)?;
        }
        Ok(())
    }
}

impl WireRead for RemoteException {
    fn wire_read(buf: &mut FrameBuffer) -> Result<Self> {
        let class_name = String::wire_read(buf)?;
        let message = String::wire_read(buf)?;
        let count = read_stop_bit(buf)?;
        let mut frames = Vec::with_capacity(count.min(64) as usize);
        for _ in 0..count {
            frames.push(RemoteFrame {
                class_name: String::wire_read(buf)?,
                method: String::wire_read(buf)?,
                file: String::wire_read(buf)?,
                line: buf.read_i32()?,
            });
        }
        Ok(RemoteException {
            class_name,
            message,
            frames,
        })
    }
}

/// The batteries-included codec: keys and values encode through their own
/// [`WireWrite`] / [`WireRead`] implementations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCodec;

impl NativeCodec {
    /// Creates the codec.
    pub fn new() -> Self {
        Self
    }
}

impl<K, V> KeyValueCodec<K, V> for NativeCodec
where
    K: WireWrite + WireRead,
    V: WireWrite + WireRead,
{
    fn write_key(
        &mut self,
        key: &K,
        buf: &mut FrameBuffer,
    ) -> std::result::Result<(), WriteError> {
        key.wire_write(buf)
    }

    fn write_value(
        &mut self,
        value: &V,
        buf: &mut FrameBuffer,
    ) -> std::result::Result<(), WriteError> {
        value.wire_write(buf)
    }

    fn read_key(&mut self, buf: &mut FrameBuffer) -> Result<K> {
        K::wire_read(buf)
    }

    fn read_value(&mut self, buf: &mut FrameBuffer) -> Result<V> {
        V::wire_read(buf)
    }
}
