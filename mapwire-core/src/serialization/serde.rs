//! Serde bridge for user-defined key and value types.
//!
//! [`SerdeCodec`] lets any `Serialize + DeserializeOwned` pair ride the
//! wire as length-prefixed JSON blobs without writing a bespoke codec.
//! Values are rendered into a scratch buffer that is reused across calls,
//! so steady-state encoding does not allocate.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{read_blob, KeyValueCodec, WriteError};
use crate::buffer::{FrameBuffer, OutOfSpace};
use crate::error::{MapError, Result};

/// A [`KeyValueCodec`] encoding keys and values as JSON blobs.
#[derive(Debug)]
pub struct SerdeCodec<K, V> {
    scratch: Vec<u8>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> SerdeCodec<K, V> {
    /// Creates the codec with an empty scratch buffer.
    pub fn new() -> Self {
        Self {
            scratch: Vec::new(),
            _marker: PhantomData,
        }
    }

    fn write_json<T: Serialize>(
        &mut self,
        value: &T,
        buf: &mut FrameBuffer,
    ) -> std::result::Result<(), WriteError> {
        self.scratch.clear();
        serde_json::to_writer(&mut self.scratch, value)
            .map_err(|e| WriteError::Encode(format!("JSON encoding failed: {e}")))?;

        let needed = 4 + self.scratch.len();
        if buf.remaining() < needed {
            return Err(OutOfSpace::sized(needed).into());
        }
        buf.write_i32(self.scratch.len() as i32)?;
        buf.write_bytes(&self.scratch)?;
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&mut self, buf: &mut FrameBuffer) -> Result<T> {
        let raw = read_blob(buf)?;
        serde_json::from_slice(&raw)
            .map_err(|e| MapError::Serialization(format!("JSON decoding failed: {e}")))
    }
}

impl<K, V> Default for SerdeCodec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyValueCodec<K, V> for SerdeCodec<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn write_key(&mut self, key: &K, buf: &mut FrameBuffer)
        -> std::result::Result<(), WriteError> {
        self.write_json(key, buf)
    }

    fn write_value(
        &mut self,
        value: &V,
        buf: &mut FrameBuffer,
    ) -> std::result::Result<(), WriteError> {
        self.write_json(value, buf)
    }

    fn read_key(&mut self, buf: &mut FrameBuffer) -> Result<K> {
        self.read_json(buf)
    }

    fn read_value(&mut self, buf: &mut FrameBuffer) -> Result<V> {
        self.read_json(buf)
    }
}
