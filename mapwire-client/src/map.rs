//! The remote map proxy: every wire-reachable map operation.

use std::collections::HashMap;
use std::hash::Hash;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use mapwire_core::protocol::codec::write_stop_bit;
use mapwire_core::serialization::{WireRead, WireWrite, WriteError};
use mapwire_core::{EventId, FrameBuffer, KeyValueCodec, MapError, RequestBuilder, Result};
use tokio::sync::Mutex;

use crate::config::MapConfig;
use crate::invoke::{Inner, Pending};

/// A stateless client for one remote key-value map.
///
/// The map owns no data: every operation is encoded into a framed binary
/// request, sent over a single long-lived TCP connection, and matched to a
/// response by transaction id. One request is in flight at a time; callers
/// needing parallelism create additional clients.
///
/// Key and value encoding is delegated to the [`KeyValueCodec`] supplied
/// at construction.
#[derive(Debug)]
pub struct RemoteMap<K, V, C> {
    name: String,
    inner: Mutex<Inner<C>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, C> RemoteMap<K, V, C>
where
    C: KeyValueCodec<K, V>,
{
    /// Creates a client for the map described by `config`.
    ///
    /// One connection attempt is made immediately; if the server is not
    /// reachable the client is still created and the first operation
    /// connects lazily.
    pub async fn connect(config: MapConfig, codec: C) -> Self {
        let name = config.name().to_string();
        let mut inner = Inner::new(config, codec);
        inner.conn.attempt_connect().await;
        Self {
            name,
            inner: Mutex::new(inner),
            _marker: PhantomData,
        }
    }

    /// Returns the configured map name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of entries as a 32-bit count.
    pub async fn size(&self) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::Size, |_, _| Ok(())).await?;
        inner.buf.read_i32().map(|v| v as usize)
    }

    /// Returns the number of entries as a 64-bit count.
    pub async fn long_size(&self) -> Result<i64> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::LongSize, |_, _| Ok(())).await?;
        inner.buf.read_i64()
    }

    /// Returns `true` if the map has no entries.
    pub async fn is_empty(&self) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::IsEmpty, |_, _| Ok(())).await?;
        inner.buf.read_bool()
    }

    /// Returns `true` if the map contains `key`.
    pub async fn contains_key(&self, key: &K) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::ContainsKey, |codec, req| {
                req.write(|b| codec.write_key(key, b))
            })
            .await?;
        inner.buf.read_bool()
    }

    /// Returns `true` if any entry maps to `value`.
    pub async fn contains_value(&self, value: &V) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::ContainsValue, |codec, req| {
                req.write(|b| codec.write_value(value, b))
            })
            .await?;
        inner.buf.read_bool()
    }

    /// Retrieves the value associated with `key`, or `None`.
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::Get, |codec, req| {
                req.write(|b| codec.write_key(key, b))
            })
            .await?;
        let Inner { buf, codec, .. } = &mut *inner;
        Self::read_prior(codec, buf)
    }

    /// Associates `value` with `key`.
    ///
    /// Returns the previous value, or `None` if there was no mapping.
    /// Under `put_returns_null` the fire-and-forget variant is used: no
    /// response is read and the result is always `None`.
    pub async fn put(&self, key: K, value: V) -> Result<Option<V>> {
        let mut inner = self.inner.lock().await;
        if inner.config.put_returns_null() {
            inner
                .invoke_no_ack(EventId::PutWithoutAck, |codec, req| {
                    req.write(|b| codec.write_key(&key, b))?;
                    req.write(|b| codec.write_value(&value, b))
                })
                .await?;
            return Ok(None);
        }
        inner
            .invoke(EventId::Put, |codec, req| {
                req.write(|b| codec.write_key(&key, b))?;
                req.write(|b| codec.write_value(&value, b))
            })
            .await?;
        let Inner { buf, codec, .. } = &mut *inner;
        Self::read_prior(codec, buf)
    }

    /// Removes the mapping for `key`.
    ///
    /// Returns the previous value, or `None` if there was no mapping.
    /// Under `remove_returns_null` the fire-and-forget variant is used.
    pub async fn remove(&self, key: &K) -> Result<Option<V>> {
        let mut inner = self.inner.lock().await;
        if inner.config.remove_returns_null() {
            inner
                .invoke_no_ack(EventId::RemoveWithoutAck, |codec, req| {
                    req.write(|b| codec.write_key(key, b))
                })
                .await?;
            return Ok(None);
        }
        inner
            .invoke(EventId::Remove, |codec, req| {
                req.write(|b| codec.write_key(key, b))
            })
            .await?;
        let Inner { buf, codec, .. } = &mut *inner;
        Self::read_prior(codec, buf)
    }

    /// Removes the entry for `key` only if it currently maps to `value`.
    pub async fn remove_with_value(&self, key: &K, value: &V) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::RemoveWithValue, |codec, req| {
                req.write(|b| codec.write_key(key, b))?;
                req.write(|b| codec.write_value(value, b))
            })
            .await?;
        inner.buf.read_bool()
    }

    /// Replaces the entry for `key` only if it is present.
    ///
    /// Returns the previous value, or `None` if there was no mapping.
    pub async fn replace(&self, key: K, value: V) -> Result<Option<V>> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::Replace, |codec, req| {
                req.write(|b| codec.write_key(&key, b))?;
                req.write(|b| codec.write_value(&value, b))
            })
            .await?;
        let Inner { buf, codec, .. } = &mut *inner;
        Self::read_prior(codec, buf)
    }

    /// Replaces the entry for `key` only if it currently maps to `old`.
    pub async fn replace_with_old_and_new(&self, key: &K, old: &V, new: &V) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::ReplaceWithOldAndNewValue, |codec, req| {
                req.write(|b| codec.write_key(key, b))?;
                req.write(|b| codec.write_value(old, b))?;
                req.write(|b| codec.write_value(new, b))
            })
            .await?;
        inner.buf.read_bool()
    }

    /// Associates `value` with `key` only if no mapping exists.
    ///
    /// Returns the current value when one is already present.
    pub async fn put_if_absent(&self, key: K, value: V) -> Result<Option<V>> {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::PutIfAbsent, |codec, req| {
                req.write(|b| codec.write_key(&key, b))?;
                req.write(|b| codec.write_value(&value, b))
            })
            .await?;
        let Inner { buf, codec, .. } = &mut *inner;
        Self::read_prior(codec, buf)
    }

    /// Removes every entry from the map.
    pub async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::Clear, |_, _| Ok(())).await?;
        Ok(())
    }

    /// Copies every entry of `entries` into the map.
    ///
    /// The entry count travels as a stop-bit varint ahead of the entries;
    /// the request buffer is pre-grown from a running size estimate so
    /// large batches do not resize once per entry. Under
    /// `put_returns_null` the fire-and-forget variant is used.
    pub async fn put_all(&self, entries: &HashMap<K, V>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.config.put_returns_null() {
            return inner
                .invoke_no_ack(EventId::PutAllWithoutAck, |codec, req| {
                    Self::encode_entries(codec, req, entries)
                })
                .await;
        }
        inner
            .invoke(EventId::PutAll, |codec, req| {
                Self::encode_entries(codec, req, entries)
            })
            .await
            .map(|_| ())
    }

    fn encode_entries(
        codec: &mut C,
        req: &mut RequestBuilder<'_>,
        entries: &HashMap<K, V>,
    ) -> Result<()> {
        let total = entries.len();
        req.write(|b| write_stop_bit(b, total as u64).map_err(WriteError::from))?;
        for (done, (key, value)) in entries.iter().enumerate() {
            req.reserve_entry_room(total, done + 1);
            let start = req.position();
            req.write(|b| codec.write_key(key, b))?;
            req.write(|b| codec.write_value(value, b))?;
            req.record_entry_len(req.position() - start);
        }
        Ok(())
    }

    /// Returns every key. Streamed from the server in chunks.
    pub async fn key_set(&self) -> Result<Vec<K>> {
        let mut inner = self.inner.lock().await;
        let pending = inner.invoke(EventId::KeySet, |_, _| Ok(())).await?;
        let result = Self::drain_chunks(&mut inner, pending, |codec, buf| codec.read_key(buf)).await;
        if result.is_err() {
            inner.conn.close();
        }
        result
    }

    /// Returns every value, in the order the server streams them.
    pub async fn values(&self) -> Result<Vec<V>> {
        let mut inner = self.inner.lock().await;
        let pending = inner.invoke(EventId::Values, |_, _| Ok(())).await?;
        let result =
            Self::drain_chunks(&mut inner, pending, |codec, buf| codec.read_value(buf)).await;
        if result.is_err() {
            inner.conn.close();
        }
        result
    }

    /// Returns every entry. Streamed from the server in chunks.
    pub async fn entry_set(&self) -> Result<Vec<(K, V)>> {
        let mut inner = self.inner.lock().await;
        let pending = inner.invoke(EventId::EntrySet, |_, _| Ok(())).await?;
        let result = Self::drain_chunks(&mut inner, pending, |codec, buf| {
            let key = codec.read_key(buf)?;
            let value = codec.read_value(buf)?;
            Ok((key, value))
        })
        .await;
        if result.is_err() {
            inner.conn.close();
        }
        result
    }

    /// Returns the server-computed hash code of the map.
    ///
    /// Serializes the entire map on the server; expensive, never invoked
    /// implicitly.
    pub async fn hash_code(&self) -> Result<i32> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::HashCode, |_, _| Ok(())).await?;
        inner.buf.read_i32()
    }

    /// Returns `name=<name>, ` followed by the server-rendered string form
    /// of the map.
    pub async fn remote_to_string(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        inner.invoke(EventId::ToString, |_, _| Ok(())).await?;
        let rendered = String::wire_read(&mut inner.buf)?;
        Ok(format!("name={}, {}", self.name, rendered))
    }

    /// Applies a read-only function to the value for `key` on the server
    /// and returns its result.
    ///
    /// The function travels as an opaque payload the server knows how to
    /// execute; the client only encodes it.
    pub async fn map_for_key<F, R>(&self, key: &K, function: &F) -> Result<R>
    where
        F: WireWrite,
        R: WireRead,
    {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::MapForKey, |codec, req| {
                req.write(|b| codec.write_key(key, b))?;
                req.write(|b| function.wire_write(b))
            })
            .await?;
        R::wire_read(&mut inner.buf)
    }

    /// Applies a mutating function to the value for `key` on the server
    /// and returns its result.
    pub async fn update_for_key<F, R>(&self, key: &K, mutator: &F) -> Result<R>
    where
        F: WireWrite,
        R: WireRead,
    {
        let mut inner = self.inner.lock().await;
        inner
            .invoke(EventId::UpdateForKey, |codec, req| {
                req.write(|b| codec.write_key(key, b))?;
                req.write(|b| mutator.wire_write(b))
            })
            .await?;
        R::wire_read(&mut inner.buf)
    }

    /// Compares the whole map against `expected`.
    ///
    /// Fetches the size and then the entire entry set; expensive, never
    /// invoked implicitly.
    pub async fn content_equals(&self, expected: &HashMap<K, V>) -> Result<bool>
    where
        K: Eq + Hash,
        V: PartialEq,
    {
        if self.size().await? != expected.len() {
            return Ok(false);
        }
        let entries = self.entry_set().await?;
        if entries.len() != expected.len() {
            return Ok(false);
        }
        Ok(entries
            .iter()
            .all(|(key, value)| expected.get(key) == Some(value)))
    }

    /// Not supported by the stateless client.
    pub fn get_using(&self, _key: &K, _using: &mut V) -> Result<Option<V>> {
        Err(MapError::Unsupported("get_using"))
    }

    /// Not supported by the stateless client.
    pub fn acquire_using(&self, _key: &K, _using: &mut V) -> Result<V> {
        Err(MapError::Unsupported("acquire_using"))
    }

    /// Not supported by the stateless client.
    pub fn get_using_locked(&self, _key: &K, _using: &mut V) -> Result<Option<V>> {
        Err(MapError::Unsupported("get_using_locked"))
    }

    /// Not supported by the stateless client.
    pub fn acquire_using_locked(&self, _key: &K, _using: &mut V) -> Result<V> {
        Err(MapError::Unsupported("acquire_using_locked"))
    }

    /// Not supported by the stateless client.
    pub fn get_all_to_file(&self, _to: &Path) -> Result<()> {
        Err(MapError::Unsupported("get_all"))
    }

    /// Not supported by the stateless client.
    pub fn put_all_from_file(&self, _from: &Path) -> Result<()> {
        Err(MapError::Unsupported("put_all"))
    }

    /// Not supported by the stateless client.
    pub fn file(&self) -> Result<PathBuf> {
        Err(MapError::Unsupported("file"))
    }

    /// Closes the connection. The client stays usable: the next operation
    /// reconnects with a fresh handshake.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.conn.close();
    }

    fn read_prior(codec: &mut C, buf: &mut FrameBuffer) -> Result<Option<V>> {
        if buf.read_bool()? {
            codec.read_value(buf).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Consumes a streamed response: per-chunk continuation flag and
    /// count, follow-up frames correlated by the original transaction id.
    async fn drain_chunks<T, F>(
        inner: &mut Inner<C>,
        pending: Pending,
        mut read_entry: F,
    ) -> Result<Vec<T>>
    where
        F: FnMut(&mut C, &mut FrameBuffer) -> Result<T>,
    {
        let mut out = Vec::new();
        loop {
            let has_more = inner.buf.read_bool()?;
            let count = inner.buf.read_i32()?;
            if count < 0 {
                return Err(MapError::Serialization(format!(
                    "negative chunk entry count {count}"
                )));
            }
            {
                let Inner { buf, codec, .. } = &mut *inner;
                for _ in 0..count {
                    out.push(read_entry(codec, buf)?);
                }
            }
            if !has_more {
                return Ok(out);
            }
            inner.buf.compact();
            inner.read_frame(pending.txn, pending.deadline).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapwire_core::NativeCodec;
    use std::time::Duration;

    async fn offline_map() -> RemoteMap<String, String, NativeCodec> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = MapConfig::builder(addr)
            .timeout(Duration::from_millis(100))
            .name("offline")
            .build()
            .unwrap();
        RemoteMap::connect(config, NativeCodec::new()).await
    }

    #[tokio::test]
    async fn test_construction_survives_absent_server() {
        let map = offline_map().await;
        assert_eq!(map.name(), "offline");
    }

    #[tokio::test]
    async fn test_unsupported_operations_fail_without_io() {
        let map = offline_map().await;
        let mut scratch = String::new();

        assert!(matches!(
            map.get_using(&"k".to_string(), &mut scratch),
            Err(MapError::Unsupported("get_using"))
        ));
        assert!(matches!(
            map.acquire_using(&"k".to_string(), &mut scratch),
            Err(MapError::Unsupported("acquire_using"))
        ));
        assert!(matches!(
            map.get_using_locked(&"k".to_string(), &mut scratch),
            Err(MapError::Unsupported("get_using_locked"))
        ));
        assert!(matches!(
            map.acquire_using_locked(&"k".to_string(), &mut scratch),
            Err(MapError::Unsupported("acquire_using_locked"))
        ));
        assert!(matches!(
            map.get_all_to_file(Path::new("/tmp/out")),
            Err(MapError::Unsupported("get_all"))
        ));
        assert!(matches!(
            map.put_all_from_file(Path::new("/tmp/in")),
            Err(MapError::Unsupported("put_all"))
        ));
        assert!(matches!(map.file(), Err(MapError::Unsupported("file"))));
    }

    #[tokio::test]
    async fn test_operation_times_out_against_dead_server() {
        let map = offline_map().await;
        let err = map.size().await.unwrap_err();
        assert!(matches!(err, MapError::Timeout(_)));
    }
}
