//! The per-request engine: request staging, the reconnect-and-resend
//! exchange loop, response frame reading, and chunk follow-ups.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use mapwire_core::protocol::SIZE_OF_SIZE;
use mapwire_core::serialization::WireRead;
use mapwire_core::{
    EventId, FrameBuffer, MapError, RemoteException, RequestBuilder, Result, TransactionClock,
};
use tokio::time::Instant;

use crate::config::MapConfig;
use crate::connection::Connection;

/// Correlation handle for a request whose response is being consumed:
/// chunked queries read follow-up frames with the same transaction id
/// under the same deadline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pending {
    pub txn: u64,
    pub deadline: Instant,
}

/// Everything one client instance owns, guarded by the operation lock.
#[derive(Debug)]
pub(crate) struct Inner<C> {
    pub config: MapConfig,
    pub conn: Connection,
    pub buf: FrameBuffer,
    pub clock: TransactionClock,
    pub codec: C,
    pub max_entry_size: usize,
}

impl<C> Inner<C> {
    pub(crate) fn new(config: MapConfig, codec: C) -> Self {
        let max_entry_size = config.entry_size_hint().max(128);
        Self {
            conn: Connection::new(config.remote_address(), config.timeout()),
            buf: FrameBuffer::with_capacity(max_entry_size),
            clock: TransactionClock::new(),
            codec,
            max_entry_size,
            config,
        }
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Runs one acknowledged request: stage, exchange, validate the frame
    /// header. On return the buffer is positioned at the response payload.
    pub(crate) async fn invoke<F>(&mut self, event: EventId, encode: F) -> Result<Pending>
    where
        F: FnOnce(&mut C, &mut RequestBuilder<'_>) -> Result<()>,
    {
        debug_assert!(!event.is_fire_and_forget());
        let deadline = Instant::now() + self.config.timeout();
        let txn = self.clock.next(Self::now_ms());
        self.dispatch(event, encode, Some(txn), deadline).await?;
        Ok(Pending { txn, deadline })
    }

    /// Runs one fire-and-forget request: stage and send, no response read.
    pub(crate) async fn invoke_no_ack<F>(&mut self, event: EventId, encode: F) -> Result<()>
    where
        F: FnOnce(&mut C, &mut RequestBuilder<'_>) -> Result<()>,
    {
        debug_assert!(event.is_fire_and_forget());
        let deadline = Instant::now() + self.config.timeout();
        self.dispatch(event, encode, None, deadline).await
    }

    async fn dispatch<F>(
        &mut self,
        event: EventId,
        encode: F,
        txn: Option<u64>,
        deadline: Instant,
    ) -> Result<()>
    where
        F: FnOnce(&mut C, &mut RequestBuilder<'_>) -> Result<()>,
    {
        // The frame is snapshotted out of the staging buffer so a
        // reconnect can resend it bit-for-bit (same transaction id) after
        // the buffer has been reused for the response.
        let request = {
            let Inner {
                buf,
                codec,
                max_entry_size,
                ..
            } = self;
            let mut builder = RequestBuilder::new(buf, max_entry_size, event);
            encode(codec, &mut builder)?;
            Bytes::copy_from_slice(builder.finish(txn))
        };

        tracing::debug!(event = ?event, txn, len = request.len(), "sending request");
        self.exchange(&request, txn, deadline).await
    }

    /// One request/response round trip with reconnect-and-resend on
    /// transport closure. Retries reuse the same encoded bytes and the
    /// same transaction id; the server is expected to be idempotent on
    /// replay.
    async fn exchange(&mut self, request: &[u8], txn: Option<u64>, deadline: Instant) -> Result<()> {
        loop {
            if !self.conn.is_connected() {
                self.conn.lazy_connect(deadline).await?;
            }
            match self.attempt(request, txn, deadline).await {
                Ok(()) => return Ok(()),
                Err(MapError::Disconnected) => {
                    tracing::debug!(txn, "transport closed mid-exchange, reconnecting");
                    self.conn.close();
                    self.conn.check_deadline(deadline)?;
                }
                Err(err) => {
                    self.abandon(&err);
                    return Err(err);
                }
            }
        }
    }

    async fn attempt(&mut self, request: &[u8], txn: Option<u64>, deadline: Instant) -> Result<()> {
        self.conn.send_all(request, deadline).await?;
        let Some(txn) = txn else {
            return Ok(());
        };
        self.buf.clear();
        self.buf.flip();
        self.read_frame(txn, deadline).await
    }

    /// Drops the connection on any terminal error except a remote
    /// failure, whose frame was consumed whole and left the wire aligned.
    fn abandon(&mut self, err: &MapError) {
        if !matches!(err, MapError::Remote(_)) {
            self.conn.close();
        }
    }

    /// Reads and validates one response frame, leaving the buffer
    /// positioned at its payload. Also used for chunk follow-ups, where
    /// leftover bytes of an earlier greedy read may already hold the frame
    /// head.
    pub(crate) async fn read_frame(&mut self, txn: u64, deadline: Instant) -> Result<()> {
        let Inner { conn, buf, .. } = self;

        conn.recv_exact(buf, SIZE_OF_SIZE, deadline).await?;
        let size = buf.read_u32()? as usize;
        let frame_len = SIZE_OF_SIZE + size;
        if buf.capacity() < frame_len {
            let anchor = buf.position();
            buf.grow(frame_len, anchor);
        }
        conn.recv_exact(buf, frame_len, deadline).await?;

        let is_exception = buf.read_bool()?;
        let echoed = buf.read_u64()?;
        if echoed != txn {
            return Err(MapError::ProtocolViolation {
                expected: txn,
                received: echoed,
            });
        }

        if is_exception {
            let mut exception = RemoteException::wire_read(buf)?;
            let remote = conn.remote();
            exception.push_endpoint_frame(&remote.ip().to_string(), remote.port());
            return Err(MapError::Remote(exception));
        }

        Ok(())
    }
}
