//! The single TCP connection to the remote map server.
//!
//! A connection is either absent or an established, handshaken stream.
//! Opening swallows I/O failures and retries until the operation deadline;
//! anything that might leave the wire in an undefined framing state closes
//! the stream, so the next operation starts with a fresh handshake.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mapwire_core::protocol::STATELESS_CLIENT_IDENTIFIER;
use mapwire_core::{FrameBuffer, MapError, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout_at, Instant};

/// Pause between reconnect attempts while the deadline allows.
const RECONNECT_PAUSE: Duration = Duration::from_millis(20);

/// Maps transport-closure error kinds onto [`MapError::Disconnected`] so
/// the exchange loop can tell "reconnect and resend" from terminal I/O
/// failures.
fn classify(err: io::Error) -> MapError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => MapError::Disconnected,
        _ => MapError::Io(err.into()),
    }
}

#[derive(Debug)]
pub(crate) struct Connection {
    remote: SocketAddr,
    timeout: Duration,
    stream: Option<TcpStream>,
    remote_id: Option<u8>,
}

impl Connection {
    pub(crate) fn new(remote: SocketAddr, timeout: Duration) -> Self {
        Self {
            remote,
            timeout,
            stream: None,
            remote_id: None,
        }
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    pub(crate) fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// One connect attempt with any failure swallowed. Used during
    /// construction: the server may not be up yet, and the first real
    /// operation will connect lazily.
    pub(crate) async fn attempt_connect(&mut self) {
        let deadline = Instant::now() + self.timeout;
        if let Err(err) = self.open(deadline).await {
            tracing::debug!(address = %self.remote, error = %err, "initial connect failed");
            self.close();
        }
    }

    /// Connects until it succeeds or the deadline fires, closing any
    /// half-open stream first. I/O failures are swallowed and retried
    /// after a short pause; every other error propagates.
    pub(crate) async fn lazy_connect(&mut self, deadline: Instant) -> Result<()> {
        tracing::debug!(address = %self.remote, "attempting to connect");
        loop {
            self.close();
            self.check_deadline(deadline)?;
            match self.open(deadline).await {
                Ok(()) => return Ok(()),
                Err(MapError::Io(_)) | Err(MapError::Disconnected) => {
                    sleep(RECONNECT_PAUSE).await;
                }
                Err(err) => {
                    self.close();
                    return Err(err);
                }
            }
        }
    }

    async fn open(&mut self, deadline: Instant) -> Result<()> {
        let stream = match timeout_at(deadline, TcpStream::connect(self.remote)).await {
            Err(_) => return Err(MapError::Timeout(self.timeout)),
            Ok(Err(err)) => return Err(classify(err)),
            Ok(Ok(stream)) => stream,
        };
        stream.set_nodelay(true).map_err(classify)?;
        self.stream = Some(stream);
        self.handshake(deadline).await?;
        tracing::debug!(
            address = %self.remote,
            identifier = self.remote_id,
            "connected to remote map"
        );
        Ok(())
    }

    /// Writes the stateless-client identifier byte and reads back the
    /// server's identifier, which is remembered for logging only.
    async fn handshake(&mut self, deadline: Instant) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(MapError::Disconnected)?;

        match timeout_at(deadline, stream.write_all(&[STATELESS_CLIENT_IDENTIFIER])).await {
            Err(_) => return Err(MapError::Timeout(self.timeout)),
            Ok(Err(err)) => return Err(classify(err)),
            Ok(Ok(())) => {}
        }

        let mut identifier = [0u8; 1];
        match timeout_at(deadline, stream.read_exact(&mut identifier)).await {
            Err(_) => return Err(MapError::Timeout(self.timeout)),
            Ok(Err(err)) => return Err(classify(err)),
            Ok(Ok(_)) => {}
        }

        self.remote_id = Some(identifier[0]);
        Ok(())
    }

    /// Writes the whole request, bounded by the deadline.
    pub(crate) async fn send_all(&mut self, bytes: &[u8], deadline: Instant) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(MapError::Disconnected)?;
        match timeout_at(deadline, stream.write_all(bytes)).await {
            Err(_) => Err(MapError::Timeout(self.timeout)),
            Ok(Err(err)) => Err(classify(err)),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Fills the buffer's valid region to at least `min_filled` bytes.
    /// Reads are greedy: whatever the socket delivers past `min_filled`
    /// stays in the buffer for the next frame.
    pub(crate) async fn recv_exact(
        &mut self,
        buf: &mut FrameBuffer,
        min_filled: usize,
        deadline: Instant,
    ) -> Result<()> {
        debug_assert!(min_filled <= buf.capacity(), "fill target past capacity");
        let stream = self.stream.as_mut().ok_or(MapError::Disconnected)?;
        while buf.limit() < min_filled {
            let read = match timeout_at(deadline, stream.read(buf.unfilled_mut())).await {
                Err(_) => return Err(MapError::Timeout(self.timeout)),
                Ok(Err(err)) => return Err(classify(err)),
                Ok(Ok(n)) => n,
            };
            if read == 0 {
                return Err(MapError::Disconnected);
            }
            buf.advance_limit(read);
        }
        Ok(())
    }

    /// Best-effort close; safe to call in any state.
    pub(crate) fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!(address = %self.remote, "connection closed");
        }
    }

    pub(crate) fn check_deadline(&self, deadline: Instant) -> Result<()> {
        if Instant::now() >= deadline {
            Err(MapError::Timeout(self.timeout))
        } else {
            Ok(())
        }
    }
}
