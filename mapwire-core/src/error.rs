//! Error types for remote map operations.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// A single frame of a server-side stack trace.
///
/// The frame slots mirror what the server serializes for a failed
/// operation; the synthetic frame appended by the response reader reuses
/// them to carry the remote endpoint (`file` = host, `line` = port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFrame {
    /// Class or module the frame belongs to.
    pub class_name: String,
    /// Method or function name.
    pub method: String,
    /// Source file, or the remote host for the synthetic endpoint frame.
    pub file: String,
    /// Source line, or the remote port for the synthetic endpoint frame.
    pub line: i32,
}

impl fmt::Display for RemoteFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "at {}.{}({}:{})",
            self.class_name, self.method, self.file, self.line
        )
    }
}

/// A failure raised on the server and marshalled back over the wire.
///
/// Carries the server-side class name, message, and stack frames, plus the
/// synthetic `~ remote` frame identifying the endpoint the failure came
/// from. Formatting happens at display time; nothing here is reflective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteException {
    /// Class name of the server-side exception.
    pub class_name: String,
    /// Message attached to the server-side exception.
    pub message: String,
    /// Server-side stack frames, oldest call last.
    pub frames: Vec<RemoteFrame>,
}

impl RemoteException {
    /// Appends the synthetic frame identifying the remote endpoint.
    pub fn push_endpoint_frame(&mut self, host: &str, port: u16) {
        self.frames.push(RemoteFrame {
            class_name: "~ remote".to_string(),
            method: "tcp ~".to_string(),
            file: host.to_string(),
            line: i32::from(port),
        });
    }
}

impl fmt::Display for RemoteException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)?;
        for frame in &self.frames {
            write!(f, "\n    {}", frame)?;
        }
        Ok(())
    }
}

/// The main error type for remote map operations.
#[derive(Debug, Error, Clone)]
pub enum MapError {
    /// The operation deadline expired. The socket is closed but the client
    /// stays usable; the next operation reconnects.
    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The transport closed mid-exchange. Normally handled internally by
    /// the reconnect-and-resend loop; surfaces only when no connection can
    /// be used at all.
    #[error("disconnected from remote server")]
    Disconnected,

    /// The response carried a transaction id other than the one sent.
    /// Framing is desynchronized; the connection is dropped without resync.
    #[error("transaction id mismatch: expected {expected}, received {received}")]
    ProtocolViolation {
        /// The transaction id written into the request.
        expected: u64,
        /// The transaction id echoed by the server.
        received: u64,
    },

    /// The server reported a failure for this operation.
    #[error("remote failure: {0}")]
    Remote(RemoteException),

    /// A read ran past the valid region of the frame buffer.
    #[error("truncated frame: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the read required.
        needed: usize,
        /// Bytes left before the buffer limit.
        available: usize,
    },

    /// A serializer failed to encode or decode a payload.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The operation is not supported by the stateless client.
    #[error("{0} is not supported by the remote map client")]
    Unsupported(&'static str),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Any other I/O error (wrapped in `Arc` for `Clone`).
    #[error("I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl From<io::Error> for MapError {
    fn from(err: io::Error) -> Self {
        MapError::Io(Arc::new(err))
    }
}

/// A specialized `Result` for remote map operations.
pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_display() {
        let err = MapError::Timeout(Duration::from_secs(10));
        assert_eq!(err.to_string(), "remote call timed out after 10s");
    }

    #[test]
    fn test_protocol_violation_display() {
        let err = MapError::ProtocolViolation {
            expected: 7,
            received: 9,
        };
        assert_eq!(
            err.to_string(),
            "transaction id mismatch: expected 7, received 9"
        );
    }

    #[test]
    fn test_truncated_display() {
        let err = MapError::Truncated {
            needed: 8,
            available: 3,
        };
        assert_eq!(err.to_string(), "truncated frame: needed 8 bytes, 3 available");
    }

    #[test]
    fn test_unsupported_display() {
        let err = MapError::Unsupported("get_using");
        assert_eq!(
            err.to_string(),
            "get_using is not supported by the remote map client"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let err: MapError = io_err.into();
        assert!(matches!(err, MapError::Io(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_is_clone() {
        let err = MapError::Disconnected;
        assert_eq!(err.to_string(), err.clone().to_string());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MapError>();
    }

    #[test]
    fn test_remote_exception_display_includes_frames() {
        let mut exc = RemoteException {
            class_name: "java.lang.IllegalStateException".to_string(),
            message: "missing table".to_string(),
            frames: vec![RemoteFrame {
                class_name: "ServerMap".to_string(),
                method: "lookup".to_string(),
                file: "ServerMap.java".to_string(),
                line: 42,
            }],
        };
        exc.push_endpoint_frame("127.0.0.1", 5701);

        let rendered = exc.to_string();
        assert!(rendered.starts_with("java.lang.IllegalStateException: missing table"));
        assert!(rendered.contains("at ServerMap.lookup(ServerMap.java:42)"));
        assert!(rendered.contains("at ~ remote.tcp ~(127.0.0.1:5701)"));
    }

    #[test]
    fn test_endpoint_frame_fields() {
        let mut exc = RemoteException {
            class_name: "E".to_string(),
            message: "m".to_string(),
            frames: Vec::new(),
        };
        exc.push_endpoint_frame("10.0.0.9", 9090);

        let frame = exc.frames.last().unwrap();
        assert_eq!(frame.class_name, "~ remote");
        assert_eq!(frame.method, "tcp ~");
        assert_eq!(frame.file, "10.0.0.9");
        assert_eq!(frame.line, 9090);
    }
}
