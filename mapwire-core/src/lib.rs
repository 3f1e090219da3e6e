//! Wire-level building blocks for the mapwire remote map client.
//!
//! This crate holds everything below the socket: the growable frame
//! buffer, the event-tag and stop-bit codecs, transaction-id generation,
//! request staging, the serialization seams, and the error taxonomy shared
//! with the client crate. Nothing in here performs I/O.

#![warn(missing_docs)]

pub mod buffer;
pub mod error;
pub mod protocol;
pub mod serialization;

pub use buffer::{FrameBuffer, OutOfSpace};
pub use error::{MapError, RemoteException, RemoteFrame, Result};
pub use protocol::event::EventId;
pub use protocol::request::RequestBuilder;
pub use protocol::txn::TransactionClock;
pub use serialization::{KeyValueCodec, NativeCodec, WireRead, WireWrite, WriteError};
