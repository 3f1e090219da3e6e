//! Stateless TCP client for a remote key-value map service.
//!
//! A [`RemoteMap`] owns no data. Every operation is serialized into a
//! framed binary request, dispatched over one long-lived TCP connection,
//! and matched to its response by a strictly increasing transaction id.
//! The transport reconnects and resends transparently when the server
//! drops the connection mid-exchange, bounded by the configured deadline.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mapwire_client::{MapConfig, NativeCodec, RemoteMap};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mapwire_client::Result<()> {
//!     let config = MapConfig::builder("127.0.0.1:8076".parse().unwrap())
//!         .name("orders")
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!     let map: RemoteMap<String, String, _> =
//!         RemoteMap::connect(config, NativeCodec::new()).await;
//!
//!     map.put("key".into(), "value".into()).await?;
//!     let value = map.get(&"key".into()).await?;
//!     println!("{:?}", value); // Some("value")
//!     Ok(())
//! }
//! ```

pub mod config;
mod connection;
mod invoke;
pub mod map;

pub use config::{MapConfig, MapConfigBuilder};
pub use map::RemoteMap;

pub use mapwire_core::{
    EventId, FrameBuffer, KeyValueCodec, MapError, NativeCodec, RemoteException, RemoteFrame,
    Result, WireRead, WireWrite, WriteError,
};
pub use mapwire_core::serialization::SerdeCodec;
