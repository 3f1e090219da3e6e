//! Client configuration.

use std::net::SocketAddr;
use std::time::Duration;

use mapwire_core::{MapError, Result};

/// Default round-trip deadline for a single operation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default map name.
const DEFAULT_NAME: &str = "default";
/// Default single-entry size hint for the request buffer.
const DEFAULT_ENTRY_SIZE_HINT: usize = 128;

/// Immutable configuration for one remote map client.
///
/// Built with [`MapConfig::builder`]; the client never mutates it.
#[derive(Debug, Clone)]
pub struct MapConfig {
    remote_address: SocketAddr,
    timeout: Duration,
    name: String,
    put_returns_null: bool,
    remove_returns_null: bool,
    entry_size_hint: usize,
}

impl MapConfig {
    /// Starts a builder for a map served at `remote_address`.
    pub fn builder(remote_address: SocketAddr) -> MapConfigBuilder {
        MapConfigBuilder::new(remote_address)
    }

    /// Address of the remote map server.
    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    /// Deadline applied to each operation, covering every connect, send,
    /// and receive it performs.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Name of the remote map, used in logs and `remote_to_string`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// When `true`, `put` and `put_all` use the fire-and-forget variants
    /// and return without reading a response.
    pub fn put_returns_null(&self) -> bool {
        self.put_returns_null
    }

    /// When `true`, `remove` uses the fire-and-forget variant and returns
    /// without reading a response.
    pub fn remove_returns_null(&self) -> bool {
        self.remove_returns_null
    }

    /// Expected size of one encoded key/value entry; seeds the request
    /// buffer capacity and the resize quantum.
    pub fn entry_size_hint(&self) -> usize {
        self.entry_size_hint
    }
}

/// Builder for [`MapConfig`].
#[derive(Debug, Clone)]
pub struct MapConfigBuilder {
    remote_address: SocketAddr,
    timeout: Duration,
    name: String,
    put_returns_null: bool,
    remove_returns_null: bool,
    entry_size_hint: usize,
}

impl MapConfigBuilder {
    fn new(remote_address: SocketAddr) -> Self {
        Self {
            remote_address,
            timeout: DEFAULT_TIMEOUT,
            name: DEFAULT_NAME.to_string(),
            put_returns_null: false,
            remove_returns_null: false,
            entry_size_hint: DEFAULT_ENTRY_SIZE_HINT,
        }
    }

    /// Sets the per-operation deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the map name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes `put` and `put_all` fire-and-forget.
    pub fn put_returns_null(mut self, enabled: bool) -> Self {
        self.put_returns_null = enabled;
        self
    }

    /// Makes `remove` fire-and-forget.
    pub fn remove_returns_null(mut self, enabled: bool) -> Self {
        self.remove_returns_null = enabled;
        self
    }

    /// Sets the expected size of one encoded entry.
    pub fn entry_size_hint(mut self, hint: usize) -> Self {
        self.entry_size_hint = hint;
        self
    }

    /// Validates and builds the configuration.
    pub fn build(self) -> Result<MapConfig> {
        if self.timeout.is_zero() {
            return Err(MapError::Config("timeout must be positive".to_string()));
        }
        if self.entry_size_hint == 0 {
            return Err(MapError::Config(
                "entry_size_hint must be positive".to_string(),
            ));
        }
        if self.name.is_empty() {
            return Err(MapError::Config("name must not be empty".to_string()));
        }

        Ok(MapConfig {
            remote_address: self.remote_address,
            timeout: self.timeout,
            name: self.name,
            put_returns_null: self.put_returns_null,
            remove_returns_null: self.remove_returns_null,
            entry_size_hint: self.entry_size_hint,
        })
    }
}
