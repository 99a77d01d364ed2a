//! Pool configuration

use std::collections::HashMap;
use std::time::Duration;

/// Opaque connection parameters forwarded to the connector.
///
/// The pool never interprets these values; they are passed verbatim to
/// [`Connector::connect`](crate::connector::Connector::connect) every time a
/// connection is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectParams {
    params: HashMap<String, String>,
}

impl ConnectParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value for the key
    pub fn set<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Iterate over all parameters
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the parameter set is empty
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Pool configuration
///
/// Immutable after the pool is constructed.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Connection parameters forwarded to the connector
    pub params: ConnectParams,
    /// Number of connections the pool maintains (must be at least 1)
    pub pool_size: usize,
    /// Maximum age of a connection before it is replaced; zero disables expiry
    pub connection_ttl: Duration,
    /// Interval between background cleanup passes (blocking variant only);
    /// zero disables the background worker
    pub cleanup_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            params: ConnectParams::new(),
            pool_size: 10,
            connection_ttl: Duration::from_secs(3600),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection parameters
    pub fn with_params(mut self, params: ConnectParams) -> Self {
        self.params = params;
        self
    }

    /// Set the pool size
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        assert!(size >= 1, "pool_size must be at least 1");
        self.pool_size = size;
        self
    }

    /// Set the connection TTL; `Duration::ZERO` means connections never expire
    pub fn with_connection_ttl(mut self, ttl: Duration) -> Self {
        self.connection_ttl = ttl;
        self
    }

    /// Set the background cleanup interval; `Duration::ZERO` disables it
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
