//! Pool variants and shared pool types

mod async_pool;
mod blocking;
mod cleanup;
mod handle;

pub use async_pool::{AsyncPool, AsyncPooledConn};
pub use blocking::{BlockingPool, PooledConn};

/// Point-in-time pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of idle connections available for acquisition
    pub idle: usize,
    /// Number of connections currently checked out
    pub acquired: usize,
    /// Configured pool size
    pub pool_size: usize,
}
