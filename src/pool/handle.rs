//! Pool-internal connection wrapper

use std::time::{Duration, Instant};

/// One live connection plus its creation timestamp.
///
/// Owned by exactly one party at a time: the pool's idle queue while idle,
/// or (unwrapped) the consumer while checked out. Consumers never see this
/// type; `release` re-wraps the raw connection with a fresh timestamp.
#[derive(Debug)]
pub(crate) struct PooledHandle<T> {
    conn: T,
    connected_at: Instant,
}

impl<T> PooledHandle<T> {
    /// Wrap a connection, stamping it with the current time
    pub(crate) fn new(conn: T) -> Self {
        Self {
            conn,
            connected_at: Instant::now(),
        }
    }

    /// Whether the handle has outlived `ttl`; a zero `ttl` never expires
    pub(crate) fn is_expired(&self, ttl: Duration) -> bool {
        !ttl.is_zero() && self.connected_at.elapsed() > ttl
    }

    /// Unwrap into the raw connection
    pub(crate) fn into_conn(self) -> T {
        self.conn
    }
}
