//! Error types for pool operations

use std::time::Duration;

use thiserror::Error;

/// Result type for pool operations, parameterized over the connector's error.
pub type PoolResult<T, E> = std::result::Result<T, PoolError<E>>;

/// Pool errors
#[derive(Debug, Error)]
pub enum PoolError<E>
where
    E: std::error::Error + 'static,
{
    /// No idle connection became available before the acquire deadline
    #[error("no idle connection became available within {waited:?}")]
    Exhausted {
        /// How long the caller waited before giving up
        waited: Duration,
    },

    /// The underlying connect (or close, during shutdown) failed
    #[error("connection error: {0}")]
    Connection(#[source] E),

    /// Shutdown was attempted while connections were still checked out
    #[error("cannot release pool: {0} connection(s) still acquired")]
    StillAcquired(usize),
}
