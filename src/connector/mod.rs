//! Boundary traits for the external connect/close capabilities
//!
//! The pool treats the remote service as opaque: a [`Connector`] opens
//! connections from a [`ConnectParams`] set it never interprets, and each
//! connection only has to support being closed exactly once at the end of
//! its life. Both capabilities exist in a synchronous flavor (for
//! [`BlockingPool`](crate::pool::BlockingPool)) and an async flavor (for
//! [`AsyncPool`](crate::pool::AsyncPool)).

use async_trait::async_trait;

use crate::config::ConnectParams;

/// A connection managed by the blocking pool
pub trait Connection: Send + 'static {
    /// Error type for connection operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Close the connection
    ///
    /// The pool calls this exactly once per connection, when the connection
    /// expires or the pool shuts down, never while a consumer holds it.
    fn close(self) -> Result<(), Self::Error>;
}

/// Opens connections for the blocking pool
pub trait Connector: Send + Sync + 'static {
    /// The connection type this connector produces
    type Conn: Connection<Error = Self::Error>;
    /// Error type for connect failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection using the given parameters
    fn connect(&self, params: &ConnectParams) -> Result<Self::Conn, Self::Error>;
}

/// A connection managed by the async pool
#[async_trait]
pub trait AsyncConnection: Send + 'static {
    /// Error type for connection operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Close the connection
    async fn close(self) -> Result<(), Self::Error>;
}

/// Opens connections for the async pool
#[async_trait]
pub trait AsyncConnector: Send + Sync + 'static {
    /// The connection type this connector produces
    type Conn: AsyncConnection<Error = Self::Error>;
    /// Error type for connect failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection using the given parameters
    async fn connect(&self, params: &ConnectParams) -> Result<Self::Conn, Self::Error>;
}
