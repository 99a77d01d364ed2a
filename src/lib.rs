//! repool
//!
//! Bounded pooling of expensive connections to a remote service.
//!
//! ## Features
//!
//! - At most `pool_size` connections checked out at a time
//! - Connections recycled on release, replaced once past `connection_ttl`
//! - [`BlockingPool`] for synchronous callers: bounded or unbounded waits,
//!   background cleanup worker replacing expired idle connections
//! - [`AsyncPool`] for tokio tasks: FIFO waiter resumption, lazy expiry at
//!   acquire time, no background worker
//! - RAII guards that release on every exit path
//! - Shutdown refuses to run while connections are still checked out
//!
//! The remote service stays opaque: implement [`Connector`] (or
//! [`AsyncConnector`]) to open connections from a [`ConnectParams`] set the
//! pool forwards but never interprets.
//!
//! ## Example
//!
//! ```
//! use repool::{BlockingPool, ConnectParams, Connection, Connector, PoolConfig};
//! use std::convert::Infallible;
//! use std::time::Duration;
//!
//! struct Client;
//!
//! impl Connection for Client {
//!     type Error = Infallible;
//!     fn close(self) -> Result<(), Infallible> {
//!         Ok(())
//!     }
//! }
//!
//! struct ClientConnector;
//!
//! impl Connector for ClientConnector {
//!     type Conn = Client;
//!     type Error = Infallible;
//!     fn connect(&self, _params: &ConnectParams) -> Result<Client, Infallible> {
//!         Ok(Client)
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PoolConfig::new()
//!         .with_pool_size(4)
//!         .with_cleanup_interval(Duration::ZERO);
//!     let pool = BlockingPool::new(ClientConnector, config)?;
//!
//!     {
//!         let conn = pool.get(Some(Duration::from_secs(1)))?;
//!         let _client: &Client = &conn;
//!     } // released here
//!
//!     pool.shutdown()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod pool;

// Re-export main types
pub use config::{ConnectParams, PoolConfig};
pub use connector::{AsyncConnection, AsyncConnector, Connection, Connector};
pub use error::{PoolError, PoolResult};
pub use pool::{AsyncPool, AsyncPooledConn, BlockingPool, PoolStats, PooledConn};
