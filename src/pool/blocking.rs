//! Thread-blocking pool variant for synchronous callers

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::cleanup::CleanupDriver;
use super::handle::PooledHandle;
use super::PoolStats;
use crate::config::PoolConfig;
use crate::connector::{Connection, Connector};
use crate::error::{PoolError, PoolResult};

struct Store<T> {
    idle: VecDeque<PooledHandle<T>>,
    acquired: usize,
    closed: bool,
}

struct Shared<C: Connector> {
    store: Mutex<Store<C::Conn>>,
    available: Condvar,
    connector: C,
    config: PoolConfig,
}

impl<C: Connector> Shared<C> {
    fn release(&self, conn: C::Conn) {
        let mut store = self.store.lock();
        assert!(!store.closed, "pool used after shutdown");
        store.acquired -= 1;
        store.idle.push_back(PooledHandle::new(conn));
        drop(store);
        self.available.notify_one();
    }

    /// One background cleanup pass: rebuild the idle queue, replacing every
    /// handle past its TTL. The queue is swapped back in whole, so acquirers
    /// never observe a partially rebuilt store.
    fn sweep_expired(&self) {
        let ttl = self.config.connection_ttl;
        if ttl.is_zero() {
            return;
        }

        let mut store = self.store.lock();
        if store.closed {
            return;
        }

        let drained = std::mem::take(&mut store.idle);
        let mut rebuilt = VecDeque::with_capacity(drained.len());
        let mut recycled = 0_usize;
        for handle in drained {
            if !handle.is_expired(ttl) {
                rebuilt.push_back(handle);
                continue;
            }
            if let Err(e) = handle.into_conn().close() {
                tracing::warn!(error = %e, "failed to close expired connection");
            }
            match self.connector.connect(&self.config.params) {
                Ok(conn) => {
                    rebuilt.push_back(PooledHandle::new(conn));
                    recycled += 1;
                }
                Err(e) => {
                    // Replacement skipped; the pool runs one handle short.
                    tracing::warn!(error = %e, "replacement connect failed during cleanup");
                }
            }
        }
        store.idle = rebuilt;
        drop(store);

        if recycled > 0 {
            tracing::debug!(recycled, "cleanup pass recycled expired connection(s)");
        }
    }
}

/// Thread-blocking connection pool.
///
/// Construction opens `pool_size` connections up front and, when
/// `cleanup_interval` is non-zero, starts a background worker that replaces
/// idle connections older than `connection_ttl`. Consumers either pair
/// [`acquire`](Self::acquire) with [`release`](Self::release) themselves or
/// use [`get`](Self::get) for scope-bound acquisition.
///
/// After a successful [`shutdown`](Self::shutdown) the pool is unusable;
/// further calls panic.
pub struct BlockingPool<C: Connector> {
    shared: Arc<Shared<C>>,
    cleanup: Mutex<Option<CleanupDriver>>,
}

impl<C: Connector> BlockingPool<C> {
    /// Create a pool, synchronously opening `pool_size` connections.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connection`] if any connect fails; connections
    /// opened before the failure are closed again.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is zero.
    pub fn new(connector: C, config: PoolConfig) -> PoolResult<Self, C::Error> {
        assert!(config.pool_size >= 1, "pool_size must be at least 1");

        let mut idle = VecDeque::with_capacity(config.pool_size);
        for _ in 0..config.pool_size {
            tracing::debug!(params = ?config.params, "opening new connection");
            match connector.connect(&config.params) {
                Ok(conn) => idle.push_back(PooledHandle::new(conn)),
                Err(e) => {
                    for handle in idle {
                        if let Err(close_err) = handle.into_conn().close() {
                            tracing::warn!(error = %close_err, "failed to close connection while rolling back");
                        }
                    }
                    return Err(PoolError::Connection(e));
                }
            }
        }

        let shared = Arc::new(Shared {
            store: Mutex::new(Store {
                idle,
                acquired: 0,
                closed: false,
            }),
            available: Condvar::new(),
            connector,
            config,
        });

        let cleanup = if shared.config.cleanup_interval.is_zero() {
            None
        } else {
            let sweeper = Arc::clone(&shared);
            Some(CleanupDriver::spawn(
                shared.config.cleanup_interval,
                move || sweeper.sweep_expired(),
            ))
        };

        Ok(Self {
            shared,
            cleanup: Mutex::new(cleanup),
        })
    }

    /// Acquire a connection, blocking the calling thread until one is idle.
    ///
    /// With `timeout: None` the call waits indefinitely; with `Some(t)` it
    /// fails with [`PoolError::Exhausted`] once `t` elapses with no idle
    /// connection. The store lock is only held for the non-blocking take;
    /// waiting happens on a condition variable, so waiters do not serialize
    /// behind each other.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been shut down.
    pub fn acquire(&self, timeout: Option<Duration>) -> PoolResult<C::Conn, C::Error> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut store = self.shared.store.lock();
        loop {
            assert!(!store.closed, "pool used after shutdown");
            if let Some(handle) = store.idle.pop_front() {
                store.acquired += 1;
                return Ok(handle.into_conn());
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .available
                        .wait_until(&mut store, deadline)
                        .timed_out()
                    {
                        return Err(PoolError::Exhausted {
                            waited: timeout.unwrap_or_default(),
                        });
                    }
                }
                None => self.shared.available.wait(&mut store),
            }
        }
    }

    /// Return a connection to the pool.
    ///
    /// The connection is re-wrapped with a fresh timestamp, so its TTL clock
    /// restarts now. Releasing a connection that did not come from this pool,
    /// or releasing one twice, is not validated and corrupts the accounting.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been shut down.
    pub fn release(&self, conn: C::Conn) {
        self.shared.release(conn);
    }

    /// Acquire a connection bound to the returned guard's scope.
    ///
    /// The guard dereferences to the connection and releases it when dropped,
    /// on every exit path. This is the recommended way to consume the pool.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub fn get(&self, timeout: Option<Duration>) -> PoolResult<PooledConn<'_, C>, C::Error> {
        let conn = self.acquire(timeout)?;
        Ok(PooledConn {
            conn: Some(conn),
            shared: &*self.shared,
        })
    }

    /// Whether no idle connection is currently available
    pub fn is_empty(&self) -> bool {
        self.shared.store.lock().idle.is_empty()
    }

    /// Get current pool counters
    pub fn stats(&self) -> PoolStats {
        let store = self.shared.store.lock();
        PoolStats {
            idle: store.idle.len(),
            acquired: store.acquired,
            pool_size: self.shared.config.pool_size,
        }
    }

    /// Close every idle connection, stop the cleanup worker and mark the
    /// pool unusable.
    ///
    /// # Errors
    ///
    /// Fails with [`PoolError::StillAcquired`] while any connection is
    /// checked out; the pool is left unchanged and fully usable. If closing
    /// an idle connection fails, the remaining connections are still closed
    /// and the first error is returned as [`PoolError::Connection`].
    ///
    /// # Panics
    ///
    /// Panics if called again after a successful shutdown.
    pub fn shutdown(&self) -> PoolResult<(), C::Error> {
        let drained = {
            let mut store = self.shared.store.lock();
            assert!(!store.closed, "pool already shut down");
            if store.acquired > 0 {
                return Err(PoolError::StillAcquired(store.acquired));
            }
            store.closed = true;
            std::mem::take(&mut store.idle)
        };

        // Wake any thread still parked in acquire so it hits the closed
        // check instead of waiting forever.
        self.shared.available.notify_all();

        if let Some(driver) = self.cleanup.lock().take() {
            driver.stop();
        }

        let mut first_err = None;
        for handle in drained {
            if let Err(e) = handle.into_conn().close() {
                tracing::warn!(error = %e, "failed to close idle connection during shutdown");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(PoolError::Connection(e)),
            None => Ok(()),
        }
    }
}

impl<C: Connector> Drop for BlockingPool<C> {
    fn drop(&mut self) {
        let store = self.shared.store.lock();
        if !store.closed {
            tracing::warn!(
                idle = store.idle.len(),
                acquired = store.acquired,
                "BlockingPool dropped without shutdown; connections will not be closed cleanly"
            );
        }
    }
}

/// RAII guard for a checked-out connection.
///
/// Dereferences to the connection and releases it back to the pool on drop.
pub struct PooledConn<'a, C: Connector> {
    conn: Option<C::Conn>,
    shared: &'a Shared<C>,
}

impl<C: Connector> std::ops::Deref for PooledConn<'_, C> {
    type Target = C::Conn;

    fn deref(&self) -> &Self::Target {
        // Invariant: conn is always Some between get() and Drop::drop()
        self.conn
            .as_ref()
            .expect("PooledConn invariant violated: connection is None before Drop")
    }
}

impl<C: Connector> std::ops::DerefMut for PooledConn<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("PooledConn invariant violated: connection is None before Drop")
    }
}

impl<C: Connector> Drop for PooledConn<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn);
        }
    }
}
