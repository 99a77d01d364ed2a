//! Cooperatively-scheduled pool variant for async callers

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;

use super::handle::PooledHandle;
use super::PoolStats;
use crate::config::PoolConfig;
use crate::connector::{AsyncConnection, AsyncConnector};
use crate::error::{PoolError, PoolResult};

struct Store<T> {
    idle: VecDeque<PooledHandle<T>>,
    acquired: usize,
    closed: bool,
}

struct Shared<C: AsyncConnector> {
    // One permit per idle handle; the semaphore's fair queue gives waiting
    // tasks first-suspended-first-resumed ordering. Store mutation happens
    // in short critical sections that never span an await.
    semaphore: Semaphore,
    store: Mutex<Store<C::Conn>>,
    connector: C,
    config: PoolConfig,
}

impl<C: AsyncConnector> Shared<C> {
    fn release(&self, conn: C::Conn) {
        let mut store = self.store.lock();
        assert!(!store.closed, "pool used after shutdown");
        store.acquired -= 1;
        store.idle.push_back(PooledHandle::new(conn));
        drop(store);
        self.semaphore.add_permits(1);
    }
}

/// Cooperatively-scheduled connection pool.
///
/// Construction performs no I/O; [`init`](Self::init) must complete before
/// the first [`acquire`](Self::acquire). Acquiring suspends the calling task
/// (never a thread) until a connection is idle, with FIFO resumption among
/// waiting tasks. Expiry is checked lazily at acquire time: a connection
/// older than `connection_ttl` is closed and replaced before being handed
/// out. There is no background worker and no acquire timeout in this
/// variant; callers bound the wait with their own timeout if they need one.
///
/// Dropping an in-flight `acquire` future is safe: before a connection is
/// taken nothing has changed, and afterwards the accounting stays
/// consistent (see `release` and the guard returned by [`get`](Self::get)).
pub struct AsyncPool<C: AsyncConnector> {
    shared: Arc<Shared<C>>,
}

impl<C: AsyncConnector> AsyncPool<C> {
    /// Create a pool; stores configuration only, opens nothing.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is zero.
    pub fn new(connector: C, config: PoolConfig) -> Self {
        assert!(config.pool_size >= 1, "pool_size must be at least 1");
        Self {
            shared: Arc::new(Shared {
                semaphore: Semaphore::new(0),
                store: Mutex::new(Store {
                    idle: VecDeque::with_capacity(config.pool_size),
                    acquired: 0,
                    closed: false,
                }),
                connector,
                config,
            }),
        }
    }

    /// Open `pool_size` connections and make them available.
    ///
    /// Must be called exactly once, to completion, before any `acquire`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connection`] on the first connect failure.
    /// Connections opened before the failure stay in the pool, so a caller
    /// that treats the error as fatal should still call
    /// [`shutdown`](Self::shutdown).
    pub async fn init(&self) -> PoolResult<(), C::Error> {
        for _ in 0..self.shared.config.pool_size {
            tracing::debug!(params = ?self.shared.config.params, "opening new connection");
            let conn = self
                .shared
                .connector
                .connect(&self.shared.config.params)
                .await
                .map_err(PoolError::Connection)?;
            self.shared
                .store
                .lock()
                .idle
                .push_back(PooledHandle::new(conn));
            self.shared.semaphore.add_permits(1);
        }
        Ok(())
    }

    /// Acquire a connection, suspending the task until one is idle.
    ///
    /// An idle connection past its TTL is closed and replaced before being
    /// returned; with a zero TTL connections never expire.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Connection`] if the replacement connect for an
    /// expired connection fails. The expired connection is already closed at
    /// that point, so the pool runs one connection short afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been shut down.
    pub async fn acquire(&self) -> PoolResult<C::Conn, C::Error> {
        let Ok(permit) = self.shared.semaphore.acquire().await else {
            panic!("pool used after shutdown");
        };

        let handle = {
            let mut store = self.shared.store.lock();
            let handle = store
                .idle
                .pop_front()
                .expect("semaphore permit held without an idle connection");
            if !handle.is_expired(self.shared.config.connection_ttl) {
                store.acquired += 1;
                permit.forget();
                return Ok(handle.into_conn());
            }
            handle
        };

        // Expired. The permit is consumed up front so the accounting stays
        // consistent even if this future is dropped across the awaits below.
        permit.forget();
        tracing::debug!("recreating connection past its ttl");
        if let Err(e) = handle.into_conn().close().await {
            tracing::warn!(error = %e, "failed to close expired connection");
        }
        match self
            .shared
            .connector
            .connect(&self.shared.config.params)
            .await
        {
            Ok(conn) => {
                self.shared.store.lock().acquired += 1;
                Ok(conn)
            }
            Err(e) => Err(PoolError::Connection(e)),
        }
    }

    /// Return a connection to the pool.
    ///
    /// Never suspends. The connection is re-wrapped with a fresh timestamp,
    /// so its TTL clock restarts now. Releasing a connection that did not
    /// come from this pool, or releasing one twice, is not validated.
    ///
    /// # Panics
    ///
    /// Panics if the pool has been shut down.
    pub fn release(&self, conn: C::Conn) {
        self.shared.release(conn);
    }

    /// Acquire a connection bound to the returned guard's scope.
    ///
    /// The guard dereferences to the connection and releases it when
    /// dropped, on every exit path including cancellation of the caller's
    /// task.
    ///
    /// # Errors
    ///
    /// Same as [`acquire`](Self::acquire).
    pub async fn get(&self) -> PoolResult<AsyncPooledConn<C>, C::Error> {
        let conn = self.acquire().await?;
        Ok(AsyncPooledConn {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
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

    /// Close every idle connection and mark the pool unusable.
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
    pub async fn shutdown(&self) -> PoolResult<(), C::Error> {
        let drained = {
            let mut store = self.shared.store.lock();
            assert!(!store.closed, "pool already shut down");
            if store.acquired > 0 {
                return Err(PoolError::StillAcquired(store.acquired));
            }
            store.closed = true;
            std::mem::take(&mut store.idle)
        };

        // Late acquirers now fail the semaphore wait instead of hanging.
        self.shared.semaphore.close();

        let mut first_err = None;
        for handle in drained {
            if let Err(e) = handle.into_conn().close().await {
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

impl<C: AsyncConnector> Drop for AsyncPool<C> {
    fn drop(&mut self) {
        let store = self.shared.store.lock();
        if !store.closed {
            tracing::warn!(
                idle = store.idle.len(),
                acquired = store.acquired,
                "AsyncPool dropped without shutdown; connections will not be closed cleanly"
            );
        }
    }
}

/// RAII guard for a checked-out connection.
///
/// Dereferences to the connection and releases it back to the pool on drop.
pub struct AsyncPooledConn<C: AsyncConnector> {
    conn: Option<C::Conn>,
    shared: Arc<Shared<C>>,
}

impl<C: AsyncConnector> std::ops::Deref for AsyncPooledConn<C> {
    type Target = C::Conn;

    fn deref(&self) -> &Self::Target {
        // Invariant: conn is always Some between get() and Drop::drop()
        self.conn
            .as_ref()
            .expect("AsyncPooledConn invariant violated: connection is None before Drop")
    }
}

impl<C: AsyncConnector> std::ops::DerefMut for AsyncPooledConn<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("AsyncPooledConn invariant violated: connection is None before Drop")
    }
}

impl<C: AsyncConnector> Drop for AsyncPooledConn<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug, thiserror::Error)]
    #[error("connect refused")]
    struct TestError;

    struct TestConn {
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsyncConnection for TestConn {
        type Error = TestError;

        async fn close(self) -> Result<(), TestError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct TestConnector {
        connects: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AsyncConnector for TestConnector {
        type Conn = TestConn;
        type Error = TestError;

        async fn connect(&self, _params: &crate::ConnectParams) -> Result<TestConn, TestError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(TestConn {
                closes: Arc::clone(&self.closes),
            })
        }
    }

    fn config(size: usize) -> PoolConfig {
        PoolConfig::new()
            .with_pool_size(size)
            .with_connection_ttl(Duration::ZERO)
            .with_cleanup_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_new_performs_no_io() {
        let connector = TestConnector::default();
        let connects = Arc::clone(&connector.connects);
        let pool = AsyncPool::new(connector, config(3));

        assert_eq!(connects.load(Ordering::SeqCst), 0);
        assert!(pool.is_empty());

        pool.init().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 3);
        let stats = pool.stats();
        assert_eq!(stats.idle, 3);
        assert_eq!(stats.acquired, 0);

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_release_round_trip() {
        let pool = AsyncPool::new(TestConnector::default(), config(2));
        pool.init().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.idle + stats.acquired, 2);

        pool.release(conn);
        let stats = pool.stats();
        assert_eq!(stats.idle, 2);
        assert_eq!(stats.acquired, 0);

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_connection_replaced_at_acquire() {
        let connector = TestConnector::default();
        let connects = Arc::clone(&connector.connects);
        let closes = Arc::clone(&connector.closes);
        let config = PoolConfig::new()
            .with_pool_size(1)
            .with_connection_ttl(Duration::from_millis(20));
        let pool = AsyncPool::new(connector, config);
        pool.init().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let conn = pool.acquire().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(pool.stats().acquired, 1);

        pool.release(conn);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let connector = TestConnector::default();
        let connects = Arc::clone(&connector.connects);
        let pool = AsyncPool::new(connector, config(1));
        pool.init().await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let conn = pool.acquire().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        pool.release(conn);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_refreshes_ttl_clock() {
        let connector = TestConnector::default();
        let connects = Arc::clone(&connector.connects);
        let config = PoolConfig::new()
            .with_pool_size(1)
            .with_connection_ttl(Duration::from_millis(60));
        let pool = AsyncPool::new(connector, config);
        pool.init().await.unwrap();

        // Hold past the original TTL; the release re-stamps the connection,
        // so the immediate re-acquire must not see it as expired.
        let conn = pool.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        pool.release(conn);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(connects.load(Ordering::SeqCst), 1);

        pool.release(conn);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_waiters_resume_in_fifo_order() {
        let pool = Arc::new(AsyncPool::new(TestConnector::default(), config(1)));
        pool.init().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut waiters = vec![];
        for i in 1..=3_u32 {
            let pool = Arc::clone(&pool);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                let conn = pool.acquire().await.unwrap();
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
                pool.release(conn);
            }));
            // Let the task reach the semaphore before spawning the next one.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        pool.release(conn);
        for waiter in waiters {
            waiter.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![1, 2, 3]);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_accounting_intact() {
        let pool = Arc::new(AsyncPool::new(TestConnector::default(), config(1)));
        pool.init().await.unwrap();

        let conn = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let _conn = pool.get().await.unwrap();
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        waiter.abort();
        let _ = waiter.await;

        // Cancelled before a connection was obtained: nothing changed.
        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.acquired, 1);

        pool.release(conn);
        let conn = pool.acquire().await.unwrap();
        pool.release(conn);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_holder_releases_via_guard() {
        let pool = Arc::new(AsyncPool::new(TestConnector::default(), config(1)));
        pool.init().await.unwrap();

        let holder = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move {
                let _conn = pool.get().await.unwrap();
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pool.stats().acquired, 1);

        holder.abort();
        let _ = holder.await;

        // The guard released on abort; no checked-out count leaked.
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.acquired, 0);

        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_refused_while_acquired() {
        let pool = AsyncPool::new(TestConnector::default(), config(1));
        pool.init().await.unwrap();

        let conn = pool.acquire().await.unwrap();
        assert!(pool.is_empty());

        match pool.shutdown().await {
            Err(PoolError::StillAcquired(n)) => assert_eq!(n, 1),
            other => panic!("expected StillAcquired, got {other:?}"),
        }

        // The failed shutdown leaves the pool fully usable.
        pool.release(conn);
        let conn = pool.acquire().await.unwrap();
        pool.release(conn);

        pool.shutdown().await.unwrap();
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_connections() {
        let connector = TestConnector::default();
        let closes = Arc::clone(&connector.closes);
        let pool = AsyncPool::new(connector, config(3));
        pool.init().await.unwrap();

        pool.shutdown().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(pool.is_empty());
    }
}
