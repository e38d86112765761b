//! Bounded resource pool with scoped acquisition
//!
//! A [`Pool`] hands out connection-like resources created lazily by a
//! [`ManageResource`] backend. Acquisition waits for capacity (cancellable
//! by deadline) and returns a [`PooledResource`] guard; dropping the guard
//! returns the resource to the pool on every exit path.
//!
//! # Example
//!
//! ```
//! use async_trait::async_trait;
//! use stinger_pool::{ManageResource, Pool, PoolConfig};
//!
//! struct NumberManager;
//!
//! #[async_trait]
//! impl ManageResource for NumberManager {
//!     type Resource = u32;
//!     type Error = String;
//!
//!     async fn create(&self) -> Result<u32, String> {
//!         Ok(42)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let pool = Pool::new(PoolConfig::new(2), NumberManager);
//!
//! let conn = pool.acquire().await.unwrap();
//! assert_eq!(*conn, 42);
//! # }
//! ```

use crate::{ManageResource, PoolConfig, PoolError, ResourceMetrics};
use log::{debug, warn};
use serde::Serialize;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::timeout;

struct Entry<T> {
    resource: T,
    id: u64,
    metrics: ResourceMetrics,
}

struct PoolState<T> {
    /// Idle resources, most recently released last (LIFO reuse)
    idle: Vec<Entry<T>>,
    /// Resources alive, idle and checked out combined
    live: usize,
    next_id: u64,
    closed: bool,
}

struct PoolInner<M: ManageResource> {
    manager: M,
    config: PoolConfig,
    /// Permits encode remaining capacity; every guard holds one
    semaphore: Arc<Semaphore>,
    state: Mutex<PoolState<M::Resource>>,
}

impl<M: ManageResource> PoolInner<M> {
    fn discard(&self, entry: Entry<M::Resource>) {
        {
            let mut state = self.state.lock().unwrap();
            state.live -= 1;
        }
        self.manager.close(entry.resource);
    }
}

impl<M: ManageResource> Drop for PoolInner<M> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        for entry in state.idle.drain(..) {
            self.manager.close(entry.resource);
        }
    }
}

/// A bounded pool of reusable resources
///
/// Cloning is cheap and yields another handle to the same pool, so it can
/// be shared across tasks freely.
pub struct Pool<M: ManageResource> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageResource> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<M: ManageResource> fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status();
        f.debug_struct("Pool")
            .field("max_size", &status.max_size)
            .field("live", &status.live)
            .field("idle", &status.idle)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<M: ManageResource> Pool<M> {
    /// Create a pool over the given backend
    ///
    /// No resources are created up front; the first acquisitions populate
    /// the pool.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_size` is 0.
    pub fn new(config: PoolConfig, manager: M) -> Self {
        assert!(config.max_size > 0, "pool capacity must be at least 1");
        let semaphore = Arc::new(Semaphore::new(config.max_size));
        Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                semaphore,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    live: 0,
                    next_id: 1,
                    closed: false,
                }),
            }),
        }
    }

    /// Acquire a resource, waiting with the configured deadline
    ///
    /// Returns an idle resource when one is available, otherwise creates a
    /// new one as long as the pool is under capacity. At capacity the call
    /// waits until a resource is released; waiting beyond the configured
    /// `acquire_timeout` fails with [`PoolError::Timeout`].
    pub async fn acquire(&self) -> Result<PooledResource<M>, PoolError<M::Error>> {
        self.acquire_inner(self.inner.config.acquire_timeout).await
    }

    /// Acquire a resource with an explicit deadline, overriding the config
    pub async fn acquire_timeout(
        &self,
        wait: Duration,
    ) -> Result<PooledResource<M>, PoolError<M::Error>> {
        self.acquire_inner(Some(wait)).await
    }

    /// Acquire a resource without waiting for capacity
    ///
    /// Fails with [`PoolError::Timeout`] when the pool is at capacity with
    /// nothing idle. Still creates a resource lazily when under capacity,
    /// so the call awaits the backend in that case.
    pub async fn try_acquire(&self) -> Result<PooledResource<M>, PoolError<M::Error>> {
        let permit = match self.inner.semaphore.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
            Err(TryAcquireError::NoPermits) => return Err(PoolError::Timeout),
        };
        self.checkout(permit).await
    }

    async fn acquire_inner(
        &self,
        wait: Option<Duration>,
    ) -> Result<PooledResource<M>, PoolError<M::Error>> {
        let semaphore = self.inner.semaphore.clone();
        let permit = match wait {
            Some(wait) => match timeout(wait, semaphore.acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(PoolError::Closed),
                Err(_) => return Err(PoolError::Timeout),
            },
            None => match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(PoolError::Closed),
            },
        };
        self.checkout(permit).await
    }

    /// Permit in hand: reuse an idle resource or create a fresh one
    async fn checkout(
        &self,
        permit: OwnedSemaphorePermit,
    ) -> Result<PooledResource<M>, PoolError<M::Error>> {
        loop {
            let entry = {
                let mut state = self.inner.state.lock().unwrap();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                state.idle.pop()
            };
            let Some(mut entry) = entry else { break };
            if self.inner.manager.validate(&mut entry.resource).await {
                entry.metrics.mark_reused();
                debug!("reusing resource #{}", entry.id);
                return Ok(PooledResource::new(entry, permit, Arc::downgrade(&self.inner)));
            }
            warn!("resource #{} failed revalidation, discarding", entry.id);
            self.inner.discard(entry);
        }

        let resource = match self.inner.manager.create().await {
            Ok(resource) => resource,
            Err(e) => {
                warn!("resource creation failed: {}", e);
                return Err(PoolError::Resource(e));
            }
        };
        let entry = {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                drop(state);
                self.inner.manager.close(resource);
                return Err(PoolError::Closed);
            }
            let id = state.next_id;
            state.next_id += 1;
            state.live += 1;
            Entry {
                resource,
                id,
                metrics: ResourceMetrics::new(),
            }
        };
        debug!("created resource #{}", entry.id);
        Ok(PooledResource::new(entry, permit, Arc::downgrade(&self.inner)))
    }

    /// A point-in-time snapshot of pool occupancy
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock().unwrap();
        PoolStatus {
            max_size: self.inner.config.max_size,
            live: state.live,
            idle: state.idle.len(),
        }
    }

    /// Whether [`close`](Pool::close) has been called
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().unwrap().closed
    }

    /// Tear the pool down
    ///
    /// Disposes all idle resources through the backend and fails pending
    /// and future acquisitions with [`PoolError::Closed`]. Checked-out
    /// resources are disposed of when their guards drop. Closing an
    /// already-closed pool does nothing.
    pub fn close(&self) {
        let idle = {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                return;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        self.inner.semaphore.close();
        debug!("closing pool, disposing {} idle resource(s)", idle.len());
        for entry in idle {
            self.inner.discard(entry);
        }
    }
}

/// A point-in-time snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Configured capacity
    pub max_size: usize,
    /// Resources currently alive, idle and checked out combined
    pub live: usize,
    /// Resources currently idle in the pool
    pub idle: usize,
}

impl PoolStatus {
    /// Resources currently checked out by callers
    pub fn in_use(&self) -> usize {
        self.live - self.idle
    }
}

/// Scoped handle to an acquired resource
///
/// Derefs to the resource. Dropping the guard returns the resource to the
/// pool's idle set, whichever way the scope is exited; a resource marked
/// with [`invalidate`](PooledResource::invalidate) is disposed of instead.
///
/// Methods are associated functions, `PooledResource::id(&guard)` style, so
/// they never shadow methods of the resource itself.
#[must_use = "the resource returns to the pool as soon as the guard is dropped"]
pub struct PooledResource<M: ManageResource> {
    entry: Option<Entry<M::Resource>>,
    invalid: bool,
    pool: Weak<PoolInner<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: ManageResource> PooledResource<M> {
    fn new(entry: Entry<M::Resource>, permit: OwnedSemaphorePermit, pool: Weak<PoolInner<M>>) -> Self {
        Self {
            entry: Some(entry),
            invalid: false,
            pool,
            _permit: permit,
        }
    }

    /// Identity of the underlying resource, stable across reuse
    pub fn id(this: &Self) -> u64 {
        this.entry.as_ref().unwrap().id
    }

    /// Bookkeeping for the underlying resource
    pub fn metrics(this: &Self) -> ResourceMetrics {
        this.entry.as_ref().unwrap().metrics
    }

    /// Mark the resource broken
    ///
    /// The drop disposes of the resource through the backend instead of
    /// returning it to the idle set, and the pool's live count shrinks so a
    /// later acquisition creates a replacement.
    pub fn invalidate(this: &mut Self) {
        this.invalid = true;
    }

    /// Detach the resource from the pool permanently
    ///
    /// The caller takes ownership; the pool frees the capacity slot without
    /// calling the backend's `close`.
    pub fn take(mut this: Self) -> M::Resource {
        let entry = this.entry.take().unwrap();
        if let Some(pool) = this.pool.upgrade() {
            let mut state = pool.state.lock().unwrap();
            state.live -= 1;
        }
        entry.resource
    }
}

impl<M: ManageResource> fmt::Debug for PooledResource<M>
where
    M::Resource: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledResource")
            .field("id", &self.entry.as_ref().map(|e| e.id))
            .field("resource", &self.entry.as_ref().map(|e| &e.resource))
            .field("invalid", &self.invalid)
            .finish()
    }
}

impl<M: ManageResource> Deref for PooledResource<M> {
    type Target = M::Resource;

    fn deref(&self) -> &M::Resource {
        &self.entry.as_ref().unwrap().resource
    }
}

impl<M: ManageResource> DerefMut for PooledResource<M> {
    fn deref_mut(&mut self) -> &mut M::Resource {
        &mut self.entry.as_mut().unwrap().resource
    }
}

impl<M: ManageResource> Drop for PooledResource<M> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else { return };
        let Some(pool) = self.pool.upgrade() else { return };
        if self.invalid {
            debug!("resource #{} invalidated by caller, disposing", entry.id);
            pool.discard(entry);
            return;
        }
        let mut state = pool.state.lock().unwrap();
        if state.closed {
            drop(state);
            pool.discard(entry);
        } else {
            state.idle.push(entry);
        }
        // The permit drops after this body, so a waiter that wakes up will
        // find the entry already in the idle set.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ManageResource, PoolConfigBuilder};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct TestManager {
        created: AtomicUsize,
        closed: AtomicUsize,
        fail_creates: AtomicBool,
        reject_validation: AtomicBool,
    }

    // Implemented for Arc so tests keep a handle to the counters after the
    // pool takes ownership of its manager.
    #[async_trait]
    impl ManageResource for Arc<TestManager> {
        type Resource = u64;
        type Error = String;

        async fn create(&self) -> Result<u64, String> {
            if self.fail_creates.load(Ordering::SeqCst) {
                return Err("backend refused".to_string());
            }
            let serial = self.created.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            Ok(serial)
        }

        async fn validate(&self, _resource: &mut u64) -> bool {
            !self.reject_validation.load(Ordering::SeqCst)
        }

        fn close(&self, _resource: u64) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager() -> Arc<TestManager> {
        Arc::new(TestManager::default())
    }

    #[tokio::test]
    async fn test_acquire_creates_lazily() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(4), mgr.clone());
        assert_eq!(mgr.created.load(Ordering::SeqCst), 0);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(*conn, 1);
        assert_eq!(mgr.created.load(Ordering::SeqCst), 1);

        let status = pool.status();
        assert_eq!(status.live, 1);
        assert_eq!(status.idle, 0);
        assert_eq!(status.in_use(), 1);
    }

    #[tokio::test]
    async fn test_release_returns_resource_to_idle_set() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(4), mgr.clone());

        let first = pool.acquire().await.unwrap();
        let first_id = PooledResource::id(&first);
        drop(first);
        assert_eq!(pool.status().idle, 1);

        let second = pool.acquire().await.unwrap();
        assert_eq!(PooledResource::id(&second), first_id);
        // Reused, not re-created
        assert_eq!(mgr.created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lifo_reuse_order() {
        let pool = Pool::new(PoolConfig::new(4), manager());

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let a_id = PooledResource::id(&a);
        let b_id = PooledResource::id(&b);

        drop(b);
        drop(a);

        let next = pool.acquire().await.unwrap();
        assert_eq!(PooledResource::id(&next), a_id);
        assert_ne!(PooledResource::id(&next), b_id);
    }

    #[tokio::test]
    async fn test_capacity_never_exceeded() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());

        let g1 = pool.acquire().await.unwrap();
        let _g2 = pool.acquire().await.unwrap();
        assert_eq!(pool.status().in_use(), 2);

        let err = pool.try_acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Timeout));
        assert_eq!(mgr.created.load(Ordering::SeqCst), 2);

        // A release frees the slot for the next caller
        let g1_id = PooledResource::id(&g1);
        drop(g1);
        let g3 = pool.try_acquire().await.unwrap();
        assert_eq!(PooledResource::id(&g3), g1_id);
    }

    #[tokio::test]
    async fn test_acquire_timeout_elapses() {
        let pool = Pool::new(PoolConfig::new(1), manager());
        let _held = pool.acquire().await.unwrap();

        let err = pool
            .acquire_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout));
    }

    #[tokio::test]
    async fn test_configured_timeout_applies_to_acquire() {
        let config = PoolConfigBuilder::default()
            .max_size(1usize)
            .acquire_timeout(Duration::from_millis(20))
            .build()
            .unwrap();
        let pool = Pool::new(config, manager());
        let _held = pool.acquire().await.unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert!(matches!(err, PoolError::Timeout));
    }

    #[tokio::test]
    async fn test_blocked_acquire_resumes_after_release() {
        let pool = Pool::new(PoolConfig::new(1), manager());
        let held = pool.acquire().await.unwrap();
        let held_id = PooledResource::id(&held);

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.acquire().await.map(|guard| PooledResource::id(&guard))
            })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        let woken_id = waiter.await.unwrap().unwrap();
        assert_eq!(woken_id, held_id);
    }

    #[tokio::test]
    async fn test_close_rejects_acquire() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());

        let guard = pool.acquire().await.unwrap();
        drop(guard);
        assert_eq!(pool.status().idle, 1);

        pool.close();
        assert!(pool.is_closed());
        // The idle resource went through the backend's close
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().live, 0);

        assert!(matches!(pool.acquire().await.unwrap_err(), PoolError::Closed));
        assert!(matches!(pool.try_acquire().await.unwrap_err(), PoolError::Closed));

        // Closing twice is a no-op
        pool.close();
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_checked_out_resource_disposed_after_close() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());

        let guard = pool.acquire().await.unwrap();
        pool.close();
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 0);

        drop(guard);
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().live, 0);
    }

    #[tokio::test]
    async fn test_pending_acquire_fails_on_close() {
        let pool = Pool::new(PoolConfig::new(1), manager());
        let _held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };

        sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        pool.close();
        assert!(matches!(waiter.await.unwrap().unwrap_err(), PoolError::Closed));
    }

    #[tokio::test]
    async fn test_invalidated_resource_is_replaced() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());

        let mut guard = pool.acquire().await.unwrap();
        let broken_id = PooledResource::id(&guard);
        PooledResource::invalidate(&mut guard);
        drop(guard);

        assert_eq!(mgr.closed.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().live, 0);

        let replacement = pool.acquire().await.unwrap();
        assert_ne!(PooledResource::id(&replacement), broken_id);
        assert_eq!(mgr.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_creation_leaves_pool_intact() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());
        mgr.fail_creates.store(true, Ordering::SeqCst);

        let err = pool.acquire().await.unwrap_err();
        assert_eq!(err.to_string(), "Resource creation failed: backend refused");
        assert_eq!(pool.status().live, 0);

        // The failure did not leak a capacity slot
        mgr.fail_creates.store(false, Ordering::SeqCst);
        let _g1 = pool.acquire().await.unwrap();
        let _g2 = pool.acquire().await.unwrap();
        assert_eq!(pool.status().in_use(), 2);
    }

    #[tokio::test]
    async fn test_failed_revalidation_discards_and_recreates() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(2), mgr.clone());

        let guard = pool.acquire().await.unwrap();
        let stale_id = PooledResource::id(&guard);
        drop(guard);

        mgr.reject_validation.store(true, Ordering::SeqCst);
        let replacement = pool.acquire().await.unwrap();
        assert_ne!(PooledResource::id(&replacement), stale_id);
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 1);
        assert_eq!(mgr.created.load(Ordering::SeqCst), 2);
        assert_eq!(pool.status().live, 1);
    }

    #[tokio::test]
    async fn test_take_detaches_resource() {
        let mgr = manager();
        let pool = Pool::new(PoolConfig::new(1), mgr.clone());

        let guard = pool.acquire().await.unwrap();
        let resource = PooledResource::take(guard);
        assert_eq!(resource, 1);

        // The slot is free again and the backend was not asked to close
        assert_eq!(pool.status().live, 0);
        assert_eq!(mgr.closed.load(Ordering::SeqCst), 0);
        let fresh = pool.acquire().await.unwrap();
        assert_eq!(*fresh, 2);
    }

    #[tokio::test]
    async fn test_metrics_track_reuse() {
        let pool = Pool::new(PoolConfig::new(1), manager());

        let guard = pool.acquire().await.unwrap();
        assert_eq!(PooledResource::metrics(&guard).recycle_count, 0);
        drop(guard);

        let guard = pool.acquire().await.unwrap();
        let metrics = PooledResource::metrics(&guard);
        assert_eq!(metrics.recycle_count, 1);
        assert!(metrics.last_acquired >= metrics.created);
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn test_zero_capacity_is_a_programming_error() {
        let _ = Pool::new(PoolConfig::new(0), manager());
    }
}
