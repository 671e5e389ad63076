//! Keyed pool implementation

use crate::adaptor::ResourceAdaptor;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConstructionCancellation, PoolConfiguration};
use crate::errors::{PoolError, PoolResult};
use crate::flight::{FlightGroup, Role};
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::reaper::{self, EvictionReason};
use crate::state::{PoolState, PoolStatus};
use crate::store::{Install, KeyedStore};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// State shared between the pool handle, construction tasks and the reaper
pub(crate) struct PoolInner<A: ResourceAdaptor> {
    pub adaptor: A,
    pub config: PoolConfiguration,
    pub clock: Arc<dyn Clock>,
    pub store: KeyedStore<A::Resource>,
    pub flights: FlightGroup<A::Resource>,
    pub metrics: MetricsTracker,
    /// Fired once by `close`; stops the reaper and detached constructions
    pub shutdown: CancellationToken,
    /// Fired once the terminal flush has released everything
    pub drained: CancellationToken,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<A: ResourceAdaptor> PoolInner<A> {
    /// Leader side of a coalesced construction: re-check the cache, build,
    /// then install.
    async fn construct_and_install(
        self: Arc<Self>,
        key: String,
        cancel: CancellationToken,
    ) -> PoolResult<Arc<A::Resource>> {
        // Someone may have installed the key between our miss and winning the flight.
        if let Some(existing) = self.store.lookup(&key, self.clock.now()) {
            return Ok(existing);
        }

        debug!(key = %key, "constructing resource");
        let constructed = tokio::select! {
            result = self.adaptor.construct(&key, &cancel) => result,
            _ = cancel.cancelled() => {
                MetricsTracker::incr(&self.metrics.construction_failures);
                debug!(key = %key, "construction cancelled");
                return Err(PoolError::cancelled(&key));
            }
        };

        let resource = match constructed {
            Ok(resource) => Arc::new(resource),
            Err(err) => {
                MetricsTracker::incr(&self.metrics.construction_failures);
                debug!(key = %key, error = %err, "construction failed");
                return Err(PoolError::construction(&key, err));
            }
        };
        MetricsTracker::incr(&self.metrics.constructions);

        match self.store.install(&key, Arc::clone(&resource), self.clock.now()) {
            Install::Installed { displaced } => {
                // Only the flight leader installs, after a miss, so `displaced`
                // is normally empty.
                if let Some(previous) = displaced {
                    debug!(key = %key, "installed over an existing entry, releasing it");
                    self.release_all(vec![(key, previous)], EvictionReason::Invalidated)
                        .await;
                }
                Ok(resource)
            }
            Install::Sealed(orphan) => {
                debug!(key = %key, "pool closed during construction, releasing");
                self.release_all(vec![(key, orphan)], EvictionReason::Shutdown).await;
                Err(PoolError::Closed)
            }
        }
    }
}

/// A keyed pool of lazily constructed, shared resources
///
/// Resources are built on first request through the [`ResourceAdaptor`],
/// cached under their key, health-checked on every [`get`](Self::get) and
/// released once idle for longer than the configured timeout. Concurrent
/// requests for a key that is not cached yet share a single construction.
///
/// Once closed the pool refuses new requests with [`PoolError::Closed`].
/// Dropping the pool closes it.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_keyedpool::{KeyedPool, PoolConfiguration, ResourceAdaptor};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// struct Upper;
///
/// #[async_trait]
/// impl ResourceAdaptor for Upper {
///     type Resource = String;
///     type Error = std::io::Error;
///
///     async fn construct(
///         &self,
///         key: &str,
///         _: &CancellationToken,
///     ) -> Result<String, std::io::Error> {
///         Ok(key.to_uppercase())
///     }
///
///     async fn health_check(&self, _: &String) -> Result<(), std::io::Error> {
///         Ok(())
///     }
///
///     async fn release(&self, _: Arc<String>) -> Result<(), std::io::Error> {
///         Ok(())
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let pool = KeyedPool::new(Upper, PoolConfiguration::new(Duration::from_secs(60)));
///
/// let first = pool.get("svc-a").await.unwrap();
/// let again = pool.get("svc-a").await.unwrap();
/// assert_eq!(*first, "SVC-A");
/// assert!(Arc::ptr_eq(&first, &again));
///
/// pool.shutdown().await;
/// assert!(pool.is_empty());
/// # });
/// ```
pub struct KeyedPool<A: ResourceAdaptor> {
    inner: Arc<PoolInner<A>>,
}

impl<A: ResourceAdaptor> KeyedPool<A> {
    /// Create a new pool using the system clock
    pub fn new(adaptor: A, config: PoolConfiguration) -> Self {
        Self::with_clock(adaptor, config, SystemClock)
    }

    /// Create a new pool reading time from `clock`
    pub fn with_clock<C: Clock>(adaptor: A, config: PoolConfiguration, clock: C) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                adaptor,
                config,
                clock: Arc::new(clock),
                store: KeyedStore::new(),
                flights: FlightGroup::new(),
                metrics: MetricsTracker::new(),
                shutdown: CancellationToken::new(),
                drained: CancellationToken::new(),
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the resource for `key`, constructing it if needed
    pub async fn get(&self, key: &str) -> PoolResult<Arc<A::Resource>> {
        self.get_with_cancellation(key, &CancellationToken::new()).await
    }

    /// Get the resource for `key`, giving up when `cancel` fires.
    ///
    /// With [`ConstructionCancellation::Caller`], if this call starts the
    /// construction then `cancel` is forwarded to the adaptor and cancelling
    /// it fails the construction for every caller waiting on `key`.
    pub async fn get_with_cancellation(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> PoolResult<Arc<A::Resource>> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }
        self.ensure_reaper();

        let resource = match self.inner.store.lookup(key, self.inner.clock.now()) {
            Some(resource) => {
                MetricsTracker::incr(&self.inner.metrics.hits);
                resource
            }
            None => {
                MetricsTracker::incr(&self.inner.metrics.misses);
                self.construct_coalesced(key, cancel).await?
            }
        };

        if let Err(err) = self.inner.adaptor.health_check(&resource).await {
            MetricsTracker::incr(&self.inner.metrics.health_check_failures);
            warn!(key = %key, error = %err, "health check failed, evicting resource");

            if let Some(evicted) = self.inner.store.remove_if_same(key, &resource) {
                drop(resource);
                self.inner
                    .release_all(vec![(key.to_owned(), evicted)], EvictionReason::Unhealthy)
                    .await;
            }
            return Err(PoolError::health_check(key, err));
        }

        Ok(resource)
    }

    async fn construct_coalesced(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> PoolResult<Arc<A::Resource>> {
        let (flight, role) = self.inner.flights.join(key, || {
            let token = match self.inner.config.cancellation {
                ConstructionCancellation::Caller => cancel.clone(),
                ConstructionCancellation::Detached => self.inner.shutdown.child_token(),
            };
            Arc::clone(&self.inner).construct_and_install(key.to_owned(), token)
        });

        if role == Role::Follower {
            MetricsTracker::incr(&self.inner.metrics.coalesced_waits);
            debug!(key = %key, "waiting on in-flight construction");
        }

        tokio::select! {
            outcome = flight => outcome,
            _ = cancel.cancelled() => Err(PoolError::cancelled(key)),
        }
    }

    fn ensure_reaper(&self) {
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("starting idle reaper");
            reaper::spawn(Arc::clone(&self.inner));
        }
    }

    /// Close the pool.
    ///
    /// Signals the reaper to flush every entry and returns without waiting
    /// for it. Only the first call has any effect; it returns `true`.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        info!("closing keyed pool");
        self.inner.store.seal();
        self.inner.shutdown.cancel();

        // Claim the start gate so no reaper can start after this point. If we
        // win it no reaper ever ran and nothing was ever installed.
        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.inner.drained.cancel();
        }
        true
    }

    /// Close the pool and wait until every cached resource has been released
    pub async fn shutdown(&self) {
        self.close();
        self.inner.drained.cancelled().await;
    }

    /// Run one idle sweep now, returning the number of evicted entries
    pub async fn evict_idle(&self) -> usize {
        self.inner.evict_idle().await
    }

    /// Evict and release the entry for `key`, if cached
    pub async fn invalidate(&self, key: &str) -> bool {
        match self.inner.store.remove(key) {
            Some(resource) => {
                self.inner
                    .release_all(vec![(key.to_owned(), resource)], EvictionReason::Invalidated)
                    .await;
                true
            }
            None => false,
        }
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is currently cached
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.store.contains_key(key)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Lifecycle state of the pool
    pub fn state(&self) -> PoolState {
        if self.is_closed() {
            PoolState::Closed
        } else if self.inner.started.load(Ordering::Acquire) {
            PoolState::Running
        } else {
            PoolState::Uninitialized
        }
    }

    /// Snapshot of state and occupancy
    pub fn status(&self) -> PoolStatus {
        PoolStatus::new(
            self.state(),
            self.len(),
            self.inner.flights.in_flight(),
            self.inner.drained.is_cancelled(),
        )
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.inner
            .metrics
            .get_metrics(self.len(), self.inner.flights.in_flight())
    }

    /// The adaptor this pool builds resources with
    pub fn adaptor(&self) -> &A {
        &self.inner.adaptor
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.inner.config
    }
}

impl<A: ResourceAdaptor> Drop for KeyedPool<A> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{Counters, CountingAdaptor};
    use std::time::Duration;

    fn config() -> PoolConfiguration {
        PoolConfiguration::new(Duration::from_secs(10))
    }

    fn pool_with(
        adaptor: CountingAdaptor,
        config: PoolConfiguration,
    ) -> (Arc<KeyedPool<CountingAdaptor>>, Arc<Counters>) {
        let counters = Arc::clone(&adaptor.counters);
        (Arc::new(KeyedPool::new(adaptor, config)), counters)
    }

    #[tokio::test]
    async fn test_cached_get_returns_same_instance() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());

        let a = pool.get("k").await.unwrap();
        let b = pool.get("k").await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(counters.construct_calls(), 1);
        assert_eq!(counters.health_checks.load(Ordering::SeqCst), 2);

        let metrics = pool.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.constructions, 1);
        assert_eq!(metrics.cached_entries, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gets_construct_once() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(50));
        let (pool, counters) = pool_with(adaptor, config());

        let mut handles = vec![];
        for _ in 0..32 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move { pool.get("shared").await }));
        }

        let mut resources = vec![];
        for handle in handles {
            resources.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(counters.construct_calls(), 1);
        assert!(resources.iter().all(|r| Arc::ptr_eq(r, &resources[0])));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.status().in_flight_constructions, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_construct_independently() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(20));
        let (pool, counters) = pool_with(adaptor, config());

        let mut handles = vec![];
        for i in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move { pool.get(&i.to_string()).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(counters.construct_calls(), 8);
        assert_eq!(pool.len(), 8);
    }

    #[tokio::test]
    async fn test_construction_error_is_not_cached() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        Counters::set(&counters.fail_construct, true);

        match pool.get("k").await {
            Err(PoolError::ConstructionFailed { key, .. }) => assert_eq!(key, "k"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!pool.contains_key("k"));

        Counters::set(&counters.fail_construct, false);
        let conn = pool.get("k").await.unwrap();

        assert_eq!(conn.key, "k");
        assert_eq!(counters.construct_calls(), 2);
        assert_eq!(pool.metrics().construction_failures, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_coalesced_waiters_share_the_error() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(50));
        let (pool, counters) = pool_with(adaptor, config());
        Counters::set(&counters.fail_construct, true);

        let mut handles = vec![];
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move { pool.get("k").await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            assert!(matches!(err, PoolError::ConstructionFailed { .. }));
        }

        assert_eq!(counters.construct_calls(), 1);
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_failed_health_check_evicts() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        let first = pool.get("k").await.unwrap();

        Counters::set(&counters.fail_health, true);
        match pool.get("k").await {
            Err(PoolError::HealthCheckFailed { key, .. }) => assert_eq!(key, "k"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!pool.contains_key("k"));
        assert_eq!(counters.released(), 1);

        Counters::set(&counters.fail_health, false);
        let second = pool.get("k").await.unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(counters.construct_calls(), 2);

        let metrics = pool.metrics();
        assert_eq!(metrics.health_check_failures, 1);
        assert_eq!(metrics.unhealthy_evictions, 1);
    }

    #[tokio::test]
    async fn test_unhealthy_fresh_resource_is_not_kept() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        Counters::set(&counters.fail_health, true);

        assert!(matches!(pool.get("k").await, Err(PoolError::HealthCheckFailed { .. })));
        assert!(pool.is_empty());
        assert_eq!(counters.released(), 1);
    }

    #[tokio::test]
    async fn test_idle_entry_is_evicted_and_released_once() {
        let adaptor = CountingAdaptor::new();
        let counters = Arc::clone(&adaptor.counters);
        let clock = Arc::new(ManualClock::new());
        let pool = KeyedPool::with_clock(adaptor, config(), Arc::clone(&clock));

        pool.get("k").await.unwrap();
        clock.advance(Duration::from_secs(11));

        assert_eq!(pool.evict_idle().await, 1);
        assert!(!pool.contains_key("k"));
        assert_eq!(counters.released(), 1);

        assert_eq!(pool.evict_idle().await, 0);
        assert_eq!(counters.released(), 1);
    }

    #[tokio::test]
    async fn test_recent_use_keeps_entry_alive() {
        let clock = Arc::new(ManualClock::new());
        let pool = KeyedPool::with_clock(CountingAdaptor::new(), config(), Arc::clone(&clock));

        pool.get("k").await.unwrap();
        clock.advance(Duration::from_secs(8));
        pool.get("k").await.unwrap();
        clock.advance(Duration::from_secs(8));

        assert_eq!(pool.evict_idle().await, 0);
        assert!(pool.contains_key("k"));
    }

    #[tokio::test]
    async fn test_ten_keys_expire_together() {
        let adaptor = CountingAdaptor::new();
        let counters = Arc::clone(&adaptor.counters);
        let clock = Arc::new(ManualClock::new());
        let pool = KeyedPool::with_clock(adaptor, config(), Arc::clone(&clock));

        for i in 0..10 {
            let conn = pool.get(&i.to_string()).await.unwrap();
            assert_eq!(conn.key, i.to_string());
        }
        assert_eq!(pool.len(), 10);

        clock.advance(Duration::from_secs(15));
        assert_eq!(pool.evict_idle().await, 10);

        assert_eq!(pool.len(), 0);
        assert_eq!(counters.released(), 10);
        let mut released = counters.released_keys.lock().clone();
        released.sort_by_key(|key| key.parse::<u32>().unwrap());
        let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(released, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_close_signals_once() {
        let (pool, _) = pool_with(CountingAdaptor::new(), config());
        pool.get("k").await.unwrap();

        let mut handles = vec![];
        for _ in 0..16 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move { pool.close() }));
        }

        let mut initiated = 0;
        for handle in handles {
            if handle.await.unwrap() {
                initiated += 1;
            }
        }

        assert_eq!(initiated, 1);
        assert_eq!(pool.state(), PoolState::Closed);
        assert!(!pool.close());
    }

    #[tokio::test]
    async fn test_get_after_close_is_rejected() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        pool.get("k").await.unwrap();
        pool.close();

        assert!(matches!(pool.get("k").await, Err(PoolError::Closed)));
        assert!(matches!(pool.get("other").await, Err(PoolError::Closed)));
        assert_eq!(counters.construct_calls(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_everything() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        for key in ["a", "b", "c"] {
            pool.get(key).await.unwrap();
        }

        pool.shutdown().await;

        assert!(pool.is_empty());
        assert_eq!(counters.released(), 3);
        assert!(pool.status().drained);
        assert_eq!(pool.metrics().shutdown_evictions, 3);
    }

    #[tokio::test]
    async fn test_shutdown_of_unused_pool_returns() {
        let (pool, _) = pool_with(CountingAdaptor::new(), config());
        pool.shutdown().await;
        assert_eq!(pool.state(), PoolState::Closed);
    }

    #[tokio::test]
    async fn test_construction_finishing_after_close_is_released() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(100));
        let (pool, counters) = pool_with(adaptor, config());

        let getter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get("late").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.close();

        assert!(matches!(getter.await.unwrap(), Err(PoolError::Closed)));
        assert!(pool.is_empty());
        assert_eq!(counters.released(), 1);
    }

    #[tokio::test]
    async fn test_caller_cancellation_fails_all_waiters() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_secs(30));
        let (pool, counters) = pool_with(adaptor, config());
        let leader_token = CancellationToken::new();

        let leader = {
            let pool = Arc::clone(&pool);
            let token = leader_token.clone();
            tokio::spawn(async move { pool.get_with_cancellation("k", &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader_token.cancel();

        assert!(matches!(leader.await.unwrap(), Err(PoolError::Cancelled { .. })));
        assert!(matches!(follower.await.unwrap(), Err(PoolError::Cancelled { .. })));
        assert_eq!(counters.construct_calls(), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.metrics().coalesced_waits, 1);
    }

    #[tokio::test]
    async fn test_detached_construction_survives_caller_cancellation() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(100));
        let config = config().with_cancellation(ConstructionCancellation::Detached);
        let (pool, counters) = pool_with(adaptor, config);
        let leader_token = CancellationToken::new();

        let leader = {
            let pool = Arc::clone(&pool);
            let token = leader_token.clone();
            tokio::spawn(async move { pool.get_with_cancellation("k", &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader_token.cancel();

        assert!(matches!(leader.await.unwrap(), Err(PoolError::Cancelled { .. })));
        let conn = follower.await.unwrap().unwrap();
        assert_eq!(conn.key, "k");
        assert_eq!(counters.construct_calls(), 1);
        assert!(pool.contains_key("k"));
    }

    #[tokio::test]
    async fn test_follower_cancellation_only_ends_its_own_wait() {
        let adaptor = CountingAdaptor::with_delay(Duration::from_millis(100));
        let (pool, counters) = pool_with(adaptor, config());
        let follower_token = CancellationToken::new();

        let leader = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.get("k").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let follower = {
            let pool = Arc::clone(&pool);
            let token = follower_token.clone();
            tokio::spawn(async move { pool.get_with_cancellation("k", &token).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        follower_token.cancel();

        assert!(matches!(follower.await.unwrap(), Err(PoolError::Cancelled { .. })));
        let conn = leader.await.unwrap().unwrap();
        assert_eq!(conn.key, "k");
        assert_eq!(counters.construct_calls(), 1);
        assert!(pool.contains_key("k"));
    }

    #[tokio::test]
    async fn test_invalidate_releases_entry() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        pool.get("k").await.unwrap();

        assert!(pool.invalidate("k").await);
        assert!(!pool.invalidate("k").await);
        assert!(!pool.contains_key("k"));
        assert_eq!(counters.released(), 1);
    }

    #[tokio::test]
    async fn test_release_failure_is_not_surfaced() {
        let (pool, counters) = pool_with(CountingAdaptor::new(), config());
        Counters::set(&counters.fail_release, true);
        pool.get("k").await.unwrap();

        assert!(pool.invalidate("k").await);
        assert!(!pool.contains_key("k"));
        assert_eq!(pool.metrics().release_failures, 1);

        pool.get("k").await.unwrap();
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (pool, _) = pool_with(CountingAdaptor::new(), config());
        assert_eq!(pool.state(), PoolState::Uninitialized);

        pool.get("k").await.unwrap();
        assert_eq!(pool.state(), PoolState::Running);

        pool.close();
        assert_eq!(pool.state(), PoolState::Closed);
    }

    #[tokio::test]
    async fn test_dropping_the_pool_flushes() {
        let adaptor = CountingAdaptor::new();
        let counters = Arc::clone(&adaptor.counters);
        let pool = KeyedPool::new(adaptor, config());
        pool.get("a").await.unwrap();
        pool.get("b").await.unwrap();

        drop(pool);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(counters.released(), 2);
    }
}
