//! Background eviction of idle entries and the shutdown flush

use crate::adaptor::ResourceAdaptor;
use crate::errors::PoolError;
use crate::metrics::MetricsTracker;
use crate::pool::PoolInner;
use std::fmt;
use std::sync::Arc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvictionReason {
    Idle,
    Unhealthy,
    Invalidated,
    Shutdown,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::Idle => "idle",
            Self::Unhealthy => "unhealthy",
            Self::Invalidated => "invalidated",
            Self::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// Start the reaper task for a pool
pub(crate) fn spawn<A: ResourceAdaptor>(inner: Arc<PoolInner<A>>) {
    tokio::spawn(run(inner));
}

/// Fires `drained` when the reaper exits, including when it unwinds
struct DrainedOnExit(CancellationToken);

impl Drop for DrainedOnExit {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn run<A: ResourceAdaptor>(inner: Arc<PoolInner<A>>) {
    let _drained = DrainedOnExit(inner.drained.clone());

    let period = inner.config.effective_sweep_interval();
    let now = Instant::now();
    let first_tick = now.checked_add(period).unwrap_or(now);
    let mut ticker = tokio::time::interval_at(first_tick, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = inner.shutdown.cancelled() => break,
            _ = ticker.tick() => {
                inner.evict_idle().await;
            }
        }
    }

    let flushed = inner.flush().await;
    info!(flushed, "keyed pool closed");
}

impl<A: ResourceAdaptor> PoolInner<A> {
    /// Evict every entry idle beyond the configured timeout
    pub(crate) async fn evict_idle(&self) -> usize {
        let evicted = self.store.evict_idle(self.clock.now(), self.config.idle_timeout);
        if evicted.is_empty() {
            return 0;
        }

        debug!(count = evicted.len(), "evicting idle resources");
        self.release_all(evicted, EvictionReason::Idle).await
    }

    /// Seal the store and evict everything in it
    pub(crate) async fn flush(&self) -> usize {
        let evicted = self.store.seal_and_drain();
        self.release_all(evicted, EvictionReason::Shutdown).await
    }

    /// Hand evicted resources back to the adaptor.
    ///
    /// Must be called with no store lock held. Release failures are counted
    /// and logged per entry; they never stop the remaining releases.
    pub(crate) async fn release_all(
        &self,
        evicted: Vec<(String, Arc<A::Resource>)>,
        reason: EvictionReason,
    ) -> usize {
        let count = evicted.len();
        match reason {
            EvictionReason::Idle => {
                MetricsTracker::add(&self.metrics.idle_evictions, count);
            }
            EvictionReason::Unhealthy => {
                MetricsTracker::add(&self.metrics.unhealthy_evictions, count);
            }
            EvictionReason::Shutdown => {
                MetricsTracker::add(&self.metrics.shutdown_evictions, count);
            }
            EvictionReason::Invalidated => {}
        }

        for (key, resource) in evicted {
            debug!(key = %key, reason = %reason, "releasing resource");
            if let Err(err) = self.adaptor.release(resource).await {
                MetricsTracker::incr(&self.metrics.release_failures);
                let cause = err.to_string();
                let report = PoolError::release(&key, err);
                warn!(key = %key, reason = %reason, cause = %cause, "{report}");
            }
        }
        count
    }
}
