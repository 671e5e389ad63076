//! Metrics collection and export for keyed pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
#[cfg(feature = "metrics")]
use tracing::warn;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use esox_keyedpool::PoolMetrics;
///
/// let metrics = PoolMetrics::default();
/// let exported = metrics.export();
/// assert_eq!(exported["constructions"], "0");
/// assert_eq!(exported["hit_ratio"], "0.00");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Lookups answered from the cache
    pub hits: usize,

    /// Lookups that had to go through construction
    pub misses: usize,

    /// Successful adaptor constructions
    pub constructions: usize,

    /// Failed or cancelled adaptor constructions
    pub construction_failures: usize,

    /// Callers that joined a construction already in flight
    pub coalesced_waits: usize,

    /// Health checks that failed on `get`
    pub health_check_failures: usize,

    /// Entries evicted by the idle sweep
    pub idle_evictions: usize,

    /// Entries evicted because their health check failed
    pub unhealthy_evictions: usize,

    /// Entries flushed at shutdown
    pub shutdown_evictions: usize,

    /// Adaptor release calls that reported an error
    pub release_failures: usize,

    /// Entries currently cached
    pub cached_entries: usize,

    /// Constructions currently in flight
    pub in_flight_constructions: usize,
}

impl PoolMetrics {
    /// Ratio of cache hits to lookups (0.0 to 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups > 0 {
            self.hits as f64 / lookups as f64
        } else {
            0.0
        }
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("hits".to_string(), self.hits.to_string());
        metrics.insert("misses".to_string(), self.misses.to_string());
        metrics.insert("constructions".to_string(), self.constructions.to_string());
        metrics.insert("construction_failures".to_string(), self.construction_failures.to_string());
        metrics.insert("coalesced_waits".to_string(), self.coalesced_waits.to_string());
        metrics.insert("health_check_failures".to_string(), self.health_check_failures.to_string());
        metrics.insert("idle_evictions".to_string(), self.idle_evictions.to_string());
        metrics.insert("unhealthy_evictions".to_string(), self.unhealthy_evictions.to_string());
        metrics.insert("shutdown_evictions".to_string(), self.shutdown_evictions.to_string());
        metrics.insert("release_failures".to_string(), self.release_failures.to_string());
        metrics.insert("cached_entries".to_string(), self.cached_entries.to_string());
        metrics.insert(
            "in_flight_constructions".to_string(),
            self.in_flight_constructions.to_string(),
        );
        metrics.insert("hit_ratio".to_string(), format!("{:.2}", self.hit_ratio()));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_keyedpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let metrics = PoolMetrics { hits: 3, cached_entries: 2, ..Default::default() };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&metrics, "grpc", Some(&tags));
    /// assert!(output.contains("keyedpool_entries_cached"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());
        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("keyedpool_entries_cached", "Entries currently cached", metrics.cached_entries),
            (
                "keyedpool_constructions_in_flight",
                "Constructions currently in flight",
                metrics.in_flight_constructions,
            ),
        ];
        for (name, help, value) in gauges {
            match IntGauge::with_opts(opts(name, help)) {
                Ok(gauge) => {
                    gauge.set(value as i64);
                    register(&registry, name, Box::new(gauge));
                }
                Err(err) => warn!(metric = name, error = %err, "failed to create metric"),
            }
        }

        let counters = [
            ("keyedpool_hits_total", "Lookups answered from the cache", metrics.hits),
            ("keyedpool_misses_total", "Lookups that required construction", metrics.misses),
            ("keyedpool_constructions_total", "Successful constructions", metrics.constructions),
            (
                "keyedpool_construction_failures_total",
                "Failed or cancelled constructions",
                metrics.construction_failures,
            ),
            (
                "keyedpool_coalesced_waits_total",
                "Callers that joined an in-flight construction",
                metrics.coalesced_waits,
            ),
            (
                "keyedpool_health_check_failures_total",
                "Failed health checks",
                metrics.health_check_failures,
            ),
            ("keyedpool_idle_evictions_total", "Entries evicted as idle", metrics.idle_evictions),
            (
                "keyedpool_unhealthy_evictions_total",
                "Entries evicted as unhealthy",
                metrics.unhealthy_evictions,
            ),
            (
                "keyedpool_shutdown_evictions_total",
                "Entries flushed at shutdown",
                metrics.shutdown_evictions,
            ),
            (
                "keyedpool_release_failures_total",
                "Release calls that reported an error",
                metrics.release_failures,
            ),
        ];
        for (name, help, value) in counters {
            match IntCounter::with_opts(opts(name, help)) {
                Ok(counter) => {
                    counter.inc_by(value as u64);
                    register(&registry, name, Box::new(counter));
                }
                Err(err) => warn!(metric = name, error = %err, "failed to create metric"),
            }
        }

        let mut buffer = Vec::new();
        if let Err(err) = TextEncoder::new().encode(&registry.gather(), &mut buffer) {
            warn!(pool = pool_name, error = %err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(feature = "metrics")]
fn register(
    registry: &prometheus::Registry,
    name: &str,
    metric: Box<dyn prometheus::core::Collector>,
) {
    if let Err(err) = registry.register(metric) {
        warn!(metric = name, error = %err, "failed to register metric");
    }
}

/// Internal metrics tracker
#[derive(Debug, Default)]
pub(crate) struct MetricsTracker {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
    pub constructions: AtomicUsize,
    pub construction_failures: AtomicUsize,
    pub coalesced_waits: AtomicUsize,
    pub health_check_failures: AtomicUsize,
    pub idle_evictions: AtomicUsize,
    pub unhealthy_evictions: AtomicUsize,
    pub shutdown_evictions: AtomicUsize,
    pub release_failures: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicUsize, n: usize) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get_metrics(&self, cached: usize, in_flight: usize) -> PoolMetrics {
        PoolMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            constructions: self.constructions.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
            coalesced_waits: self.coalesced_waits.load(Ordering::Relaxed),
            health_check_failures: self.health_check_failures.load(Ordering::Relaxed),
            idle_evictions: self.idle_evictions.load(Ordering::Relaxed),
            unhealthy_evictions: self.unhealthy_evictions.load(Ordering::Relaxed),
            shutdown_evictions: self.shutdown_evictions.load(Ordering::Relaxed),
            release_failures: self.release_failures.load(Ordering::Relaxed),
            cached_entries: cached,
            in_flight_constructions: in_flight,
        }
    }
}
