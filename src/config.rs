//! Pool configuration options

use std::time::Duration;

/// How a coalesced construction reacts to cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstructionCancellation {
    /// The token of the caller that started the construction is forwarded to
    /// the adaptor. Cancelling it fails the construction for every caller
    /// waiting on the same key.
    #[default]
    Caller,

    /// The construction runs under a pool-owned token and is only cancelled
    /// by pool shutdown. A caller cancelling stops its own wait, nobody else's.
    Detached,
}

/// Configuration for keyed pool behavior
///
/// # Examples
///
/// ```
/// use esox_keyedpool::{ConstructionCancellation, PoolConfiguration};
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new(Duration::from_secs(300))
///     .with_sweep_interval(Duration::from_secs(30))
///     .with_cancellation(ConstructionCancellation::Detached);
///
/// assert_eq!(config.idle_timeout, Duration::from_secs(300));
/// assert_eq!(config.sweep_interval, Duration::from_secs(30));
/// ```
#[derive(Debug, Clone)]
pub struct PoolConfiguration {
    /// Entries unused for longer than this are evicted by the reaper
    pub idle_timeout: Duration,

    /// Period of the background idle sweep. Values outside
    /// [`MIN_SWEEP_INTERVAL`](Self::MIN_SWEEP_INTERVAL) to
    /// [`MAX_SWEEP_INTERVAL`](Self::MAX_SWEEP_INTERVAL) are clamped.
    pub sweep_interval: Duration,

    /// Cancellation policy for coalesced constructions
    pub cancellation: ConstructionCancellation,
}

impl PoolConfiguration {
    /// Default period of the background idle sweep
    pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

    /// Shortest sweep period the reaper runs with
    pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

    /// Longest sweep period the reaper runs with
    pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

    /// Create a configuration evicting entries idle for longer than `idle_timeout`
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            idle_timeout,
            sweep_interval: Self::DEFAULT_SWEEP_INTERVAL,
            cancellation: ConstructionCancellation::default(),
        }
    }

    /// Set the reaper period, clamped to the supported range
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self.sweep_interval = self.effective_sweep_interval();
        self
    }

    /// The sweep period the reaper actually uses
    pub fn effective_sweep_interval(&self) -> Duration {
        self.sweep_interval.clamp(Self::MIN_SWEEP_INTERVAL, Self::MAX_SWEEP_INTERVAL)
    }

    /// Set the cancellation policy for coalesced constructions
    pub fn with_cancellation(mut self, policy: ConstructionCancellation) -> Self {
        self.cancellation = policy;
        self
    }
}
