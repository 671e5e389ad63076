//! Lifecycle state of a keyed pool

use std::fmt;

/// Lifecycle of a pool
///
/// `Uninitialized` until the first `get` starts the idle reaper, `Running`
/// from then on, `Closed` after the first `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub enum PoolState {
    Uninitialized,
    Running,
    Closed,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(state)
    }
}

/// Point-in-time status of a pool
///
/// # Examples
///
/// ```
/// use esox_keyedpool::{PoolState, PoolStatus};
///
/// let status = PoolStatus::new(PoolState::Running, 4, 1, false);
/// assert!(status.is_accepting());
/// assert_eq!(status.cached_entries, 4);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "metrics", derive(serde::Serialize))]
pub struct PoolStatus {
    /// Current lifecycle state
    pub state: PoolState,

    /// Entries currently cached
    pub cached_entries: usize,

    /// Constructions currently in flight
    pub in_flight_constructions: usize,

    /// Whether the shutdown flush has completed
    pub drained: bool,
}

impl PoolStatus {
    pub fn new(state: PoolState, cached: usize, in_flight: usize, drained: bool) -> Self {
        Self {
            state,
            cached_entries: cached,
            in_flight_constructions: in_flight,
            drained,
        }
    }

    /// Whether the pool still serves `get`
    pub fn is_accepting(&self) -> bool {
        self.state != PoolState::Closed
    }
}
