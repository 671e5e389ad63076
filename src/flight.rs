//! Coalescing of concurrent constructions for the same key

use crate::errors::{PoolError, PoolResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;

/// The shared outcome of one construction
pub(crate) type Flight<T> = Shared<BoxFuture<'static, PoolResult<Arc<T>>>>;

/// Whether a caller started a construction or joined one already running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Role {
    Leader,
    Follower,
}

/// At most one in-flight construction per key.
///
/// The first caller for a key spawns the construction as its own task, so it
/// runs to completion even if that caller goes away. Everybody asking for the
/// key while it runs awaits the same [`Flight`] and sees the same value or the
/// same error. The task unregisters the flight once it has finished, so a
/// failure is never remembered.
pub(crate) struct FlightGroup<T> {
    flights: Arc<DashMap<String, Flight<T>>>,
}

impl<T: Send + Sync + 'static> FlightGroup<T> {
    pub fn new() -> Self {
        Self {
            flights: Arc::new(DashMap::new()),
        }
    }

    /// Join the flight for `key`, starting one with `make` if none is running.
    ///
    /// `make` is only called by the leader. The future it returns must perform
    /// the second cache check and install the result before resolving.
    pub fn join<F, Fut>(&self, key: &str, make: F) -> (Flight<T>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PoolResult<Arc<T>>> + Send + 'static,
    {
        match self.flights.entry(key.to_owned()) {
            Entry::Occupied(entry) => (entry.get().clone(), Role::Follower),
            Entry::Vacant(entry) => {
                let flights = Arc::clone(&self.flights);
                let owned_key = key.to_owned();
                let construction = make();

                let handle = tokio::spawn(async move {
                    let _unregister = Unregister {
                        flights,
                        key: owned_key,
                    };
                    construction.await
                });

                let failed_key = key.to_owned();
                let flight = async move {
                    match handle.await {
                        Ok(outcome) => outcome,
                        Err(join_error) => Err(PoolError::construction(
                            &failed_key,
                            std::io::Error::other(join_error.to_string()),
                        )),
                    }
                }
                .boxed()
                .shared();

                entry.insert(flight.clone());
                (flight, Role::Leader)
            }
        }
    }

    /// Number of constructions currently running
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}

/// Drops the flight registration when the construction task ends, including
/// when it unwinds.
struct Unregister<T> {
    flights: Arc<DashMap<String, Flight<T>>>,
    key: String,
}

impl<T> Drop for Unregister<T> {
    fn drop(&mut self) {
        self.flights.remove(&self.key);
    }
}

impl<T: Send + Sync + 'static> Default for FlightGroup<T> {
    fn default() -> Self {
        Self::new()
    }
}
