//! Keyed cache storage

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached resource and the last time it was handed out
#[derive(Debug)]
struct Entry<T> {
    resource: Arc<T>,
    last_used: Mutex<Instant>,
}

impl<T> Entry<T> {
    fn new(resource: Arc<T>, now: Instant) -> Self {
        Self {
            resource,
            last_used: Mutex::new(now),
        }
    }

    fn touch(&self, now: Instant) {
        let mut last_used = self.last_used.lock();
        if now > *last_used {
            *last_used = now;
        }
    }

    fn is_idle(&self, cutoff: Instant) -> bool {
        *self.last_used.lock() < cutoff
    }
}

#[derive(Debug)]
struct StoreState<T> {
    entries: HashMap<String, Entry<T>>,
    sealed: bool,
}

/// Outcome of [`KeyedStore::install`]
#[derive(Debug)]
pub(crate) enum Install<T> {
    /// Cached; a resource previously held under the key is handed back
    Installed { displaced: Option<Arc<T>> },
    /// The store was sealed; ownership of the resource goes back to the caller
    Sealed(Arc<T>),
}

/// Map from key to resource, guarded by a read/write lock.
///
/// Reads share the lock. Installs and removals take it exclusively. A key is
/// either mapped, with its timestamp living in the same entry, or absent.
/// Nothing here ever calls back into an adaptor, so the lock is never held
/// across a release.
#[derive(Debug)]
pub(crate) struct KeyedStore<T> {
    state: RwLock<StoreState<T>>,
}

impl<T> KeyedStore<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState {
                entries: HashMap::new(),
                sealed: false,
            }),
        }
    }

    /// Look up a cached resource, refreshing its last-used time on a hit
    pub fn lookup(&self, key: &str, now: Instant) -> Option<Arc<T>> {
        let state = self.state.read();
        let entry = state.entries.get(key)?;
        entry.touch(now);
        Some(Arc::clone(&entry.resource))
    }

    /// Cache `resource` under `key`, unless the store has been sealed
    pub fn install(&self, key: &str, resource: Arc<T>, now: Instant) -> Install<T> {
        let mut state = self.state.write();
        if state.sealed {
            return Install::Sealed(resource);
        }

        let displaced = state
            .entries
            .insert(key.to_owned(), Entry::new(resource, now))
            .map(|old| old.resource);
        Install::Installed { displaced }
    }

    /// Remove the entry for `key`
    pub fn remove(&self, key: &str) -> Option<Arc<T>> {
        self.state.write().entries.remove(key).map(|entry| entry.resource)
    }

    /// Remove the entry for `key` only if it still holds `resource`
    pub fn remove_if_same(&self, key: &str, resource: &Arc<T>) -> Option<Arc<T>> {
        let mut state = self.state.write();
        match state.entries.get(key) {
            Some(entry) if Arc::ptr_eq(&entry.resource, resource) => {
                state.entries.remove(key).map(|entry| entry.resource)
            }
            _ => None,
        }
    }

    /// Remove every entry unused for longer than `idle_timeout`
    pub fn evict_idle(&self, now: Instant, idle_timeout: Duration) -> Vec<(String, Arc<T>)> {
        let Some(cutoff) = now.checked_sub(idle_timeout) else {
            return Vec::new();
        };

        let mut state = self.state.write();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_idle(cutoff))
            .map(|(key, _)| key.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|key| {
                let entry = state.entries.remove(&key)?;
                Some((key, entry.resource))
            })
            .collect()
    }

    /// Seal the store against further installs and take every entry out
    pub fn seal_and_drain(&self) -> Vec<(String, Arc<T>)> {
        let mut state = self.state.write();
        state.sealed = true;
        state
            .entries
            .drain()
            .map(|(key, entry)| (key, entry.resource))
            .collect()
    }

    pub fn seal(&self) {
        self.state.write().sealed = true;
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }
}

impl<T> Default for KeyedStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
