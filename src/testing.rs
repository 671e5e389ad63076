//! Test doubles shared by the unit tests

use crate::adaptor::ResourceAdaptor;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A fake connection. `id` is unique per construction.
#[derive(Debug)]
pub(crate) struct FakeConn {
    pub key: String,
    pub id: usize,
}

/// Call counters and failure switches, shared with the test body
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub construct_calls: AtomicUsize,
    pub health_checks: AtomicUsize,
    pub released: AtomicUsize,
    pub fail_construct: AtomicBool,
    pub fail_health: AtomicBool,
    pub fail_release: AtomicBool,
    pub released_keys: Mutex<Vec<String>>,
}

impl Counters {
    pub fn construct_calls(&self) -> usize {
        self.construct_calls.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

pub(crate) struct CountingAdaptor {
    pub counters: Arc<Counters>,
    construct_delay: Duration,
}

impl CountingAdaptor {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(construct_delay: Duration) -> Self {
        Self {
            counters: Arc::new(Counters::default()),
            construct_delay,
        }
    }
}

#[async_trait]
impl ResourceAdaptor for CountingAdaptor {
    type Resource = FakeConn;
    type Error = std::io::Error;

    async fn construct(
        &self,
        key: &str,
        _cancel: &CancellationToken,
    ) -> Result<FakeConn, std::io::Error> {
        let id = self.counters.construct_calls.fetch_add(1, Ordering::SeqCst);
        if !self.construct_delay.is_zero() {
            tokio::time::sleep(self.construct_delay).await;
        }

        if self.counters.fail_construct.load(Ordering::SeqCst) {
            return Err(std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "dial failed"));
        }

        Ok(FakeConn {
            key: key.to_string(),
            id,
        })
    }

    async fn health_check(&self, _conn: &FakeConn) -> Result<(), std::io::Error> {
        self.counters.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.counters.fail_health.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("connection closed"));
        }
        Ok(())
    }

    async fn release(&self, conn: Arc<FakeConn>) -> Result<(), std::io::Error> {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.released_keys.lock().push(conn.key.clone());
        if self.counters.fail_release.load(Ordering::SeqCst) {
            return Err(std::io::Error::other("close failed"));
        }
        Ok(())
    }
}
