//! Basic usage examples for KeyedPool

use async_trait::async_trait;
use esox_keyedpool::{
    ConstructionCancellation, KeyedPool, ManualClock, PoolConfiguration, ResourceAdaptor,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pretend network session to some endpoint
struct Session {
    endpoint: String,
    serial: usize,
    open: AtomicBool,
}

#[derive(Default)]
struct SessionAdaptor {
    dialed: AtomicUsize,
}

#[async_trait]
impl ResourceAdaptor for SessionAdaptor {
    type Resource = Session;
    type Error = std::io::Error;

    async fn construct(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Session, std::io::Error> {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            _ = cancel.cancelled() => {
                return Err(std::io::Error::new(std::io::ErrorKind::Interrupted, "dial cancelled"));
            }
        }

        let serial = self.dialed.fetch_add(1, Ordering::SeqCst);
        Ok(Session {
            endpoint: key.to_string(),
            serial,
            open: AtomicBool::new(true),
        })
    }

    async fn health_check(&self, session: &Session) -> Result<(), std::io::Error> {
        if session.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "session closed"))
        }
    }

    async fn release(&self, session: Arc<Session>) -> Result<(), std::io::Error> {
        session.open.store(false, Ordering::SeqCst);
        println!("   Released session #{} to {}", session.serial, session.endpoint);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== EsoxSolutions.KeyedPool - Basic Examples ===\n");

    // Example 1: Coalesced construction
    coalesced_construction().await;

    // Example 2: Idle eviction
    idle_eviction().await;

    // Example 3: Unhealthy resources
    unhealthy_resource().await;

    // Example 4: Metrics
    metrics().await;
}

async fn coalesced_construction() {
    println!("1. Coalesced Construction:");
    let pool = Arc::new(KeyedPool::new(
        SessionAdaptor::default(),
        PoolConfiguration::new(Duration::from_secs(60)),
    ));

    let mut handles = vec![];
    for i in 0..10 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            let session = pool.get("db.internal:5432").await.unwrap();
            println!("   Task {} got session #{}", i, session.serial);
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    println!("   Dialed: {}", pool.adaptor().dialed.load(Ordering::SeqCst));
    pool.shutdown().await;
    println!();
}

async fn idle_eviction() {
    println!("2. Idle Eviction:");
    let clock = Arc::new(ManualClock::new());
    let pool = KeyedPool::with_clock(
        SessionAdaptor::default(),
        PoolConfiguration::new(Duration::from_secs(10)),
        Arc::clone(&clock),
    );

    for i in 0..3 {
        pool.get(&format!("replica-{}:9000", i)).await.unwrap();
    }
    println!("   Cached: {}", pool.len());

    clock.advance(Duration::from_secs(15));
    let evicted = pool.evict_idle().await;
    println!("   Evicted after 15s idle: {}", evicted);
    println!("   Cached: {}", pool.len());
    println!();
}

async fn unhealthy_resource() {
    println!("3. Unhealthy Resource:");
    let pool = KeyedPool::new(
        SessionAdaptor::default(),
        PoolConfiguration::new(Duration::from_secs(60))
            .with_cancellation(ConstructionCancellation::Detached),
    );

    let session = pool.get("cache:6379").await.unwrap();
    session.open.store(false, Ordering::SeqCst);

    match pool.get("cache:6379").await {
        Ok(_) => println!("   Unexpectedly healthy"),
        Err(e) => println!("   Error: {}", e),
    }

    let fresh = pool.get("cache:6379").await.unwrap();
    println!("   Reconnected with session #{}", fresh.serial);
    pool.shutdown().await;
    println!();
}

async fn metrics() {
    println!("4. Metrics:");
    let pool = KeyedPool::new(
        SessionAdaptor::default(),
        PoolConfiguration::new(Duration::from_secs(60)),
    );

    for _ in 0..5 {
        pool.get("api:443").await.unwrap();
    }

    let metrics = pool.metrics();
    println!("   Hits: {}", metrics.hits);
    println!("   Misses: {}", metrics.misses);
    println!("   Hit ratio: {:.2}", metrics.hit_ratio());
    println!("   Status: {:?}", pool.status());
    println!();
    println!(
        "{}",
        esox_keyedpool::MetricsExporter::export_prometheus(&metrics, "sessions", None)
    );
    pool.shutdown().await;
}
