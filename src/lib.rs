//! # EsoxSolutions.KeyedPool
//!
//! Keyed resource pool for Rust: lazily constructs expensive resources such
//! as network connections, caches them by key, validates them on every use
//! and evicts idle or unhealthy entries in the background.
//!
//! ## Features
//!
//! - One construction per key, no matter how many callers ask at once
//! - Health check on every `get`; unhealthy resources are evicted
//! - Background idle reaper with a full flush on shutdown
//! - Configurable cancellation of shared constructions
//! - Injectable clock for deterministic tests
//! - Metrics with Prometheus export
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use esox_keyedpool::{KeyedPool, PoolConfiguration, ResourceAdaptor};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! struct Channel {
//!     target: String,
//! }
//!
//! struct ChannelAdaptor;
//!
//! #[async_trait]
//! impl ResourceAdaptor for ChannelAdaptor {
//!     type Resource = Channel;
//!     type Error = std::io::Error;
//!
//!     async fn construct(
//!         &self,
//!         key: &str,
//!         _: &CancellationToken,
//!     ) -> Result<Channel, std::io::Error> {
//!         Ok(Channel { target: key.to_string() })
//!     }
//!
//!     async fn health_check(&self, _: &Channel) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//!
//!     async fn release(&self, _: Arc<Channel>) -> Result<(), std::io::Error> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let pool = KeyedPool::new(ChannelAdaptor, PoolConfiguration::new(Duration::from_secs(300)));
//! let channel = pool.get("10.0.0.1:443").await.unwrap();
//! println!("Got: {}", channel.target);
//! pool.close();
//! # });
//! ```

mod adaptor;
mod clock;
mod config;
mod errors;
mod flight;
mod metrics;
mod pool;
mod reaper;
mod state;
mod store;

#[cfg(test)]
mod testing;

pub use adaptor::ResourceAdaptor;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConstructionCancellation, PoolConfiguration};
pub use errors::{BoxError, PoolError, PoolResult};
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::KeyedPool;
pub use state::{PoolState, PoolStatus};
