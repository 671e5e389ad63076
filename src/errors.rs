//! Error types for the keyed pool

use std::sync::Arc;
use thiserror::Error;

/// Type-erased adaptor error.
///
/// Shared behind an `Arc` so a single construction failure can be handed to
/// every caller that was waiting on it.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Failed to construct resource for key `{key}`")]
    ConstructionFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Health check failed for key `{key}`")]
    HealthCheckFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// Only ever reported through logs and metrics, never returned from `get`.
    #[error("Failed to release resource for key `{key}`")]
    ReleaseFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Construction for key `{key}` was cancelled")]
    Cancelled { key: String },

    #[error("Pool is closed")]
    Closed,
}

impl PoolError {
    pub(crate) fn construction<E>(key: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConstructionFailed {
            key: key.to_owned(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn health_check<E>(key: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::HealthCheckFailed {
            key: key.to_owned(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn release<E>(key: &str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ReleaseFailed {
            key: key.to_owned(),
            source: Arc::new(err),
        }
    }

    pub(crate) fn cancelled(key: &str) -> Self {
        Self::Cancelled { key: key.to_owned() }
    }

    /// The key this error relates to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::ConstructionFailed { key, .. }
            | Self::HealthCheckFailed { key, .. }
            | Self::ReleaseFailed { key, .. }
            | Self::Cancelled { key } => Some(key),
            Self::Closed => None,
        }
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
