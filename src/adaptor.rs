//! The capability contract a resource kind plugs into the pool

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Construction, health-check and teardown logic for one kind of resource
///
/// The pool never looks inside a resource. Everything it knows about the
/// resource comes from these three operations.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use esox_keyedpool::ResourceAdaptor;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// struct Connection {
///     target: String,
/// }
///
/// struct ConnectionAdaptor;
///
/// #[async_trait]
/// impl ResourceAdaptor for ConnectionAdaptor {
///     type Resource = Connection;
///     type Error = std::io::Error;
///
///     async fn construct(
///         &self,
///         key: &str,
///         _cancel: &CancellationToken,
///     ) -> Result<Connection, std::io::Error> {
///         Ok(Connection { target: key.to_string() })
///     }
///
///     async fn health_check(&self, _conn: &Connection) -> Result<(), std::io::Error> {
///         Ok(())
///     }
///
///     async fn release(&self, _conn: Arc<Connection>) -> Result<(), std::io::Error> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait ResourceAdaptor: Send + Sync + 'static {
    /// The pooled resource
    type Resource: Send + Sync + 'static;

    /// Error reported by any of the three operations
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a new resource for `key`.
    ///
    /// At most one call per key is in flight at any time. `cancel` fires when
    /// the construction is no longer wanted; the pool stops waiting at that
    /// point whether or not the adaptor observes it.
    async fn construct(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Self::Resource, Self::Error>;

    /// Called on every `get` before the resource is handed out. Any error
    /// evicts the resource.
    async fn health_check(&self, resource: &Self::Resource) -> Result<(), Self::Error>;

    /// Tear down an evicted resource. Errors are logged, never propagated.
    async fn release(&self, resource: Arc<Self::Resource>) -> Result<(), Self::Error>;
}
