pub mod config;
pub mod metrics;
pub mod pool;

#[cfg(feature = "validation")]
pub mod validation;

#[cfg(feature = "mock_transport")]
pub mod mock;

use async_trait::async_trait;
pub use config::PoolConfig;
use std::fmt;

/// Custom error type for resource pool operations
#[derive(Debug, Clone)]
pub enum PoolError<E> {
    /// No resource became available before the deadline
    Timeout,
    /// The pool has been shut down
    Closed,
    /// The backend failed to create a resource
    Resource(E),
}

impl<E: fmt::Display> fmt::Display for PoolError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Timeout => write!(f, "Timed out waiting for a free resource"),
            PoolError::Closed => write!(f, "Pool is closed"),
            PoolError::Resource(e) => write!(f, "Resource creation failed: {}", e),
        }
    }
}

impl<E: fmt::Display + fmt::Debug> std::error::Error for PoolError<E> {}

/// Trait defining the backend of a resource pool
///
/// The pool owns one instance of a `ManageResource` implementation and calls
/// it whenever a resource has to be created, revalidated, or disposed of.
/// Application code supplies an implementation wrapping its real connection
/// setup; tests substitute an always-available in-memory backend such as
/// the mock transport shipped with this crate.
///
/// The pool never calls these methods while holding its internal lock, so
/// implementations are free to take their time (for example dialing a
/// broker) without stalling concurrent releases.
#[async_trait]
pub trait ManageResource: Send + Sync {
    /// The pooled resource type
    type Resource: Send;

    /// Error returned when a resource cannot be created
    type Error: fmt::Display + Send;

    /// Create a fresh resource
    ///
    /// Failures propagate to the caller of `acquire` as
    /// [`PoolError::Resource`]; a resource that failed to create is never
    /// counted against the pool's capacity.
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Check an idle resource before it is handed out again
    ///
    /// Returning `false` discards the resource and the pool creates a
    /// replacement. The default implementation accepts everything.
    async fn validate(&self, _resource: &mut Self::Resource) -> bool {
        true
    }

    /// Dispose of a resource that is leaving the pool
    ///
    /// Called for idle resources on teardown and for resources that were
    /// invalidated or failed revalidation. The default implementation lets
    /// the resource drop.
    fn close(&self, _resource: Self::Resource) {}
}

// Re-export commonly used types
pub use config::PoolConfigBuilder;
pub use metrics::ResourceMetrics;
pub use pool::{Pool, PoolStatus, PooledResource};
