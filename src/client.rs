use std::sync::Arc;

use crate::OpstoreError;
use crate::cache::CacheStore;
use crate::client_builder::ClientBuilder;
use crate::client_internal::ClientInternal;
use crate::config::Config;
use crate::health::HealthStatus;
use crate::lock::LockManager;
use crate::metrics::MetricsSnapshot;
use crate::queue::JobQueue;
use crate::rate_limiter::RateLimiter;
use crate::session::SessionStore;

/// Handle to the shared operational data layer.
///
/// One client owns one bounded connection pool and one set of performance
/// counters; the cache, job queue, lock manager, rate limiter and session
/// store all multiplex over them. The client is explicitly constructed and
/// passed to consumers, cheap to clone, and never ambient global state.
///
/// # Examples
///
/// ```rust,ignore
/// use opstore::{JobPriority, OpsClient};
///
/// async fn example() -> Result<(), opstore::OpstoreError> {
///     let client = OpsClient::builder().from_env()?.build().await?;
///
///     client.cache().set("risk:model:v3", &"warm", None).await;
///     client
///         .queue()
///         .enqueue("documents", serde_json::json!({"loan_id": 42}), JobPriority::High)
///         .await;
///
///     client.close();
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct OpsClient {
    pub(crate) inner: Arc<ClientInternal>,
}

impl OpsClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub(crate) fn from_parts(pool: deadpool_redis::Pool, config: Config) -> Self {
        Self {
            inner: Arc::new(ClientInternal::new(pool, config)),
        }
    }

    pub fn cache(&self) -> CacheStore {
        CacheStore::new(Arc::clone(&self.inner))
    }

    pub fn queue(&self) -> JobQueue {
        JobQueue::new(Arc::clone(&self.inner))
    }

    pub fn locks(&self) -> LockManager {
        LockManager::new(Arc::clone(&self.inner))
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(Arc::clone(&self.inner))
    }

    pub fn sessions(&self) -> SessionStore {
        SessionStore::new(self.cache())
    }

    /// Current counters plus the derived cache hit ratio.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot(self.health())
    }

    pub fn health(&self) -> HealthStatus {
        self.inner.health.get()
    }

    /// Key prefix every store key of this client carries.
    pub fn prefix(&self) -> &str {
        &self.inner.keys.prefix
    }

    /// On-demand liveness probe, independent of the background monitor.
    pub async fn ping(&self) -> Result<(), OpstoreError> {
        self.inner.ping().await
    }

    /// Stops background work and marks the client stopped. Outstanding
    /// clones keep working against the pool until dropped.
    pub fn close(&self) {
        tracing::info!("Shutting down operational store client");
        self.inner.close();
    }
}
