//! Sliding-window admission control on a sorted set of request timestamps.
//!
//! Unlike fixed buckets, the trailing window never under- or over-counts
//! at bucket boundaries; the cost is O(entries-in-window) work per check.
//! Fail-soft: when the store is unreachable the request is admitted, since
//! rate limiting here protects throughput, not correctness.

use std::sync::Arc;
use std::time::Duration;

use deadpool_redis::redis::{self, AsyncCommands};

use crate::OpstoreError;
use crate::client_internal::ClientInternal;

#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<ClientInternal>,
}

impl RateLimiter {
    pub(crate) fn new(inner: Arc<ClientInternal>) -> Self {
        Self { inner }
    }

    /// Returns `true` when `key` already saw `limit` requests within the
    /// trailing `window`. A limited request is not recorded; an admitted
    /// one is, and the window key's expiry is refreshed so abandoned keys
    /// clean themselves up.
    pub async fn is_rate_limited(&self, key: &str, limit: u64, window: Duration) -> bool {
        self.inner.metrics.record_operation();
        match self.try_check(key, limit, window).await {
            Ok(limited) => limited,
            Err(e) => {
                tracing::error!(key, error = %e, "Rate limit check failed");
                self.inner.metrics.record_connection_error();
                false
            }
        }
    }

    async fn try_check(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
    ) -> Result<bool, OpstoreError> {
        let full_key = self.inner.keys.full(&self.inner.keys.rate_limit(key));
        let now_micros = chrono::Utc::now().timestamp_micros();
        let window_start = now_micros - window.as_micros() as i64;

        let mut conn = self.inner.connection().await?;

        // drop entries that fell out of the trailing window
        let _: i64 = conn.zrembyscore(&full_key, 0, window_start).await?;
        let current: u64 = conn.zcard(&full_key).await?;

        if current >= limit {
            tracing::debug!(key, current, limit, "Request rate limited");
            return Ok(true);
        }

        // microsecond members so same-second requests stay distinct entries
        let _: () = redis::pipe()
            .zadd(&full_key, now_micros.to_string(), now_micros)
            .expire(&full_key, window.as_secs().max(1) as i64)
            .query_async(&mut conn)
            .await?;

        Ok(false)
    }
}
