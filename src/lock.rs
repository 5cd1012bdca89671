//! Distributed mutual exclusion on top of the store's atomic primitives.
//!
//! Acquisition is `SET key token NX EX ttl`; the store's atomicity on that
//! conditional set is what guarantees a single holder, no client-side
//! coordination involved. Release is a server-side compare-and-delete
//! script so a holder whose lock already expired and was re-acquired by
//! someone else cannot delete the new holder's key. Every lock carries a
//! TTL, so a crashed holder cannot deadlock other callers; liveness over
//! strict exclusion is the deliberate trade-off.
//!
//! Unlike the cache and queue, lock operations surface errors: callers use
//! locks for correctness, not acceleration.

use std::sync::Arc;
use std::time::{Duration, Instant};

use deadpool_redis::redis;
use uuid::Uuid;

use crate::OpstoreError;
use crate::client_internal::ClientInternal;

/// Deletes the lock key only while it still holds the caller's token.
const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Store-side expiry; must exceed the expected critical-section length.
    pub ttl: Duration,
    /// How long acquire keeps retrying before giving up.
    pub blocking_timeout: Duration,
    pub retry_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            blocking_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Clone)]
pub struct LockManager {
    inner: Arc<ClientInternal>,
}

impl LockManager {
    pub(crate) fn new(inner: Arc<ClientInternal>) -> Self {
        Self { inner }
    }

    /// Acquires the named lock, polling until `blocking_timeout` elapses.
    ///
    /// Returns [`OpstoreError::LockTimeout`] when the lock stays held by
    /// someone else for the whole window.
    pub async fn acquire(
        &self,
        name: &str,
        options: LockOptions,
    ) -> Result<LockGuard, OpstoreError> {
        let token = Uuid::new_v4().to_string();
        let key = self.inner.keys.full(&self.inner.keys.lock(name));
        let ttl_secs = options.ttl.as_secs().max(1);
        let started = Instant::now();

        loop {
            let mut conn = self.inner.connection().await?;
            let acquired: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(&token)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs)
                .query_async(&mut conn)
                .await?;

            if acquired.is_some() {
                tracing::debug!(lock = name, "Lock acquired");
                return Ok(LockGuard {
                    inner: Arc::clone(&self.inner),
                    name: name.to_string(),
                    key,
                    token,
                    released: false,
                });
            }

            if started.elapsed() >= options.blocking_timeout {
                return Err(OpstoreError::LockTimeout {
                    name: name.to_string(),
                    waited_ms: started.elapsed().as_millis(),
                });
            }

            tokio::time::sleep(options.retry_interval).await;
        }
    }

    /// Runs `critical_section` under the named lock, releasing on both the
    /// success and error paths.
    pub async fn with_lock<F, Fut, T>(
        &self,
        name: &str,
        options: LockOptions,
        critical_section: F,
    ) -> Result<T, OpstoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire(name, options).await?;
        let output = critical_section().await;
        guard.release().await?;
        Ok(output)
    }
}

/// Proof of lock ownership. Release is explicit; a guard dropped without
/// release leaves the key to expire via its TTL.
pub struct LockGuard {
    inner: Arc<ClientInternal>,
    name: String,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Atomic compare-and-delete: the key is removed only if it still holds
    /// this guard's token. Returns `false` when the lock had already
    /// expired and possibly been taken by another holder (a no-op there).
    pub async fn release(mut self) -> Result<bool, OpstoreError> {
        self.released = true;

        let mut conn = self.inner.connection().await?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 1 {
            tracing::debug!(lock = self.name, "Lock released");
        } else {
            tracing::warn!(lock = self.name, "Lock was no longer held at release");
        }
        Ok(deleted == 1)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            tracing::warn!(
                lock = self.name,
                "Lock guard dropped without release; key expires via TTL"
            );
        }
    }
}
