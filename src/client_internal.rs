use deadpool_redis::redis;
use tokio_util::sync::CancellationToken;

use crate::OpstoreError;
use crate::config::Config;
use crate::health::{HealthFlag, HealthStatus};
use crate::keys::Keys;
use crate::metrics::Metrics;

/// Ping failures tolerated before the status flips to unhealthy.
const UNHEALTHY_AFTER_FAILURES: u32 = 3;

/// Shared core behind [`OpsClient`](crate::OpsClient): the connection pool,
/// key scheme, counters and health flag every subsystem borrows.
pub(crate) struct ClientInternal {
    pool: deadpool_redis::Pool,
    pub(crate) config: Config,
    pub(crate) keys: Keys,
    pub(crate) metrics: Metrics,
    pub(crate) health: HealthFlag,
    pub(crate) cancel_token: CancellationToken,
}

impl ClientInternal {
    pub(crate) fn new(pool: deadpool_redis::Pool, config: Config) -> Self {
        let keys = Keys::new(
            config.namespace.as_deref(),
            config.max_key_length,
            config.dead_letter_queue.clone(),
        );
        Self {
            pool,
            keys,
            config,
            metrics: Metrics::default(),
            health: HealthFlag::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// Borrows a pooled connection, blocking up to the configured wait
    /// timeout when the pool is exhausted.
    pub(crate) async fn connection(&self) -> Result<deadpool_redis::Connection, OpstoreError> {
        self.pool
            .get()
            .await
            .map_err(OpstoreError::DeadpoolRedisPoolError)
    }

    pub(crate) async fn ping(&self) -> Result<(), OpstoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Periodic liveness probe. Flips the shared status to unhealthy after
    /// repeated ping failures and back to healthy on the next success; the
    /// process itself keeps running either way.
    pub(crate) async fn health_loop(&self, cancel_token: CancellationToken) {
        tracing::debug!(
            interval_secs = self.config.health_check_interval.as_secs(),
            "Starting health check loop"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    return;
                }
                _ = tokio::time::sleep(self.config.health_check_interval) => {
                    match self.ping().await {
                        Ok(()) => {
                            if consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
                                tracing::info!("Backing store reachable again");
                            }
                            consecutive_failures = 0;
                            self.health.set(HealthStatus::Healthy);
                        }
                        Err(e) => {
                            consecutive_failures += 1;
                            self.metrics.record_connection_error();
                            tracing::warn!(
                                consecutive_failures,
                                error = %e,
                                "Health check ping failed"
                            );
                            if consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
                                self.health.set(HealthStatus::Unhealthy);
                            }
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn close(&self) {
        self.cancel_token.cancel();
        self.health.set(HealthStatus::Stopped);
    }
}
