use std::sync::Arc;

use crate::OpstoreError;
use crate::client::OpsClient;
use crate::config::Config;
use crate::health::HealthStatus;

/// Configures and constructs an [`OpsClient`].
///
/// # Examples
///
/// ```rust,ignore
/// let client = opstore::OpsClient::builder()
///     .from_env()?
///     .namespace("underwriting")
///     .build()
///     .await?;
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: Config,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlays configuration from the environment (see [`Config::from_env`]).
    pub fn from_env(mut self) -> Result<Self, OpstoreError> {
        self.config = Config::from_env()?;
        Ok(self)
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = Some(namespace.into());
        self
    }

    /// Builds the client: creates the bounded pool, verifies the store with
    /// a PING (the one place connection errors propagate) and spawns the
    /// background health loop.
    pub async fn build(self) -> Result<OpsClient, OpstoreError> {
        let pool = create_pool(&self.config)?;
        let client = OpsClient::from_parts(pool, self.config);

        client.inner.ping().await?;
        client.inner.health.set(HealthStatus::Healthy);

        if !client.inner.config.health_check_interval.is_zero() {
            let inner = Arc::clone(&client.inner);
            let cancel_token = inner.cancel_token.clone();
            tokio::spawn(async move { inner.health_loop(cancel_token).await });
        }

        tracing::info!(
            max_connections = client.inner.config.max_connections,
            prefix = %client.inner.keys.prefix,
            "Operational store client ready"
        );
        Ok(client)
    }

    /// Builds from an existing pool without connection verification or the
    /// health loop. Mainly for tests.
    pub fn build_from_pool(self, pool: deadpool_redis::Pool) -> OpsClient {
        let client = OpsClient::from_parts(pool, self.config);
        client.inner.health.set(HealthStatus::Healthy);
        client
    }
}

fn create_pool(config: &Config) -> Result<deadpool_redis::Pool, OpstoreError> {
    let mut cfg = deadpool_redis::Config::from_url(config.redis_url());
    cfg.pool = Some(deadpool_redis::PoolConfig {
        max_size: config.max_connections,
        timeouts: deadpool_redis::Timeouts {
            wait: Some(config.connect_timeout),
            create: Some(config.connect_timeout),
            recycle: Some(config.socket_timeout),
        },
        ..Default::default()
    });
    Ok(cfg.create_pool(Some(deadpool_redis::Runtime::Tokio1))?)
}
