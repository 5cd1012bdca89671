use std::time::Duration;

use crate::OpstoreError;
use crate::queue::JobPriority;

/// Connection, cache and queue tuning for an [`OpsClient`](crate::OpsClient).
///
/// Every field has a production default; [`Config::from_env`] overlays values
/// from the environment (`REDIS_URL` or `REDIS_HOST`/`REDIS_PORT`/
/// `REDIS_PASSWORD`/`REDIS_DB` for the connection, `OPSTORE_*` for the rest).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Explicit connection URL; takes precedence over host/port/password/db.
    pub url: Option<String>,
    /// Bound on waiting for a pooled connection as well as on establishing
    /// new ones. Pool exhaustion blocks callers up to this long.
    pub connect_timeout: Duration,
    pub socket_timeout: Duration,
    pub max_connections: usize,
    /// Cadence of the background health ping; zero disables the monitor.
    pub health_check_interval: Duration,
    pub default_ttl_secs: u64,
    /// Logical keys longer than this are replaced by a content hash.
    pub max_key_length: usize,
    /// Binary envelopes larger than this many bytes are gzip-compressed.
    pub compression_threshold: usize,
    /// Dequeue scan order across priority tiers.
    pub priorities: Vec<JobPriority>,
    pub max_attempts: u32,
    pub base_retry_delay: Duration,
    /// Key segment for the dead-letter lists (`queue:{segment}:{name}`).
    pub dead_letter_queue: String,
    pub namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            db: 0,
            url: None,
            connect_timeout: Duration::from_secs(30),
            socket_timeout: Duration::from_secs(30),
            max_connections: 50,
            health_check_interval: Duration::from_secs(30),
            default_ttl_secs: 3600,
            max_key_length: 250,
            compression_threshold: 1024,
            priorities: JobPriority::ALL.to_vec(),
            max_attempts: 3,
            base_retry_delay: Duration::from_secs(60),
            dead_letter_queue: "failed".to_string(),
            namespace: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, OpstoreError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("REDIS_URL") {
            config.url = Some(url);
        }
        if let Ok(host) = std::env::var("REDIS_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("REDIS_PORT") {
            config.port = parse_env("REDIS_PORT", &port)?;
        }
        if let Ok(password) = std::env::var("REDIS_PASSWORD") {
            config.password = Some(password);
        }
        if let Ok(db) = std::env::var("REDIS_DB") {
            config.db = parse_env("REDIS_DB", &db)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_NAMESPACE") {
            config.namespace = Some(value);
        }
        if let Ok(value) = std::env::var("OPSTORE_MAX_CONNECTIONS") {
            config.max_connections = parse_env("OPSTORE_MAX_CONNECTIONS", &value)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout =
                Duration::from_secs(parse_env("OPSTORE_CONNECT_TIMEOUT_SECS", &value)?);
        }
        if let Ok(value) = std::env::var("OPSTORE_SOCKET_TIMEOUT_SECS") {
            config.socket_timeout =
                Duration::from_secs(parse_env("OPSTORE_SOCKET_TIMEOUT_SECS", &value)?);
        }
        if let Ok(value) = std::env::var("OPSTORE_HEALTH_CHECK_INTERVAL_SECS") {
            config.health_check_interval =
                Duration::from_secs(parse_env("OPSTORE_HEALTH_CHECK_INTERVAL_SECS", &value)?);
        }
        if let Ok(value) = std::env::var("OPSTORE_DEFAULT_TTL_SECS") {
            config.default_ttl_secs = parse_env("OPSTORE_DEFAULT_TTL_SECS", &value)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_MAX_KEY_LENGTH") {
            config.max_key_length = parse_env("OPSTORE_MAX_KEY_LENGTH", &value)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_COMPRESSION_THRESHOLD") {
            config.compression_threshold = parse_env("OPSTORE_COMPRESSION_THRESHOLD", &value)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_MAX_ATTEMPTS") {
            config.max_attempts = parse_env("OPSTORE_MAX_ATTEMPTS", &value)?;
        }
        if let Ok(value) = std::env::var("OPSTORE_RETRY_BASE_DELAY_SECS") {
            config.base_retry_delay =
                Duration::from_secs(parse_env("OPSTORE_RETRY_BASE_DELAY_SECS", &value)?);
        }
        if let Ok(value) = std::env::var("OPSTORE_DEAD_LETTER_QUEUE") {
            config.dead_letter_queue = value;
        }

        Ok(config)
    }

    /// Connection URL, either the explicit one or assembled from parts.
    pub fn redis_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, OpstoreError> {
    raw.parse()
        .map_err(|_| OpstoreError::ConfigError(format!("{name} has invalid value {raw:?}")))
}
