use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpstoreError {
    #[error("Redis error: {0}")]
    RedisError(#[from] deadpool_redis::redis::RedisError),

    #[error("Redis pool error: {0}")]
    DeadpoolRedisPoolError(#[from] deadpool_redis::PoolError),

    #[error("Redis pool creation failed: {0}")]
    DeadpoolRedisCreatePoolError(#[from] deadpool_redis::CreatePoolError),

    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("MessagePack encode error: {0}")]
    MsgpackEncodeError(#[from] rmp_serde::encode::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Could not acquire lock '{name}' within {waited_ms}ms")]
    LockTimeout { name: String, waited_ms: u128 },

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
