//! TTL cache with transparent serialization over the shared pool.
//!
//! Every operation is fail-soft: a backing-store error is logged, counted
//! and converted into the method's safe default instead of propagating.
//! Call sites treat the cache as best-effort acceleration, not a source of
//! truth, so a flapping store must never take the application down with it.

use std::collections::HashMap;
use std::sync::Arc;

use deadpool_redis::redis::AsyncCommands;
use serde::Serialize;
use serde_json::Value;

use crate::OpstoreError;
use crate::client_internal::ClientInternal;
use crate::codec;

#[derive(Clone)]
pub struct CacheStore {
    pub(crate) inner: Arc<ClientInternal>,
}

impl CacheStore {
    pub(crate) fn new(inner: Arc<ClientInternal>) -> Self {
        Self { inner }
    }

    fn encode<T: Serialize>(&self, value: &T) -> Result<String, OpstoreError> {
        let value = serde_json::to_value(value)?;
        codec::encode(&value, self.inner.config.compression_threshold)
    }

    fn fail_soft<T>(&self, op: &str, key: &str, result: Result<T, OpstoreError>, default: T) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(key, error = %e, "Cache {op} failed");
                self.inner.metrics.record_connection_error();
                default
            }
        }
    }

    /// Fetches and decodes a value, `None` on miss or store error.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.inner.metrics.record_operation();
        match self.try_get(key).await {
            Ok(Some(value)) => {
                self.inner.metrics.record_hit();
                Some(value)
            }
            Ok(None) => {
                self.inner.metrics.record_miss();
                None
            }
            Err(e) => {
                tracing::error!(key, error = %e, "Cache get failed");
                self.inner.metrics.record_miss();
                self.inner.metrics.record_connection_error();
                None
            }
        }
    }

    /// Like [`get`](Self::get), substituting `default` on miss or error.
    pub async fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).await.unwrap_or(default)
    }

    async fn try_get(&self, key: &str) -> Result<Option<Value>, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        let raw: Option<String> = conn.get(&full_key).await?;
        Ok(raw.map(|raw| codec::decode(&raw)))
    }

    /// Stores a value under `key` with the given TTL in seconds
    /// (`None` means the configured default TTL).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_set(key, value, ttl_secs).await;
        if result.is_ok() {
            self.inner.metrics.record_set();
        }
        self.fail_soft("set", key, result.map(|_| true), false)
    }

    async fn try_set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<(), OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let ttl = ttl_secs.unwrap_or(self.inner.config.default_ttl_secs);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        let _: () = conn.set_ex(&full_key, envelope, ttl).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_delete(key).await;
        if result.is_ok() {
            self.inner.metrics.record_delete();
        }
        self.fail_soft("delete", key, result, false)
    }

    async fn try_delete(&self, key: &str) -> Result<bool, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        let removed: i64 = conn.del(&full_key).await?;
        Ok(removed > 0)
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_exists(key).await;
        self.fail_soft("exists", key, result, false)
    }

    async fn try_exists(&self, key: &str) -> Result<bool, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        Ok(conn.exists(&full_key).await?)
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_expire(key, ttl_secs).await;
        self.fail_soft("expire", key, result, false)
    }

    async fn try_expire(&self, key: &str, ttl_secs: i64) -> Result<bool, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        Ok(conn.expire(&full_key, ttl_secs).await?)
    }

    /// Remaining TTL in seconds; Redis semantics (-2 missing key, -1 no
    /// expiry) pass through, and a store error also yields -1.
    pub async fn ttl(&self, key: &str) -> i64 {
        self.inner.metrics.record_operation();
        let result = self.try_ttl(key).await;
        self.fail_soft("ttl", key, result, -1)
    }

    async fn try_ttl(&self, key: &str) -> Result<i64, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        Ok(conn.ttl(&full_key).await?)
    }

    /// Atomically adds `amount`, returning the new value (0 on error).
    pub async fn increment(&self, key: &str, amount: i64) -> i64 {
        self.inner.metrics.record_operation();
        let result = self.try_increment(key, amount).await;
        self.fail_soft("increment", key, result, 0)
    }

    async fn try_increment(&self, key: &str, amount: i64) -> Result<i64, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        Ok(conn.incr(&full_key, amount).await?)
    }

    pub async fn decrement(&self, key: &str, amount: i64) -> i64 {
        self.inner.metrics.record_operation();
        let result = self.try_decrement(key, amount).await;
        self.fail_soft("decrement", key, result, 0)
    }

    async fn try_decrement(&self, key: &str, amount: i64) -> Result<i64, OpstoreError> {
        let full_key = self.inner.keys.full(key);
        let mut conn = self.inner.connection().await?;
        Ok(conn.decr(&full_key, amount).await?)
    }

    // Hash operations

    pub async fn hget(&self, name: &str, field: &str) -> Option<Value> {
        self.inner.metrics.record_operation();
        let result = self.try_hget(name, field).await;
        self.fail_soft("hget", name, result, None)
    }

    async fn try_hget(&self, name: &str, field: &str) -> Result<Option<Value>, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        let raw: Option<String> = conn.hget(&full_key, field).await?;
        Ok(raw.map(|raw| codec::decode(&raw)))
    }

    pub async fn hset<T: Serialize>(&self, name: &str, field: &str, value: &T) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_hset(name, field, value).await;
        self.fail_soft("hset", name, result.map(|_| true), false)
    }

    async fn try_hset<T: Serialize>(
        &self,
        name: &str,
        field: &str,
        value: &T,
    ) -> Result<(), OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        let _: () = conn.hset(&full_key, field, envelope).await?;
        Ok(())
    }

    pub async fn hgetall(&self, name: &str) -> HashMap<String, Value> {
        self.inner.metrics.record_operation();
        let result = self.try_hgetall(name).await;
        self.fail_soft("hgetall", name, result, HashMap::new())
    }

    async fn try_hgetall(&self, name: &str) -> Result<HashMap<String, Value>, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        let raw: HashMap<String, String> = conn.hgetall(&full_key).await?;
        Ok(raw
            .into_iter()
            .map(|(field, value)| (field, codec::decode(&value)))
            .collect())
    }

    pub async fn hdel(&self, name: &str, fields: &[&str]) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_hdel(name, fields).await;
        self.fail_soft("hdel", name, result, 0)
    }

    async fn try_hdel(&self, name: &str, fields: &[&str]) -> Result<u64, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        Ok(conn.hdel(&full_key, fields.to_vec()).await?)
    }

    // List operations

    /// Pushes onto the head of a list, returning the new length (0 on error).
    pub async fn lpush<T: Serialize>(&self, name: &str, value: &T) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_push(name, value, true).await;
        if result.is_ok() {
            self.inner.metrics.record_queue_push();
        }
        self.fail_soft("lpush", name, result, 0)
    }

    pub async fn rpush<T: Serialize>(&self, name: &str, value: &T) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_push(name, value, false).await;
        if result.is_ok() {
            self.inner.metrics.record_queue_push();
        }
        self.fail_soft("rpush", name, result, 0)
    }

    async fn try_push<T: Serialize>(
        &self,
        name: &str,
        value: &T,
        left: bool,
    ) -> Result<u64, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        let len: u64 = if left {
            conn.lpush(&full_key, envelope).await?
        } else {
            conn.rpush(&full_key, envelope).await?
        };
        Ok(len)
    }

    pub async fn lpop(&self, name: &str) -> Option<Value> {
        self.inner.metrics.record_operation();
        let result = self.try_pop(name, true).await;
        if matches!(result, Ok(Some(_))) {
            self.inner.metrics.record_queue_pop();
        }
        self.fail_soft("lpop", name, result, None)
    }

    pub async fn rpop(&self, name: &str) -> Option<Value> {
        self.inner.metrics.record_operation();
        let result = self.try_pop(name, false).await;
        if matches!(result, Ok(Some(_))) {
            self.inner.metrics.record_queue_pop();
        }
        self.fail_soft("rpop", name, result, None)
    }

    async fn try_pop(&self, name: &str, left: bool) -> Result<Option<Value>, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        let raw: Option<String> = if left {
            conn.lpop(&full_key, None).await?
        } else {
            conn.rpop(&full_key, None).await?
        };
        Ok(raw.map(|raw| codec::decode(&raw)))
    }

    /// Blocking pop from the tail of the first non-empty list, scanning
    /// `names` in order. Returns the logical list name and the value, or
    /// `None` once `timeout_secs` expires with nothing available.
    pub async fn brpop(&self, names: &[String], timeout_secs: f64) -> Option<(String, Value)> {
        self.inner.metrics.record_operation();
        let result = self.try_brpop(names, timeout_secs).await;
        if matches!(result, Ok(Some(_))) {
            self.inner.metrics.record_queue_pop();
        }
        self.fail_soft("brpop", names.first().map_or("", |n| n.as_str()), result, None)
    }

    async fn try_brpop(
        &self,
        names: &[String],
        timeout_secs: f64,
    ) -> Result<Option<(String, Value)>, OpstoreError> {
        let full_keys: Vec<String> = names.iter().map(|name| self.inner.keys.full(name)).collect();
        let mut conn = self.inner.connection().await?;
        let popped: Option<(String, String)> = conn.brpop(full_keys, timeout_secs).await?;
        Ok(popped.map(|(full_key, raw)| {
            (
                self.inner.keys.strip_prefix(&full_key).to_string(),
                codec::decode(&raw),
            )
        }))
    }

    pub async fn llen(&self, name: &str) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_llen(name).await;
        self.fail_soft("llen", name, result, 0)
    }

    async fn try_llen(&self, name: &str) -> Result<u64, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        Ok(conn.llen(&full_key).await?)
    }

    pub async fn lrange(&self, name: &str, start: isize, stop: isize) -> Vec<Value> {
        self.inner.metrics.record_operation();
        let result = self.try_lrange(name, start, stop).await;
        self.fail_soft("lrange", name, result, Vec::new())
    }

    async fn try_lrange(
        &self,
        name: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<Value>, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        let raw: Vec<String> = conn.lrange(&full_key, start, stop).await?;
        Ok(raw.iter().map(|raw| codec::decode(raw)).collect())
    }

    // Set operations

    pub async fn sadd<T: Serialize>(&self, name: &str, value: &T) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_sadd(name, value).await;
        self.fail_soft("sadd", name, result, 0)
    }

    async fn try_sadd<T: Serialize>(&self, name: &str, value: &T) -> Result<u64, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        Ok(conn.sadd(&full_key, envelope).await?)
    }

    pub async fn srem<T: Serialize>(&self, name: &str, value: &T) -> u64 {
        self.inner.metrics.record_operation();
        let result = self.try_srem(name, value).await;
        self.fail_soft("srem", name, result, 0)
    }

    async fn try_srem<T: Serialize>(&self, name: &str, value: &T) -> Result<u64, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        Ok(conn.srem(&full_key, envelope).await?)
    }

    pub async fn smembers(&self, name: &str) -> Vec<Value> {
        self.inner.metrics.record_operation();
        let result = self.try_smembers(name).await;
        self.fail_soft("smembers", name, result, Vec::new())
    }

    async fn try_smembers(&self, name: &str) -> Result<Vec<Value>, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let mut conn = self.inner.connection().await?;
        let raw: Vec<String> = conn.smembers(&full_key).await?;
        Ok(raw.iter().map(|raw| codec::decode(raw)).collect())
    }

    pub async fn sismember<T: Serialize>(&self, name: &str, value: &T) -> bool {
        self.inner.metrics.record_operation();
        let result = self.try_sismember(name, value).await;
        self.fail_soft("sismember", name, result, false)
    }

    async fn try_sismember<T: Serialize>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<bool, OpstoreError> {
        let full_key = self.inner.keys.full(name);
        let envelope = self.encode(value)?;
        let mut conn = self.inner.connection().await?;
        Ok(conn.sismember(&full_key, envelope).await?)
    }
}
