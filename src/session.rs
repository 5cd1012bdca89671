//! Session records layered on the cache store (`session:{id}` keys).

use serde_json::{Value, json};

use crate::cache::CacheStore;

#[derive(Clone)]
pub struct SessionStore {
    cache: CacheStore,
}

impl SessionStore {
    pub(crate) fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    fn key(&self, session_id: &str) -> String {
        self.cache.inner.keys.session(session_id)
    }

    /// Creates a session holding `user_data`, expiring after `ttl_secs`
    /// (`None` means the configured default TTL). Fail-soft like the cache.
    pub async fn create(&self, session_id: &str, user_data: Value, ttl_secs: Option<u64>) -> bool {
        let now = chrono::Utc::now().to_rfc3339();
        let record = json!({
            "user_data": user_data,
            "created_at": now,
            "last_accessed": now,
        });
        self.cache.set(&self.key(session_id), &record, ttl_secs).await
    }

    /// Fetches a session record, refreshing its `last_accessed` stamp.
    pub async fn get(&self, session_id: &str) -> Option<Value> {
        let key = self.key(session_id);
        let mut record = self.cache.get(&key).await?;

        if let Value::Object(fields) = &mut record {
            fields.insert(
                "last_accessed".to_string(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
            // best-effort touch; the read result stands either way
            self.cache.set(&key, &record, None).await;
        }

        Some(record)
    }

    pub async fn delete(&self, session_id: &str) -> bool {
        self.cache.delete(&self.key(session_id)).await
    }
}
