use crate::queue::JobPriority;

/// Centralizes the Redis key naming scheme shared by every subsystem.
#[derive(Clone)]
pub(crate) struct Keys {
    /// Normalized namespace prefix applied to every Redis key
    /// (e.g. `opstore:` or `opstore:<custom>:`).
    pub(crate) prefix: String,
    /// Logical keys longer than this are replaced by a blake3 hash of the
    /// original key to bound store-side key-length costs.
    max_key_length: usize,
    /// Key segment used for dead-letter lists.
    dead_letter_segment: String,
}

impl Keys {
    pub(crate) fn new(
        namespace: Option<&str>,
        max_key_length: usize,
        dead_letter_segment: impl Into<String>,
    ) -> Self {
        let prefix = match namespace {
            Some(ns) if !ns.is_empty() => format!("opstore:{ns}:"),
            _ => "opstore:".to_string(),
        };
        Self {
            prefix,
            max_key_length,
            dead_letter_segment: dead_letter_segment.into(),
        }
    }

    /// Full store key for a logical key: `{prefix}{key-or-hash}`.
    ///
    /// The hash mapping is deterministic, so repeated lookups of the same
    /// over-long key always land on the same store key.
    pub(crate) fn full(&self, logical: &str) -> String {
        if logical.len() > self.max_key_length {
            format!("{}{}", self.prefix, blake3::hash(logical.as_bytes()).to_hex())
        } else {
            format!("{}{}", self.prefix, logical)
        }
    }

    pub(crate) fn queue(&self, priority: JobPriority, queue: &str) -> String {
        format!("queue:{}:{}", priority.as_str(), queue)
    }

    pub(crate) fn delayed(&self, queue: &str) -> String {
        format!("queue:delayed:{queue}")
    }

    pub(crate) fn dead_letter(&self, queue: &str) -> String {
        format!("queue:{}:{}", self.dead_letter_segment, queue)
    }

    pub(crate) fn lock(&self, name: &str) -> String {
        format!("lock:{name}")
    }

    pub(crate) fn rate_limit(&self, key: &str) -> String {
        format!("rate_limit:{key}")
    }

    pub(crate) fn session(&self, session_id: &str) -> String {
        format!("session:{session_id}")
    }

    /// Logical key for a full store key returned by Redis (e.g. from BRPOP).
    pub(crate) fn strip_prefix<'a>(&self, full: &'a str) -> &'a str {
        full.strip_prefix(&self.prefix).unwrap_or(full)
    }
}
