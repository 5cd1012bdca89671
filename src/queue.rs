//! Multi-priority, at-least-once job queue on the cache's list primitives.
//!
//! Producers LPUSH and consumers BRPOP, so each priority list is FIFO.
//! Dequeue scans the full priority x queue-name cross-product in one
//! blocking pop, which is what gives urgent jobs strict precedence over
//! lower tiers regardless of arrival time.
//!
//! Like the cache, queue operations never propagate store errors: a failed
//! push or pop is logged, counted and reported as "nothing happened" so a
//! crashed worker cannot take the producer side down with it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::cache::CacheStore;
use crate::client_internal::ClientInternal;
use crate::codec;

pub type JobId = String;

/// Moves one stored envelope from the delayed list to the active list,
/// atomically: the push only happens when this caller's removal won, so
/// concurrent promoters cannot duplicate a job.
const PROMOTE_SCRIPT: &str = r#"
local removed = redis.call('lrem', KEYS[1], 1, ARGV[1])
if removed == 1 then
    redis.call('lpush', KEYS[2], ARGV[1])
end
return removed
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Urgent,
    High,
    Normal,
    Low,
}

impl JobPriority {
    /// Strict precedence order used by the dequeue scan.
    pub const ALL: [JobPriority; 4] = [
        JobPriority::Urgent,
        JobPriority::High,
        JobPriority::Normal,
        JobPriority::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Urgent => "urgent",
            JobPriority::High => "high",
            JobPriority::Normal => "normal",
            JobPriority::Low => "low",
        }
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub priority: JobPriority,
    pub payload: Value,
    /// Creation timestamp in microseconds since the epoch.
    pub created_at: i64,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Earliest redelivery time for a retry-scheduled job, microseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<i64>,
    /// Set once the job is dead-lettered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<i64>,
}

impl Job {
    pub(crate) fn new(
        queue: impl Into<String>,
        payload: Value,
        priority: JobPriority,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            queue: queue.into(),
            priority,
            payload,
            created_at: Utc::now().timestamp_micros(),
            attempts: 0,
            max_attempts,
            retry_at: None,
            failed_at: None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_micros(self.created_at).unwrap_or_else(Utc::now)
    }

    /// Whether the job is due for redelivery from the delayed list.
    pub fn is_due(&self, now_micros: i64) -> bool {
        self.retry_at.is_none_or(|retry_at| retry_at <= now_micros)
    }
}

/// Terminal state of a [`requeue`](JobQueue::requeue) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    /// Re-scheduled into the delayed holding list until `retry_at`.
    Scheduled { retry_at: DateTime<Utc> },
    /// Retry budget exhausted; pushed to the dead-letter list.
    DeadLettered,
}

/// Point-in-time pending counts for a queue name. Not transactionally
/// consistent with concurrent pushes and pops.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queue: String,
    pub total_pending: u64,
    pub pending: Vec<PriorityPending>,
    pub delayed: u64,
    pub dead_lettered: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PriorityPending {
    pub priority: JobPriority,
    pub count: u64,
}

#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<ClientInternal>,
    cache: CacheStore,
}

impl JobQueue {
    pub(crate) fn new(inner: Arc<ClientInternal>) -> Self {
        let cache = CacheStore::new(Arc::clone(&inner));
        Self { inner, cache }
    }

    /// Enqueues `payload` for background processing, returning the new job
    /// id, or `None` when the store rejected the push.
    pub async fn enqueue(
        &self,
        queue: &str,
        payload: Value,
        priority: JobPriority,
    ) -> Option<JobId> {
        let job = Job::new(queue, payload, priority, self.inner.config.max_attempts);
        let key = self.inner.keys.queue(priority, queue);

        if self.cache.lpush(&key, &job).await == 0 {
            return None;
        }

        tracing::debug!(job_id = job.id, queue, priority = %priority, "Job enqueued");
        Some(job.id)
    }

    /// Blocking pop across every priority tier of every named queue.
    ///
    /// A job in `urgent` is always returned before any job in lower tiers
    /// regardless of arrival time; within a tier, `queues` are checked in
    /// the caller-supplied order. Returns `None` once `timeout_secs`
    /// expires, which is not an error.
    pub async fn dequeue(&self, queues: &[&str], timeout_secs: f64) -> Option<Job> {
        let scan = self.scan_keys(queues);
        let (key, value) = self.cache.brpop(&scan, timeout_secs).await?;

        match serde_json::from_value::<Job>(value) {
            Ok(job) => {
                tracing::debug!(job_id = job.id, queue = job.queue, key, "Job dequeued");
                Some(job)
            }
            Err(e) => {
                // The entry is already off the list; all we can do is drop it.
                tracing::error!(key, error = %e, "Dequeued entry is not a job envelope");
                None
            }
        }
    }

    fn scan_keys(&self, queues: &[&str]) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.inner.config.priorities.len() * queues.len());
        for priority in &self.inner.config.priorities {
            for queue in queues {
                keys.push(self.inner.keys.queue(*priority, queue));
            }
        }
        keys
    }

    /// Records a failed attempt and either schedules the job for retry
    /// (linear backoff: `base_retry_delay * attempts`) or dead-letters it
    /// once the retry budget is spent. `None` means the store rejected the
    /// push and the job was not persisted anywhere.
    pub async fn requeue(&self, job: &Job) -> Option<RequeueOutcome> {
        let mut job = job.clone();
        job.attempts += 1;

        if job.attempts >= job.max_attempts {
            job.failed_at = Some(Utc::now().timestamp_micros());
            let key = self.inner.keys.dead_letter(&job.queue);

            if self.cache.lpush(&key, &job).await == 0 {
                return None;
            }

            tracing::warn!(
                job_id = job.id,
                queue = job.queue,
                attempts = job.attempts,
                "Job dead-lettered"
            );
            return Some(RequeueOutcome::DeadLettered);
        }

        let delay = self.inner.config.base_retry_delay * job.attempts;
        let retry_at = Utc::now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        job.retry_at = Some(retry_at.timestamp_micros());
        let key = self.inner.keys.delayed(&job.queue);

        if self.cache.lpush(&key, &job).await == 0 {
            return None;
        }

        tracing::debug!(
            job_id = job.id,
            queue = job.queue,
            attempts = job.attempts,
            retry_at = %retry_at,
            "Job scheduled for retry"
        );
        Some(RequeueOutcome::Scheduled { retry_at })
    }

    /// Moves due jobs from the delayed holding list back onto their
    /// priority list, returning how many were promoted. The store does not
    /// redeliver delayed jobs on its own; consumers run this periodically
    /// (or via [`delayed_promotion_loop`](Self::delayed_promotion_loop)).
    pub async fn promote_delayed(&self, queue: &str) -> usize {
        match self.try_promote_delayed(queue).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(queue, error = %e, "Delayed promotion failed");
                self.inner.metrics.record_connection_error();
                0
            }
        }
    }

    async fn try_promote_delayed(&self, queue: &str) -> Result<usize, crate::OpstoreError> {
        use deadpool_redis::redis::{self, AsyncCommands};

        let delayed_key = self.inner.keys.full(&self.inner.keys.delayed(queue));
        let mut conn = self.inner.connection().await?;
        let envelopes: Vec<String> = conn.lrange(&delayed_key, 0, -1).await?;

        let now = Utc::now().timestamp_micros();
        let mut promoted = 0;

        for raw in envelopes {
            let Ok(job) = serde_json::from_value::<Job>(codec::decode(&raw)) else {
                tracing::warn!(queue, "Skipping undecodable delayed entry");
                continue;
            };
            if !job.is_due(now) {
                continue;
            }

            let active_key = self.inner.keys.full(&self.inner.keys.queue(job.priority, queue));
            // Remove the exact stored envelope and re-push it verbatim (it
            // is the same format dequeue expects). Remove-and-push is one
            // script so a concurrent promoter that lost the removal never
            // pushes a second copy.
            let removed: i64 = redis::Script::new(PROMOTE_SCRIPT)
                .key(&delayed_key)
                .key(&active_key)
                .arg(&raw)
                .invoke_async(&mut conn)
                .await?;

            if removed > 0 {
                promoted += 1;
                tracing::debug!(job_id = job.id, queue, "Delayed job promoted");
            }
        }

        Ok(promoted)
    }

    /// Periodic scan-and-promote over the given queue names, in the same
    /// shape as the other background loops: cancel via the token.
    pub async fn delayed_promotion_loop(
        &self,
        queues: Vec<String>,
        interval: std::time::Duration,
        cancel_token: CancellationToken,
    ) {
        tracing::debug!(interval_ms = interval.as_millis(), "Starting delayed promotion loop");

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    return;
                }
                _ = tokio::time::sleep(interval) => {
                    for queue in &queues {
                        self.promote_delayed(queue).await;
                    }
                }
            }
        }
    }

    /// Pending/delayed/dead-lettered counts for `queue`. Fail-soft: a store
    /// error shows up as zero counts.
    pub async fn stats(&self, queue: &str) -> QueueStats {
        let mut pending = Vec::with_capacity(self.inner.config.priorities.len());
        let mut total_pending = 0;

        for priority in &self.inner.config.priorities {
            let count = self.cache.llen(&self.inner.keys.queue(*priority, queue)).await;
            total_pending += count;
            pending.push(PriorityPending {
                priority: *priority,
                count,
            });
        }

        QueueStats {
            queue: queue.to_string(),
            total_pending,
            pending,
            delayed: self.cache.llen(&self.inner.keys.delayed(queue)).await,
            dead_lettered: self.cache.llen(&self.inner.keys.dead_letter(queue)).await,
        }
    }
}
