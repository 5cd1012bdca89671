//! Process-lifetime performance counters shared by every subsystem.
//!
//! Counters are mutated from many tasks and read by the snapshot path, so
//! all updates go through one mutex to keep hit/miss percentages coherent.
//! Nothing here persists; a restart resets everything.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::HealthStatus;

#[derive(Debug, Default, Clone)]
struct Counters {
    cache_hits: u64,
    cache_misses: u64,
    cache_sets: u64,
    cache_deletes: u64,
    queue_pushes: u64,
    queue_pops: u64,
    connection_errors: u64,
    operations_total: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Metrics {
    inner: Mutex<Counters>,
}

/// Point-in-time view of the counters, with the derived hit ratio.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_sets: u64,
    pub cache_deletes: u64,
    pub queue_pushes: u64,
    pub queue_pops: u64,
    pub connection_errors: u64,
    pub operations_total: u64,
    /// Percentage of cache reads served from the store, 0.0 when no reads
    /// have happened yet.
    pub cache_hit_ratio: f64,
    pub status: HealthStatus,
    pub last_updated: DateTime<Utc>,
}

impl Metrics {
    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn record_operation(&self) {
        self.lock().operations_total += 1;
    }

    pub(crate) fn record_hit(&self) {
        self.lock().cache_hits += 1;
    }

    pub(crate) fn record_miss(&self) {
        self.lock().cache_misses += 1;
    }

    pub(crate) fn record_set(&self) {
        self.lock().cache_sets += 1;
    }

    pub(crate) fn record_delete(&self) {
        self.lock().cache_deletes += 1;
    }

    pub(crate) fn record_queue_push(&self) {
        self.lock().queue_pushes += 1;
    }

    pub(crate) fn record_queue_pop(&self) {
        self.lock().queue_pops += 1;
    }

    pub(crate) fn record_connection_error(&self) {
        self.lock().connection_errors += 1;
    }

    pub(crate) fn snapshot(&self, status: HealthStatus) -> MetricsSnapshot {
        let counters = self.lock().clone();
        let reads = counters.cache_hits + counters.cache_misses;
        let cache_hit_ratio = if reads > 0 {
            counters.cache_hits as f64 / reads as f64 * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            cache_hits: counters.cache_hits,
            cache_misses: counters.cache_misses,
            cache_sets: counters.cache_sets,
            cache_deletes: counters.cache_deletes,
            queue_pushes: counters.queue_pushes,
            queue_pops: counters.queue_pops,
            connection_errors: counters.connection_errors,
            operations_total: counters.operations_total,
            cache_hit_ratio,
            status,
            last_updated: Utc::now(),
        }
    }
}
