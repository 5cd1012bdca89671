//! Liveness status for the backing store connection.
//!
//! The background ping loop in `client_internal` is the only writer after
//! startup; readers see the status through a shared atomic so no lock is
//! involved on the request path.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Initializing,
    Healthy,
    Unhealthy,
    Stopped,
}

/// Atomic cell holding the current [`HealthStatus`].
#[derive(Debug)]
pub(crate) struct HealthFlag(AtomicU8);

impl HealthFlag {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(HealthStatus::Initializing as u8))
    }

    pub(crate) fn set(&self, status: HealthStatus) {
        self.0.store(status as u8, Ordering::Relaxed);
    }

    pub(crate) fn get(&self) -> HealthStatus {
        match self.0.load(Ordering::Relaxed) {
            1 => HealthStatus::Healthy,
            2 => HealthStatus::Unhealthy,
            3 => HealthStatus::Stopped,
            _ => HealthStatus::Initializing,
        }
    }
}
