//! Pool counters
//!
//! Uses relaxed atomics: counters are for observation, not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live counters maintained by a pool
#[derive(Debug, Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    rejected: AtomicU64,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    cancelled: AtomicU64,
}

/// Point-in-time copy of [`PoolMetrics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub taken_at: DateTime<Utc>,
    pub submitted: u64,
    pub rejected: u64,
    pub started: u64,
    pub succeeded: u64,
    /// Jobs whose processing function returned an error (panics excluded)
    pub failed: u64,
    pub panicked: u64,
    /// Accepted jobs that never started because the pool was cancelled
    pub cancelled: u64,
    pub in_flight: u64,
}

impl MetricsSnapshot {
    /// Jobs that produced a result
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.panicked + self.cancelled
    }
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn job_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn job_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    /// Jobs started but not yet finished
    pub fn in_flight(&self) -> u64 {
        let started = self.started.load(Ordering::Relaxed);
        let finished = self.succeeded.load(Ordering::Relaxed)
            + self.failed.load(Ordering::Relaxed)
            + self.panicked.load(Ordering::Relaxed);
        started.saturating_sub(finished)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            taken_at: Utc::now(),
            submitted: self.submitted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            in_flight: self.in_flight(),
        }
    }
}
