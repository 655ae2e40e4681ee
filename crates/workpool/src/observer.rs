//! Pool events and observers
//!
//! The engine never logs on its own. It reports [`PoolEvent`]s to a
//! [`PoolObserver`]; [`TracingObserver`] (the default) turns them into
//! structured `tracing` records.

use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::job::JobId;
use crate::pool::PoolState;

/// Structured event emitted by a pool
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEvent {
    /// Job accepted into the queue
    JobSubmitted { job_id: JobId },
    /// Job refused at submission
    JobRejected { job_id: JobId, reason: &'static str },
    /// Worker began processing a job
    JobStarted { job_id: JobId, worker_id: usize },
    /// Processing function returned a value
    JobCompleted {
        job_id: JobId,
        worker_id: usize,
        duration: Duration,
    },
    /// Processing function returned an error or panicked
    JobFailed {
        job_id: JobId,
        worker_id: usize,
        duration: Duration,
        kind: &'static str,
        message: String,
    },
    /// Queued job skipped because the pool was cancelled
    JobCancelled { job_id: JobId, worker_id: usize },
    /// Worker loop exited
    WorkerStopped { worker_id: usize },
    /// Pool state transition
    StateChanged { from: PoolState, to: PoolState },
}

/// Receiver of pool events
///
/// Called synchronously from submitters and workers, so implementations must
/// be cheap and must not block.
pub trait PoolObserver: Send + Sync + 'static {
    fn on_event(&self, pool: &str, event: &PoolEvent);
}

impl<F> PoolObserver for F
where
    F: Fn(&str, &PoolEvent) + Send + Sync + 'static,
{
    fn on_event(&self, pool: &str, event: &PoolEvent) {
        self(pool, event)
    }
}

/// Logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl PoolObserver for TracingObserver {
    fn on_event(&self, pool: &str, event: &PoolEvent) {
        match event {
            PoolEvent::JobSubmitted { job_id } => {
                trace!(pool, %job_id, "Job submitted");
            }
            PoolEvent::JobRejected { job_id, reason } => {
                debug!(pool, %job_id, reason, "Job rejected");
            }
            PoolEvent::JobStarted { job_id, worker_id } => {
                trace!(pool, %job_id, worker_id, "Job started");
            }
            PoolEvent::JobCompleted {
                job_id,
                worker_id,
                duration,
            } => {
                debug!(
                    pool,
                    %job_id,
                    worker_id,
                    duration_ms = duration.as_millis() as u64,
                    "Job completed"
                );
            }
            PoolEvent::JobFailed {
                job_id,
                worker_id,
                duration,
                kind,
                message,
            } => {
                warn!(
                    pool,
                    %job_id,
                    worker_id,
                    duration_ms = duration.as_millis() as u64,
                    kind,
                    error = %message,
                    "Job failed"
                );
            }
            PoolEvent::JobCancelled { job_id, worker_id } => {
                debug!(pool, %job_id, worker_id, "Job cancelled before start");
            }
            PoolEvent::WorkerStopped { worker_id } => {
                debug!(pool, worker_id, "Worker stopped");
            }
            PoolEvent::StateChanged { from, to } => {
                info!(pool, from = ?from, to = ?to, "Pool state changed");
            }
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PoolObserver for NoopObserver {
    fn on_event(&self, _pool: &str, _event: &PoolEvent) {}
}
