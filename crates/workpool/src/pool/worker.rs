//! Worker loop
//!
//! Each worker repeatedly takes a job, runs the processing function with
//! panics caught, and publishes the result. A failing job never ends the loop.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::queue::Next;
use super::Shared;
use crate::context::Context;
use crate::error::JobError;
use crate::job::{Job, JobContext, JobResult};
use crate::observer::PoolEvent;

/// State of a single worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    /// Waiting for a job
    Idle = 0,
    /// Running the processing function or publishing its result
    Processing = 1,
    /// Leaving the loop (skipping jobs after cancellation)
    ShuttingDown = 2,
    /// Loop exited
    Stopped = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Processing,
            2 => WorkerState::ShuttingDown,
            _ => WorkerState::Stopped,
        }
    }
}

/// Lock-free state cell for one worker
#[derive(Debug)]
pub(crate) struct WorkerSlot {
    state: AtomicU8,
}

impl WorkerSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Marks the worker stopped when the loop exits or its task is aborted
struct WorkerExit<P, T> {
    worker_id: usize,
    shared: Arc<Shared<P, T>>,
}

impl<P, T> Drop for WorkerExit<P, T> {
    fn drop(&mut self) {
        self.shared.workers[self.worker_id].set(WorkerState::Stopped);
        self.shared.emit(PoolEvent::WorkerStopped {
            worker_id: self.worker_id,
        });
        self.shared.tracker.worker_stopped();
    }
}

pub(crate) async fn run_worker<P, T>(worker_id: usize, shared: Arc<Shared<P, T>>)
where
    P: Send + 'static,
    T: Send + 'static,
{
    let _exit = WorkerExit {
        worker_id,
        shared: Arc::clone(&shared),
    };
    let slot = &shared.workers[worker_id];

    loop {
        slot.set(WorkerState::Idle);

        let job = match shared.queue.next(&shared.token).await {
            Next::Job(job) => job,
            Next::Closed => break,
            Next::Cancelled => {
                skip_remaining(worker_id, &shared, None).await;
                return;
            }
        };

        // Cancelled while the job was being handed over: do not start it.
        if shared.token.is_cancelled() {
            skip_remaining(worker_id, &shared, Some(job)).await;
            return;
        }

        slot.set(WorkerState::Processing);
        let result = execute(worker_id, &shared, job).await;

        if shared.results.publish(result).await.is_err() {
            // Every result stream and the pool itself are gone.
            break;
        }
    }

    slot.set(WorkerState::ShuttingDown);
}

/// Run one job with panics caught at the worker boundary
async fn execute<P, T>(worker_id: usize, shared: &Shared<P, T>, job: Job<P>) -> JobResult<T>
where
    P: Send + 'static,
    T: Send + 'static,
{
    let (job_id, payload, deadline) = job.into_parts();

    let mut ctx = Context::from_token(shared.token.child_token());
    if let Some(deadline) = deadline {
        ctx = ctx.with_deadline(deadline);
    }
    let job_ctx = JobContext::new(job_id, worker_id, ctx);

    shared.metrics.job_started();
    shared.emit(PoolEvent::JobStarted { job_id, worker_id });

    let process = Arc::clone(&shared.process);
    let started = Instant::now();
    // The call itself sits inside the future so a panic while building it is caught too.
    let outcome = AssertUnwindSafe(async move { process(job_ctx, payload).await })
        .catch_unwind()
        .await;
    let duration = started.elapsed();

    let outcome = match outcome {
        Ok(Ok(value)) => {
            shared.metrics.job_succeeded();
            shared.emit(PoolEvent::JobCompleted {
                job_id,
                worker_id,
                duration,
            });
            Ok(value)
        }
        Ok(Err(err)) => {
            shared.metrics.job_failed();
            Err(JobError::Failed(err))
        }
        Err(panic) => {
            shared.metrics.job_panicked();
            Err(JobError::from_panic(panic))
        }
    };

    if let Err(err) = &outcome {
        shared.emit(PoolEvent::JobFailed {
            job_id,
            worker_id,
            duration,
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    JobResult::new(job_id, worker_id, outcome, duration)
}

/// After cancellation, answer every job still queued with a cancelled result
async fn skip_remaining<P, T>(worker_id: usize, shared: &Shared<P, T>, first: Option<Job<P>>)
where
    P: Send + 'static,
    T: Send + 'static,
{
    shared.workers[worker_id].set(WorkerState::ShuttingDown);

    let mut next = first.or_else(|| shared.queue.try_next());
    while let Some(job) = next {
        let job_id = job.id();
        shared.metrics.job_cancelled();
        shared.emit(PoolEvent::JobCancelled { job_id, worker_id });

        if shared
            .results
            .publish(JobResult::cancelled(job_id, worker_id))
            .await
            .is_err()
        {
            return;
        }
        next = shared.queue.try_next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_slot() {
        let slot = WorkerSlot::new();
        assert_eq!(slot.get(), WorkerState::Idle);

        for state in [
            WorkerState::Processing,
            WorkerState::ShuttingDown,
            WorkerState::Stopped,
            WorkerState::Idle,
        ] {
            slot.set(state);
            assert_eq!(slot.get(), state);
        }
    }
}
