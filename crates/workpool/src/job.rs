//! Jobs and their results

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::context::{Context, ContextState};
use crate::error::JobError;

/// Caller-chosen job identifier, used to correlate results with submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        JobId(id)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// A unit of work submitted to the pool
///
/// Immutable once built; consumed by exactly one worker.
#[derive(Debug, Clone)]
pub struct Job<P> {
    id: JobId,
    payload: P,
    deadline: Option<Instant>,
}

impl<P> Job<P> {
    /// Create a job without a deadline
    pub fn new(id: u64, payload: P) -> Self {
        Self {
            id: JobId(id),
            payload,
            deadline: None,
        }
    }

    /// Attach an advisory deadline
    ///
    /// The pool does not enforce it; the processing function sees it through
    /// [`JobContext::state`].
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach an advisory deadline `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn into_parts(self) -> (JobId, P, Option<Instant>) {
        (self.id, self.payload, self.deadline)
    }
}

/// Context handed to the processing function alongside the payload
///
/// Cancellation is cooperative: a long job may poll [`JobContext::state`] or
/// await [`JobContext::cancelled`] to stop early, but the pool never
/// interrupts it.
#[derive(Debug, Clone)]
pub struct JobContext {
    job_id: JobId,
    worker_id: usize,
    ctx: Context,
}

impl JobContext {
    pub(crate) fn new(job_id: JobId, worker_id: usize, ctx: Context) -> Self {
        Self {
            job_id,
            worker_id,
            ctx,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// The job's deadline, if one was set at submission
    pub fn deadline(&self) -> Option<Instant> {
        self.ctx.deadline()
    }

    /// Pool cancellation and job deadline, combined
    pub fn state(&self) -> ContextState {
        self.ctx.state()
    }

    pub fn is_cancelled(&self) -> bool {
        self.ctx.state() == ContextState::Cancelled
    }

    /// Wait for pool cancellation or the job deadline
    pub async fn cancelled(&self) -> ContextState {
        self.ctx.done().await
    }

    /// The underlying context, e.g. to hand to nested submissions
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

/// Outcome of processing one job
///
/// Holds either a value or an error, never both.
#[derive(Debug)]
pub struct JobResult<T> {
    job_id: JobId,
    worker_id: usize,
    outcome: Result<T, JobError>,
    duration: Duration,
}

impl<T> JobResult<T> {
    pub(crate) fn new(
        job_id: JobId,
        worker_id: usize,
        outcome: Result<T, JobError>,
        duration: Duration,
    ) -> Self {
        Self {
            job_id,
            worker_id,
            outcome,
            duration,
        }
    }

    pub(crate) fn cancelled(job_id: JobId, worker_id: usize) -> Self {
        Self::new(job_id, worker_id, Err(JobError::Cancelled), Duration::ZERO)
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Worker that produced this result
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Time spent in the processing function (zero for cancelled jobs)
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&JobError> {
        self.outcome.as_ref().err()
    }

    pub fn outcome(&self) -> &Result<T, JobError> {
        &self.outcome
    }

    pub fn into_outcome(self) -> Result<T, JobError> {
        self.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_accessors() {
        let job = Job::new(7, "payload");
        assert_eq!(job.id(), JobId(7));
        assert_eq!(*job.payload(), "payload");
        assert!(job.deadline().is_none());
        assert_eq!(job.id().to_string(), "job-7");
    }

    #[tokio::test]
    async fn test_job_deadline_reaches_context() {
        let job = Job::new(1, ()).with_timeout(Duration::from_secs(10));
        let (id, _, deadline) = job.into_parts();

        let mut ctx = Context::background();
        if let Some(deadline) = deadline {
            ctx = ctx.with_deadline(deadline);
        }
        let job_ctx = JobContext::new(id, 2, ctx);

        assert_eq!(job_ctx.job_id(), JobId(1));
        assert_eq!(job_ctx.worker_id(), 2);
        assert_eq!(job_ctx.deadline(), deadline);
        assert_eq!(job_ctx.state(), ContextState::NotCancelled);
    }

    #[test]
    fn test_job_context_sees_cancellation() {
        let pool_ctx = Context::background();
        let job_ctx = JobContext::new(JobId(3), 0, pool_ctx.child());
        assert!(!job_ctx.is_cancelled());

        pool_ctx.cancel();
        assert!(job_ctx.is_cancelled());
    }

    #[test]
    fn test_result_is_value_or_error() {
        let ok: JobResult<u32> = JobResult::new(JobId(1), 0, Ok(2), Duration::from_millis(3));
        assert!(ok.is_ok());
        assert_eq!(ok.value(), Some(&2));
        assert!(ok.error().is_none());

        let cancelled: JobResult<u32> = JobResult::cancelled(JobId(2), 1);
        assert!(!cancelled.is_ok());
        assert!(cancelled.value().is_none());
        assert!(matches!(cancelled.error(), Some(JobError::Cancelled)));
        assert_eq!(cancelled.duration(), Duration::ZERO);
    }

    #[test]
    fn test_job_id_serializes_transparently() {
        assert_eq!(serde_json::to_string(&JobId(42)).unwrap(), "42");
    }
}
