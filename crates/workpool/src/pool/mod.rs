//! Worker pool
//!
//! This module provides:
//! - [`Pool`] - Lifecycle controller: start, submit, cancel, shutdown
//! - [`ResultStream`] - Consumer side of the bounded result sink
//! - [`PoolState`] / [`WorkerState`] - Observable state machines
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Pool                               │
//! │                                                              │
//! │  submit() ──► JobQueue (bounded, MPMC) ──┐                   │
//! │                                          ▼                   │
//! │              ┌──────────┐ ┌──────────┐      ┌──────────┐     │
//! │              │ worker 0 │ │ worker 1 │ ...  │ worker N │     │
//! │              └────┬─────┘ └────┬─────┘      └────┬─────┘     │
//! │                   ▼            ▼                 ▼           │
//! │              ResultSink (bounded) ──► results() stream       │
//! │                                                              │
//! │  CompletionTracker: last worker out closes the sink and      │
//! │  moves the pool to Stopped                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod lifecycle;
mod queue;
mod sink;
mod tracker;
mod worker;

pub use lifecycle::PoolState;
pub use sink::ResultStream;
pub use worker::WorkerState;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::PoolConfig;
use crate::context::Context;
use crate::error::PoolError;
use crate::job::{Job, JobContext, JobId};
use crate::metrics::{MetricsSnapshot, PoolMetrics};
use crate::observer::{PoolEvent, PoolObserver, TracingObserver};
use lifecycle::Lifecycle;
use queue::JobQueue;
use sink::{result_channel, ResultSink};
use tracker::CompletionTracker;
use worker::{run_worker, WorkerSlot};

/// Processing function, type-erased
pub(crate) type ProcessFn<P, T> =
    Arc<dyn Fn(JobContext, P) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// State shared between the pool handle and its workers
pub(crate) struct Shared<P, T> {
    name: Arc<str>,
    config: PoolConfig,
    queue: JobQueue<P>,
    results: ResultSink<T>,
    token: CancellationToken,
    process: ProcessFn<P, T>,
    lifecycle: Arc<Lifecycle>,
    tracker: CompletionTracker,
    workers: Vec<WorkerSlot>,
    metrics: PoolMetrics,
    observer: Arc<dyn PoolObserver>,
}

impl<P, T> Shared<P, T> {
    fn emit(&self, event: PoolEvent) {
        self.observer.on_event(&self.name, &event);
    }
}

/// Bounded worker pool
///
/// Runs a fixed number of workers on the current tokio runtime. Every job
/// accepted by [`submit`](Pool::submit) yields exactly one result on
/// [`results`](Pool::results), unless a forced shutdown abandons it (which
/// [`shutdown`](Pool::shutdown) reports).
///
/// Dropping the pool cancels it.
///
/// # Example
///
/// ```
/// use futures::StreamExt;
/// use workpool::{Job, Pool};
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let pool = Pool::with_workers(3, |_ctx, n: u64| async move { Ok(n * 2) })?;
///
/// for id in 1..=5 {
///     pool.submit(Job::new(id, id)).await?;
/// }
/// pool.close();
///
/// let mut doubled: Vec<u64> = pool
///     .results()
///     .filter_map(|result| async move { result.into_outcome().ok() })
///     .collect()
///     .await;
/// doubled.sort();
/// assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
/// # Ok(())
/// # }
/// ```
pub struct Pool<P, T> {
    shared: Arc<Shared<P, T>>,
    stream: ResultStream<T>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<P, T> Pool<P, T>
where
    P: Send + 'static,
    T: Send + 'static,
{
    /// Start a pool that reports events to [`TracingObserver`]
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F, Fut>(config: PoolConfig, process: F) -> Result<Self, PoolError>
    where
        F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::start(config, Arc::new(TracingObserver), process)
    }

    /// Start a pool with default settings and `worker_count` workers
    pub fn with_workers<F, Fut>(worker_count: usize, process: F) -> Result<Self, PoolError>
    where
        F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self::new(PoolConfig::new(worker_count), process)
    }

    /// Build the queue, sink and tracker, launch the workers, and enter `Running`
    #[instrument(skip_all, fields(pool = %config.name, workers = config.worker_count))]
    pub fn start<F, Fut>(
        config: PoolConfig,
        observer: Arc<dyn PoolObserver>,
        process: F,
    ) -> Result<Self, PoolError>
    where
        F: Fn(JobContext, P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            PoolError::InvalidConfiguration("pool must be started inside a tokio runtime".into())
        })?;

        let name: Arc<str> = Arc::from(config.name.as_str());
        let process: ProcessFn<P, T> = Arc::new(
            move |ctx: JobContext, payload: P| -> BoxFuture<'static, anyhow::Result<T>> {
                Box::pin(process(ctx, payload))
            },
        );
        let (results, stream) = result_channel(config.result_capacity);
        let lifecycle = Arc::new(Lifecycle::new(Arc::clone(&name), Arc::clone(&observer)));

        // Runs once, in whichever worker stops last: close the sink, then report Stopped.
        let tracker = {
            let results = results.clone();
            let lifecycle = Arc::clone(&lifecycle);
            CompletionTracker::new(config.worker_count, move || {
                results.close();
                lifecycle.begin_draining();
                lifecycle.transition(PoolState::Draining, PoolState::Stopped);
            })
        };

        let shared = Arc::new(Shared {
            name,
            queue: JobQueue::bounded(config.queue_capacity),
            results,
            token: CancellationToken::new(),
            process,
            lifecycle,
            tracker,
            workers: (0..config.worker_count).map(|_| WorkerSlot::new()).collect(),
            metrics: PoolMetrics::new(),
            observer,
            config,
        });

        let handles = (0..shared.config.worker_count)
            .map(|worker_id| runtime.spawn(run_worker(worker_id, Arc::clone(&shared))))
            .collect();

        shared
            .lifecycle
            .transition(PoolState::Created, PoolState::Running);

        Ok(Self {
            shared,
            stream,
            handles: Mutex::new(handles),
        })
    }
}

impl<P, T> Pool<P, T> {
    /// Submit a job, waiting for queue space
    ///
    /// Waits at most `submit_timeout` from the configuration (if set).
    pub async fn submit(&self, job: Job<P>) -> Result<(), PoolError> {
        let ctx = match self.shared.config.submit_timeout {
            Some(timeout) => Context::background().with_timeout(timeout),
            None => Context::background(),
        };
        self.submit_with(job, &ctx).await
    }

    /// Submit a job, giving up when `ctx` is cancelled or its deadline passes
    ///
    /// # Errors
    ///
    /// - [`PoolError::Cancelled`] if the pool or `ctx` was cancelled
    /// - [`PoolError::QueueClosed`] if the pool no longer accepts jobs
    /// - [`PoolError::Timeout`] if `ctx`'s deadline passed first
    pub async fn submit_with(&self, job: Job<P>, ctx: &Context) -> Result<(), PoolError> {
        let job_id = job.id();
        let outcome = if self.shared.token.is_cancelled() {
            Err(PoolError::Cancelled)
        } else if self.shared.lifecycle.current() != PoolState::Running {
            Err(PoolError::QueueClosed)
        } else {
            self.shared
                .queue
                .submit(job, &self.shared.token, ctx)
                .await
                .map_err(|err| self.closed_by_cancel(err))
        };
        self.record_submission(job_id, &outcome);
        outcome
    }

    /// Submit a job only if the queue has room right now
    pub fn try_submit(&self, job: Job<P>) -> Result<(), PoolError> {
        let job_id = job.id();
        let outcome = if self.shared.token.is_cancelled() {
            Err(PoolError::Cancelled)
        } else if self.shared.lifecycle.current() != PoolState::Running {
            Err(PoolError::QueueClosed)
        } else {
            self.shared
                .queue
                .try_submit(job)
                .map_err(|err| self.closed_by_cancel(err))
        };
        self.record_submission(job_id, &outcome);
        outcome
    }

    /// A queue closed by `cancel` reports the cancellation, not the closure
    fn closed_by_cancel(&self, err: PoolError) -> PoolError {
        match err {
            PoolError::QueueClosed if self.shared.token.is_cancelled() => PoolError::Cancelled,
            other => other,
        }
    }

    fn record_submission(&self, job_id: JobId, outcome: &Result<(), PoolError>) {
        match outcome {
            Ok(()) => {
                self.shared.metrics.job_submitted();
                self.shared.emit(PoolEvent::JobSubmitted { job_id });
            }
            Err(err) => {
                self.shared.metrics.job_rejected();
                self.shared.emit(PoolEvent::JobRejected {
                    job_id,
                    reason: rejection_reason(err),
                });
            }
        }
    }

    /// Stream of results
    ///
    /// Ends after every worker stopped and the buffer is drained. Streams
    /// obtained from several calls share the results between them.
    pub fn results(&self) -> ResultStream<T> {
        self.stream.clone()
    }

    /// Stop accepting jobs; queued jobs still run
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.shared.queue.close();
        self.shared.lifecycle.begin_draining();
    }

    /// Cancel the pool
    ///
    /// Blocked submitters return [`PoolError::Cancelled`]. Workers finish the
    /// job they are running, answer the jobs still queued with cancelled
    /// results, and stop. Idempotent.
    pub fn cancel(&self) {
        // Close first: a send that lands before the close is still drained by
        // the workers, which only start skipping once they see the token.
        self.shared.queue.close();
        self.shared.token.cancel();
        self.shared.lifecycle.begin_draining();
    }

    /// Close the queue and wait up to `drain_timeout` for queued jobs to finish
    ///
    /// # Errors
    ///
    /// [`PoolError::DrainTimeoutExceeded`] if the workers had to be stopped
    /// forcibly; jobs in flight or still queued at that point get no result.
    pub async fn shutdown(&self, drain_timeout: Duration) -> Result<(), PoolError> {
        self.shutdown_with(&Context::background().with_timeout(drain_timeout))
            .await
    }

    /// Graceful shutdown bounded by `ctx`
    ///
    /// Cancelling `ctx` forces the shutdown immediately. Safe to call after
    /// [`cancel`](Pool::cancel) and safe to call more than once.
    #[instrument(skip_all, fields(pool = %self.shared.name))]
    pub async fn shutdown_with(&self, ctx: &Context) -> Result<(), PoolError> {
        self.close();

        tokio::select! {
            biased;
            _ = self.shared.lifecycle.reached(PoolState::Stopped) => {
                self.handles.lock().clear();
                return Ok(());
            }
            _ = ctx.done() => {}
        }

        if self.state() == PoolState::Stopped {
            self.handles.lock().clear();
            return Ok(());
        }

        let abandoned = self.shared.metrics.in_flight() as usize + self.shared.queue.len();
        self.shared.token.cancel();
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }

        Err(PoolError::DrainTimeoutExceeded { abandoned })
    }

    /// Wait until every worker stopped and the result stream is closed
    pub async fn wait_stopped(&self) {
        self.shared.lifecycle.reached(PoolState::Stopped).await
    }

    pub fn state(&self) -> PoolState {
        self.shared.lifecycle.current()
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.token.is_cancelled()
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Number of workers, fixed at start
    pub fn worker_count(&self) -> usize {
        self.shared.workers.len()
    }

    /// Workers whose loop has not exited yet
    pub fn live_workers(&self) -> usize {
        self.shared.tracker.live()
    }

    /// Current state of each worker, indexed by worker id
    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.shared.workers.iter().map(WorkerSlot::get).collect()
    }

    /// Jobs waiting in the queue
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Results waiting to be consumed
    pub fn buffered_results(&self) -> usize {
        self.shared.results.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl<P, T> Drop for Pool<P, T> {
    fn drop(&mut self) {
        self.shared.token.cancel();
    }
}

fn rejection_reason(err: &PoolError) -> &'static str {
    match err {
        PoolError::QueueClosed => "queue closed",
        PoolError::QueueFull => "queue full",
        PoolError::Timeout => "timeout",
        PoolError::Cancelled => "cancelled",
        PoolError::DrainTimeoutExceeded { .. } | PoolError::InvalidConfiguration(_) => "rejected",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use futures::StreamExt;

    fn quiet<F, Fut>(config: PoolConfig, process: F) -> Pool<u64, u64>
    where
        F: Fn(JobContext, u64) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<u64>> + Send + 'static,
    {
        Pool::start(config, Arc::new(NoopObserver), process).unwrap()
    }

    #[test]
    fn test_start_requires_runtime() {
        let err = Pool::<u64, u64>::with_workers(1, |_ctx, n| async move { Ok(n) }).err();
        assert!(matches!(err, Some(PoolError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_zero_workers_rejected() {
        let err = Pool::<u64, u64>::with_workers(0, |_ctx, n| async move { Ok(n) }).err();
        assert!(matches!(err, Some(PoolError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_running_after_start() {
        let pool = quiet(PoolConfig::new(2).with_name("unit"), |_ctx, n| async move {
            Ok(n)
        });
        assert_eq!(pool.state(), PoolState::Running);
        assert_eq!(pool.name(), "unit");
        assert_eq!(pool.worker_count(), 2);
        assert_eq!(pool.live_workers(), 2);
        assert_eq!(pool.worker_states().len(), 2);
    }

    #[tokio::test]
    async fn test_close_drains_and_stops() {
        let pool = quiet(PoolConfig::new(2), |_ctx, n| async move { Ok(n + 1) });
        for id in 0..4 {
            pool.submit(Job::new(id, id)).await.unwrap();
        }
        pool.close();
        assert_eq!(pool.state(), PoolState::Draining);

        let results: Vec<_> = pool.results().collect().await;
        assert_eq!(results.len(), 4);
        pool.wait_stopped().await;
        assert_eq!(pool.state(), PoolState::Stopped);
        assert_eq!(pool.live_workers(), 0);
        assert!(pool
            .worker_states()
            .iter()
            .all(|s| *s == WorkerState::Stopped));

        let metrics = pool.metrics();
        assert_eq!(metrics.submitted, 4);
        assert_eq!(metrics.succeeded, 4);
    }

    #[tokio::test]
    async fn test_try_submit_reports_full_queue() {
        let pool = quiet(PoolConfig::new(1).with_queue_capacity(1), |ctx, n| async move {
            ctx.cancelled().await;
            Ok(n)
        });

        // The single worker takes the first job and parks on it.
        pool.submit(Job::new(1, 1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.try_submit(Job::new(2, 2)).unwrap();

        assert!(matches!(
            pool.try_submit(Job::new(3, 3)),
            Err(PoolError::QueueFull)
        ));
        assert_eq!(pool.queued(), 1);
        assert_eq!(pool.metrics().rejected, 1);

        pool.cancel();
        assert!(matches!(
            pool.try_submit(Job::new(4, 4)),
            Err(PoolError::Cancelled)
        ));
    }

    #[test]
    fn test_rejection_reasons() {
        assert_eq!(rejection_reason(&PoolError::QueueClosed), "queue closed");
        assert_eq!(rejection_reason(&PoolError::Timeout), "timeout");
        assert_eq!(rejection_reason(&PoolError::Cancelled), "cancelled");
    }
}
