//! Bounded job queue
//!
//! A multi-consumer channel: every worker holds a receiver clone, so no lock
//! sits between an idle worker and the next job.

use async_channel::{Receiver, Sender, TrySendError};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::error::PoolError;
use crate::job::Job;

/// What a worker got when asking for the next job
#[derive(Debug)]
pub(crate) enum Next<P> {
    Job(Job<P>),
    /// Queue closed and fully drained
    Closed,
    /// Pool cancelled; remaining jobs must not be started
    Cancelled,
}

pub(crate) struct JobQueue<P> {
    tx: Sender<Job<P>>,
    rx: Receiver<Job<P>>,
}

impl<P> JobQueue<P> {
    pub(crate) fn bounded(capacity: usize) -> Self {
        let (tx, rx) = async_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Enqueue a job, waiting for space
    ///
    /// Gives up with `Cancelled` when the pool is cancelled, or with the
    /// caller context's error when it is cancelled or its deadline passes.
    /// Cancellation is checked before any enqueue attempt.
    pub(crate) async fn submit(
        &self,
        job: Job<P>,
        pool_token: &CancellationToken,
        ctx: &Context,
    ) -> Result<(), PoolError> {
        if pool_token.is_cancelled() {
            return Err(PoolError::Cancelled);
        }
        if let Some(err) = ctx.state().into_error() {
            return Err(err);
        }

        tokio::select! {
            biased;
            _ = pool_token.cancelled() => Err(PoolError::Cancelled),
            state = ctx.done() => Err(state.into_error().unwrap_or(PoolError::Timeout)),
            sent = self.tx.send(job) => sent.map_err(|_| PoolError::QueueClosed),
        }
    }

    /// Enqueue a job only if there is room right now
    pub(crate) fn try_submit(&self, job: Job<P>) -> Result<(), PoolError> {
        self.tx.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => PoolError::QueueFull,
            TrySendError::Closed(_) => PoolError::QueueClosed,
        })
    }

    /// Wait for the next job
    ///
    /// Cancellation wins when it is already signalled, even if jobs are queued.
    pub(crate) async fn next(&self, pool_token: &CancellationToken) -> Next<P> {
        tokio::select! {
            biased;
            _ = pool_token.cancelled() => Next::Cancelled,
            received = self.rx.recv() => match received {
                Ok(job) => Next::Job(job),
                Err(_) => Next::Closed,
            },
        }
    }

    /// Take a queued job without waiting
    pub(crate) fn try_next(&self) -> Option<Job<P>> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting jobs; returns true only for the call that closed it
    pub(crate) fn close(&self) -> bool {
        self.tx.close()
    }

    pub(crate) fn len(&self) -> usize {
        self.rx.len()
    }
}
