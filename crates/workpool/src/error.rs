//! Error types
//!
//! Pool-level failures are returned from [`Pool`](crate::Pool) operations.
//! Job-level failures never escape a worker; they travel inside a
//! [`JobResult`](crate::JobResult) as a [`JobError`].

/// Pool-level errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Submission attempted after the queue was closed
    #[error("job queue is closed")]
    QueueClosed,

    /// Non-blocking submission found the queue full
    #[error("job queue is full")]
    QueueFull,

    /// Submission or shutdown exceeded its deadline
    #[error("operation timed out")]
    Timeout,

    /// Operation aborted because the pool (or the caller's context) was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// Graceful shutdown did not finish in time; remaining work was abandoned
    #[error("drain timeout exceeded, {abandoned} job(s) abandoned")]
    DrainTimeoutExceeded {
        /// Jobs that were in flight or still queued when workers were stopped
        abandoned: usize,
    },

    /// Rejected configuration
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),
}

/// Failure of a single job, carried inside its result
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The processing function returned an error
    #[error("job failed: {0:#}")]
    Failed(anyhow::Error),

    /// The processing function panicked
    #[error("job panicked: {0}")]
    Panicked(String),

    /// The job was accepted but never started because the pool was cancelled
    #[error("job cancelled before it started")]
    Cancelled,
}

impl JobError {
    /// Build a [`JobError::Panicked`] from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        JobError::Panicked(message)
    }

    /// Short label used in events and logs
    pub fn kind(&self) -> &'static str {
        match self {
            JobError::Failed(_) => "failed",
            JobError::Panicked(_) => "panicked",
            JobError::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_str() {
        let err = JobError::from_panic(Box::new("boom"));
        assert!(matches!(err, JobError::Panicked(ref m) if m == "boom"));
        assert_eq!(err.kind(), "panicked");
    }

    #[test]
    fn test_panic_payload_string() {
        let err = JobError::from_panic(Box::new(format!("index {} out of range", 7)));
        assert_eq!(err.to_string(), "job panicked: index 7 out of range");
    }

    #[test]
    fn test_panic_payload_other() {
        let err = JobError::from_panic(Box::new(42_u32));
        assert!(matches!(err, JobError::Panicked(ref m) if m == "non-string panic payload"));
    }

    #[test]
    fn test_failed_keeps_context_chain() {
        let source = anyhow::anyhow!("connection reset").context("fetching page");
        let err = JobError::Failed(source);
        assert_eq!(err.to_string(), "job failed: fetching page: connection reset");
    }

    #[test]
    fn test_drain_timeout_message() {
        let err = PoolError::DrainTimeoutExceeded { abandoned: 3 };
        assert_eq!(err.to_string(), "drain timeout exceeded, 3 job(s) abandoned");
    }
}
