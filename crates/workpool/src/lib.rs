//! # Workpool
//!
//! A bounded worker pool with a cancellable job pipeline, built on tokio.
//!
//! ## Features
//!
//! - **Bounded job queue**: submissions wait for space, with timeouts and cancellation
//! - **Fixed worker set**: N workers, each isolating panics to the failing job
//! - **Backpressure**: a bounded result stream throttles workers when the consumer lags
//! - **Graceful shutdown**: drain queued work within a time budget, then stop forcibly
//! - **Observability**: structured events through an observer hook, plus counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Producer(s)                              │
//! │            submit() / submit_with(ctx) / close()            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Pool                                │
//! │  (job queue → N workers → result sink, lifecycle, tracker)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ResultStream                            │
//! │      (one JobResult per accepted job, ends when stopped)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use futures::StreamExt;
//! use workpool::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = PoolConfig::new(2).with_name("lengths");
//! let pool = Pool::new(config, |_ctx: JobContext, word: String| async move {
//!     anyhow::ensure!(!word.is_empty(), "empty word");
//!     Ok(word.len())
//! })?;
//!
//! pool.submit(Job::new(1, "pool".to_string())).await?;
//! pool.submit(Job::new(2, String::new())).await?;
//!
//! let results = pool.results();
//! pool.shutdown(Duration::from_secs(5)).await?;
//!
//! let outcomes: Vec<_> = results.collect().await;
//! assert_eq!(outcomes.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod job;
pub mod metrics;
pub mod observer;
pub mod pool;
pub mod telemetry;

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::context::{Context, ContextState};
    pub use crate::error::{JobError, PoolError};
    pub use crate::job::{Job, JobContext, JobId, JobResult};
    pub use crate::observer::{PoolEvent, PoolObserver};
    pub use crate::pool::{Pool, PoolState, ResultStream, WorkerState};
}

// Re-export key types at crate root
pub use config::PoolConfig;
pub use context::{Context, ContextState};
pub use error::{JobError, PoolError};
pub use job::{Job, JobContext, JobId, JobResult};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use observer::{NoopObserver, PoolEvent, PoolObserver, TracingObserver};
pub use pool::{Pool, PoolState, ResultStream, WorkerState};
pub use telemetry::{init_telemetry, TelemetryConfig};
