//! Pool configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PoolError;

/// Worker pool configuration
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use workpool::PoolConfig;
///
/// let config = PoolConfig::new(8)
///     .with_name("thumbnails")
///     .with_queue_capacity(256)
///     .with_submit_timeout(Duration::from_secs(2));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolConfig {
    /// Pool name used in events and logs (generated if not provided)
    pub name: String,

    /// Number of concurrent workers, fixed for the pool's lifetime
    pub worker_count: usize,

    /// Maximum jobs waiting in the job queue
    pub queue_capacity: usize,

    /// Maximum results buffered before workers block on publish
    pub result_capacity: usize,

    /// How long `submit` may wait for queue space (None = until space or cancellation)
    #[serde(with = "option_duration_millis")]
    pub submit_timeout: Option<Duration>,

    /// Default time budget for graceful shutdown
    #[serde(with = "duration_millis")]
    pub drain_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: format!("pool-{}", Uuid::now_v7()),
            worker_count: 4,
            queue_capacity: 64,
            result_capacity: 64,
            submit_timeout: None,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given worker count
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Reads `WORKPOOL_NAME`, `WORKPOOL_WORKERS`, `WORKPOOL_QUEUE_CAPACITY`,
    /// `WORKPOOL_RESULT_CAPACITY`, `WORKPOOL_SUBMIT_TIMEOUT_MS` and
    /// `WORKPOOL_DRAIN_TIMEOUT_MS`. Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            name: lookup("WORKPOOL_NAME").unwrap_or(defaults.name),
            worker_count: parse("WORKPOOL_WORKERS")
                .map(|n| n as usize)
                .unwrap_or(defaults.worker_count),
            queue_capacity: parse("WORKPOOL_QUEUE_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.queue_capacity),
            result_capacity: parse("WORKPOOL_RESULT_CAPACITY")
                .map(|n| n as usize)
                .unwrap_or(defaults.result_capacity),
            submit_timeout: parse("WORKPOOL_SUBMIT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .or(defaults.submit_timeout),
            drain_timeout: parse("WORKPOOL_DRAIN_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.drain_timeout),
        }
    }

    /// Set the pool name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the worker count
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count;
        self
    }

    /// Set the job queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the result buffer capacity
    pub fn with_result_capacity(mut self, capacity: usize) -> Self {
        self.result_capacity = capacity;
        self
    }

    /// Bound how long `submit` waits for queue space
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = Some(timeout);
        self
    }

    /// Let `submit` wait for queue space until cancelled
    pub fn without_submit_timeout(mut self) -> Self {
        self.submit_timeout = None;
        self
    }

    /// Set the default drain timeout
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Validate the configuration
    ///
    /// Values are never clamped: a zero worker count or capacity is rejected.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count < 1 {
            return Err(PoolError::InvalidConfiguration(
                "worker_count must be at least 1".into(),
            ));
        }
        if self.queue_capacity < 1 {
            return Err(PoolError::InvalidConfiguration(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.result_capacity < 1 {
            return Err(PoolError::InvalidConfiguration(
                "result_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde support for Option<Duration> as milliseconds
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_millis().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
