//! Cancellation and deadline context
//!
//! A [`Context`] is always present: callers that have nothing to cancel pass
//! [`Context::background()`]. Its [`ContextState`] says whether the work it
//! guards may still proceed.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PoolError;

/// State of a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Neither cancelled nor past its deadline
    NotCancelled,
    /// Cancelled explicitly (or through a parent)
    Cancelled,
    /// Deadline elapsed
    DeadlineExceeded,
}

impl ContextState {
    /// The pool error matching this state, if the context is done
    pub fn into_error(self) -> Option<PoolError> {
        match self {
            ContextState::NotCancelled => None,
            ContextState::Cancelled => Some(PoolError::Cancelled),
            ContextState::DeadlineExceeded => Some(PoolError::Timeout),
        }
    }
}

/// Cancellation signal plus an optional deadline
///
/// Cloning a context shares its cancellation signal. Use [`Context::child`]
/// for a context that is cancelled with its parent but can also be cancelled
/// on its own.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use workpool::{Context, ContextState};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ctx = Context::background().with_timeout(Duration::from_secs(5));
/// assert_eq!(ctx.state(), ContextState::NotCancelled);
///
/// ctx.cancel();
/// assert_eq!(ctx.state(), ContextState::Cancelled);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// A context driven by an existing cancellation token
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Tighten the deadline to `timeout` from now
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Tighten the deadline to `deadline`
    ///
    /// An earlier existing deadline is kept.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Derive a context cancelled together with this one
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this context and its children
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The deadline, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (zero once passed, None without deadline)
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Current state; cancellation wins over an elapsed deadline
    pub fn state(&self) -> ContextState {
        if self.token.is_cancelled() {
            ContextState::Cancelled
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            ContextState::DeadlineExceeded
        } else {
            ContextState::NotCancelled
        }
    }

    /// Whether the context is cancelled or past its deadline
    pub fn is_done(&self) -> bool {
        self.state() != ContextState::NotCancelled
    }

    /// Wait until the context is cancelled or its deadline passes
    ///
    /// Never resolves for a background context.
    pub async fn done(&self) -> ContextState {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => ContextState::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => self.state(),
                }
            }
            None => {
                self.token.cancelled().await;
                ContextState::Cancelled
            }
        }
    }
}
