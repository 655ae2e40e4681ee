//! Pool state machine

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::observer::{PoolEvent, PoolObserver};

/// Pool lifecycle state
///
/// Only moves forward: `Created → Running → Draining → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Built, workers not yet launched
    Created,
    /// Accepting and processing jobs
    Running,
    /// Not accepting jobs; workers finishing up
    Draining,
    /// Every worker stopped and the result stream is closed
    Stopped,
}

/// Owner of the pool state; every transition goes through here
pub(crate) struct Lifecycle {
    name: Arc<str>,
    state: watch::Sender<PoolState>,
    observer: Arc<dyn PoolObserver>,
}

impl Lifecycle {
    pub(crate) fn new(name: Arc<str>, observer: Arc<dyn PoolObserver>) -> Self {
        let (state, _) = watch::channel(PoolState::Created);
        Self {
            name,
            state,
            observer,
        }
    }

    pub(crate) fn current(&self) -> PoolState {
        *self.state.borrow()
    }

    /// Move from `from` to `to` atomically; a no-op in any other state
    pub(crate) fn transition(&self, from: PoolState, to: PoolState) -> bool {
        debug_assert!(from < to, "pool state only moves forward");
        let changed = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });

        if changed {
            self.observer
                .on_event(&self.name, &PoolEvent::StateChanged { from, to });
        }
        changed
    }

    /// Move to `Draining` from `Created` or `Running`
    pub(crate) fn begin_draining(&self) -> bool {
        self.transition(PoolState::Running, PoolState::Draining)
            || self.transition(PoolState::Created, PoolState::Draining)
    }

    /// Wait until the state reaches `target` (or has moved past it)
    pub(crate) async fn reached(&self, target: PoolState) {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| *state >= target).await;
    }
}
