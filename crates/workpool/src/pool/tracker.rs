//! Completion tracking for the worker set
//!
//! The last worker to stop runs the completion action exactly once. The
//! decrement uses acquire/release ordering, so everything each worker did
//! (including its final publish) happens-before the action closes the sink.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

type CompletionAction = Box<dyn FnOnce() + Send>;

pub(crate) struct CompletionTracker {
    live: AtomicUsize,
    on_complete: Mutex<Option<CompletionAction>>,
}

impl CompletionTracker {
    pub(crate) fn new(workers: usize, on_complete: impl FnOnce() + Send + 'static) -> Self {
        Self {
            live: AtomicUsize::new(workers),
            on_complete: Mutex::new(Some(Box::new(on_complete))),
        }
    }

    /// Workers that have not stopped yet
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Record one stopped worker, however it stopped
    ///
    /// Returns true for the call that brought the count to zero.
    pub(crate) fn worker_stopped(&self) -> bool {
        let previous = self.live.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "more workers stopped than were started");
        if previous != 1 {
            return false;
        }

        if let Some(action) = self.on_complete.lock().take() {
            action();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[test]
    fn test_completes_on_last_worker() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let tracker = CompletionTracker::new(3, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!tracker.worker_stopped());
        assert!(!tracker.worker_stopped());
        assert_eq!(tracker.live(), 1);
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        assert!(tracker.worker_stopped());
        assert_eq!(tracker.live(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_decrements_fire_once() {
        const WORKERS: usize = 64;

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let tracker = Arc::new(CompletionTracker::new(WORKERS, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let finals: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..WORKERS)
                .map(|_| {
                    let tracker = Arc::clone(&tracker);
                    scope.spawn(move || tracker.worker_stopped())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(finals, 1);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_writes_visible_to_completion_action() {
        let flag = Arc::new(AtomicBool::new(false));
        let observed = Arc::new(AtomicBool::new(false));

        let tracker = {
            let flag = Arc::clone(&flag);
            let observed = Arc::clone(&observed);
            Arc::new(CompletionTracker::new(1, move || {
                observed.store(flag.load(Ordering::Relaxed), Ordering::Relaxed);
            }))
        };

        let worker = {
            let tracker = Arc::clone(&tracker);
            let flag = Arc::clone(&flag);
            std::thread::spawn(move || {
                flag.store(true, Ordering::Relaxed);
                tracker.worker_stopped();
            })
        };
        worker.join().unwrap();

        assert!(observed.load(Ordering::Relaxed));
    }
}
