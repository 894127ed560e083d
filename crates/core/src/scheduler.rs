//! Deferred-callback scheduling.
//!
//! The tree coalesces bursts of child updates by deferring its aggregate
//! notification to "after the current synchronous work". What that means
//! depends on the host: an async host lets the runtime deliver the
//! callback on its next turn ([`TokioScheduler`]), a synchronous host
//! drains an explicit queue between bursts ([`TickScheduler`]).

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use tracing::trace;

/// A queued single-shot callback.
pub type Deferred = Box<dyn FnOnce() + Send>;

/// A single-shot deferral point.
///
/// `defer` must invoke the callback exactly once, after the caller's
/// current synchronous execution completes. No ordering is guaranteed
/// relative to unrelated deferred callbacks.
pub trait Scheduler: Send + Sync {
    /// Queue `callback` to run on the next turn of the host.
    fn defer(&self, callback: Deferred);
}

/// A FIFO callback queue drained explicitly by the host.
///
/// Deterministic, so it is also the scheduler the tests run on: mutate
/// the tree, then call [`TickScheduler::run_until_idle`] to deliver every
/// coalesced notification the burst produced.
#[derive(Default)]
pub struct TickScheduler {
    queue: Mutex<VecDeque<Deferred>>,
}

impl TickScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued callbacks until the queue is empty, including callbacks
    /// deferred while draining. Returns how many callbacks ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.guard().pop_front();
            match next {
                Some(callback) => {
                    callback();
                    ran += 1;
                }
                None => break,
            }
        }
        trace!(ran, "tick scheduler drained");
        ran
    }

    /// Number of callbacks waiting to run.
    pub fn pending(&self) -> usize {
        self.guard().len()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, VecDeque<Deferred>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Scheduler for TickScheduler {
    fn defer(&self, callback: Deferred) {
        self.guard().push_back(callback);
    }
}

impl std::fmt::Debug for TickScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Defers callbacks onto the tokio runtime.
///
/// The callback runs on the runtime's next turn, after the task that
/// called `defer` yields. Must be used from within a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn defer(&self, callback: Deferred) {
        tokio::spawn(async move {
            callback();
        });
    }
}
