//! Reactive Runtime
//!
//! The runtime owns the one piece of cross-binding scheduling the framework
//! has: explicit batches.
//!
//! # How It Works
//!
//! Outside a batch, an observable write re-evaluates every dependent
//! expression synchronously, before `set` returns. Nothing is deferred to a
//! later tick.
//!
//! Inside [`Runtime::batch`], a triggered expression is queued instead. The
//! queue is keyed by subscriber, so an expression that depends on three
//! observables written in the same batch re-evaluates once. The queue is
//! drained in first-trigger order when the outermost batch exits.
//!
//! # Threading
//!
//! Everything here is thread-local. The reactive graph lives on the UI
//! thread and never crosses to another.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::debug;

use super::subscriber::SubscriberId;

/// A computation the runtime can defer and run later.
pub trait Reactive {
    /// Get the subscriber ID for this computation.
    fn subscriber_id(&self) -> SubscriberId;

    /// Run a re-evaluation that was deferred by a batch.
    fn run_deferred(self: Rc<Self>);
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    queue: IndexMap<SubscriberId, Weak<dyn Reactive>>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// Guard that closes a batch level when dropped.
struct BatchGuard;

impl BatchGuard {
    fn enter() -> Self {
        BATCH.with(|state| state.borrow_mut().depth += 1);
        Self
    }
}

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = BATCH.with(|state| {
            let mut state = state.borrow_mut();
            state.depth -= 1;
            state.depth == 0
        });

        if !outermost {
            return;
        }

        if std::thread::panicking() {
            BATCH.with(|state| state.borrow_mut().queue.clear());
            return;
        }

        Runtime::flush();
    }
}

/// Entry point for batching.
pub struct Runtime;

impl Runtime {
    /// Run `f` with re-evaluations deferred until it returns.
    ///
    /// Batches nest; only the outermost one flushes.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        let guard = BatchGuard::enter();
        let result = f();
        drop(guard);
        result
    }

    /// Check whether a batch is open.
    pub fn is_batching() -> bool {
        BATCH.with(|state| state.borrow().depth > 0)
    }

    /// Queue `reactive` if a batch is open.
    ///
    /// Returns `false` when no batch is open and the caller should run the
    /// computation itself.
    pub fn defer(reactive: &Rc<dyn Reactive>) -> bool {
        BATCH.with(|state| {
            let mut state = state.borrow_mut();
            if state.depth == 0 {
                return false;
            }
            state
                .queue
                .entry(reactive.subscriber_id())
                .or_insert_with(|| Rc::downgrade(reactive));
            true
        })
    }

    /// Number of computations waiting for the current batch to close.
    pub fn pending() -> usize {
        BATCH.with(|state| state.borrow().queue.len())
    }

    fn flush() {
        let mut flushed = 0usize;
        loop {
            let queue = BATCH.with(|state| std::mem::take(&mut state.borrow_mut().queue));
            if queue.is_empty() {
                break;
            }
            for reactive in queue.into_values().filter_map(|weak| weak.upgrade()) {
                reactive.run_deferred();
                flushed += 1;
            }
        }
        if flushed > 0 {
            debug!(flushed, "batch flushed");
        }
    }
}
