//! Reactive Context
//!
//! The reactive context records which observables a computation reads while
//! it runs. An expression binding enters a collecting scope, runs its read
//! function, and takes the collected set back when the scope ends.
//!
//! # Implementation
//!
//! We use a thread-local stack of scopes. Observables consult the top of the
//! stack when read: a collecting scope records the read, an untracked scope
//! (pushed by [`ReactiveContext::untracked`]) swallows it. Nothing else about
//! the evaluation is ambient; the scope is entered and finished explicitly by
//! its owner.
//!
//! This design supports nested scopes (e.g., an expression created while
//! another expression is evaluating).

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::subscriber::{Source, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The collecting subscriber, or `None` for an untracked scope.
    subscriber_id: Option<SubscriberId>,
    /// Observables read during this scope, in first-read order.
    dependencies: IndexMap<u64, Rc<dyn Source>>,
}

/// The observables collected by one scope, keyed by source id.
pub type Dependencies = IndexMap<u64, Rc<dyn Source>>;

/// Guard that pops the scope when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new collecting scope for the given subscriber.
    ///
    /// While this scope is on top of the stack, every observable read is
    /// recorded. Call [`finish`](Self::finish) to pop it and take the reads.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: IndexMap::new(),
            });
        });

        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Run `f` with dependency collection suspended.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        let _scope = Self::push(None);
        f()
    }

    /// Check whether a read right now would be recorded.
    pub fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .is_some_and(|entry| entry.subscriber_id.is_some())
        })
    }

    /// Get the current collecting subscriber, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Record a read of `source` in the current scope.
    ///
    /// Called by observables when they are read. Repeated reads of the same
    /// observable collapse into one dependency.
    pub fn track(source: Rc<dyn Source>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() {
                    entry.dependencies.entry(source.source_id()).or_insert(source);
                }
            }
        });
    }

    /// Pop this scope and return what it collected.
    pub fn finish(mut self) -> Dependencies {
        self.finished = true;
        self.pop()
    }

    fn pop(&self) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            match popped {
                Some(entry) => {
                    debug_assert_eq!(
                        entry.subscriber_id, self.subscriber_id,
                        "ReactiveContext mismatch: expected {:?}, got {:?}",
                        self.subscriber_id, entry.subscriber_id
                    );
                    entry.dependencies
                }
                None => Dependencies::new(),
            }
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            drop(self.pop());
        }
    }
}
