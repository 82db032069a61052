//! Subscriber types for the reactive system.
//!
//! A subscriber is anything that wants to hear about observable changes:
//! expression bindings, ad-hoc listeners registered by components, and the
//! render bindings of rendering components. This module also defines the
//! [`Source`] seam that lets a collecting scope subscribe to an observable
//! without knowing its value type.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscriber.
///
/// Each subscriber (expression binding, listener) gets a unique ID when
/// created. Observables key their listener tables by it, and the batch
/// queue uses it to deduplicate deferred re-evaluations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered notification callback.
///
/// The `active` flag lets an observable skip listeners that were removed
/// while a notification pass was already iterating over a snapshot.
pub struct Listener {
    id: SubscriberId,
    active: Cell<bool>,
    notify: Rc<dyn Fn()>,
}

impl Listener {
    pub fn new(id: SubscriberId, notify: Rc<dyn Fn()>) -> Self {
        Self {
            id,
            active: Cell::new(true),
            notify,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    pub fn deactivate(&self) {
        self.active.set(false);
    }

    /// Invoke the callback if the listener is still registered.
    pub fn notify(&self) {
        if self.active.get() {
            (self.notify)();
        }
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("active", &self.active.get())
            .finish()
    }
}

/// Type-erased view of an observable, as seen by a collecting scope.
pub trait Source {
    /// Stable identity of the underlying observable.
    fn source_id(&self) -> u64;

    /// Register `notify` to run whenever the value changes.
    fn subscribe_erased(&self, notify: Rc<dyn Fn()>) -> Subscription;
}

/// Guard for a registered listener. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriberId,
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, cancel: impl FnOnce() + 'static) -> Self {
        Self {
            id,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unsubscribe now. Equivalent to dropping the guard.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn deactivated_listener_is_silent() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let listener = Listener::new(
            SubscriberId::new(),
            Rc::new(move || calls_clone.set(calls_clone.get() + 1)),
        );

        listener.notify();
        assert_eq!(calls.get(), 1);

        listener.deactivate();
        listener.notify();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn subscription_cancels_once() {
        let cancelled = Rc::new(Cell::new(0));
        let cancelled_clone = cancelled.clone();
        let sub = Subscription::new(SubscriberId::new(), move || {
            cancelled_clone.set(cancelled_clone.get() + 1)
        });

        sub.unsubscribe();
        assert_eq!(cancelled.get(), 1);
    }
}
