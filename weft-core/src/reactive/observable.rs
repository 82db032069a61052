//! Observable Implementation
//!
//! An Observable is the leaf reactive primitive. It holds a value and a
//! table of listeners that hear about every change.
//!
//! # How Observables Work
//!
//! 1. Reading an observable inside a collecting scope records it as a
//!    dependency of the scope's owner (see [`ReactiveContext`]).
//!
//! 2. Writing a value that differs from the current one notifies every
//!    listener synchronously, in registration order.
//!
//! 3. Writing an equal value is a no-op: no version bump, no notification.
//!
//! Listeners are held strongly by the observable, but the closures that
//! expression bindings register only hold weak references back to the
//! binding, so an observable never keeps a binding alive.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::context::ReactiveContext;
use super::subscriber::{Listener, Source, SubscriberId, Subscription};

/// Counter for generating unique observable IDs.
static OBSERVABLE_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_observable_id() -> u64 {
    OBSERVABLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

struct ObservableInner<T> {
    id: u64,
    value: RefCell<T>,
    version: Cell<u64>,
    eq: fn(&T, &T) -> bool,
    listeners: RefCell<IndexMap<SubscriberId, Rc<Listener>>>,
}

impl<T: 'static> ObservableInner<T> {
    fn add_listener(self: &Rc<Self>, id: SubscriberId, notify: Rc<dyn Fn()>) -> Subscription {
        let listener = Rc::new(Listener::new(id, notify));
        self.listeners.borrow_mut().insert(id, listener);

        let weak: Weak<Self> = Rc::downgrade(self);
        Subscription::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                let removed = inner.listeners.borrow_mut().shift_remove(&id);
                if let Some(listener) = removed {
                    listener.deactivate();
                }
            }
        })
    }

    fn notify(&self) {
        // Snapshot so listeners may subscribe/unsubscribe while we iterate.
        let snapshot: SmallVec<[Rc<Listener>; 4]> =
            self.listeners.borrow().values().cloned().collect();

        trace!(observable = self.id, listeners = snapshot.len(), "notifying");
        for listener in snapshot {
            listener.notify();
        }
    }
}

impl<T: 'static> Source for Rc<ObservableInner<T>> {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn subscribe_erased(&self, notify: Rc<dyn Fn()>) -> Subscription {
        self.add_listener(SubscriberId::new(), notify)
    }
}

/// A reactive value container.
///
/// Cloning an `Observable` creates another handle to the same value.
///
/// # Example
///
/// ```rust
/// use weft_core::reactive::Observable;
///
/// let count = Observable::new(0);
/// let _sub = count.subscribe(|| println!("changed"));
///
/// count.set(1); // prints "changed"
/// count.set(1); // equal value, nothing happens
/// assert_eq!(count.get(), 1);
/// ```
pub struct Observable<T: 'static> {
    inner: Rc<ObservableInner<T>>,
}

impl<T: PartialEq + 'static> Observable<T> {
    /// Create a new observable that compares values with `PartialEq`.
    pub fn new(value: T) -> Self {
        Self::with_eq(value, |a, b| a == b)
    }
}

impl<T: 'static> Observable<T> {
    /// Create a new observable with a custom equality test.
    ///
    /// Writes for which `eq(current, new)` holds are skipped.
    pub fn with_eq(value: T, eq: fn(&T, &T) -> bool) -> Self {
        Self {
            inner: Rc::new(ObservableInner {
                id: next_observable_id(),
                value: RefCell::new(value),
                version: Cell::new(0),
                eq,
                listeners: RefCell::new(IndexMap::new()),
            }),
        }
    }

    /// Get the observable's unique ID.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Number of accepted writes so far.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    fn track(&self) {
        if ReactiveContext::is_tracking() {
            ReactiveContext::track(Rc::new(Rc::clone(&self.inner)));
        }
    }

    /// Borrow the current value, recording the read in the current scope.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Borrow the current value without recording a dependency.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Store `value` and notify listeners, unless it equals the current one.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let unchanged = (self.inner.eq)(&self.inner.value.borrow(), &value);
        if unchanged {
            trace!(observable = self.inner.id, "skipping equal write");
            return false;
        }

        *self.inner.value.borrow_mut() = value;
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.notify();
        true
    }

    /// Compute a new value from the current one and store it.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.inner.value.borrow());
        self.set(next)
    }

    /// Register a listener that runs after every change.
    ///
    /// The listener stays registered until the returned guard is dropped.
    pub fn subscribe(&self, notify: impl Fn() + 'static) -> Subscription {
        self.inner.add_listener(SubscriberId::new(), Rc::new(notify))
    }

    /// Get the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Get a clone of the current value, recording the read.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get a clone of the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T: 'static> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Debug + 'static> Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observable_get_and_set() {
        let observable = Observable::new(0);
        assert_eq!(observable.get(), 0);

        assert!(observable.set(42));
        assert_eq!(observable.get(), 42);
        assert_eq!(observable.version(), 1);
    }

    #[test]
    fn observable_update() {
        let observable = Observable::new(10);
        observable.update(|v| v + 5);
        assert_eq!(observable.get(), 15);
    }

    #[test]
    fn equal_writes_are_skipped() {
        let observable = Observable::new("a".to_string());
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let _sub = observable.subscribe(move || calls_clone.set(calls_clone.get() + 1));

        assert!(!observable.set("a".to_string()));
        assert_eq!(calls.get(), 0);
        assert_eq!(observable.version(), 0);

        assert!(observable.set("b".to_string()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn listeners_fire_in_registration_order() {
        let observable = Observable::new(0);
        let order = Rc::new(RefCell::new(Vec::new()));

        let subs: Vec<_> = (0..3)
            .map(|n| {
                let order = order.clone();
                observable.subscribe(move || order.borrow_mut().push(n))
            })
            .collect();

        observable.set(1);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        drop(subs);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let observable = Observable::new(0);
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();

        let sub = observable.subscribe(move || calls_clone.set(calls_clone.get() + 1));
        assert_eq!(observable.listener_count(), 1);

        observable.set(1);
        drop(sub);
        assert_eq!(observable.listener_count(), 0);

        observable.set(2);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn listener_removed_mid_pass_is_skipped() {
        let observable = Observable::new(0);
        let second_calls = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let victim_clone = victim.clone();
        let _first = observable.subscribe(move || {
            victim_clone.borrow_mut().take();
        });
        let second_clone = second_calls.clone();
        *victim.borrow_mut() =
            Some(observable.subscribe(move || second_clone.set(second_clone.get() + 1)));

        observable.set(1);
        assert_eq!(second_calls.get(), 0);
        assert_eq!(observable.listener_count(), 1);
    }

    #[test]
    fn custom_equality_compares_identity() {
        let a = Rc::new(5);
        let observable = Observable::with_eq(a.clone(), |x, y| Rc::ptr_eq(x, y));

        assert!(!observable.set(a));
        assert!(observable.set(Rc::new(5)));
    }

    #[test]
    fn reads_register_in_collecting_scope() {
        let observable = Observable::new(1);
        let ctx = ReactiveContext::enter(SubscriberId::new());
        observable.get();
        observable.with(|_| ());
        let deps = ctx.finish();

        assert_eq!(deps.len(), 1);
        assert!(deps.contains_key(&observable.id()));
    }

    #[test]
    fn untracked_reads_do_not_register() {
        let observable = Observable::new(1);
        let ctx = ReactiveContext::enter(SubscriberId::new());
        observable.get_untracked();
        assert!(ctx.finish().is_empty());
    }
}
