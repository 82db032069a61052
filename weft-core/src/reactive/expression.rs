//! Observable Expressions
//!
//! An `ObservableExpression` wraps a read function, remembers every
//! observable the function touched, and fires a change callback exactly once
//! each time the function's result changes.
//!
//! # How Expressions Work
//!
//! 1. [`start`](ObservableExpression::start) evaluates the read function
//!    inside a collecting [`ReactiveContext`] and always fires the callback
//!    with the first result.
//!
//! 2. After every evaluation, the collected set replaces the subscription
//!    set: observables no longer read are unsubscribed, newly read ones are
//!    subscribed. The subscription set therefore always equals the reads of
//!    the most recent evaluation.
//!
//! 3. When a subscribed observable changes, the expression re-evaluates and
//!    compares the new result with the previous one. The callback only fires
//!    if they differ.
//!
//! # Re-entrancy
//!
//! Each trigger bumps a version counter. A trigger that arrives while the
//! expression is evaluating (or while its callback is running) only bumps
//! the counter; when the current pass ends the expression sees the newer
//! version and runs one more pass. Any number of nested triggers collapse
//! into that single extra pass.
//!
//! # Failures
//!
//! A failing read still commits the dependencies it collected before it
//! failed, so a later write can retrigger it and recover. The previous
//! result is kept. The error goes back to the caller of `start`/`refresh`,
//! or to the `on_error` handler for reactive re-evaluations.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{error, trace, warn};

use crate::error::ExprError;

use super::context::{Dependencies, ReactiveContext};
use super::runtime::{Reactive, Runtime};
use super::subscriber::{SubscriberId, Subscription};

/// Passes after which a self-retriggering expression is abandoned.
const MAX_SETTLE_PASSES: usize = 100;

type ReadFn<T> = Box<dyn Fn() -> Result<T, ExprError>>;
type EqFn<T> = Box<dyn Fn(&T, &T) -> bool>;
type ChangeFn<T> = Box<dyn FnMut(&T)>;
type ErrorFn = Box<dyn FnMut(ExprError)>;

struct ExprInner<T: 'static> {
    id: SubscriberId,
    read: ReadFn<T>,
    eq: EqFn<T>,
    on_change: RefCell<ChangeFn<T>>,
    on_error: RefCell<Option<ErrorFn>>,
    value: RefCell<Option<T>>,
    subscriptions: RefCell<IndexMap<u64, Subscription>>,
    version: Cell<u64>,
    evaluating: Cell<bool>,
    started: Cell<bool>,
    disposed: Cell<bool>,
    evaluations: Cell<usize>,
}

/// Resets the `evaluating` flag even if the read function panics.
struct EvaluatingGuard<'a>(&'a Cell<bool>);

impl<'a> EvaluatingGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for EvaluatingGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: 'static> ExprInner<T> {
    fn trigger(self: &Rc<Self>) {
        if self.disposed.get() {
            return;
        }
        self.version.set(self.version.get() + 1);

        if self.evaluating.get() {
            trace!(subscriber = self.id.raw(), "coalescing re-entrant trigger");
            return;
        }

        let erased: Rc<dyn Reactive> = self.clone();
        if Runtime::defer(&erased) {
            return;
        }

        if let Err(err) = self.run() {
            self.report(err);
        }
    }

    /// Evaluate until no trigger arrived during the last pass.
    fn run(self: &Rc<Self>) -> Result<(), ExprError> {
        let mut first_error = None;

        for _ in 0..MAX_SETTLE_PASSES {
            let seen = self.version.get();
            if let Err(err) = self.evaluate() {
                first_error.get_or_insert(err);
            }
            if self.disposed.get() || self.version.get() == seen {
                return first_error.map_or(Ok(()), Err);
            }
        }

        warn!(
            subscriber = self.id.raw(),
            passes = MAX_SETTLE_PASSES,
            "expression keeps retriggering itself; giving up"
        );
        first_error.map_or(Ok(()), Err)
    }

    fn evaluate(self: &Rc<Self>) -> Result<(), ExprError> {
        let _evaluating = EvaluatingGuard::enter(&self.evaluating);

        let ctx = ReactiveContext::enter(self.id);
        let result = (self.read)();
        let dependencies = ctx.finish();

        self.commit(dependencies);
        self.evaluations.set(self.evaluations.get() + 1);

        let next = result?;
        let changed = match self.value.borrow().as_ref() {
            Some(previous) => !(self.eq)(previous, &next),
            None => true,
        };
        if !changed {
            trace!(subscriber = self.id.raw(), "result unchanged");
            return Ok(());
        }

        *self.value.borrow_mut() = Some(next);

        let current = self.value.borrow();
        if let Some(value) = current.as_ref() {
            let mut on_change = self.on_change.borrow_mut();
            ReactiveContext::untracked(|| (*on_change)(value));
        }
        Ok(())
    }

    /// Swap the subscription set for the freshly collected one.
    fn commit(self: &Rc<Self>, dependencies: Dependencies) {
        if self.disposed.get() {
            return;
        }

        let stale: Vec<Subscription> = {
            let mut subscriptions = self.subscriptions.borrow_mut();
            let stale_ids: Vec<u64> = subscriptions
                .keys()
                .filter(|id| !dependencies.contains_key(*id))
                .copied()
                .collect();
            stale_ids
                .iter()
                .filter_map(|id| subscriptions.shift_remove(id))
                .collect()
        };

        let mut added = 0usize;
        for (source_id, source) in dependencies {
            if self.subscriptions.borrow().contains_key(&source_id) {
                continue;
            }
            let weak: Weak<Self> = Rc::downgrade(self);
            let subscription = source.subscribe_erased(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.trigger();
                }
            }));
            self.subscriptions.borrow_mut().insert(source_id, subscription);
            added += 1;
        }

        if !stale.is_empty() || added > 0 {
            trace!(
                subscriber = self.id.raw(),
                dropped = stale.len(),
                added,
                "dependencies changed"
            );
        }
        drop(stale);
    }

    fn report(&self, err: ExprError) {
        let mut handler = self.on_error.borrow_mut();
        match handler.as_mut() {
            Some(handler) => handler(err),
            None => error!(subscriber = self.id.raw(), error = %err, "expression failed"),
        }
    }

    fn dispose(&self) {
        self.disposed.set(true);
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        drop(subscriptions);
    }
}

impl<T: 'static> Reactive for ExprInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn run_deferred(self: Rc<Self>) {
        if self.disposed.get() || self.evaluating.get() {
            return;
        }
        if let Err(err) = self.run() {
            self.report(err);
        }
    }
}

/// A dependency-tracked computation with a change callback.
///
/// Cloning creates another handle to the same expression. When the last
/// handle is dropped, every subscription is released.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use weft_core::reactive::{Observable, ObservableExpression};
///
/// let count = Observable::new(0);
/// let history = Rc::new(RefCell::new(Vec::new()));
///
/// let source = count.clone();
/// let sink = history.clone();
/// let expr = ObservableExpression::new(
///     move || source.get(),
///     move |value: &i32| sink.borrow_mut().push(*value),
/// );
/// expr.start().unwrap();
///
/// count.set(1);
/// count.set(1);
/// assert_eq!(*history.borrow(), vec![0, 1]);
/// ```
pub struct ObservableExpression<T: 'static> {
    inner: Rc<ExprInner<T>>,
}

impl<T: PartialEq + 'static> ObservableExpression<T> {
    /// Create an expression whose result is compared with `PartialEq`.
    pub fn new(read: impl Fn() -> T + 'static, on_change: impl FnMut(&T) + 'static) -> Self {
        Self::with_eq(move || Ok(read()), |a, b| a == b, on_change)
    }

    /// Create an expression with a fallible read function.
    pub fn try_new(
        read: impl Fn() -> Result<T, ExprError> + 'static,
        on_change: impl FnMut(&T) + 'static,
    ) -> Self {
        Self::with_eq(read, |a, b| a == b, on_change)
    }
}

impl<T: 'static> ObservableExpression<T> {
    /// Create an expression with a custom change test.
    ///
    /// `eq(previous, next)` returning `true` suppresses the callback. Passing
    /// `|_, _| false` turns the expression into an effect that fires on every
    /// dependency change.
    pub fn with_eq(
        read: impl Fn() -> Result<T, ExprError> + 'static,
        eq: impl Fn(&T, &T) -> bool + 'static,
        on_change: impl FnMut(&T) + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(ExprInner {
                id: SubscriberId::new(),
                read: Box::new(read),
                eq: Box::new(eq),
                on_change: RefCell::new(Box::new(on_change)),
                on_error: RefCell::new(None),
                value: RefCell::new(None),
                subscriptions: RefCell::new(IndexMap::new()),
                version: Cell::new(0),
                evaluating: Cell::new(false),
                started: Cell::new(false),
                disposed: Cell::new(false),
                evaluations: Cell::new(0),
            }),
        }
    }

    /// Route failures of reactive re-evaluations to `handler`.
    pub fn on_error(self, handler: impl FnMut(ExprError) + 'static) -> Self {
        *self.inner.on_error.borrow_mut() = Some(Box::new(handler));
        self
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the first evaluation and fire the callback with its result.
    ///
    /// Starting an already started expression does nothing.
    ///
    /// # Panics
    ///
    /// Panics if the expression was disposed.
    pub fn start(&self) -> Result<(), ExprError> {
        assert!(
            !self.inner.disposed.get(),
            "start() called on a disposed expression"
        );
        if self.inner.started.replace(true) {
            return Ok(());
        }
        self.inner.run()
    }

    /// Force a re-evaluation now.
    ///
    /// # Panics
    ///
    /// Panics if the expression was disposed.
    pub fn refresh(&self) -> Result<(), ExprError> {
        assert!(
            !self.inner.disposed.get(),
            "refresh() called on a disposed expression"
        );
        self.inner.started.set(true);
        if self.inner.evaluating.get() {
            self.inner.version.set(self.inner.version.get() + 1);
            return Ok(());
        }
        self.inner.run()
    }

    /// Borrow the latest result.
    pub fn with_value<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        f(self.inner.value.borrow().as_ref())
    }

    /// Number of observables the latest evaluation read.
    pub fn dependency_count(&self) -> usize {
        self.inner.subscriptions.borrow().len()
    }

    /// Number of times the read function has run.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.get()
    }

    /// Release every subscription. The expression never fires again.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }
}

impl<T: Clone + 'static> ObservableExpression<T> {
    /// Get a clone of the latest result.
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }
}

impl<T: 'static> Clone for ObservableExpression<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for ObservableExpression<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableExpression")
            .field("id", &self.inner.id)
            .field("evaluations", &self.evaluation_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;

    fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<T>>>, impl FnMut(&T) + 'static) {
        let history = Rc::new(RefCell::new(Vec::new()));
        let sink = history.clone();
        (history, move |value: &T| sink.borrow_mut().push(value.clone()))
    }

    #[test]
    fn fires_initially_and_on_real_changes_only() {
        let count = Observable::new(0);
        let (history, on_change) = recorder::<i32>();

        let source = count.clone();
        let expr = ObservableExpression::new(move || source.get(), on_change);
        expr.start().unwrap();
        assert_eq!(*history.borrow(), vec![0]);

        count.set(1);
        assert_eq!(*history.borrow(), vec![0, 1]);

        count.set(1);
        assert_eq!(*history.borrow(), vec![0, 1]);
    }

    #[test]
    fn derived_result_suppresses_callback_when_equal() {
        let count = Observable::new(2);
        let (history, on_change) = recorder::<bool>();

        let source = count.clone();
        let expr = ObservableExpression::new(move || source.get() % 2 == 0, on_change);
        expr.start().unwrap();

        count.set(4);
        count.set(6);
        assert_eq!(expr.evaluation_count(), 3);
        assert_eq!(*history.borrow(), vec![true]);

        count.set(7);
        assert_eq!(*history.borrow(), vec![true, false]);
    }

    #[test]
    fn dependency_set_follows_branches() {
        let use_b = Observable::new(true);
        let b = Observable::new(1);
        let c = Observable::new(100);
        let (history, on_change) = recorder::<i32>();

        let (flag, b_src, c_src) = (use_b.clone(), b.clone(), c.clone());
        let expr = ObservableExpression::new(
            move || if flag.get() { b_src.get() } else { c_src.get() },
            on_change,
        );
        expr.start().unwrap();
        assert_eq!(b.listener_count(), 1);
        assert_eq!(c.listener_count(), 0);

        use_b.set(false);
        assert_eq!(b.listener_count(), 0);
        assert_eq!(c.listener_count(), 1);

        b.set(2);
        assert_eq!(*history.borrow(), vec![1, 100]);

        c.set(101);
        assert_eq!(*history.borrow(), vec![1, 100, 101]);
    }

    #[test]
    fn failing_read_keeps_dependencies_and_previous_value() {
        let input = Observable::new(1);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let (history, on_change) = recorder::<i32>();

        let source = input.clone();
        let sink = errors.clone();
        let expr = ObservableExpression::try_new(
            move || {
                let value = source.get();
                if value < 0 {
                    Err(ExprError::failed("negative"))
                } else {
                    Ok(value)
                }
            },
            on_change,
        )
        .on_error(move |err| sink.borrow_mut().push(err));
        expr.start().unwrap();

        input.set(-1);
        assert_eq!(errors.borrow().len(), 1);
        assert_eq!(expr.get(), Some(1));
        assert_eq!(input.listener_count(), 1);

        input.set(5);
        assert_eq!(*history.borrow(), vec![1, 5]);
    }

    #[test]
    fn start_returns_initial_failure() {
        let expr = ObservableExpression::<i32>::try_new(
            || Err(ExprError::failed("broken")),
            |_| {},
        );
        assert_eq!(expr.start(), Err(ExprError::failed("broken")));
    }

    #[test]
    fn reentrant_write_coalesces_into_one_extra_pass() {
        let count = Observable::new(0);
        let (history, _) = recorder::<i32>();

        let source = count.clone();
        let writer = count.clone();
        let sink = history.clone();
        let expr = ObservableExpression::new(
            move || source.get(),
            move |value: &i32| {
                sink.borrow_mut().push(*value);
                if *value == 1 {
                    // Two writes from inside the callback.
                    writer.set(2);
                    writer.set(3);
                }
            },
        );
        expr.start().unwrap();

        count.set(1);
        assert_eq!(*history.borrow(), vec![0, 1, 3]);
        assert_eq!(expr.evaluation_count(), 3);
    }

    #[test]
    fn writes_outside_batch_rerun_per_write() {
        let a = Observable::new(1);
        let b = Observable::new(10);
        let (history, on_change) = recorder::<i32>();

        let (a_src, b_src) = (a.clone(), b.clone());
        let expr = ObservableExpression::new(move || a_src.get() + b_src.get(), on_change);
        expr.start().unwrap();

        a.set(2);
        b.set(20);
        assert_eq!(expr.evaluation_count(), 3);
        assert_eq!(*history.borrow(), vec![11, 12, 22]);
    }

    #[test]
    fn batched_writes_rerun_once() {
        let a = Observable::new(1);
        let b = Observable::new(10);
        let (history, on_change) = recorder::<i32>();

        let (a_src, b_src) = (a.clone(), b.clone());
        let expr = ObservableExpression::new(move || a_src.get() + b_src.get(), on_change);
        expr.start().unwrap();

        Runtime::batch(|| {
            a.set(2);
            b.set(20);
            assert_eq!(expr.evaluation_count(), 1);
        });

        assert_eq!(expr.evaluation_count(), 2);
        assert_eq!(*history.borrow(), vec![11, 22]);
    }

    #[test]
    fn dispose_releases_subscriptions() {
        let count = Observable::new(0);
        let (history, on_change) = recorder::<i32>();

        let source = count.clone();
        let expr = ObservableExpression::new(move || source.get(), on_change);
        expr.start().unwrap();
        assert_eq!(count.listener_count(), 1);

        expr.dispose();
        assert_eq!(count.listener_count(), 0);
        count.set(9);
        assert_eq!(*history.borrow(), vec![0]);
    }

    #[test]
    fn dropping_last_handle_releases_subscriptions() {
        let count = Observable::new(0);
        let source = count.clone();
        let expr = ObservableExpression::new(move || source.get(), |_| {});
        expr.start().unwrap();
        assert_eq!(count.listener_count(), 1);

        drop(expr);
        assert_eq!(count.listener_count(), 0);
    }

    #[test]
    #[should_panic(expected = "disposed expression")]
    fn refresh_after_dispose_panics() {
        let expr = ObservableExpression::new(|| 1, |_| {});
        expr.start().unwrap();
        expr.dispose();
        let _ = expr.refresh();
    }

    #[test]
    fn callback_reads_are_not_tracked() {
        let tracked = Observable::new(0);
        let peeked = Observable::new(0);

        let (source, peek) = (tracked.clone(), peeked.clone());
        let expr = ObservableExpression::new(
            move || source.get(),
            move |_: &i32| {
                peek.get();
            },
        );
        expr.start().unwrap();

        assert_eq!(expr.dependency_count(), 1);
        assert_eq!(peeked.listener_count(), 0);
    }
}
