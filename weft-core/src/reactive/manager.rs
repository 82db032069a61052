//! Binding sets with a shared lifetime.
//!
//! A [`WhenChangeManager`] owns the expression bindings of one component.
//! Each binding is registered as a factory, so the manager can tear every
//! live expression down on disconnect and build fresh ones on reconnect.
//! The manager never holds a borrow of itself while a binding evaluates:
//! callbacks are free to register further bindings.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::ExprError;

use super::expression::ObservableExpression;

/// A live binding, as the manager sees it.
pub trait Binding {
    fn start(&self) -> Result<(), ExprError>;
    fn refresh(&self) -> Result<(), ExprError>;
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
    fn dependency_count(&self) -> usize;
}

impl<T: 'static> Binding for ObservableExpression<T> {
    fn start(&self) -> Result<(), ExprError> {
        ObservableExpression::start(self)
    }

    fn refresh(&self) -> Result<(), ExprError> {
        ObservableExpression::refresh(self)
    }

    fn dispose(&self) {
        ObservableExpression::dispose(self)
    }

    fn is_disposed(&self) -> bool {
        ObservableExpression::is_disposed(self)
    }

    fn dependency_count(&self) -> usize {
        ObservableExpression::dependency_count(self)
    }
}

/// Builds a fresh, unstarted binding.
pub type BindingFactory = Rc<dyn Fn() -> Rc<dyn Binding>>;

/// Identifies a binding registered with a [`WhenChangeManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingId(u64);

impl BindingId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct BindingSlot {
    id: BindingId,
    factory: BindingFactory,
    live: Option<Rc<dyn Binding>>,
}

/// The set of bindings tied to one owner's connect cycle.
#[derive(Default)]
pub struct WhenChangeManager {
    slots: RefCell<Vec<BindingSlot>>,
    running: Cell<bool>,
}

impl WhenChangeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding.
    ///
    /// If the manager is running, the binding is built and started right
    /// away and the result of its first evaluation is returned alongside the
    /// id. Otherwise it starts with the next [`start_all`](Self::start_all).
    pub fn add(&self, factory: BindingFactory) -> (BindingId, Result<(), ExprError>) {
        let id = BindingId::new();
        let live = self.running.get().then(|| factory());
        self.slots.borrow_mut().push(BindingSlot {
            id,
            factory,
            live: live.clone(),
        });

        let started = match live {
            Some(binding) => binding.start(),
            None => Ok(()),
        };
        (id, started)
    }

    /// Dispose and forget a binding.
    pub fn remove(&self, id: BindingId) -> bool {
        let removed = {
            let mut slots = self.slots.borrow_mut();
            let index = slots.iter().position(|slot| slot.id == id);
            index.map(|index| slots.remove(index))
        };
        match removed {
            Some(slot) => {
                if let Some(live) = slot.live {
                    live.dispose();
                }
                true
            }
            None => false,
        }
    }

    /// Build and start every binding that is not live yet.
    ///
    /// Returns the failures of the first evaluations; failing bindings stay
    /// live so a later change can recover them.
    pub fn start_all(&self) -> Vec<ExprError> {
        self.running.set(true);

        let fresh: Vec<Rc<dyn Binding>> = {
            let mut slots = self.slots.borrow_mut();
            slots
                .iter_mut()
                .filter(|slot| slot.live.is_none())
                .map(|slot| {
                    let binding = (slot.factory)();
                    slot.live = Some(binding.clone());
                    binding
                })
                .collect()
        };

        debug!(count = fresh.len(), "starting bindings");
        fresh
            .into_iter()
            .filter_map(|binding| binding.start().err())
            .collect()
    }

    /// Dispose every live binding. Factories are kept for the next start.
    pub fn stop_all(&self) {
        self.running.set(false);

        let live: Vec<Rc<dyn Binding>> = self
            .slots
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| slot.live.take())
            .collect();

        debug!(count = live.len(), "stopping bindings");
        for binding in live {
            binding.dispose();
        }
    }

    /// Stop everything and forget all factories.
    pub fn clear(&self) {
        self.stop_all();
        self.slots.borrow_mut().clear();
    }

    /// Force a live binding to re-evaluate.
    pub fn refresh(&self, id: BindingId) -> Option<Result<(), ExprError>> {
        let live = self
            .slots
            .borrow()
            .iter()
            .find(|slot| slot.id == id)
            .and_then(|slot| slot.live.clone());
        live.map(|binding| binding.refresh())
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Number of registered bindings, live or not.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Number of bindings currently live.
    pub fn active_count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.live.as_ref().is_some_and(|live| !live.is_disposed()))
            .count()
    }

    /// Total subscriptions held by live bindings.
    pub fn dependency_count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter_map(|slot| slot.live.as_ref())
            .map(|live| live.dependency_count())
            .sum()
    }
}

impl fmt::Debug for WhenChangeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhenChangeManager")
            .field("bindings", &self.len())
            .field("active", &self.active_count())
            .field("running", &self.running.get())
            .finish()
    }
}
