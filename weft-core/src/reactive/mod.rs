//! Reactive Primitives
//!
//! This module implements the dependency-tracking half of Weft: observables,
//! expression bindings, batching, and the binding sets components own.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] is a container for mutable state. Reads inside a
//! collecting scope register the observable as a dependency; writes that
//! change the value notify every listener synchronously.
//!
//! ## Expressions
//!
//! An [`ObservableExpression`] runs a read function, subscribes to exactly
//! the observables that function touched, and fires a callback whenever the
//! result changes. It is the building block for `watch_expr` on components
//! and for render bindings.
//!
//! ## Batches
//!
//! [`Runtime::batch`] defers re-evaluations until the batch closes, so an
//! expression that reads several observables written together runs once.
//!
//! # Implementation Notes
//!
//! Dependency collection uses an explicit scope stack
//! ([`ReactiveContext`]) held in a thread-local. Evaluations enter and
//! finish their scope themselves; observables only ask "is anyone
//! collecting right now?".
//!
//! Everything here is single-threaded (`Rc`/`RefCell`): the reactive graph
//! lives on the UI thread.

mod context;
mod dispose;
mod expression;
mod manager;
mod observable;
mod runtime;
mod subscriber;

pub use context::{Dependencies, ReactiveContext};
pub use dispose::{Disposable, DisposableBag};
pub use expression::ObservableExpression;
pub use manager::{Binding, BindingFactory, BindingId, WhenChangeManager};
pub use observable::Observable;
pub use runtime::{Reactive, Runtime};
pub use subscriber::{Listener, Source, SubscriberId, Subscription};
