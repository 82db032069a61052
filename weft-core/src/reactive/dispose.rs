//! Run-once cleanup handles.
//!
//! A [`Disposable`] wraps a cleanup closure that runs exactly once: either
//! when [`dispose`](Disposable::dispose) is called or when the handle is
//! dropped. Render outputs and collection entries use them to tie resources
//! to the lifetime of what they produced.

use std::fmt;

use super::subscriber::Subscription;

/// A cleanup action that runs exactly once.
#[must_use = "dropping a Disposable runs its cleanup immediately"]
pub struct Disposable {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl Disposable {
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// A disposable with nothing to clean up.
    pub fn noop() -> Self {
        Self { cleanup: None }
    }

    /// Run the cleanup now.
    pub fn dispose(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        self.run();
    }
}

impl From<Subscription> for Disposable {
    fn from(subscription: Subscription) -> Self {
        Self::new(move || subscription.unsubscribe())
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("pending", &self.cleanup.is_some())
            .finish()
    }
}

/// An ordered collection of disposables released together.
#[derive(Debug, Default)]
pub struct DisposableBag {
    items: Vec<Disposable>,
}

impl DisposableBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, disposable: impl Into<Disposable>) {
        self.items.push(disposable.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Dispose everything, in the order it was added.
    pub fn dispose_all(&mut self) {
        for item in self.items.drain(..) {
            item.dispose();
        }
    }
}

impl Drop for DisposableBag {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
