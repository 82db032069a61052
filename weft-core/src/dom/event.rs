//! Events and handlers.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::node::NodeId;

/// An event travelling from its target up through its ancestors.
#[derive(Debug)]
pub struct Event {
    name: String,
    target: NodeId,
    current_target: Cell<NodeId>,
    value: Option<String>,
    stopped: Cell<bool>,
}

impl Event {
    pub(crate) fn new(name: &str, target: NodeId, value: Option<String>) -> Self {
        Self {
            name: name.to_owned(),
            target,
            current_target: Cell::new(target),
            value,
            stopped: Cell::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node the event was dispatched at.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// The node whose handler is running.
    pub fn current_target(&self) -> NodeId {
        self.current_target.get()
    }

    pub(crate) fn set_current_target(&self, node: NodeId) {
        self.current_target.set(node);
    }

    /// Payload carried by input-style events.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Keep the event from reaching further ancestors.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }
}

/// A shared event callback.
///
/// Handlers are compared by the slot they occupy, never by identity: a
/// render produces new closures every time.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);

impl EventHandler {
    pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
        Self(Rc::new(handler))
    }

    pub fn call(&self, event: &Event) {
        (self.0)(event)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

impl<F: Fn(&Event) + 'static> From<F> for EventHandler {
    fn from(handler: F) -> Self {
        Self::new(handler)
    }
}
