//! The live tree.
//!
//! [`Document`] is a cheap, cloneable handle to a tree of elements, text
//! nodes, and detached fragments. It is the host environment as far as the
//! rest of the crate is concerned: components register their elements as
//! hosts, the reconciler mutates it, and events are dispatched through it.
//!
//! # Re-entrancy
//!
//! Every public method borrows the tree only for the duration of the
//! operation itself. Host lifecycle hooks and event handlers run after the
//! borrow is released, so they may freely call back into the document.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::DomError;

use super::event::{Event, EventHandler};
use super::mutation::Mutation;
use super::node::{AttrValue, NodeData, NodeId, NodeKind, Payload};

/// Callbacks a host element receives from the document.
pub trait HostHooks {
    /// The host became reachable from the document root.
    fn connected(&self);

    /// The host stopped being reachable from the document root.
    fn disconnected(&self);

    /// The host environment reports that the host's content changed behind
    /// the framework's back.
    fn external_mutation(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Connected,
    Disconnected,
}

type Transitions = Vec<(Weak<dyn HostHooks>, Transition)>;

struct DocumentInner {
    root: NodeId,
    nodes: HashMap<NodeId, NodeData>,
    hosts: HashMap<NodeId, Weak<dyn HostHooks>>,
    recording: bool,
    log: Vec<Mutation>,
}

impl DocumentInner {
    fn node(&self, id: NodeId) -> Result<&NodeData, DomError> {
        self.nodes.get(&id).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData, DomError> {
        self.nodes.get_mut(&id).ok_or(DomError::UnknownNode(id))
    }

    fn record(&mut self, mutation: Mutation) {
        if self.recording {
            self.log.push(mutation);
        }
    }

    fn create(&mut self, data: NodeData) -> NodeId {
        let id = NodeId::new();
        let mutation = match &data.payload {
            Payload::Element { tag, .. } => Mutation::CreateElement {
                node: id,
                tag: tag.clone(),
            },
            Payload::Text(_) => Mutation::CreateText { node: id },
            Payload::Fragment => Mutation::CreateFragment { node: id },
        };
        self.nodes.insert(id, data);
        self.record(mutation);
        id
    }

    fn is_connected(&self, mut id: NodeId) -> bool {
        loop {
            if id == self.root {
                return true;
            }
            match self.nodes.get(&id).and_then(|node| node.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.nodes.get(&id).and_then(|node| node.parent) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    /// Whether `node` is registered and its hooks are still alive.
    fn is_live_host(&self, node: NodeId) -> bool {
        self.hosts
            .get(&node)
            .is_some_and(|hooks| hooks.strong_count() > 0)
    }

    /// Hosts in the subtree rooted at `id`, in document order.
    fn hosts_in(&self, id: NodeId, transition: Transition, out: &mut Transitions) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(hook) = self.hosts.get(&current) {
                out.push((hook.clone(), transition));
            }
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        before: Option<NodeId>,
        out: &mut Transitions,
    ) -> Result<(), DomError> {
        if !self.node(parent)?.is_container() {
            return Err(DomError::NotAContainer(parent));
        }
        let kind = self.node(node)?.kind();
        if let Some(before) = before {
            if self.node(before)?.parent != Some(parent) {
                return Err(DomError::NotAChild { parent, node: before });
            }
        }
        if self.is_ancestor_or_self(node, parent) {
            return Err(DomError::Cycle { parent, node });
        }
        if before == Some(node) {
            return Ok(());
        }

        if kind == NodeKind::Fragment {
            // Splice the fragment's children across; the fragment stays empty.
            let children = self.node(node)?.children.clone();
            for child in children {
                self.insert_before(parent, child, before, out)?;
            }
            return Ok(());
        }

        let was_connected = self.is_connected(node);
        let previous_parent = self.node(node)?.parent;
        if let Some(previous) = previous_parent {
            self.node_mut(previous)?.children.retain(|child| *child != node);
        }

        let siblings = &mut self.node_mut(parent)?.children;
        let index = before
            .and_then(|before| siblings.iter().position(|child| *child == before))
            .unwrap_or(siblings.len());
        siblings.insert(index, node);
        self.node_mut(node)?.parent = Some(parent);

        self.record(match previous_parent {
            Some(_) => Mutation::Move { parent, node, before },
            None => Mutation::Insert { parent, node, before },
        });

        let now_connected = self.is_connected(node);
        match (was_connected, now_connected) {
            (false, true) => self.hosts_in(node, Transition::Connected, out),
            (true, false) => self.hosts_in(node, Transition::Disconnected, out),
            _ => {}
        }
        Ok(())
    }

    fn remove_child(
        &mut self,
        parent: NodeId,
        node: NodeId,
        out: &mut Transitions,
    ) -> Result<(), DomError> {
        if self.node(node)?.parent != Some(parent) {
            return Err(DomError::NotAChild { parent, node });
        }
        let was_connected = self.is_connected(node);

        self.node_mut(parent)?.children.retain(|child| *child != node);
        self.node_mut(node)?.parent = None;
        self.record(Mutation::Remove { parent, node });

        if was_connected {
            self.hosts_in(node, Transition::Disconnected, out);
        }
        Ok(())
    }

    fn element_mut(
        &mut self,
        id: NodeId,
    ) -> Result<
        (
            &mut indexmap::IndexMap<String, AttrValue>,
            &mut indexmap::IndexMap<String, EventHandler>,
        ),
        DomError,
    > {
        match &mut self.node_mut(id)?.payload {
            Payload::Element {
                attributes,
                listeners,
                ..
            } => Ok((attributes, listeners)),
            _ => Err(DomError::NotAContainer(id)),
        }
    }
}

fn deliver(transitions: Transitions) {
    for (hook, transition) in transitions {
        let Some(hook) = hook.upgrade() else { continue };
        match transition {
            Transition::Connected => hook.connected(),
            Transition::Disconnected => hook.disconnected(),
        }
    }
}

/// Handle to a live tree.
///
/// Cloning creates another handle to the same tree.
#[derive(Clone)]
pub struct Document {
    inner: Rc<RefCell<DocumentInner>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document with an empty, connected `body` root.
    pub fn new() -> Self {
        let root = NodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(root, NodeData::element("body"));
        Self {
            inner: Rc::new(RefCell::new(DocumentInner {
                root,
                nodes,
                hosts: HashMap::new(),
                recording: false,
                log: Vec::new(),
            })),
        }
    }

    /// The connected root element.
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    // ------------------------------------------------------------------
    // Creation
    // ------------------------------------------------------------------

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeData::element(tag))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner.borrow_mut().create(NodeData::text(text))
    }

    /// Create a detached container whose children move into whatever
    /// parent it is inserted into.
    pub fn create_fragment(&self) -> NodeId {
        self.inner.borrow_mut().create(NodeData::fragment())
    }

    // ------------------------------------------------------------------
    // Structure
    // ------------------------------------------------------------------

    /// Insert `node` into `parent` before `before` (or at the end).
    ///
    /// A node that already has a parent is moved in a single operation.
    pub fn insert_before(
        &self,
        parent: NodeId,
        node: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), DomError> {
        let mut transitions = Transitions::new();
        self.inner
            .borrow_mut()
            .insert_before(parent, node, before, &mut transitions)?;
        deliver(transitions);
        Ok(())
    }

    pub fn append_child(&self, parent: NodeId, node: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, node, None)
    }

    pub fn remove_child(&self, parent: NodeId, node: NodeId) -> Result<(), DomError> {
        let mut transitions = Transitions::new();
        self.inner
            .borrow_mut()
            .remove_child(parent, node, &mut transitions)?;
        deliver(transitions);
        Ok(())
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace_child(&self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), DomError> {
        if new == old {
            return match self.inner.borrow().node(old)?.parent {
                Some(owner) if owner == parent => Ok(()),
                _ => Err(DomError::NotAChild { parent, node: old }),
            };
        }
        let mut transitions = Transitions::new();
        {
            let mut inner = self.inner.borrow_mut();
            inner.insert_before(parent, new, Some(old), &mut transitions)?;
            inner.remove_child(parent, old, &mut transitions)?;
        }
        deliver(transitions);
        Ok(())
    }

    /// Free a detached subtree.
    pub fn release(&self, node: NodeId) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        if inner.node(node)?.parent.is_some() || node == inner.root {
            return Err(DomError::StillAttached(node));
        }

        let mut stack = vec![node];
        let mut freed = 0usize;
        while let Some(current) = stack.pop() {
            if let Some(data) = inner.nodes.remove(&current) {
                stack.extend(data.children);
                inner.hosts.remove(&current);
                freed += 1;
            }
        }
        trace!(node = %node, freed, "released subtree");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content
    // ------------------------------------------------------------------

    pub fn set_attribute(
        &self,
        node: NodeId,
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let (attributes, _) = inner.element_mut(node)?;
        attributes.insert(name.to_owned(), value.into());
        inner.record(Mutation::SetAttribute {
            node,
            name: name.to_owned(),
        });
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let (attributes, _) = inner.element_mut(node)?;
        if attributes.shift_remove(name).is_some() {
            inner.record(Mutation::RemoveAttribute {
                node,
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<AttrValue> {
        let inner = self.inner.borrow();
        match &inner.nodes.get(&node)?.payload {
            Payload::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, AttrValue)> {
        let inner = self.inner.borrow();
        match inner.nodes.get(&node).map(|data| &data.payload) {
            Some(Payload::Element { attributes, .. }) => attributes
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Replace a text node's payload in place.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        match &mut inner.node_mut(node)?.payload {
            Payload::Text(content) => {
                content.clear();
                content.push_str(text);
            }
            _ => return Err(DomError::NotAContainer(node)),
        }
        inner.record(Mutation::SetText { node });
        Ok(())
    }

    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.payload {
            Payload::Text(content) => Some(content.clone()),
            _ => None,
        }
    }

    /// Concatenated text of a subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            let Some(data) = inner.nodes.get(&current) else { continue };
            if let Payload::Text(content) = &data.payload {
                out.push_str(content);
            }
            stack.extend(data.children.iter().rev().copied());
        }
        out
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    pub fn add_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let (_, listeners) = inner.element_mut(node)?;
        let existed = listeners.insert(event.to_owned(), handler).is_some();
        if !existed {
            inner.record(Mutation::AddListener {
                node,
                event: event.to_owned(),
            });
        }
        Ok(())
    }

    /// Swap the handler in an existing listener slot.
    ///
    /// The registration itself is untouched, so nothing is logged. Falls
    /// back to [`add_listener`](Self::add_listener) for an empty slot.
    pub fn replace_listener(
        &self,
        node: NodeId,
        event: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        {
            let mut inner = self.inner.borrow_mut();
            let (_, listeners) = inner.element_mut(node)?;
            if let Some(slot) = listeners.get_mut(event) {
                *slot = handler;
                return Ok(());
            }
        }
        self.add_listener(node, event, handler)
    }

    pub fn remove_listener(&self, node: NodeId, event: &str) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        let (_, listeners) = inner.element_mut(node)?;
        if listeners.shift_remove(event).is_some() {
            inner.record(Mutation::RemoveListener {
                node,
                event: event.to_owned(),
            });
        }
        Ok(())
    }

    pub fn listener_count(&self, node: NodeId) -> usize {
        match self.inner.borrow().nodes.get(&node).map(|data| &data.payload) {
            Some(Payload::Element { listeners, .. }) => listeners.len(),
            _ => 0,
        }
    }

    /// Dispatch an event at `target` and bubble it to the root.
    ///
    /// Returns the number of handlers that ran.
    pub fn dispatch_event(
        &self,
        target: NodeId,
        name: &str,
        value: Option<String>,
    ) -> Result<usize, DomError> {
        let path: SmallVec<[NodeId; 16]> = {
            let inner = self.inner.borrow();
            inner.node(target)?;
            let mut path = SmallVec::new();
            let mut current = Some(target);
            while let Some(id) = current {
                path.push(id);
                current = inner.nodes.get(&id).and_then(|node| node.parent);
            }
            path
        };

        let event = Event::new(name, target, value);
        let mut invoked = 0;
        for node in path {
            let handler = match self.inner.borrow().nodes.get(&node).map(|data| &data.payload) {
                Some(Payload::Element { listeners, .. }) => listeners.get(name).cloned(),
                _ => None,
            };
            if let Some(handler) = handler {
                event.set_current_target(node);
                handler.call(&event);
                invoked += 1;
            }
            if event.is_propagation_stopped() {
                break;
            }
        }
        trace!(target = %target, event = name, invoked, "dispatched");
        Ok(invoked)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn contains(&self, node: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&node)
    }

    pub fn kind(&self, node: NodeId) -> Option<NodeKind> {
        self.inner.borrow().nodes.get(&node).map(NodeData::kind)
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.payload {
            Payload::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DomError> {
        Ok(self.inner.borrow().node(node)?.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.nodes.contains_key(&node) && inner.is_connected(node)
    }

    /// Number of live nodes, the root included.
    pub fn node_count(&self) -> usize {
        self.inner.borrow().nodes.len()
    }

    /// Find the first descendant of `scope` whose `id` attribute is `id`.
    ///
    /// The search does not descend into other hosts: a nested host element
    /// can match, its content cannot.
    pub fn find_by_id(&self, scope: NodeId, id: &str) -> Option<NodeId> {
        let inner = self.inner.borrow();
        let mut stack: Vec<NodeId> = inner.nodes.get(&scope)?.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(data) = inner.nodes.get(&current) else { continue };
            if let Payload::Element { attributes, .. } = &data.payload {
                if matches!(attributes.get("id"), Some(AttrValue::Str(value)) if value == id) {
                    return Some(current);
                }
            }
            if !inner.is_live_host(current) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // Hosts
    // ------------------------------------------------------------------

    /// Make `node` a host element that receives lifecycle hooks.
    pub fn register_host(&self, node: NodeId, hooks: Weak<dyn HostHooks>) -> Result<(), DomError> {
        let mut inner = self.inner.borrow_mut();
        if inner.node(node)?.kind() != NodeKind::Element {
            return Err(DomError::NotAContainer(node));
        }
        inner.hosts.retain(|_, hooks| hooks.strong_count() > 0);
        inner.hosts.insert(node, hooks);
        debug!(host = %node, "registered host");
        Ok(())
    }

    pub fn unregister_host(&self, node: NodeId) {
        self.inner.borrow_mut().hosts.remove(&node);
    }

    pub fn is_host(&self, node: NodeId) -> bool {
        self.inner.borrow().is_live_host(node)
    }

    /// Tell a host that its content changed outside the framework.
    pub fn notify_external_mutation(&self, host: NodeId) -> Result<(), DomError> {
        let hook = {
            let inner = self.inner.borrow();
            inner.node(host)?;
            inner.hosts.get(&host).and_then(Weak::upgrade)
        };
        if let Some(hook) = hook {
            hook.external_mutation();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Start or stop appending to the mutation log.
    pub fn record_mutations(&self, enabled: bool) {
        self.inner.borrow_mut().recording = enabled;
    }

    /// Drain the mutation log.
    pub fn take_mutations(&self) -> Vec<Mutation> {
        std::mem::take(&mut self.inner.borrow_mut().log)
    }

    /// Serialize a subtree as markup.
    pub fn to_html(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        write_html(&inner, node, &mut out);
        out
    }
}

fn write_html(inner: &DocumentInner, node: NodeId, out: &mut String) {
    let Some(data) = inner.nodes.get(&node) else { return };
    match &data.payload {
        Payload::Text(content) => out.push_str(&escape(content)),
        Payload::Fragment => {
            for child in &data.children {
                write_html(inner, *child, out);
            }
        }
        Payload::Element {
            tag, attributes, ..
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attributes {
                let _ = write!(out, " {name}=\"{}\"", escape(&value.to_string()));
            }
            out.push('>');
            for child in &data.children {
                write_html(inner, *child, out);
            }
            let _ = write!(out, "</{tag}>");
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Document")
            .field("root", &inner.root)
            .field("nodes", &inner.nodes.len())
            .field("hosts", &inner.hosts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct RecordingHost {
        events: RefCell<Vec<&'static str>>,
    }

    impl HostHooks for RecordingHost {
        fn connected(&self) {
            self.events.borrow_mut().push("connected");
        }

        fn disconnected(&self) {
            self.events.borrow_mut().push("disconnected");
        }

        fn external_mutation(&self) {
            self.events.borrow_mut().push("mutation");
        }
    }

    fn host(doc: &Document, node: NodeId) -> Rc<RecordingHost> {
        let hooks = Rc::new(RecordingHost::default());
        let weak: Weak<RecordingHost> = Rc::downgrade(&hooks);
        doc.register_host(node, weak).unwrap();
        hooks
    }

    #[test]
    fn append_and_serialize() {
        let doc = Document::new();
        let list = doc.create_element("ul");
        doc.set_attribute(list, "class", "items").unwrap();
        let item = doc.create_element("li");
        let label = doc.create_text("a < b");
        doc.append_child(item, label).unwrap();
        doc.append_child(list, item).unwrap();

        assert_eq!(doc.to_html(list), "<ul class=\"items\"><li>a &lt; b</li></ul>");
        assert_eq!(doc.text_content(list), "a < b");
    }

    #[test]
    fn reinserting_an_attached_node_is_a_move() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let a = doc.create_element("a");
        let b = doc.create_element("b");
        doc.append_child(parent, a).unwrap();
        doc.append_child(parent, b).unwrap();

        doc.record_mutations(true);
        doc.insert_before(parent, b, Some(a)).unwrap();

        assert_eq!(doc.children(parent), vec![b, a]);
        assert_eq!(
            doc.take_mutations(),
            vec![Mutation::Move {
                parent,
                node: b,
                before: Some(a)
            }]
        );
    }

    #[test]
    fn insert_rejects_cycles_and_strangers() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner).unwrap();

        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::Cycle {
                parent: inner,
                node: outer
            })
        );

        let stranger = doc.create_element("p");
        let other = doc.create_element("p");
        assert_eq!(
            doc.insert_before(outer, other, Some(stranger)),
            Err(DomError::NotAChild {
                parent: outer,
                node: stranger
            })
        );
    }

    #[test]
    fn fragments_splice_their_children() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let fragment = doc.create_fragment();
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(fragment, a).unwrap();
        doc.append_child(fragment, b).unwrap();

        doc.append_child(parent, fragment).unwrap();
        assert_eq!(doc.children(parent), vec![a, b]);
        assert!(doc.children(fragment).is_empty());
    }

    #[test]
    fn hosts_hear_connection_changes() {
        let doc = Document::new();
        let wrapper = doc.create_element("section");
        let element = doc.create_element("x-panel");
        doc.append_child(wrapper, element).unwrap();
        let hooks = host(&doc, element);

        doc.append_child(doc.root(), wrapper).unwrap();
        assert!(doc.is_connected(element));

        // Moving within the connected tree is not a transition.
        let sibling = doc.create_element("div");
        doc.append_child(doc.root(), sibling).unwrap();
        doc.insert_before(doc.root(), wrapper, None).unwrap();

        doc.remove_child(doc.root(), wrapper).unwrap();
        doc.notify_external_mutation(element).unwrap();

        assert_eq!(
            *hooks.events.borrow(),
            vec!["connected", "disconnected", "mutation"]
        );
    }

    #[test]
    fn release_frees_detached_subtrees_only() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let child = doc.create_text("x");
        doc.append_child(parent, child).unwrap();
        let before = doc.node_count();

        assert_eq!(doc.release(child), Err(DomError::StillAttached(child)));
        doc.release(parent).unwrap();
        assert_eq!(doc.node_count(), before - 2);
        assert!(!doc.contains(child));
    }

    #[test]
    fn events_bubble_until_stopped() {
        let doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("button");
        doc.append_child(outer, inner).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        doc.add_listener(
            inner,
            "click",
            EventHandler::new(move |event: &Event| {
                log.borrow_mut().push(("inner", event.value().map(str::to_owned)))
            }),
        )
        .unwrap();
        let log = seen.clone();
        doc.add_listener(
            outer,
            "click",
            EventHandler::new(move |event: &Event| {
                assert_eq!(event.current_target(), outer);
                log.borrow_mut().push(("outer", None));
                event.stop_propagation();
            }),
        )
        .unwrap();

        let invoked = doc.dispatch_event(inner, "click", Some("1".into())).unwrap();
        assert_eq!(invoked, 2);
        assert_eq!(
            *seen.borrow(),
            vec![("inner", Some("1".to_string())), ("outer", None)]
        );
    }

    #[test]
    fn replacing_a_listener_is_silent() {
        let doc = Document::new();
        let button = doc.create_element("button");
        let hits = Rc::new(Cell::new(0));

        doc.record_mutations(true);
        doc.add_listener(button, "click", EventHandler::new(|_| {})).unwrap();
        let counter = hits.clone();
        doc.replace_listener(
            button,
            "click",
            EventHandler::new(move |_| counter.set(counter.get() + 1)),
        )
        .unwrap();

        let log = doc.take_mutations();
        assert_eq!(log.len(), 1);
        doc.dispatch_event(button, "click", None).unwrap();
        assert_eq!(hits.get(), 1);
        assert_eq!(doc.listener_count(button), 1);
    }

    #[test]
    fn find_by_id_stops_at_nested_hosts() {
        let doc = Document::new();
        let scope = doc.create_element("x-outer");
        let own = doc.create_element("span");
        doc.set_attribute(own, "id", "title").unwrap();
        let nested = doc.create_element("x-inner");
        doc.set_attribute(nested, "id", "inner").unwrap();
        let private = doc.create_element("span");
        doc.set_attribute(private, "id", "secret").unwrap();
        doc.append_child(nested, private).unwrap();
        doc.append_child(scope, own).unwrap();
        doc.append_child(scope, nested).unwrap();
        let _hooks = host(&doc, nested);

        assert_eq!(doc.find_by_id(scope, "title"), Some(own));
        assert_eq!(doc.find_by_id(scope, "inner"), Some(nested));
        assert_eq!(doc.find_by_id(scope, "secret"), None);
        assert_eq!(doc.find_by_id(nested, "secret"), Some(private));
    }

    #[test]
    fn dropped_hosts_stop_hiding_their_content() {
        let doc = Document::new();
        let scope = doc.create_element("x-outer");
        let nested = doc.create_element("x-inner");
        let private = doc.create_element("span");
        doc.set_attribute(private, "id", "secret").unwrap();
        doc.append_child(nested, private).unwrap();
        doc.append_child(scope, nested).unwrap();

        let hooks = host(&doc, nested);
        assert_eq!(doc.find_by_id(scope, "secret"), None);

        drop(hooks);
        assert!(!doc.is_host(nested));
        assert_eq!(doc.find_by_id(scope, "secret"), Some(private));
    }

    #[test]
    fn replacing_a_child_with_itself_keeps_it() {
        let doc = Document::new();
        let parent = doc.create_element("div");
        let child = doc.create_element("span");
        doc.append_child(parent, child).unwrap();

        doc.replace_child(parent, child, child).unwrap();
        assert_eq!(doc.children(parent), vec![child]);
        assert_eq!(doc.parent(child), Ok(Some(parent)));

        let stranger = doc.create_element("p");
        assert_eq!(
            doc.replace_child(parent, stranger, stranger),
            Err(DomError::NotAChild { parent, node: stranger })
        );
    }
}
