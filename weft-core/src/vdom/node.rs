//! Virtual node types and builders.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::dom::{AttrValue, Event, EventHandler};

/// Identity of a child within its sibling list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(Rc<str>),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(value) => write!(f, "{value}"),
            Key::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Int(value.into())
    }
}

impl From<u32> for Key {
    fn from(value: u32) -> Self {
        Key::Int(value.into())
    }
}

impl From<usize> for Key {
    fn from(value: usize) -> Self {
        Key::Int(value as i64)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Str(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Str(value.into())
    }
}

#[derive(Debug)]
pub struct ElementNode {
    tag: String,
    key: Option<Key>,
    attrs: IndexMap<String, AttrValue>,
    events: IndexMap<String, EventHandler>,
    children: Vec<VNode>,
}

impl ElementNode {
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn attrs(&self) -> &IndexMap<String, AttrValue> {
        &self.attrs
    }

    pub fn events(&self) -> &IndexMap<String, EventHandler> {
        &self.events
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TextNode {
    text: String,
}

impl TextNode {
    pub fn text(&self) -> &str {
        &self.text
    }
}

#[derive(Debug)]
pub struct FragmentNode {
    children: Vec<VNode>,
}

impl FragmentNode {
    pub fn children(&self) -> &[VNode] {
        &self.children
    }
}

/// An immutable description of rendered output.
///
/// Each variant carries only the fields its kind needs. Cloning shares the
/// underlying node.
#[derive(Debug, Clone)]
pub enum VNode {
    Element(Rc<ElementNode>),
    Text(Rc<TextNode>),
    Fragment(Rc<FragmentNode>),
}

impl VNode {
    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element(element) => element.key.as_ref(),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&ElementNode> {
        match self {
            VNode::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    /// Whether a live node built for `self` can be patched into `other`.
    pub fn same_shape(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => a.tag == b.tag && a.key == b.key,
            (VNode::Text(_), VNode::Text(_)) => true,
            (VNode::Fragment(_), VNode::Fragment(_)) => true,
            _ => false,
        }
    }

    /// Whether both values share the same underlying node.
    pub fn ptr_eq(&self, other: &VNode) -> bool {
        match (self, other) {
            (VNode::Element(a), VNode::Element(b)) => Rc::ptr_eq(a, b),
            (VNode::Text(a), VNode::Text(b)) => Rc::ptr_eq(a, b),
            (VNode::Fragment(a), VNode::Fragment(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for VNode {
    fn from(value: &str) -> Self {
        text(value)
    }
}

impl From<String> for VNode {
    fn from(value: String) -> Self {
        VNode::Text(Rc::new(TextNode { text: value }))
    }
}

/// Builder returned by [`h`].
#[derive(Debug)]
#[must_use]
pub struct ElementBuilder {
    node: ElementNode,
}

/// Start describing an element.
///
/// ```
/// use weft_core::vdom::h;
///
/// let item = h("li")
///     .key(7)
///     .attr("class", "row")
///     .on("click", |_| {})
///     .text("seven")
///     .build();
/// assert_eq!(item.key().map(|k| k.to_string()), Some("7".into()));
/// ```
pub fn h(tag: &str) -> ElementBuilder {
    ElementBuilder {
        node: ElementNode {
            tag: tag.to_owned(),
            key: None,
            attrs: IndexMap::new(),
            events: IndexMap::new(),
            children: Vec::new(),
        },
    }
}

/// A text node.
pub fn text(value: &str) -> VNode {
    VNode::Text(Rc::new(TextNode {
        text: value.to_owned(),
    }))
}

/// A keyless group of children that is flattened into its parent's list.
pub fn fragment<I, C>(children: I) -> VNode
where
    I: IntoIterator<Item = C>,
    C: Into<VNode>,
{
    VNode::Fragment(Rc::new(FragmentNode {
        children: children.into_iter().map(Into::into).collect(),
    }))
}

impl ElementBuilder {
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.node.key = Some(key.into());
        self
    }

    pub fn attr(mut self, name: &str, value: impl Into<AttrValue>) -> Self {
        self.node.attrs.insert(name.to_owned(), value.into());
        self
    }

    /// Bind `handler` to the `event` slot. A later call for the same event
    /// replaces the earlier handler.
    pub fn on(mut self, event: &str, handler: impl Fn(&Event) + 'static) -> Self {
        self.node
            .events
            .insert(event.to_owned(), EventHandler::new(handler));
        self
    }

    pub fn child(mut self, child: impl Into<VNode>) -> Self {
        self.node.children.push(child.into());
        self
    }

    pub fn children<I, C>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<VNode>,
    {
        self.node.children.extend(children.into_iter().map(Into::into));
        self
    }

    pub fn text(self, value: &str) -> Self {
        self.child(text(value))
    }

    pub fn build(self) -> VNode {
        VNode::Element(Rc::new(self.node))
    }
}

impl From<ElementBuilder> for VNode {
    fn from(builder: ElementBuilder) -> Self {
        builder.build()
    }
}

/// Expand nested fragments into one flat sibling list.
pub(crate) fn flatten(children: &[VNode], out: &mut Vec<VNode>) {
    for child in children {
        match child {
            VNode::Fragment(fragment) => flatten(&fragment.children, out),
            other => out.push(other.clone()),
        }
    }
}
