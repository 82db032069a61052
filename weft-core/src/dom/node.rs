//! Live node identity and payloads.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::event::EventHandler;

/// Unique identifier for a node in a [`Document`](super::Document).
///
/// Two handles refer to the same live node iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of a live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Element,
    Text,
    Fragment,
}

/// An attribute or property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Str(value) => f.write_str(value),
        }
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for AttrValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<usize> for AttrValue {
    fn from(value: usize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Kind-specific node contents.
pub(crate) enum Payload {
    Element {
        tag: String,
        attributes: IndexMap<String, AttrValue>,
        listeners: IndexMap<String, EventHandler>,
    },
    Text(String),
    Fragment,
}

pub(crate) struct NodeData {
    pub(crate) payload: Payload,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn element(tag: &str) -> Self {
        Self::with_payload(Payload::Element {
            tag: tag.to_owned(),
            attributes: IndexMap::new(),
            listeners: IndexMap::new(),
        })
    }

    pub(crate) fn text(text: &str) -> Self {
        Self::with_payload(Payload::Text(text.to_owned()))
    }

    pub(crate) fn fragment() -> Self {
        Self::with_payload(Payload::Fragment)
    }

    fn with_payload(payload: Payload) -> Self {
        Self {
            payload,
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        match self.payload {
            Payload::Element { .. } => NodeKind::Element,
            Payload::Text(_) => NodeKind::Text,
            Payload::Fragment => NodeKind::Fragment,
        }
    }

    pub(crate) fn is_container(&self) -> bool {
        !matches!(self.payload, Payload::Text(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn attr_values_display_plainly() {
        assert_eq!(AttrValue::from("x").to_string(), "x");
        assert_eq!(AttrValue::from(3).to_string(), "3");
        assert_eq!(AttrValue::from(true).to_string(), "true");
    }

    #[test]
    fn attr_values_round_trip_through_json() {
        let value: AttrValue = serde_json::from_str("\"primary\"").unwrap();
        assert_eq!(value, AttrValue::from("primary"));
        assert_eq!(serde_json::to_string(&AttrValue::Int(4)).unwrap(), "4");
    }
}
