//! Mutation records.
//!
//! When recording is enabled, a [`Document`](super::Document) appends one
//! [`Mutation`] per operation it performs on the live tree. Tests use the log
//! to assert how much work a patch did; diagnostics dump it as JSON.

use serde::Serialize;

use super::node::NodeId;

/// One operation performed on the live tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId },
    CreateFragment { node: NodeId },
    Insert { parent: NodeId, node: NodeId, before: Option<NodeId> },
    Move { parent: NodeId, node: NodeId, before: Option<NodeId> },
    Remove { parent: NodeId, node: NodeId },
    SetAttribute { node: NodeId, name: String },
    RemoveAttribute { node: NodeId, name: String },
    SetText { node: NodeId },
    AddListener { node: NodeId, event: String },
    RemoveListener { node: NodeId, event: String },
}

impl Mutation {
    /// Whether the operation changes the shape of the tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::CreateElement { .. }
                | Self::CreateText { .. }
                | Self::CreateFragment { .. }
                | Self::Insert { .. }
                | Self::Move { .. }
                | Self::Remove { .. }
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateElement { .. } | Self::CreateText { .. } | Self::CreateFragment { .. }
        )
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Self::Move { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}
