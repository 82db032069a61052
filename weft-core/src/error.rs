//! Error Types
//!
//! Failures are split by where they originate:
//!
//! - [`DomError`]: the host tree refused an operation (unknown node, a node
//!   that is not where the caller thinks it is, a cycle). These indicate the
//!   caller's picture of the live tree is out of sync with the tree itself.
//! - [`ExprError`]: an expression's read function (or a render function)
//!   failed. These are routed to the binding's owner.
//!
//! Shape mismatches during reconciliation have no variant: they are
//! handled by replacing the subtree, not by failing.

use thiserror::Error;

use crate::dom::NodeId;

/// Errors raised by the host tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {node} is not a child of {parent}")]
    NotAChild { parent: NodeId, node: NodeId },

    #[error("node {0} cannot hold children")]
    NotAContainer(NodeId),

    #[error("inserting {node} under {parent} would create a cycle")]
    Cycle { parent: NodeId, node: NodeId },

    #[error("node {0} is still attached and cannot be released")]
    StillAttached(NodeId),

    #[error("render depth limit of {0} exceeded")]
    DepthLimit(usize),
}

/// Errors raised while evaluating an expression or a render function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    /// The read function reported a failure.
    #[error("expression failed: {0}")]
    Failed(String),

    /// A render function reported a failure.
    #[error("render failed: {0}")]
    Render(String),
}

impl ExprError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render(message.into())
    }
}

/// Any failure the framework reports to a component owner.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Dom(#[from] DomError),

    #[error(transparent)]
    Expression(#[from] ExprError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_errors_render_node_ids() {
        let err = DomError::NotAChild {
            parent: NodeId::from(1),
            node: NodeId::from(7),
        };
        assert_eq!(err.to_string(), "node #7 is not a child of #1");
    }

    #[test]
    fn umbrella_error_is_transparent() {
        let err: Error = ExprError::failed("boom").into();
        assert_eq!(err.to_string(), "expression failed: boom");
    }
}
