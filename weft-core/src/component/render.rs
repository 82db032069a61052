//! Render output.

use crate::reactive::{Disposable, DisposableBag};
use crate::vdom::{fragment, ElementBuilder, VNode};

/// What a render function produces: the tree to show, plus resources that
/// live exactly as long as that tree stays on screen.
///
/// The resources are disposed when the next successful render replaces the
/// tree or when the component disconnects, whichever comes first.
#[derive(Debug)]
#[must_use]
pub struct RenderOutput {
    pub tree: VNode,
    pub resources: DisposableBag,
}

impl RenderOutput {
    pub fn new(tree: impl Into<VNode>) -> Self {
        Self {
            tree: tree.into(),
            resources: DisposableBag::new(),
        }
    }

    /// Output that renders nothing.
    pub fn empty() -> Self {
        Self::new(fragment(std::iter::empty::<VNode>()))
    }

    /// Tie `resource` to this output's lifetime on screen.
    pub fn with_resource(mut self, resource: impl Into<Disposable>) -> Self {
        self.resources.push(resource);
        self
    }
}

impl From<VNode> for RenderOutput {
    fn from(tree: VNode) -> Self {
        Self::new(tree)
    }
}

impl From<ElementBuilder> for RenderOutput {
    fn from(builder: ElementBuilder) -> Self {
        Self::new(builder.build())
    }
}
