//! Operation nodes.

use crate::graph::NodeIndex;

use super::{NodeBehavior, NodeLinks, Propagation, TagContext};

/// A single evaluation step inside a component.
///
/// What the operation computes is up to whoever builds the graph. Here it
/// only needs to remember that it was tagged and report itself to the
/// scheduler as an entry point.
#[derive(Debug, Default)]
pub struct OperationNode {
    owner: Option<NodeIndex>,
    needs_update: bool,
}

impl OperationNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// The component this operation belongs to.
    pub fn owner(&self) -> Option<NodeIndex> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: NodeIndex) {
        self.owner = Some(owner);
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub(crate) fn clear_update(&mut self) {
        self.needs_update = false;
    }
}

impl NodeBehavior for OperationNode {
    fn tag_update(&mut self, _links: &NodeLinks, _ctx: &TagContext<'_>) -> Propagation {
        self.needs_update = true;
        Propagation::entry()
    }
}
