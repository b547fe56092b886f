//! Component nodes.

use indexmap::IndexMap;
use tracing::trace;

use crate::graph::NodeIndex;

use super::{Fanout, NodeBehavior, NodeLinks, Propagation, TagContext};

/// Groups the operations for one aspect (animation, geometry, shading...) of
/// a data-block.
///
/// While the graph is being built, operations are looked up by name. After
/// [`finalize_build`](NodeBehavior::finalize_build) the lookup table is gone
/// and only the ordered operation list remains.
#[derive(Debug)]
pub struct ComponentNode {
    owner: Option<NodeIndex>,
    subdata: String,
    operations_map: Option<IndexMap<String, NodeIndex>>,
    operations: Vec<NodeIndex>,
    tag_count: u32,
}

impl ComponentNode {
    pub fn new(subdata: impl Into<String>) -> Self {
        Self {
            owner: None,
            subdata: subdata.into(),
            operations_map: Some(IndexMap::new()),
            operations: Vec::new(),
            tag_count: 0,
        }
    }

    /// The ID node this component belongs to.
    pub fn owner(&self) -> Option<NodeIndex> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: NodeIndex) {
        self.owner = Some(owner);
    }

    /// Extra data the component was created with (bone name for bones).
    pub fn subdata(&self) -> &str {
        &self.subdata
    }

    pub fn is_finalized(&self) -> bool {
        self.operations_map.is_none()
    }

    /// Look up an operation by name. Only available while building.
    pub fn find_operation(&self, name: &str) -> Option<NodeIndex> {
        self.operations_map.as_ref()?.get(name).copied()
    }

    /// Register an operation. Returns `false` once the build is finalized.
    pub(crate) fn insert_operation(&mut self, name: &str, index: NodeIndex) -> bool {
        match self.operations_map.as_mut() {
            Some(map) => {
                map.insert(name.to_string(), index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_operation(&mut self, index: NodeIndex) {
        match self.operations_map.as_mut() {
            Some(map) => map.retain(|_, op| *op != index),
            None => self.operations.retain(|op| *op != index),
        }
    }

    /// Owned operations, in the order they were added.
    pub fn operations(&self) -> Vec<NodeIndex> {
        match &self.operations_map {
            Some(map) => map.values().copied().collect(),
            None => self.operations.clone(),
        }
    }

    pub fn operation_count(&self) -> usize {
        self.operations_map
            .as_ref()
            .map_or(self.operations.len(), IndexMap::len)
    }

    /// Number of tags received since the last clear.
    pub fn tag_count(&self) -> u32 {
        self.tag_count
    }

    pub fn is_tagged(&self) -> bool {
        self.tag_count > 0
    }

    pub(crate) fn clear_tag(&mut self) {
        self.tag_count = 0;
    }
}

impl NodeBehavior for ComponentNode {
    fn tag_update(&mut self, _links: &NodeLinks, _ctx: &TagContext<'_>) -> Propagation {
        self.tag_count += 1;
        // Tags can arrive before the build is finalized.
        let forward: Fanout = match &self.operations_map {
            Some(map) => map.values().copied().collect(),
            None => self.operations.iter().copied().collect(),
        };
        trace!(operations = forward.len(), "component tagged");
        Propagation::forward(forward)
    }

    fn finalize_build(&mut self) -> Fanout {
        if let Some(map) = self.operations_map.take() {
            self.operations = map.into_values().collect();
            self.operations.shrink_to_fit();
        }
        Fanout::new()
    }
}
