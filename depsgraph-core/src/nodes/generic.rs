//! Generic nodes.

use tracing::trace;

use super::{Fanout, NodeBehavior, NodeLinks, Propagation, TagContext};

/// Source of time-dependent changes.
///
/// A change of the current time invalidates everything downstream, so a tag
/// goes out along every outgoing relation without filtering.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeSourceNode;

impl NodeBehavior for TimeSourceNode {
    fn tag_update(&mut self, links: &NodeLinks, ctx: &TagContext<'_>) -> Propagation {
        let forward: Fanout = links
            .outlinks
            .iter()
            .filter_map(|&index| ctx.relations.get(index))
            .map(|rel| rel.to)
            .collect();
        trace!(targets = forward.len(), "time source tagged");
        Propagation::forward(forward)
    }
}
