//! Snapshots of a graph for inspection.
//!
//! A [`GraphSnapshot`] is a plain, owned copy of the graph's structure. It
//! carries no data-block content and cannot be turned back into a graph; it
//! exists to be printed, diffed, or shipped to a viewer as JSON or
//! MessagePack.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::nodes::{NodeClass, NodeKind};

use super::{Depsgraph, NodeIndex, RelationIndex};

/// One node of a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub index: NodeIndex,
    pub kind: NodeKind,
    pub class: NodeClass,
    pub identifier: String,
    pub inlinks: Vec<RelationIndex>,
    pub outlinks: Vec<RelationIndex>,
    /// Owning ID node for components, owning component for operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<NodeIndex>,
}

/// One relation of a [`GraphSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationSnapshot {
    pub index: RelationIndex,
    pub from: NodeIndex,
    pub to: NodeIndex,
    pub name: String,
}

/// Structure of a graph at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Copy-on-write strategy the graph runs with.
    pub strategy: String,
    pub nodes: Vec<NodeSnapshot>,
    pub relations: Vec<RelationSnapshot>,
}

impl GraphSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|node| node.index == index)
    }
}

/// Node and relation counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub id_nodes: usize,
    pub components: usize,
    pub operations: usize,
    pub relations: usize,
    pub released_relations: usize,
}

impl Depsgraph {
    /// Copy out the current structure of the graph.
    pub fn snapshot(&self) -> GraphSnapshot {
        let nodes = self
            .nodes()
            .map(|(index, node)| NodeSnapshot {
                index,
                kind: node.kind(),
                class: node.class(),
                identifier: node.identifier(),
                inlinks: node.inlinks().to_vec(),
                outlinks: node.outlinks().to_vec(),
                owner: node
                    .as_component()
                    .and_then(|component| component.owner())
                    .or_else(|| node.as_operation().and_then(|op| op.owner())),
            })
            .collect();

        let relations = self
            .relations()
            .iter()
            .map(|(index, rel)| RelationSnapshot {
                index,
                from: rel.from,
                to: rel.to,
                name: rel.name.clone(),
            })
            .collect();

        GraphSnapshot {
            strategy: self.shadow_strategy().to_string(),
            nodes,
            relations,
        }
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            relations: self.relations().len(),
            released_relations: self.released_relations(),
            ..GraphStats::default()
        };
        for (_, node) in self.nodes() {
            match node.class() {
                NodeClass::Component => stats.components += 1,
                NodeClass::Operation => stats.operations += 1,
                NodeClass::Generic if node.as_id().is_some_and(|id| id.is_initialized()) => {
                    stats.id_nodes += 1
                }
                NodeClass::Generic => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Id, IdType};

    fn small_graph() -> (Depsgraph, NodeIndex, NodeIndex) {
        let mut graph = Depsgraph::new();
        let mesh = Id::new(IdType::Mesh, "Cube").into_ref();
        let node = graph.add_id_node(&mesh);
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let op = graph.add_operation(geometry, "Geometry Eval");
        graph.add_relation(graph.time_source(), geometry, "Time -> Geometry");
        (graph, geometry, op)
    }

    #[test]
    fn snapshot_lists_nodes_and_relations() {
        let (graph, geometry, op) = small_graph();
        let snapshot = graph.snapshot();

        assert_eq!(snapshot.strategy, "alias");
        assert_eq!(snapshot.nodes.len(), 4);
        assert_eq!(snapshot.relations.len(), 1);
        assert_eq!(snapshot.relations[0].name, "Time -> Geometry");

        let geometry_node = snapshot.node(geometry).unwrap();
        assert_eq!(geometry_node.identifier, "(7) : Geometry Component");
        assert_eq!(geometry_node.inlinks, vec![snapshot.relations[0].index]);
        assert_eq!(snapshot.node(op).unwrap().owner, Some(geometry));
    }

    #[test]
    fn snapshot_encodes() {
        let (graph, _, _) = small_graph();
        let snapshot = graph.snapshot();

        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"(0) : Geometry Eval\""));
        let decoded: GraphSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);

        let bytes = snapshot.to_msgpack().unwrap();
        let decoded: GraphSnapshot = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn stats_count_live_nodes() {
        let (mut graph, geometry, _) = small_graph();
        assert_eq!(
            graph.stats(),
            GraphStats {
                id_nodes: 1,
                components: 1,
                operations: 1,
                relations: 1,
                released_relations: 0,
            }
        );

        graph.remove_node(geometry);
        let stats = graph.stats();
        assert_eq!(stats.components, 0);
        assert_eq!(stats.operations, 0);
        assert_eq!(stats.released_relations, 1);
    }
}
