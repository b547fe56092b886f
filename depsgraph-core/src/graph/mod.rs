//! Dependency Graph
//!
//! This module implements the graph that owns every node and relation, and
//! that node variants see (through a narrow [`TagContext`]) while an update
//! tag travels through it.
//!
//! # Overview
//!
//! - Nodes live in an arena of slots addressed by [`NodeIndex`]. A slot is
//!   emptied when its node is removed and never reused, so a stale index
//!   resolves to `None` rather than to some other node.
//! - Relations live in a [`RelationArena`]. Nodes store [`RelationIndex`]es.
//!   Removing a node releases its inlinks and only its inlinks.
//! - ID nodes are found by data-block identity. Each owns its components,
//!   each component owns its operations; all of them are arena nodes too, so
//!   relations can connect any two of them.
//!
//! # Tagging
//!
//! [`Depsgraph::tag_update`] walks depth-first: time sources fan out along
//! their relations, ID nodes fan out to the components their tag policy
//! lets through, components fan out to their operations. Operations end the
//! walk and are collected in [`Depsgraph::entry_tags`] for the scheduler.
//! A node reached twice during the same walk is handled once.

mod debug;
mod relation;

pub use debug::{GraphSnapshot, GraphStats, NodeSnapshot, RelationSnapshot};
pub use relation::{Relation, RelationArena, RelationIndex};

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::DepsgraphConfig;
use crate::cow::ShadowStrategy;
use crate::error::{DegError, Result};
use crate::id::{id_address, IdRef};
use crate::nodes::{
    BuildContext, ComponentNode, DepsNode, IdNode, NodeKind, NodeTypeRegistry, OperationNode,
    TagContext, TagPolicy, TagPolicyTable,
};

/// Stable index of a node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeIndex(u32);

impl NodeIndex {
    /// Position of the node's slot in the arena.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Fails with [`DegError::IndexOutOfRange`] for values past `u32::MAX`
/// instead of wrapping onto a live node.
impl TryFrom<usize> for NodeIndex {
    type Error = DegError;

    fn try_from(index: usize) -> Result<Self> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| DegError::IndexOutOfRange { index })
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The dependency graph.
pub struct Depsgraph {
    config: DepsgraphConfig,
    shadow: Arc<dyn ShadowStrategy>,
    registry: Arc<NodeTypeRegistry>,
    policies: TagPolicyTable,
    nodes: Vec<Option<DepsNode>>,
    relations: RelationArena,
    time_source: NodeIndex,
    /// ID nodes keyed by data-block identity.
    id_nodes: IndexMap<usize, NodeIndex>,
    /// Operations tagged since the last [`clear_tags`](Self::clear_tags).
    entry_tags: IndexSet<NodeIndex>,
}

impl Depsgraph {
    /// Create a graph with the default config and the built-in registry.
    pub fn new() -> Self {
        Self::with_config(DepsgraphConfig::default())
    }

    /// Create a graph with `config` and the built-in registry.
    pub fn with_config(config: DepsgraphConfig) -> Self {
        Self::with_registry(config, NodeTypeRegistry::global())
    }

    /// Create a graph that builds its nodes from `registry`.
    ///
    /// # Panics
    ///
    /// If the registry has no time source factory.
    pub fn with_registry(config: DepsgraphConfig, registry: Arc<NodeTypeRegistry>) -> Self {
        let shadow: Arc<dyn ShadowStrategy> = Arc::from(config.shadow_strategy());
        debug!(strategy = shadow.name(), "creating depsgraph");

        let mut graph = Self {
            config,
            shadow,
            registry,
            policies: TagPolicyTable::default(),
            nodes: Vec::new(),
            relations: RelationArena::new(),
            time_source: NodeIndex(0),
            id_nodes: IndexMap::new(),
            entry_tags: IndexSet::new(),
        };
        let time_source = graph
            .build_node(NodeKind::TimeSource, None, "", "")
            .unwrap_or_else(|err| panic!("{err}"));
        graph.time_source = graph.insert_node(time_source);
        graph
    }

    /// The config the graph was created with.
    pub fn config(&self) -> &DepsgraphConfig {
        &self.config
    }

    /// Name of the copy-on-write strategy in use.
    pub fn shadow_strategy(&self) -> &'static str {
        self.shadow.name()
    }

    /// The registry nodes are built from.
    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    /// Tag policies in effect.
    pub fn policies(&self) -> &TagPolicyTable {
        &self.policies
    }

    /// Replace the tag policy for a component kind.
    pub fn set_tag_policy(&mut self, kind: NodeKind, policy: TagPolicy) -> TagPolicy {
        self.policies.set(kind, policy)
    }

    // ------------------------------------------------------------------
    // Node storage
    // ------------------------------------------------------------------

    fn build_node(
        &self,
        kind: NodeKind,
        owner: Option<&IdRef>,
        subdata: &str,
        name: &str,
    ) -> Result<DepsNode> {
        let ctx = BuildContext {
            shadow: &self.shadow,
        };
        self.registry
            .try_factory_for(kind)?
            .try_create(&ctx, owner, subdata, name)
    }

    /// # Panics
    ///
    /// If the arena already holds `u32::MAX + 1` slots.
    fn insert_node(&mut self, node: DepsNode) -> NodeIndex {
        let index = NodeIndex::try_from(self.nodes.len()).unwrap_or_else(|err| panic!("{err}"));
        trace!(%index, node = %node.identifier(), "insert node");
        self.nodes.push(Some(node));
        index
    }

    fn slot_mut(&mut self, index: NodeIndex) -> Option<&mut DepsNode> {
        self.nodes.get_mut(index.index()).and_then(Option::as_mut)
    }

    /// The node at `index`, unless it was released.
    pub fn node(&self, index: NodeIndex) -> Option<&DepsNode> {
        self.nodes.get(index.index()).and_then(Option::as_ref)
    }

    /// Like [`node`](Self::node), with [`DegError::NodeReleased`] for a
    /// dead index.
    pub fn try_node(&self, index: NodeIndex) -> Result<&DepsNode> {
        self.node(index).ok_or(DegError::NodeReleased { index })
    }

    /// Live nodes with their indices.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &DepsNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            // `insert_node` keeps every slot position within `u32`.
            .filter_map(|(i, slot)| Some((NodeIndex(i as u32), slot.as_ref()?)))
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// The graph's time source node.
    pub fn time_source(&self) -> NodeIndex {
        self.time_source
    }

    // ------------------------------------------------------------------
    // ID nodes
    // ------------------------------------------------------------------

    /// Node for a data-block, created on first request.
    pub fn add_id_node(&mut self, id: &IdRef) -> NodeIndex {
        let key = id_address(id);
        if let Some(&index) = self.id_nodes.get(&key) {
            return index;
        }

        let name = id.read().full_name();
        let node = self
            .build_node(NodeKind::IdRef, Some(id), "", &name)
            .unwrap_or_else(|err| panic!("{err}"));
        let index = self.insert_node(node);
        self.id_nodes.insert(key, index);
        debug!(%index, id = %name, "added ID node");
        index
    }

    /// Node of a data-block, without creating it.
    pub fn find_id_node(&self, id: &IdRef) -> Option<NodeIndex> {
        self.id_nodes.get(&id_address(id)).copied()
    }

    /// Live ID nodes, in the order they were added.
    pub fn id_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.id_nodes.values().copied()
    }

    /// ID node data at `index`.
    pub fn id_node(&self, index: NodeIndex) -> Option<&IdNode> {
        self.node(index)?.as_id()
    }

    /// ID node data at `index`, or why there is none.
    pub fn try_id_node(&self, index: NodeIndex) -> Result<&IdNode> {
        let node = self.try_node(index)?;
        node.as_id().ok_or(DegError::UnexpectedNodeKind {
            index,
            actual: node.kind(),
            expected: "ID",
        })
    }

    fn id_node_mut(&mut self, index: NodeIndex) -> Option<&mut IdNode> {
        self.slot_mut(index)?.as_id_mut()
    }

    // ------------------------------------------------------------------
    // Components and operations
    // ------------------------------------------------------------------

    /// Component `(kind, name)` of an ID node, without creating it.
    pub fn find_component(
        &self,
        owner: NodeIndex,
        kind: NodeKind,
        name: &str,
    ) -> Option<NodeIndex> {
        self.id_node(owner)?.find_component(kind, name)
    }

    /// Component `(kind, name)` of an ID node, created on first request.
    ///
    /// The component is built by the registry factory for `kind` against
    /// the ID node's original data-block. Repeated calls with the same key
    /// return the same node.
    pub fn try_add_component(
        &mut self,
        owner: NodeIndex,
        kind: NodeKind,
        name: &str,
    ) -> Result<NodeIndex> {
        let id_node = self.try_id_node(owner)?;
        if let Some(existing) = id_node.find_component(kind, name) {
            return Ok(existing);
        }
        if !kind.is_component() {
            return Err(DegError::NotAComponent { kind });
        }
        let id_orig = id_node
            .id_orig()
            .cloned()
            .ok_or(DegError::IdNodeNotInitialized { index: owner })?;

        let mut node = self.build_node(kind, Some(&id_orig), name, name)?;
        node.as_component_mut()
            .ok_or(DegError::NotAComponent { kind })?
            .set_owner(owner);
        let index = self.insert_node(node);
        if let Some(id_node) = self.id_node_mut(owner) {
            id_node.insert_component(kind, name, index);
        }
        trace!(%owner, %index, ?kind, name, "added component");
        Ok(index)
    }

    /// Panicking form of [`try_add_component`](Self::try_add_component).
    pub fn add_component(&mut self, owner: NodeIndex, kind: NodeKind, name: &str) -> NodeIndex {
        self.try_add_component(owner, kind, name)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Component data at `index`.
    pub fn component(&self, index: NodeIndex) -> Option<&ComponentNode> {
        self.node(index)?.as_component()
    }

    /// Component data at `index`, or why there is none.
    pub fn try_component(&self, index: NodeIndex) -> Result<&ComponentNode> {
        let node = self.try_node(index)?;
        node.as_component().ok_or(DegError::UnexpectedNodeKind {
            index,
            actual: node.kind(),
            expected: "component",
        })
    }

    fn component_mut(&mut self, index: NodeIndex) -> Option<&mut ComponentNode> {
        self.slot_mut(index)?.as_component_mut()
    }

    /// Operation `name` of a component, created on first request.
    pub fn try_add_operation(&mut self, component: NodeIndex, name: &str) -> Result<NodeIndex> {
        let comp = self.try_component(component)?;
        if let Some(existing) = comp.find_operation(name) {
            return Ok(existing);
        }
        if comp.is_finalized() {
            return Err(DegError::BuildFinalized { index: component });
        }

        let mut node = self.build_node(NodeKind::Operation, None, "", name)?;
        if let Some(op) = node.as_operation_mut() {
            op.set_owner(component);
        }
        let index = self.insert_node(node);
        if let Some(comp) = self.component_mut(component) {
            comp.insert_operation(name, index);
        }
        Ok(index)
    }

    /// Panicking form of [`try_add_operation`](Self::try_add_operation).
    pub fn add_operation(&mut self, component: NodeIndex, name: &str) -> NodeIndex {
        self.try_add_operation(component, name)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// Operation data at `index`.
    pub fn operation(&self, index: NodeIndex) -> Option<&OperationNode> {
        self.node(index)?.as_operation()
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    /// Connect `from` to `to`. Both endpoints must be live; on error
    /// neither node is touched.
    pub fn try_add_relation(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        name: &str,
    ) -> Result<RelationIndex> {
        self.try_node(from)?;
        self.try_node(to)?;

        let index = self.relations.insert(Relation::new(from, to, name));
        if let Some(node) = self.slot_mut(from) {
            node.links_mut().outlinks.push(index);
        }
        if let Some(node) = self.slot_mut(to) {
            node.links_mut().inlinks.push(index);
        }
        trace!(%from, %to, relation = %index, name, "added relation");
        Ok(index)
    }

    /// Panicking form of [`try_add_relation`](Self::try_add_relation).
    pub fn add_relation(&mut self, from: NodeIndex, to: NodeIndex, name: &str) -> RelationIndex {
        self.try_add_relation(from, to, name)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    /// The relation at `index`, unless it was released.
    pub fn relation(&self, index: RelationIndex) -> Option<&Relation> {
        self.relations.get(index)
    }

    /// Every relation of the graph.
    pub fn relations(&self) -> &RelationArena {
        &self.relations
    }

    /// Number of relations released so far.
    pub fn released_relations(&self) -> usize {
        self.relations.released_count()
    }

    // ------------------------------------------------------------------
    // Tagging
    // ------------------------------------------------------------------

    /// Tag a node for update and propagate the tag.
    ///
    /// Tagging a released index does nothing.
    pub fn tag_update(&mut self, index: NodeIndex) {
        let nodes = &mut self.nodes;
        let entry_tags = &mut self.entry_tags;
        let ctx = TagContext {
            relations: &self.relations,
            policies: &self.policies,
        };

        let mut visited = HashSet::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(node) = nodes.get_mut(current.index()).and_then(Option::as_mut) else {
                trace!(node = %current, "tag reached a released node");
                continue;
            };
            trace!(node = %node.identifier(), "tag_update");

            let propagation = node.tag_update(&ctx);
            if propagation.entry_tag {
                entry_tags.insert(current);
            }
            stack.extend(propagation.forward.into_iter().rev());
        }
    }

    /// Tag everything that depends on time.
    pub fn tag_time_source(&mut self) {
        self.tag_update(self.time_source);
    }

    /// Tag the node of a data-block. Returns `false` if the data-block is
    /// not in the graph.
    pub fn tag_id(&mut self, id: &IdRef) -> bool {
        match self.find_id_node(id) {
            Some(index) => {
                self.tag_update(index);
                true
            }
            None => false,
        }
    }

    /// Tag a single component directly, without consulting its tag policy.
    ///
    /// This is how components that generic tags never reach, like particle
    /// evaluation, get updated. Returns `false` if there is no such
    /// component.
    pub fn tag_component(&mut self, owner: NodeIndex, kind: NodeKind, name: &str) -> bool {
        match self.find_component(owner, kind, name) {
            Some(index) => {
                self.tag_update(index);
                true
            }
            None => false,
        }
    }

    /// Operations tagged since the last clear, in tagging order.
    pub fn entry_tags(&self) -> &IndexSet<NodeIndex> {
        &self.entry_tags
    }

    /// Forget every tag: entry tags, operation flags, component tag counts.
    pub fn clear_tags(&mut self) {
        self.entry_tags.clear();
        for node in self.nodes.iter_mut().flatten() {
            if let Some(op) = node.as_operation_mut() {
                op.clear_update();
            } else if let Some(component) = node.as_component_mut() {
                component.clear_tag();
            }
        }
    }

    // ------------------------------------------------------------------
    // Build lifecycle
    // ------------------------------------------------------------------

    /// Let every ID node, and through it every component, finish its build.
    pub fn finalize_build(&mut self) {
        let roots: Vec<NodeIndex> = self.id_nodes.values().copied().collect();
        for &root in &roots {
            self.finalize_node(root);
        }
        debug!(id_nodes = roots.len(), "finalized build");
    }

    /// Finalize one ID node and its components.
    pub fn finalize_node(&mut self, index: NodeIndex) {
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.slot_mut(current) {
                let next = node.finalize_build();
                stack.extend(next.into_iter().rev());
            }
        }
    }

    /// Destroy an ID node: release its components and their operations,
    /// release its copy-on-write data-block, drop it from the ID lookup.
    ///
    /// The node itself stays in the graph in its destroyed state. Returns
    /// `false` if there was nothing to destroy.
    pub fn destroy_id_node(&mut self, index: NodeIndex) -> bool {
        let Some(id_node) = self.id_node_mut(index) else {
            return false;
        };
        if !id_node.is_initialized() {
            return false;
        }

        let key = id_node.id_orig().map(id_address);
        let components = id_node.destroy();
        if let Some(key) = key {
            self.id_nodes.shift_remove(&key);
        }
        for component in components {
            self.release_component(component);
        }
        debug!(%index, "destroyed ID node");
        true
    }

    fn release_component(&mut self, index: NodeIndex) {
        let operations = self
            .component(index)
            .map(ComponentNode::operations)
            .unwrap_or_default();
        for op in operations {
            self.release_slot(op);
        }
        self.release_slot(index);
    }

    /// Remove a node from the graph.
    ///
    /// ID nodes are destroyed first, components take their operations with
    /// them. Owners forget removed components and operations. Returns
    /// `false` if the index was not live.
    pub fn remove_node(&mut self, index: NodeIndex) -> bool {
        let Some(node) = self.node(index) else {
            return false;
        };
        let kind = node.kind();
        let owner = node
            .as_component()
            .and_then(ComponentNode::owner)
            .or_else(|| node.as_operation().and_then(OperationNode::owner));

        match kind {
            NodeKind::IdRef => {
                self.destroy_id_node(index);
            }
            NodeKind::Operation => {
                if let Some(component) = owner.and_then(|owner| self.component_mut(owner)) {
                    component.remove_operation(index);
                }
            }
            kind if kind.is_component() => {
                if let Some(id_node) = owner.and_then(|owner| self.id_node_mut(owner)) {
                    id_node.remove_component(index);
                }
                self.release_component(index);
                return true;
            }
            _ => {}
        }
        self.release_slot(index)
    }

    /// Empty a node slot, releasing the node's inlinks.
    fn release_slot(&mut self, index: NodeIndex) -> bool {
        let Some(node) = self.nodes.get_mut(index.index()).and_then(Option::take) else {
            return false;
        };

        for &rel_index in node.inlinks() {
            if let Some(rel) = self.relations.release(rel_index) {
                if let Some(source) = self.slot_mut(rel.from) {
                    source.links_mut().outlinks.retain(|r| *r != rel_index);
                }
            }
        }
        self.entry_tags.shift_remove(&index);
        trace!(%index, node = %node.identifier(), "released node");
        true
    }
}

impl Default for Depsgraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Depsgraph {
    fn drop(&mut self) {
        let ids: Vec<NodeIndex> = self.id_nodes.values().copied().collect();
        for index in ids {
            self.destroy_id_node(index);
        }
    }
}

impl fmt::Debug for Depsgraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Depsgraph")
            .field("config", &self.config)
            .field("shadow", &self.shadow.name())
            .field("nodes", &self.node_count())
            .field("relations", &self.relations.len())
            .field("id_nodes", &self.id_nodes.len())
            .field("entry_tags", &self.entry_tags.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{AnimData, AnimRecalc, Id, IdType};

    fn mesh_graph() -> (Depsgraph, IdRef, NodeIndex) {
        let mut graph = Depsgraph::new();
        let mesh = Id::new(IdType::Mesh, "Cube").into_ref();
        let node = graph.add_id_node(&mesh);
        (graph, mesh, node)
    }

    #[test]
    fn new_graph_has_a_time_source() {
        let graph = Depsgraph::new();
        let time = graph.node(graph.time_source()).unwrap();
        assert_eq!(time.kind(), NodeKind::TimeSource);
        assert_eq!(time.name(), "Time Source");
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.shadow_strategy(), "alias");
    }

    #[test]
    fn add_id_node_is_lookup_or_create() {
        let (mut graph, mesh, node) = mesh_graph();
        assert_eq!(graph.add_id_node(&mesh), node);
        assert_eq!(graph.find_id_node(&mesh), Some(node));
        assert_eq!(graph.node(node).unwrap().name(), "MECube");

        let twin = Id::new(IdType::Mesh, "Cube").into_ref();
        assert_ne!(graph.add_id_node(&twin), node);
    }

    #[test]
    fn add_component_is_idempotent() {
        let (mut graph, _mesh, node) = mesh_graph();

        let first = graph.add_component(node, NodeKind::Animation, "");
        let second = graph.add_component(node, NodeKind::Animation, "");
        assert_eq!(first, second);
        assert_eq!(graph.id_node(node).unwrap().component_count(), 1);

        let bone = graph.add_component(node, NodeKind::Bone, "Spine");
        assert_ne!(bone, first);
        assert_eq!(graph.find_component(node, NodeKind::Bone, "Spine"), Some(bone));
        assert_eq!(graph.component(bone).unwrap().owner(), Some(node));
        assert_eq!(graph.component(bone).unwrap().subdata(), "Spine");
        assert_eq!(graph.node(bone).unwrap().name(), "Spine");
        assert_eq!(graph.node(first).unwrap().name(), "Animation Component");
    }

    #[test]
    fn add_component_rejects_bad_owners_and_kinds() {
        let (mut graph, _mesh, node) = mesh_graph();
        let time = graph.time_source();

        assert!(matches!(
            graph.try_add_component(time, NodeKind::Geometry, ""),
            Err(DegError::UnexpectedNodeKind { .. })
        ));
        assert!(matches!(
            graph.try_add_component(node, NodeKind::TimeSource, ""),
            Err(DegError::NotAComponent { kind: NodeKind::TimeSource })
        ));
        assert!(matches!(
            graph.try_add_component(NodeIndex::from(99), NodeKind::Geometry, ""),
            Err(DegError::NodeReleased { .. })
        ));
    }

    #[test]
    fn relations_are_listed_on_both_ends() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let time = graph.time_source();

        let rel = graph.add_relation(time, geometry, "Time -> Geometry");
        assert_eq!(graph.node(time).unwrap().outlinks(), &[rel]);
        assert_eq!(graph.node(geometry).unwrap().inlinks(), &[rel]);
        let relation = graph.relation(rel).unwrap();
        assert_eq!((relation.from, relation.to), (time, geometry));
    }

    #[test]
    fn relation_to_released_node_fails_without_side_effects() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        graph.remove_node(geometry);

        let time = graph.time_source();
        assert!(graph.try_add_relation(time, geometry, "dangling").is_err());
        assert!(graph.node(time).unwrap().outlinks().is_empty());
        assert!(graph.relations().is_empty());
    }

    #[test]
    fn time_source_tags_reach_operations() {
        let (mut graph, _mesh, node) = mesh_graph();
        let transform = graph.add_component(node, NodeKind::Transform, "");
        let op = graph.add_operation(transform, "Transform Local");
        graph.add_relation(graph.time_source(), transform, "Time");

        graph.tag_time_source();

        assert!(graph.component(transform).unwrap().is_tagged());
        assert!(graph.operation(op).unwrap().needs_update());
        assert_eq!(graph.entry_tags().iter().copied().collect::<Vec<_>>(), vec![op]);
    }

    #[test]
    fn id_tag_respects_policies() {
        let (mut graph, mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let shading = graph.add_component(node, NodeKind::Shading, "");
        let animation = graph.add_component(node, NodeKind::Animation, "");
        let particles = graph.add_component(node, NodeKind::EvalParticles, "");

        assert!(graph.tag_id(&mesh));

        assert!(graph.component(geometry).unwrap().is_tagged());
        assert!(!graph.component(shading).unwrap().is_tagged());
        assert!(!graph.component(animation).unwrap().is_tagged());
        assert!(!graph.component(particles).unwrap().is_tagged());

        mesh.write().set_anim_data(Some(AnimData {
            action: None,
            recalc: AnimRecalc::ANIM,
        }));
        graph.tag_update(node);
        assert!(graph.component(animation).unwrap().is_tagged());

        assert!(graph.tag_component(node, NodeKind::EvalParticles, ""));
        assert!(graph.component(particles).unwrap().is_tagged());
        assert!(!graph.tag_component(node, NodeKind::Cache, ""));
    }

    #[test]
    fn policy_override_changes_propagation() {
        let (mut graph, _mesh, node) = mesh_graph();
        let shading = graph.add_component(node, NodeKind::Shading, "");

        graph.set_tag_policy(NodeKind::Shading, TagPolicy::Always);
        graph.tag_update(node);
        assert!(graph.component(shading).unwrap().is_tagged());
    }

    #[test]
    fn cycle_through_time_source_terminates() {
        let mut graph = Depsgraph::new();
        let time = graph.time_source();
        graph.add_relation(time, time, "loop");

        graph.tag_update(time);
        assert!(graph.entry_tags().is_empty());
    }

    #[test]
    fn clear_tags_resets_flags() {
        let (mut graph, mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let op = graph.add_operation(geometry, "Geometry Eval");

        graph.tag_id(&mesh);
        assert_eq!(graph.entry_tags().len(), 1);

        graph.clear_tags();
        assert!(graph.entry_tags().is_empty());
        assert!(!graph.operation(op).unwrap().needs_update());
        assert!(!graph.component(geometry).unwrap().is_tagged());
    }

    #[test]
    fn operations_are_idempotent_until_finalized() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");

        let op = graph.add_operation(geometry, "Geometry Eval");
        assert_eq!(graph.add_operation(geometry, "Geometry Eval"), op);
        assert_eq!(graph.operation(op).unwrap().owner(), Some(geometry));

        graph.finalize_build();
        assert!(graph.component(geometry).unwrap().is_finalized());
        assert_eq!(graph.component(geometry).unwrap().operations(), vec![op]);
        assert!(matches!(
            graph.try_add_operation(geometry, "Late"),
            Err(DegError::BuildFinalized { .. })
        ));
    }

    #[test]
    fn destroy_id_node_releases_everything_it_owns() {
        let (mut graph, mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let op = graph.add_operation(geometry, "Geometry Eval");
        let time = graph.time_source();
        let rel = graph.add_relation(time, geometry, "Time");

        assert!(graph.destroy_id_node(node));

        assert!(graph.node(geometry).is_none());
        assert!(graph.node(op).is_none());
        assert!(graph.relation(rel).is_none());
        assert_eq!(graph.released_relations(), 1);
        assert!(graph.node(time).unwrap().outlinks().is_empty());
        assert!(graph.id_node(node).unwrap().is_destroyed());
        assert_eq!(graph.find_id_node(&mesh), None);
        assert_eq!(Arc::strong_count(&mesh), 1);

        assert!(!graph.destroy_id_node(node));
        assert_eq!(graph.released_relations(), 1);
    }

    #[test]
    fn removing_a_source_keeps_its_outgoing_relations() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let time = graph.time_source();
        let rel = graph.add_relation(time, geometry, "Time");

        assert!(graph.remove_node(time));

        // Owned by the destination, which is still alive.
        assert_eq!(graph.released_relations(), 0);
        assert!(graph.relation(rel).is_some());
        assert_eq!(graph.node(geometry).unwrap().inlinks(), &[rel]);

        graph.tag_time_source();
        assert!(!graph.component(geometry).unwrap().is_tagged());
    }

    #[test]
    fn removing_a_component_detaches_it_from_its_owner() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let op = graph.add_operation(geometry, "Geometry Eval");

        assert!(graph.remove_node(geometry));
        assert!(graph.node(op).is_none());
        assert_eq!(graph.find_component(node, NodeKind::Geometry, ""), None);
        assert!(!graph.remove_node(geometry));

        let again = graph.add_component(node, NodeKind::Geometry, "");
        assert_ne!(again, geometry);
    }

    #[test]
    fn removing_an_operation_detaches_it_from_its_component() {
        let (mut graph, _mesh, node) = mesh_graph();
        let geometry = graph.add_component(node, NodeKind::Geometry, "");
        let op = graph.add_operation(geometry, "Geometry Eval");

        assert!(graph.remove_node(op));
        assert!(graph.component(geometry).unwrap().operations().is_empty());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_index_does_not_alias_a_live_node() {
        let (graph, _mesh, node) = mesh_graph();
        let wrapped = u32::MAX as usize + 1 + node.index();

        let err = NodeIndex::try_from(wrapped).unwrap_err();
        assert!(matches!(err, DegError::IndexOutOfRange { index } if index == wrapped));

        let exact = NodeIndex::try_from(node.index()).unwrap();
        assert_eq!(exact, node);
        assert_eq!(graph.node(exact).unwrap().name(), "MECube");
    }
}
