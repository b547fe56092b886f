//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph.
//!
//! # Overview
//!
//! Every node carries the same base data: its kind, a display name, and the
//! indices of its incoming and outgoing relations. What a node does when it
//! is tagged for update depends on its variant:
//!
//! - [`TimeSourceNode`]: forwards the tag to every node it has a relation to.
//! - [`IdNode`]: wraps a data-block and forwards the tag to the components it
//!   owns, filtered by the per-kind [`TagPolicy`].
//! - [`ComponentNode`]: groups the operations for one aspect of a data-block
//!   and forwards the tag to them.
//! - [`OperationNode`]: a leaf; gets flagged and recorded as an entry point
//!   for the scheduler.
//!
//! The set of variants is closed ([`NodeData`]); each variant implements
//! [`NodeBehavior`] and [`DepsNode`] dispatches to it.

mod component;
mod generic;
mod id_node;
mod operation;
mod policy;
mod registry;

pub use component::ComponentNode;
pub use generic::TimeSourceNode;
pub use id_node::{ComponentIdKey, IdNode, IdNodeState};
pub use operation::OperationNode;
pub use policy::{TagPolicy, TagPolicyTable};
pub use registry::{BuildContext, NodeConstructor, NodeFactory, NodeTypeRegistry};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::graph::{NodeIndex, RelationArena, RelationIndex};

/// Node indices a tag or a build pass fans out to.
pub type Fanout = SmallVec<[NodeIndex; 8]>;

/// Relation indices stored on a node.
pub type LinkList = SmallVec<[RelationIndex; 4]>;

/// The kind of a node.
///
/// The numeric value is part of [`DepsNode::identifier`] and decides the
/// [`NodeClass`]: everything ordered before [`NodeKind::Parameters`] other
/// than operations is generic, the rest are components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum NodeKind {
    /// An atomic evaluation step owned by a component.
    Operation = 0,
    /// Drives time-dependent evaluation.
    TimeSource = 1,
    /// A data-block.
    IdRef = 2,

    // Components.
    Parameters = 3,
    Proxy = 4,
    Animation = 5,
    Transform = 6,
    Geometry = 7,
    Sequencer = 8,
    LayerCollections = 9,
    CopyOnWrite = 10,
    EvalPose = 11,
    Bone = 12,
    EvalParticles = 13,
    Shading = 14,
    Cache = 15,
}

impl NodeKind {
    /// Every kind, in numeric order.
    pub const ALL: [NodeKind; 16] = [
        NodeKind::Operation,
        NodeKind::TimeSource,
        NodeKind::IdRef,
        NodeKind::Parameters,
        NodeKind::Proxy,
        NodeKind::Animation,
        NodeKind::Transform,
        NodeKind::Geometry,
        NodeKind::Sequencer,
        NodeKind::LayerCollections,
        NodeKind::CopyOnWrite,
        NodeKind::EvalPose,
        NodeKind::Bone,
        NodeKind::EvalParticles,
        NodeKind::Shading,
        NodeKind::Cache,
    ];

    /// Numeric value, as shown in [`DepsNode::identifier`].
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Broad category, derived from the numeric order of the kind.
    pub const fn class(self) -> NodeClass {
        match self {
            NodeKind::Operation => NodeClass::Operation,
            kind if (kind as u8) < (NodeKind::Parameters as u8) => NodeClass::Generic,
            _ => NodeClass::Component,
        }
    }

    /// Whether an ID node can own nodes of this kind.
    pub const fn is_component(self) -> bool {
        matches!(self.class(), NodeClass::Component)
    }

    /// Built-in type descriptor for this kind.
    pub fn type_info(self) -> &'static NodeTypeInfo {
        &BUILTIN_TYPES[self as usize]
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown node kind \"{s}\""))
    }
}

/// Broad category of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeClass {
    /// Control points such as the time source, and ID nodes.
    Generic,
    /// Owned by an ID node, groups operations.
    Component,
    /// Owned by a component, ends tag propagation.
    Operation,
}

/// Immutable descriptor of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeTypeInfo {
    /// The kind this descriptor is for.
    pub kind: NodeKind,
    /// Always `kind.class()`.
    pub class: NodeClass,
    /// Display name, used when a node is created without one.
    pub name: &'static str,
}

impl NodeTypeInfo {
    /// Descriptor with the class derived from `kind`.
    pub const fn new(kind: NodeKind, name: &'static str) -> Self {
        Self {
            kind,
            class: kind.class(),
            name,
        }
    }
}

/// Descriptors for every built-in kind, indexed by `NodeKind as usize`.
static BUILTIN_TYPES: [NodeTypeInfo; 16] = [
    NodeTypeInfo::new(NodeKind::Operation, "Operation"),
    NodeTypeInfo::new(NodeKind::TimeSource, "Time Source"),
    NodeTypeInfo::new(NodeKind::IdRef, "ID Node"),
    NodeTypeInfo::new(NodeKind::Parameters, "Parameters Component"),
    NodeTypeInfo::new(NodeKind::Proxy, "Proxy Component"),
    NodeTypeInfo::new(NodeKind::Animation, "Animation Component"),
    NodeTypeInfo::new(NodeKind::Transform, "Transform Component"),
    NodeTypeInfo::new(NodeKind::Geometry, "Geometry Component"),
    NodeTypeInfo::new(NodeKind::Sequencer, "Sequencer Component"),
    NodeTypeInfo::new(NodeKind::LayerCollections, "Layer Collections Component"),
    NodeTypeInfo::new(NodeKind::CopyOnWrite, "Copy-on-Write Component"),
    NodeTypeInfo::new(NodeKind::EvalPose, "Pose Eval Component"),
    NodeTypeInfo::new(NodeKind::Bone, "Bone Component"),
    NodeTypeInfo::new(NodeKind::EvalParticles, "Particles Component"),
    NodeTypeInfo::new(NodeKind::Shading, "Shading Component"),
    NodeTypeInfo::new(NodeKind::Cache, "Cache Component"),
];

/// Incoming and outgoing relations of a node.
///
/// A node releases only its `inlinks` when it goes away. Its `outlinks`
/// belong to the destination nodes.
#[derive(Debug, Default, Clone)]
pub struct NodeLinks {
    /// Relations this node depends on. Released with the node.
    pub inlinks: LinkList,
    /// Relations depending on this node.
    pub outlinks: LinkList,
}

/// What the graph gives a node while it handles a tag.
pub struct TagContext<'a> {
    /// Resolves the relation indices in [`NodeLinks`].
    pub relations: &'a RelationArena,
    /// Decides which components an ID node tag reaches.
    pub policies: &'a TagPolicyTable,
}

/// Result of tagging a single node.
#[derive(Debug, Default)]
pub struct Propagation {
    /// Nodes the tag continues to, in order.
    pub forward: Fanout,
    /// Record the node as an entry point for the scheduler.
    pub entry_tag: bool,
}

impl Propagation {
    /// Continue to `forward`, no entry tag.
    pub fn forward(forward: Fanout) -> Self {
        Self {
            forward,
            entry_tag: false,
        }
    }

    /// Stop here and record the node for the scheduler.
    pub fn entry() -> Self {
        Self {
            forward: Fanout::new(),
            entry_tag: true,
        }
    }
}

/// Per-variant behavior of a node.
pub trait NodeBehavior {
    /// Handle an update tag and say where it goes next.
    fn tag_update(&mut self, links: &NodeLinks, ctx: &TagContext<'_>) -> Propagation;

    /// Called once the graph is fully built. Returns the nodes the pass
    /// continues to.
    fn finalize_build(&mut self) -> Fanout {
        Fanout::new()
    }
}

/// Variant-specific node data.
#[derive(Debug)]
pub enum NodeData {
    /// See [`TimeSourceNode`].
    TimeSource(TimeSourceNode),
    /// See [`IdNode`].
    Id(IdNode),
    /// See [`ComponentNode`].
    Component(ComponentNode),
    /// See [`OperationNode`].
    Operation(OperationNode),
}

/// A node in the dependency graph.
#[derive(Debug)]
pub struct DepsNode {
    kind: NodeKind,
    name: String,
    links: NodeLinks,
    data: NodeData,
}

impl DepsNode {
    /// Create a node with no relations.
    pub fn new(kind: NodeKind, name: impl Into<String>, data: NodeData) -> Self {
        Self {
            kind,
            name: name.into(),
            links: NodeLinks::default(),
            data,
        }
    }

    /// The node's kind.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The node's class, derived from its kind.
    pub fn class(&self) -> NodeClass {
        self.kind.class()
    }

    /// Display name. Not unique.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Built-in descriptor for the node's kind.
    pub fn type_info(&self) -> &'static NodeTypeInfo {
        self.kind.type_info()
    }

    /// Debug rendering of the node: numeric kind and name.
    ///
    /// Not unique; two nodes can render the same.
    pub fn identifier(&self) -> String {
        format!("({}) : {}", self.kind.as_u8(), self.name)
    }

    /// Relations this node depends on.
    pub fn inlinks(&self) -> &[RelationIndex] {
        &self.links.inlinks
    }

    /// Relations depending on this node.
    pub fn outlinks(&self) -> &[RelationIndex] {
        &self.links.outlinks
    }

    pub(crate) fn links_mut(&mut self) -> &mut NodeLinks {
        &mut self.links
    }

    /// Variant-specific data.
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    /// The ID node data, if this is an ID node.
    pub fn as_id(&self) -> Option<&IdNode> {
        match &self.data {
            NodeData::Id(node) => Some(node),
            _ => None,
        }
    }

    /// The component data, if this is a component.
    pub fn as_component(&self) -> Option<&ComponentNode> {
        match &self.data {
            NodeData::Component(node) => Some(node),
            _ => None,
        }
    }

    /// The operation data, if this is an operation.
    pub fn as_operation(&self) -> Option<&OperationNode> {
        match &self.data {
            NodeData::Operation(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_id_mut(&mut self) -> Option<&mut IdNode> {
        match &mut self.data {
            NodeData::Id(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_component_mut(&mut self) -> Option<&mut ComponentNode> {
        match &mut self.data {
            NodeData::Component(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_operation_mut(&mut self) -> Option<&mut OperationNode> {
        match &mut self.data {
            NodeData::Operation(node) => Some(node),
            _ => None,
        }
    }

    /// Tag this node. The graph follows the returned propagation.
    pub fn tag_update(&mut self, ctx: &TagContext<'_>) -> Propagation {
        let links = &self.links;
        match &mut self.data {
            NodeData::TimeSource(node) => node.tag_update(links, ctx),
            NodeData::Id(node) => node.tag_update(links, ctx),
            NodeData::Component(node) => node.tag_update(links, ctx),
            NodeData::Operation(node) => node.tag_update(links, ctx),
        }
    }

    /// Finish this node's build, returning the nodes the pass continues to.
    pub fn finalize_build(&mut self) -> Fanout {
        match &mut self.data {
            NodeData::TimeSource(node) => node.finalize_build(),
            NodeData::Id(node) => node.finalize_build(),
            NodeData::Component(node) => node.finalize_build(),
            NodeData::Operation(node) => node.finalize_build(),
        }
    }
}
