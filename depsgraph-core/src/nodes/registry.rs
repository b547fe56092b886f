//! Node Type Registry
//!
//! Maps a [`NodeKind`] to the factory that builds nodes of that kind. The
//! graph never constructs a concrete variant itself; it asks the registry,
//! which is what lets an ID node create any kind of component generically.
//!
//! The built-in table is static. [`NodeTypeRegistry::global`] fills a
//! process-wide registry from it the first time it is asked for.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use tracing::warn;

use crate::cow::ShadowStrategy;
use crate::error::{DegError, Result};
use crate::id::IdRef;

use super::{
    ComponentNode, DepsNode, IdNode, NodeData, NodeKind, NodeTypeInfo, OperationNode,
    TimeSourceNode,
};

/// Graph-wide state a factory may need while building a node.
pub struct BuildContext<'a> {
    pub shadow: &'a Arc<dyn ShadowStrategy>,
}

/// Builds the variant data of a node from `(owner data-block, subdata, name)`.
pub type NodeConstructor =
    fn(&BuildContext<'_>, Option<&IdRef>, &str, &str) -> Result<NodeData>;

/// Creates nodes of one kind.
#[derive(Clone, Copy)]
pub struct NodeFactory {
    info: NodeTypeInfo,
    construct: NodeConstructor,
}

impl NodeFactory {
    pub const fn new(info: NodeTypeInfo, construct: NodeConstructor) -> Self {
        Self { info, construct }
    }

    pub fn info(&self) -> &NodeTypeInfo {
        &self.info
    }

    pub fn kind(&self) -> NodeKind {
        self.info.kind
    }

    /// Build a node. An empty `name` falls back to the type's display name.
    pub fn try_create(
        &self,
        ctx: &BuildContext<'_>,
        owner: Option<&IdRef>,
        subdata: &str,
        name: &str,
    ) -> Result<DepsNode> {
        let name = if name.is_empty() { self.info.name } else { name };
        let data = (self.construct)(ctx, owner, subdata, name)?;
        Ok(DepsNode::new(self.info.kind, name, data))
    }

    /// Build a node, panicking on a broken build invariant.
    pub fn create(
        &self,
        ctx: &BuildContext<'_>,
        owner: Option<&IdRef>,
        subdata: &str,
        name: &str,
    ) -> DepsNode {
        self.try_create(ctx, owner, subdata, name)
            .unwrap_or_else(|err| panic!("{err}"))
    }
}

impl std::fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeFactory").field("info", &self.info).finish()
    }
}

fn build_time_source(
    _ctx: &BuildContext<'_>,
    _owner: Option<&IdRef>,
    _subdata: &str,
    _name: &str,
) -> Result<NodeData> {
    Ok(NodeData::TimeSource(TimeSourceNode))
}

fn build_id_node(
    ctx: &BuildContext<'_>,
    owner: Option<&IdRef>,
    subdata: &str,
    name: &str,
) -> Result<NodeData> {
    let id = owner.ok_or_else(|| DegError::MissingDatablock {
        name: name.to_string(),
    })?;
    let mut node = IdNode::new();
    node.init(id, subdata, Arc::clone(ctx.shadow));
    Ok(NodeData::Id(node))
}

fn build_component(
    _ctx: &BuildContext<'_>,
    _owner: Option<&IdRef>,
    subdata: &str,
    _name: &str,
) -> Result<NodeData> {
    Ok(NodeData::Component(ComponentNode::new(subdata)))
}

fn build_operation(
    _ctx: &BuildContext<'_>,
    _owner: Option<&IdRef>,
    _subdata: &str,
    _name: &str,
) -> Result<NodeData> {
    Ok(NodeData::Operation(OperationNode::new()))
}

fn builtin_factory(kind: NodeKind) -> NodeFactory {
    let construct: NodeConstructor = match kind {
        NodeKind::Operation => build_operation,
        NodeKind::TimeSource => build_time_source,
        NodeKind::IdRef => build_id_node,
        _ => build_component,
    };
    NodeFactory::new(*kind.type_info(), construct)
}

/// Table of node factories keyed by kind.
#[derive(Debug, Default, Clone)]
pub struct NodeTypeRegistry {
    factories: IndexMap<NodeKind, NodeFactory>,
}

impl NodeTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in NodeKind::ALL {
            registry.register(builtin_factory(kind));
        }
        registry
    }

    /// The process-wide built-in registry.
    pub fn global() -> Arc<NodeTypeRegistry> {
        static GLOBAL: OnceLock<Arc<NodeTypeRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Register a factory. The first registration of a kind wins; later
    /// ones are ignored. Returns whether the factory was added.
    pub fn register(&mut self, factory: NodeFactory) -> bool {
        let kind = factory.kind();
        if self.factories.contains_key(&kind) {
            warn!(?kind, "node type registered twice, keeping the first factory");
            return false;
        }
        self.factories.insert(kind, factory);
        true
    }

    pub fn try_factory_for(&self, kind: NodeKind) -> Result<&NodeFactory> {
        self.factories
            .get(&kind)
            .ok_or(DegError::UnregisteredNodeType { kind })
    }

    /// Factory for `kind`.
    ///
    /// # Panics
    ///
    /// If `kind` was never registered.
    pub fn factory_for(&self, kind: NodeKind) -> &NodeFactory {
        self.try_factory_for(kind)
            .unwrap_or_else(|err| panic!("{err}"))
    }

    pub fn is_registered(&self, kind: NodeKind) -> bool {
        self.factories.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cow::AliasShadow;
    use crate::id::{Id, IdType};

    fn alias() -> Arc<dyn ShadowStrategy> {
        Arc::new(AliasShadow)
    }

    #[test]
    fn builtins_cover_every_kind() {
        let registry = NodeTypeRegistry::with_builtins();
        assert_eq!(registry.len(), NodeKind::ALL.len());
        for kind in NodeKind::ALL {
            assert_eq!(registry.factory_for(kind).kind(), kind);
        }
    }

    #[test]
    fn global_is_shared() {
        let a = NodeTypeRegistry::global();
        let b = NodeTypeRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn duplicate_registration_keeps_first() {
        fn other(
            _: &BuildContext<'_>,
            _: Option<&IdRef>,
            _: &str,
            _: &str,
        ) -> Result<NodeData> {
            Ok(NodeData::Operation(OperationNode::new()))
        }

        let mut registry = NodeTypeRegistry::new();
        assert!(registry.register(builtin_factory(NodeKind::Geometry)));
        assert!(!registry.register(NodeFactory::new(
            NodeTypeInfo::new(NodeKind::Geometry, "Impostor"),
            other,
        )));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.factory_for(NodeKind::Geometry).info().name, "Geometry Component");
    }

    #[test]
    fn unregistered_kind_is_an_error() {
        let registry = NodeTypeRegistry::new();
        let err = registry.try_factory_for(NodeKind::Shading).unwrap_err();
        assert!(matches!(err, DegError::UnregisteredNodeType { kind: NodeKind::Shading }));
    }

    #[test]
    #[should_panic(expected = "no factory registered for node type Cache")]
    fn unregistered_kind_panics() {
        NodeTypeRegistry::new().factory_for(NodeKind::Cache);
    }

    #[test]
    fn empty_name_uses_type_name() {
        let shadow = alias();
        let ctx = BuildContext { shadow: &shadow };
        let registry = NodeTypeRegistry::with_builtins();

        let node = registry.factory_for(NodeKind::Animation).create(&ctx, None, "", "");
        assert_eq!(node.name(), "Animation Component");
        assert!(node.as_component().is_some());

        let named = registry
            .factory_for(NodeKind::Bone)
            .create(&ctx, None, "Spine", "Spine");
        assert_eq!(named.name(), "Spine");
        assert_eq!(named.as_component().unwrap().subdata(), "Spine");
    }

    #[test]
    fn id_node_needs_a_data_block() {
        let shadow = alias();
        let ctx = BuildContext { shadow: &shadow };
        let factory = NodeTypeRegistry::with_builtins().factory_for(NodeKind::IdRef).clone();

        let err = factory.try_create(&ctx, None, "", "MECube").unwrap_err();
        assert!(matches!(err, DegError::MissingDatablock { .. }));

        let mesh = Id::new(IdType::Mesh, "Cube").into_ref();
        let node = factory.create(&ctx, Some(&mesh), "", "MECube");
        assert!(node.as_id().unwrap().is_initialized());
    }

    #[test]
    #[should_panic(expected = "requires a source data-block")]
    fn id_node_without_data_block_panics() {
        let shadow = alias();
        let ctx = BuildContext { shadow: &shadow };
        NodeTypeRegistry::with_builtins()
            .factory_for(NodeKind::IdRef)
            .create(&ctx, None, "", "");
    }
}
