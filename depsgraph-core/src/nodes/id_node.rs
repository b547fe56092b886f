//! ID Nodes
//!
//! An ID node stands for one data-block in the graph. It owns the component
//! nodes that group the data-block's operations, keyed by
//! `(component kind, name)`, and holds two data-block references:
//!
//! - `id_orig`: the original, owned by the outside world.
//! - `id_cow`: what evaluation binds to. Either the original itself or a
//!   private copy, depending on the graph's [`ShadowStrategy`].
//!
//! Component nodes live in the graph's node arena; the map here stores their
//! indices. Lookup-or-create therefore goes through
//! [`Depsgraph::add_component`](crate::graph::Depsgraph::add_component),
//! which consults [`IdNode::find_component`] first.
//!
//! # Lifecycle
//!
//! `Uninitialized → Initialized → Destroyed`. Destruction is terminal and
//! idempotent; it runs on drop as well.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{Equivalent, IndexMap};
use tracing::{debug, trace};

use crate::cow::{Shadow, ShadowStrategy};
use crate::graph::NodeIndex;
use crate::id::IdRef;

use super::{Fanout, NodeBehavior, NodeKind, NodeLinks, Propagation, TagContext};

/// Key of a component inside its ID node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentIdKey {
    pub kind: NodeKind,
    pub name: String,
}

impl ComponentIdKey {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl Hash for ComponentIdKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.as_str().hash(state);
    }
}

/// Borrowed form of [`ComponentIdKey`] for lookups.
struct ComponentIdKeyRef<'a> {
    kind: NodeKind,
    name: &'a str,
}

impl Hash for ComponentIdKeyRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
    }
}

impl Equivalent<ComponentIdKey> for ComponentIdKeyRef<'_> {
    fn equivalent(&self, key: &ComponentIdKey) -> bool {
        self.kind == key.kind && self.name == key.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdNodeState {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Graph node wrapping a data-block.
pub struct IdNode {
    state: IdNodeState,
    id_orig: Option<IdRef>,
    shadow: Option<Shadow>,
    strategy: Option<Arc<dyn ShadowStrategy>>,
    eval_flags: u32,
    components: IndexMap<ComponentIdKey, NodeIndex>,
}

impl IdNode {
    pub fn new() -> Self {
        Self {
            state: IdNodeState::Uninitialized,
            id_orig: None,
            shadow: None,
            strategy: None,
            eval_flags: 0,
            components: IndexMap::new(),
        }
    }

    /// Bind the node to its data-block.
    ///
    /// The evaluation reference is produced right away, so operations can
    /// hold on to it from the moment the node exists.
    ///
    /// # Panics
    ///
    /// If the node was already initialized or destroyed.
    pub fn init(&mut self, id: &IdRef, _subdata: &str, strategy: Arc<dyn ShadowStrategy>) {
        assert_eq!(
            self.state,
            IdNodeState::Uninitialized,
            "ID node {} initialized twice",
            id.read()
        );

        let shadow = strategy.create(id);
        debug!(id = %id.read(), strategy = strategy.name(), "init ID node");

        self.id_orig = Some(Arc::clone(id));
        self.shadow = Some(shadow);
        self.strategy = Some(strategy);
        self.eval_flags = 0;
        self.components = IndexMap::new();
        self.state = IdNodeState::Initialized;
    }

    pub fn state(&self) -> IdNodeState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == IdNodeState::Initialized
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == IdNodeState::Destroyed
    }

    /// The original data-block. `None` before init and after destroy.
    pub fn id_orig(&self) -> Option<&IdRef> {
        self.id_orig.as_ref()
    }

    /// The data-block evaluation binds to.
    pub fn id_cow(&self) -> Option<&IdRef> {
        self.shadow.as_ref().map(Shadow::id)
    }

    pub fn shadow(&self) -> Option<&Shadow> {
        self.shadow.as_ref()
    }

    pub fn eval_flags(&self) -> u32 {
        self.eval_flags
    }

    pub fn set_eval_flags(&mut self, flags: u32) {
        self.eval_flags = flags;
    }

    /// Exact lookup of a component.
    pub fn find_component(&self, kind: NodeKind, name: &str) -> Option<NodeIndex> {
        self.components
            .get(&ComponentIdKeyRef { kind, name })
            .copied()
    }

    /// Components in the order they were added.
    pub fn components(&self) -> impl Iterator<Item = (&ComponentIdKey, NodeIndex)> + '_ {
        self.components.iter().map(|(key, &index)| (key, index))
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub(crate) fn insert_component(&mut self, kind: NodeKind, name: &str, index: NodeIndex) {
        debug_assert!(self.find_component(kind, name).is_none());
        self.components.insert(ComponentIdKey::new(kind, name), index);
    }

    /// Forget a component that the graph released on its own.
    pub(crate) fn remove_component(&mut self, index: NodeIndex) {
        self.components.retain(|_, component| *component != index);
    }

    /// Tear the node down.
    ///
    /// Drops the component map, releases the evaluation copy if this node
    /// owns one, and marks the node destroyed. Returns the component indices
    /// so the graph can release those nodes. Does nothing unless the node is
    /// initialized.
    pub fn destroy(&mut self) -> Vec<NodeIndex> {
        if self.state != IdNodeState::Initialized {
            return Vec::new();
        }

        let components = std::mem::take(&mut self.components)
            .into_values()
            .collect();

        if let (Some(orig), Some(shadow), Some(strategy)) =
            (self.id_orig.take(), self.shadow.take(), self.strategy.take())
        {
            debug!(id = %orig.read(), "destroy ID node");
            strategy.release(&orig, shadow);
        }

        self.state = IdNodeState::Destroyed;
        components
    }
}

impl Default for IdNode {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IdNode {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for IdNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdNode")
            .field("state", &self.state)
            .field("id", &self.id_orig.as_ref().map(|id| id.read().full_name()))
            .field("copy_on_write", &self.shadow.as_ref().is_some_and(Shadow::is_owned))
            .field("eval_flags", &self.eval_flags)
            .field("components", &self.components)
            .finish()
    }
}

impl NodeBehavior for IdNode {
    fn tag_update(&mut self, _links: &NodeLinks, ctx: &TagContext<'_>) -> Propagation {
        let Some(id) = self.id_orig.as_ref() else {
            return Propagation::default();
        };
        let id = id.read();

        let mut forward = Fanout::new();
        for (key, &index) in &self.components {
            if ctx.policies.policy_for(key.kind).allows(&id) {
                forward.push(index);
            } else {
                trace!(id = %id, component = ?key.kind, "tag suppressed");
            }
        }
        Propagation::forward(forward)
    }

    fn finalize_build(&mut self) -> Fanout {
        self.components.values().copied().collect()
    }
}
