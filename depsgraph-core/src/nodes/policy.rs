//! Tag Policies
//!
//! When an ID node is tagged, each of its components decides, based on its
//! kind and on the data-block that owns it, whether the tag reaches it. The
//! defaults:
//!
//! | Component kind  | Tagged when                                          |
//! |-----------------|------------------------------------------------------|
//! | `Animation`     | the data-block has animation data with the animation recalc flag set |
//! | `Shading`       | the data-block is a material or a world              |
//! | `EvalParticles` | never, particle settings are tagged explicitly       |
//! | anything else   | always                                               |
//!
//! The shading rule keeps unrelated property changes from flooding shading
//! recomputation until tags carry finer-grained flags. Callers may replace
//! any entry with [`TagPolicyTable::set`].

use indexmap::IndexMap;

use crate::id::{Id, IdType};
use crate::nodes::NodeKind;

/// Whether a generic tag on a data-block reaches a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagPolicy {
    Always,
    Never,
    /// Only while the data-block has a pending animation recalc.
    WhenAnimationPending,
    /// Only for data-blocks of one of these kinds.
    WhenOwnerIs(&'static [IdType]),
}

impl TagPolicy {
    pub fn allows(&self, owner: &Id) -> bool {
        match self {
            TagPolicy::Always => true,
            TagPolicy::Never => false,
            TagPolicy::WhenAnimationPending => owner.has_pending_animation_recalc(),
            TagPolicy::WhenOwnerIs(kinds) => kinds.contains(&owner.id_type()),
        }
    }
}

/// Per-kind policy lookup with overrides.
#[derive(Debug, Clone, Default)]
pub struct TagPolicyTable {
    overrides: IndexMap<NodeKind, TagPolicy>,
}

impl TagPolicyTable {
    /// Built-in policy for a component kind.
    pub fn default_policy(kind: NodeKind) -> TagPolicy {
        match kind {
            NodeKind::Animation => TagPolicy::WhenAnimationPending,
            NodeKind::Shading => TagPolicy::WhenOwnerIs(&[IdType::Material, IdType::World]),
            NodeKind::EvalParticles => TagPolicy::Never,
            _ => TagPolicy::Always,
        }
    }

    pub fn policy_for(&self, kind: NodeKind) -> TagPolicy {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_policy(kind))
    }

    /// Replace the policy for `kind`, returning the one in effect before.
    pub fn set(&mut self, kind: NodeKind, policy: TagPolicy) -> TagPolicy {
        let previous = self.policy_for(kind);
        self.overrides.insert(kind, policy);
        previous
    }

    /// Go back to the built-in policy for `kind`.
    pub fn reset(&mut self, kind: NodeKind) {
        self.overrides.shift_remove(&kind);
    }
}
