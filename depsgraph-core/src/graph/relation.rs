//! Relations
//!
//! A relation is a directed edge: `to` depends on `from`. Both endpoints
//! list it (`from` in its outlinks, `to` in its inlinks), but neither owns
//! the relation object. Relations live in a [`RelationArena`] and nodes keep
//! [`RelationIndex`]es into it.
//!
//! Releasing is the destination's job: when a node goes away the graph
//! releases the node's inlinks, never its outlinks. A released slot is never
//! reused, so a stale index resolves to `None` instead of to another edge.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DegError, Result};

use super::NodeIndex;

/// Stable index of a relation in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationIndex(u32);

impl RelationIndex {
    /// Position of the relation's slot in the arena.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for RelationIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl TryFrom<usize> for RelationIndex {
    type Error = DegError;

    fn try_from(index: usize) -> Result<Self> {
        u32::try_from(index)
            .map(Self)
            .map_err(|_| DegError::IndexOutOfRange { index })
    }
}

impl fmt::Display for RelationIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// The node depended on.
    pub from: NodeIndex,
    /// The dependent node. Releases the relation.
    pub to: NodeIndex,
    /// Describes why the edge exists. Diagnostic only.
    pub name: String,
}

impl Relation {
    /// Relation making `to` depend on `from`.
    pub fn new(from: NodeIndex, to: NodeIndex, name: impl Into<String>) -> Self {
        Self {
            from,
            to,
            name: name.into(),
        }
    }
}

/// Owner of every relation in a graph.
#[derive(Debug, Default)]
pub struct RelationArena {
    slots: Vec<Option<Relation>>,
    released: usize,
}

impl RelationArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a relation and return its index.
    ///
    /// # Panics
    ///
    /// If the arena already holds `u32::MAX + 1` slots.
    pub fn insert(&mut self, relation: Relation) -> RelationIndex {
        let index =
            RelationIndex::try_from(self.slots.len()).unwrap_or_else(|err| panic!("{err}"));
        self.slots.push(Some(relation));
        index
    }

    /// The relation at `index`, unless it was released.
    pub fn get(&self, index: RelationIndex) -> Option<&Relation> {
        self.slots.get(index.index()).and_then(Option::as_ref)
    }

    /// Release a relation. Returns `None` if it was already released.
    pub fn release(&mut self, index: RelationIndex) -> Option<Relation> {
        let relation = self.slots.get_mut(index.index())?.take()?;
        self.released += 1;
        Some(relation)
    }

    /// Live relations with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (RelationIndex, &Relation)> + '_ {
        self.slots
            .iter()
            .enumerate()
            // `insert` keeps every slot position within `u32`.
            .filter_map(|(i, slot)| Some((RelationIndex(i as u32), slot.as_ref()?)))
    }

    /// Number of live relations.
    pub fn len(&self) -> usize {
        self.slots.len() - self.released
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of relations released so far.
    pub fn released_count(&self) -> usize {
        self.released
    }
}
