//! Error types for the dependency graph.
//!
//! Every variant here describes a broken build-time invariant: a node kind
//! that was never registered, an ID node created without a data-block, a
//! node index that no longer points at a live node. The panicking entry
//! points (`factory_for`, `add_component`, ...) format one of these errors
//! into their panic message; the `try_` variants hand it back instead.

use thiserror::Error;

use crate::graph::NodeIndex;
use crate::nodes::NodeKind;

/// The main error type for dependency graph operations.
#[derive(Error, Debug)]
pub enum DegError {
    /// No factory was registered for the requested node kind.
    #[error("no factory registered for node type {kind:?}")]
    UnregisteredNodeType {
        /// The kind that was looked up.
        kind: NodeKind,
    },

    /// An ID node was requested without a source data-block.
    #[error("ID node \"{name}\" requires a source data-block")]
    MissingDatablock {
        /// Name the node would have been created with.
        name: String,
    },

    /// The index does not point at a live node.
    #[error("node {index} has been released or never existed")]
    NodeReleased {
        /// The stale index.
        index: NodeIndex,
    },

    /// The index is past the largest index a graph can hand out.
    #[error("index {index} is out of range for a graph index")]
    IndexOutOfRange {
        /// The rejected index.
        index: usize,
    },

    /// The node exists but is not of the expected variant.
    #[error("node {index} is a {actual:?} node, expected {expected}")]
    UnexpectedNodeKind {
        /// The offending node.
        index: NodeIndex,
        /// What the node actually is.
        actual: NodeKind,
        /// What the caller needed.
        expected: &'static str,
    },

    /// Only component kinds can be owned by an ID node.
    #[error("{kind:?} is not a component kind")]
    NotAComponent {
        /// The requested kind.
        kind: NodeKind,
    },

    /// The ID node was destroyed, or never initialized.
    #[error("ID node {index} is not initialized")]
    IdNodeNotInitialized {
        /// The ID node.
        index: NodeIndex,
    },

    /// Operations cannot be added once the component finalized its build.
    #[error("component {index} already finalized its build")]
    BuildFinalized {
        /// The component node.
        index: NodeIndex,
    },

    /// Config could not be parsed.
    #[error("invalid depsgraph config: {0}")]
    Config(#[from] serde_json::Error),

    /// Snapshot could not be encoded as MessagePack.
    #[error("snapshot encode failed: {0}")]
    SnapshotEncode(#[from] rmp_serde::encode::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DegError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = DegError::UnregisteredNodeType {
            kind: NodeKind::Shading,
        };
        assert_eq!(err.to_string(), "no factory registered for node type Shading");

        let err = DegError::NodeReleased {
            index: NodeIndex::from(7),
        };
        assert_eq!(err.to_string(), "node #7 has been released or never existed");

        let err = DegError::IndexOutOfRange { index: 1 << 20 };
        assert_eq!(err.to_string(), "index 1048576 is out of range for a graph index");
    }

    #[test]
    fn json_errors_convert() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: DegError = parse.into();
        assert!(matches!(err, DegError::Config(_)));
    }
}
