//! Depsgraph Core
//!
//! This crate provides the node layer of a dependency graph that tracks
//! which parts of a scene need re-evaluation after something changed.
//! It implements:
//!
//! - Typed graph nodes (time source, ID, component, operation)
//! - Update-tag propagation with per-component tag policies
//! - A node type registry that builds nodes of any registered kind
//! - Copy-on-write shadows of data-blocks for evaluation
//!
//! The crate is designed to be used both as a native Rust library and, with
//! the `python` feature, as a Python extension module via PyO3.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: the graph arena, relations, tagging, snapshots
//! - `nodes`: node kinds, node variants, tag policies, the type registry
//! - `id`: externally owned data-blocks and their shared handles
//! - `cow`: strategies producing the data-block evaluation binds to
//! - `config`: build-time switches
//!
//! # Example
//!
//! ```rust
//! use depsgraph_core::graph::Depsgraph;
//! use depsgraph_core::id::{Id, IdType};
//! use depsgraph_core::nodes::NodeKind;
//!
//! let mut graph = Depsgraph::new();
//! let cube = Id::new(IdType::Mesh, "Cube").into_ref();
//!
//! let node = graph.add_id_node(&cube);
//! let geometry = graph.add_component(node, NodeKind::Geometry, "");
//! let eval = graph.add_operation(geometry, "Geometry Eval");
//! graph.add_relation(graph.time_source(), geometry, "Time -> Geometry");
//!
//! // Frame changed: everything time-dependent is tagged.
//! graph.tag_time_source();
//! assert!(graph.entry_tags().contains(&eval));
//! ```

pub mod config;
pub mod cow;
pub mod error;
pub mod graph;
pub mod id;
pub mod nodes;

#[cfg(feature = "python")]
mod python;

pub use config::DepsgraphConfig;
pub use error::{DegError, Result};
pub use graph::{Depsgraph, NodeIndex, RelationIndex};
pub use id::{Id, IdRef, IdType};
pub use nodes::{NodeKind, NodeTypeRegistry};
