//! Python bindings.
//!
//! Exposes a `Depsgraph` class that owns its data-blocks. Nodes and
//! relations are handed to Python as plain integer indices.

use indexmap::IndexMap;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::DepsgraphConfig;
use crate::error::DegError;
use crate::graph::{Depsgraph, NodeIndex};
use crate::id::{Id, IdRef, IdType};
use crate::nodes::NodeKind;

fn value_error(err: DegError) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Graph index from a Python int. Values past `u32::MAX` raise instead of
/// wrapping onto another node.
fn node_index(index: usize) -> PyResult<NodeIndex> {
    NodeIndex::try_from(index).map_err(value_error)
}

fn parse_kind(kind: &str) -> PyResult<NodeKind> {
    kind.parse().map_err(PyValueError::new_err)
}

/// Python-exposed dependency graph.
///
/// Data-blocks are created by the graph object itself and live as long as
/// it does.
#[pyclass(name = "Depsgraph")]
pub struct PyDepsgraph {
    graph: Depsgraph,
    /// Data-blocks keyed by full name.
    ids: IndexMap<String, IdRef>,
}

#[pymethods]
impl PyDepsgraph {
    #[new]
    #[pyo3(signature = (copy_on_write = false))]
    fn new(copy_on_write: bool) -> Self {
        let config = DepsgraphConfig {
            copy_on_write,
            ..DepsgraphConfig::from_env()
        };
        Self {
            graph: Depsgraph::with_config(config),
            ids: IndexMap::new(),
        }
    }

    /// Add a data-block and return its ID node. Adding the same type and
    /// name twice returns the same node.
    fn add_id(&mut self, id_type: &str, name: &str) -> PyResult<usize> {
        let id_type: IdType = id_type.parse().map_err(PyValueError::new_err)?;
        let id = Id::new(id_type, name);
        let id = self
            .ids
            .entry(id.full_name())
            .or_insert_with(|| id.into_ref());
        Ok(self.graph.add_id_node(id).index())
    }

    #[pyo3(signature = (id_node, kind, name = ""))]
    fn add_component(&mut self, id_node: usize, kind: &str, name: &str) -> PyResult<usize> {
        let kind = parse_kind(kind)?;
        self.graph
            .try_add_component(node_index(id_node)?, kind, name)
            .map(|index| index.index())
            .map_err(value_error)
    }

    fn add_operation(&mut self, component: usize, name: &str) -> PyResult<usize> {
        self.graph
            .try_add_operation(node_index(component)?, name)
            .map(|index| index.index())
            .map_err(value_error)
    }

    #[pyo3(signature = (from_node, to_node, name = ""))]
    fn add_relation(&mut self, from_node: usize, to_node: usize, name: &str) -> PyResult<usize> {
        self.graph
            .try_add_relation(node_index(from_node)?, node_index(to_node)?, name)
            .map(|index| index.index())
            .map_err(value_error)
    }

    #[getter]
    fn time_source(&self) -> usize {
        self.graph.time_source().index()
    }

    fn tag_update(&mut self, node: usize) -> PyResult<()> {
        self.graph.tag_update(node_index(node)?);
        Ok(())
    }

    fn tag_time_source(&mut self) {
        self.graph.tag_time_source();
    }

    #[pyo3(signature = (id_node, kind, name = ""))]
    fn tag_component(&mut self, id_node: usize, kind: &str, name: &str) -> PyResult<bool> {
        let kind = parse_kind(kind)?;
        Ok(self.graph.tag_component(node_index(id_node)?, kind, name))
    }

    /// Operation indices tagged since the last clear.
    fn entry_tags(&self) -> Vec<usize> {
        self.graph.entry_tags().iter().map(NodeIndex::index).collect()
    }

    fn clear_tags(&mut self) {
        self.graph.clear_tags();
    }

    fn finalize_build(&mut self) {
        self.graph.finalize_build();
    }

    fn remove_node(&mut self, node: usize) -> PyResult<bool> {
        Ok(self.graph.remove_node(node_index(node)?))
    }

    fn identifier(&self, node: usize) -> PyResult<String> {
        self.graph
            .try_node(node_index(node)?)
            .map(|node| node.identifier())
            .map_err(value_error)
    }

    fn snapshot_json(&self) -> PyResult<String> {
        self.graph.snapshot().to_json().map_err(value_error)
    }

    fn __repr__(&self) -> String {
        let stats = self.graph.stats();
        format!(
            "Depsgraph(ids={}, components={}, operations={}, relations={})",
            stats.id_nodes, stats.components, stats.operations, stats.relations
        )
    }
}

/// Python module definition.
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyDepsgraph>()?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
