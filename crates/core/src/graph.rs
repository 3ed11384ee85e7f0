//! Job-graph templates and per-job mutation.
//!
//! A job graph is the render engine's "API format" workflow: an object
//! keyed by node ID where each value carries a `class_type` and an
//! `inputs` map:
//!
//! ```json
//! {
//!   "54":  { "class_type": "LoadImage", "inputs": { "image": "in.png" } },
//!   "455": { "class_type": "PreviewImage", "inputs": { "images": ["54", 0] } }
//! }
//! ```
//!
//! Templates are loaded once and never mutated. [`JobGraph::mutate`]
//! returns a fresh copy with the requested inputs overwritten, so
//! sequential jobs that share a template cannot leak asset names into
//! each other.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// Identifier of a node inside a job graph (the JSON object key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single node descriptor.
///
/// Unknown fields (e.g. `_meta`) are preserved so the submitted graph
/// matches the template apart from the assigned inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A render-engine job graph, keyed by node ID in template order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobGraph {
    nodes: IndexMap<NodeId, GraphNode>,
}

/// A set of `(node, input key, value)` overwrites to stamp onto a graph.
///
/// Assignments are applied in insertion order; a later assignment to the
/// same input wins.
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    entries: Vec<(NodeId, String, Value)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an assignment (builder style).
    pub fn set(
        mut self,
        node: impl Into<NodeId>,
        input: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.push(node, input, value);
        self
    }

    pub fn push(&mut self, node: impl Into<NodeId>, input: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((node.into(), input.into(), value.into()));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(NodeId, String, Value)> {
        self.entries.iter()
    }
}

impl JobGraph {
    /// Parse a graph from a JSON value.
    ///
    /// The value must be a non-empty object whose entries all carry a
    /// `class_type`.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::Validation("Job graph JSON must be an object".to_string()))?;

        if obj.is_empty() {
            return Err(CoreError::Validation(
                "Job graph JSON must contain at least one node".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| CoreError::Validation(format!("Invalid job graph: {e}")))
    }

    /// Parse a graph from raw JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::Validation(format!("Job graph is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Load a template from disk.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read job graph '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains_key(node)
    }

    pub fn node(&self, node: &NodeId) -> Option<&GraphNode> {
        self.nodes.get(node)
    }

    /// Read a single input value, if both node and input exist.
    pub fn input(&self, node: &NodeId, input: &str) -> Option<&Value> {
        self.nodes.get(node).and_then(|n| n.inputs.get(input))
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Produce a job-specific copy with `assignments` applied.
    ///
    /// Assignments targeting a node that is absent from the template are
    /// logged and skipped; the template itself is never touched.
    pub fn mutate(&self, assignments: &Assignments) -> JobGraph {
        let mut copy = self.clone();

        for (node_id, input, value) in assignments.iter() {
            match copy.nodes.get_mut(node_id) {
                Some(node) => {
                    node.inputs.insert(input.clone(), value.clone());
                    tracing::debug!(node_id = %node_id, input = %input, "Assigned graph input");
                }
                None => {
                    tracing::warn!(
                        node_id = %node_id,
                        input = %input,
                        "Node not present in job graph template, skipping assignment",
                    );
                }
            }
        }

        copy
    }

    /// Serialize to the JSON shape the render engine expects.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
