//! Typed model of the `/history/{prompt_id}` response.
//!
//! ```json
//! {
//!   "abc-123": {
//!     "outputs": {
//!       "455": { "images": [ { "filename": "mask_00001_.png", "subfolder": "", "type": "output" } ] }
//!     },
//!     "status": { "status_str": "success", "completed": true }
//!   }
//! }
//! ```
//!
//! Outputs keep the engine's node order so the fallback search is
//! deterministic.

use indexmap::IndexMap;
use lookbook_core::graph::NodeId;
use serde::{Deserialize, Serialize};

/// Reference to one image produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(rename = "type", default = "default_image_type")]
    pub kind: String,
}

fn default_image_type() -> String {
    "output".to_string()
}

impl ImageRef {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            subfolder: String::new(),
            kind: default_image_type(),
        }
    }
}

/// Outputs of a single node. Non-image outputs are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

/// History entry of one prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptHistory {
    #[serde(default)]
    pub outputs: IndexMap<NodeId, NodeOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,
}

/// The whole history response: prompt id -> entry. Empty while the prompt
/// is still queued or running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: IndexMap<String, PromptHistory>,
}

/// The node whose images are the job's result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedOutput<'a> {
    pub node_id: &'a NodeId,
    pub images: &'a [ImageRef],
    /// True when the designated node was absent or empty and another node
    /// was picked instead.
    pub fallback: bool,
}

impl History {
    pub fn get(&self, prompt_id: &str) -> Option<&PromptHistory> {
        self.entries.get(prompt_id)
    }

    pub fn insert(&mut self, prompt_id: impl Into<String>, entry: PromptHistory) {
        self.entries.insert(prompt_id.into(), entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entry(mut self, prompt_id: &str) -> Option<PromptHistory> {
        self.entries.shift_remove(prompt_id)
    }
}

impl PromptHistory {
    /// Entry whose outputs are exactly `outputs`, in order.
    pub fn with_outputs<I>(outputs: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, Vec<ImageRef>)>,
    {
        Self {
            outputs: outputs
                .into_iter()
                .map(|(id, images)| (id, NodeOutput { images }))
                .collect(),
            status: None,
        }
    }

    /// Locate the result node.
    ///
    /// The designated node wins when it has images; otherwise the first
    /// node in output order with a non-empty image list is used. `None`
    /// means no node has produced images yet.
    pub fn resolve_output(&self, designated: &NodeId) -> Option<ResolvedOutput<'_>> {
        if let Some((node_id, output)) = self.outputs.get_key_value(designated) {
            if !output.images.is_empty() {
                return Some(ResolvedOutput {
                    node_id,
                    images: &output.images,
                    fallback: false,
                });
            }
        }

        self.outputs
            .iter()
            .find(|(_, output)| !output.images.is_empty())
            .map(|(node_id, output)| ResolvedOutput {
                node_id,
                images: &output.images,
                fallback: true,
            })
    }

    /// Whether any node (designated or fallback) has images.
    pub fn has_output_images(&self, designated: &NodeId) -> bool {
        self.resolve_output(designated).is_some()
    }
}
