//! Per-item outcomes for batch pipelines.
//!
//! A batch keeps going when an individual item fails; the failure is
//! recorded and the next item starts. The batch as a whole only fails
//! when not a single item succeeded.

use std::path::PathBuf;

use serde::Serialize;

/// Outcome of processing one item (an image or an input/mask pair).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded { output_paths: Vec<PathBuf> },
    Failed { error: String },
}

/// A single batch entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub item_id: String,
    #[serde(flatten)]
    pub status: ItemStatus,
}

impl ItemOutcome {
    pub fn succeeded(item_id: impl Into<String>, output_paths: Vec<PathBuf>) -> Self {
        Self {
            item_id: item_id.into(),
            status: ItemStatus::Succeeded { output_paths },
        }
    }

    pub fn failed(item_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            status: ItemStatus::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, ItemStatus::Succeeded { .. })
    }
}

/// Ordered outcomes for every item in a batch, plus items skipped before
/// processing (e.g. inputs with no matching mask).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub items: Vec<ItemOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match &outcome.status {
            ItemStatus::Succeeded { output_paths } => tracing::info!(
                item_id = %outcome.item_id,
                outputs = output_paths.len(),
                "Item succeeded",
            ),
            ItemStatus::Failed { error } => tracing::error!(
                item_id = %outcome.item_id,
                error = %error,
                "Item failed",
            ),
        }
        self.items.push(outcome);
    }

    pub fn skip(&mut self, item_id: impl Into<String>) {
        self.skipped.push(item_id.into());
    }

    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items.len() - self.succeeded()
    }

    /// A batch fails only when zero items succeeded.
    pub fn is_failure(&self) -> bool {
        self.succeeded() == 0
    }

    /// All output paths across successful items, in item order.
    pub fn output_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.items
            .iter()
            .filter_map(|item| match &item.status {
                ItemStatus::Succeeded { output_paths } => Some(output_paths),
                ItemStatus::Failed { .. } => None,
            })
            .flatten()
    }

    /// Human-readable reason combining every item failure.
    pub fn failure_summary(&self) -> String {
        let reasons: Vec<String> = self
            .items
            .iter()
            .filter_map(|item| match &item.status {
                ItemStatus::Failed { error } => Some(format!("{}: {error}", item.item_id)),
                ItemStatus::Succeeded { .. } => None,
            })
            .collect();

        if reasons.is_empty() {
            "no items were processed".to_string()
        } else {
            reasons.join("; ")
        }
    }
}
