//! Output Resolver & Downloader.

use std::path::{Path, PathBuf};

use lookbook_core::graph::NodeId;
use lookbook_core::naming::variant_path;

use crate::engine::RenderEngine;
use crate::history::PromptHistory;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("No output images found for prompt {prompt_id}")]
    NoOutputImages { prompt_id: String },

    #[error("All {attempted} output variants failed to download for prompt {prompt_id}")]
    AllVariantsFailed { prompt_id: String, attempted: usize },
}

/// Download up to `max_variants` images of the resolved output node.
///
/// The first image lands on `destination`; image `n` lands on
/// `{stem}_variant_{n}{ext}` beside it. A variant that fails to fetch or
/// write is logged and skipped. Returns the written paths in order.
pub async fn download_outputs(
    engine: &dyn RenderEngine,
    history: &PromptHistory,
    prompt_id: &str,
    output_node: &NodeId,
    destination: &Path,
    max_variants: usize,
) -> Result<Vec<PathBuf>, DownloadError> {
    let resolved = history
        .resolve_output(output_node)
        .ok_or_else(|| DownloadError::NoOutputImages {
            prompt_id: prompt_id.to_string(),
        })?;

    if resolved.fallback {
        tracing::warn!(
            prompt_id,
            designated = %output_node,
            used = %resolved.node_id,
            "Designated output node empty, using fallback node",
        );
    }

    let wanted = resolved.images.len().min(max_variants.max(1));
    if resolved.images.len() > wanted {
        tracing::debug!(
            prompt_id,
            available = resolved.images.len(),
            max_variants,
            "Capping output variants",
        );
    }

    let mut written = Vec::with_capacity(wanted);

    for (index, image) in resolved.images.iter().take(wanted).enumerate() {
        let variant = index + 1;
        let path = variant_path(destination, variant);

        let bytes = match engine.view(image).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    prompt_id,
                    variant,
                    filename = %image.filename,
                    error = %e,
                    "Failed to fetch output variant",
                );
                continue;
            }
        };

        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            tracing::warn!(
                prompt_id,
                variant,
                path = %path.display(),
                error = %e,
                "Failed to write output variant",
            );
            continue;
        }

        tracing::info!(
            prompt_id,
            variant,
            bytes = bytes.len(),
            path = %path.display(),
            "Downloaded output variant",
        );
        written.push(path);
    }

    if written.is_empty() {
        return Err(DownloadError::AllVariantsFailed {
            prompt_id: prompt_id.to_string(),
            attempted: wanted,
        });
    }

    Ok(written)
}
