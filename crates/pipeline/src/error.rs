use lookbook_comfyui::job::JobError;
use lookbook_comfyui::uploader::UploadError;
use lookbook_core::batch::BatchResult;
use lookbook_core::error::CoreError;

use crate::config::ConfigError;
use crate::face::FaceError;
use crate::vision::VisionError;

/// Errors that end a pipeline run.
///
/// Item-level failures inside a batch never surface here; they are
/// recorded in the [`BatchResult`] instead. Only batch-level
/// preconditions, single-item runs and zero-success batches do.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("No style images referenced in prompt data")]
    NoStylesReferenced,

    #[error("Missing required style images: {}", .0.join(", "))]
    MissingStyles(Vec<String>),

    #[error("Failed to upload background image: {0}")]
    BackgroundUploadFailed(#[source] UploadError),

    #[error("Failed to upload style images: {}", .0.join(", "))]
    StyleUploadsFailed(Vec<String>),

    #[error("No matching image/mask pairs found")]
    NoPairs,

    #[error("No images found to process")]
    NoImages,

    /// A single-item run failed.
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("No items were processed successfully: {}", .0.failure_summary())]
    AllItemsFailed(BatchResult),

    #[error(transparent)]
    Face(#[from] FaceError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error("Unreadable image {name}: {reason}")]
    UnreadableImage { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Worker(String),
}
