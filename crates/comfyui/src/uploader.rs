//! Asset Uploader: pushes a local file to the engine's input folder.

use std::path::{Path, PathBuf};

use lookbook_core::naming::{timestamp_prefixed_name, unique_suffix_name};
use lookbook_core::types::epoch_millis;
use serde::Serialize;

use crate::engine::RenderEngine;
use crate::retry::{retry, RetryPolicy};

/// What role an uploaded asset plays in the job graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Input,
    Mask,
    Style,
    Background,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Mask => "mask",
            Self::Style => "style",
            Self::Background => "background",
        }
    }
}

/// How the remote name is derived from the local file name.
///
/// The engine overwrites same-named uploads, so anything that may be
/// uploaded twice in one process lifetime should carry a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameStrategy {
    /// The local basename, unchanged.
    Original,
    /// `{stem}_{millis}{ext}`.
    UniqueSuffix,
    /// `{millis}_{name}`.
    TimestampPrefix,
}

impl NameStrategy {
    pub fn remote_name(&self, filename: &str) -> String {
        match self {
            Self::Original => filename.to_string(),
            Self::UniqueSuffix => unique_suffix_name(filename, epoch_millis()),
            Self::TimestampPrefix => timestamp_prefixed_name(filename, epoch_millis()),
        }
    }
}

/// A file that now exists on the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedAsset {
    pub local_path: PathBuf,
    /// Name to reference in the job graph.
    pub remote_name: String,
    pub kind: AssetKind,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Asset not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read asset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload failed after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
}

/// Uploads files under a retry policy.
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    policy: RetryPolicy,
}

impl Uploader {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Upload `local_path`, naming it per `naming`.
    ///
    /// A missing file fails immediately without touching the engine. The
    /// returned remote name is the one the engine reports, or the
    /// requested name if the engine does not echo one.
    pub async fn upload(
        &self,
        engine: &dyn RenderEngine,
        local_path: &Path,
        kind: AssetKind,
        naming: NameStrategy,
    ) -> Result<UploadedAsset, UploadError> {
        let bytes = match tokio::fs::read(local_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::error!(path = %local_path.display(), "Asset missing locally");
                return Err(UploadError::NotFound {
                    path: local_path.to_path_buf(),
                });
            }
            Err(source) => {
                return Err(UploadError::Io {
                    path: local_path.to_path_buf(),
                    source,
                })
            }
        };

        let filename = local_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| kind.as_str().to_string());
        let requested = naming.remote_name(&filename);

        tracing::info!(
            engine = engine.base_url(),
            kind = kind.as_str(),
            local = %filename,
            remote = %requested,
            bytes = bytes.len(),
            "Uploading asset",
        );

        let response = retry(&self.policy, "upload_image", |_| {
            engine.upload_image(bytes.clone(), &requested)
        })
        .await
        .map_err(|exhausted| UploadError::Exhausted {
            attempts: exhausted.attempts,
            reason: exhausted.last_error.to_string(),
        })?;

        let remote_name = response
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or(requested);

        tracing::debug!(kind = kind.as_str(), remote = %remote_name, "Asset uploaded");

        Ok(UploadedAsset {
            local_path: local_path.to_path_buf(),
            remote_name,
            kind,
        })
    }
}
