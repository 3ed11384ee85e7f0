//! Face-presence renaming.
//!
//! Every image found under the input tree is copied flat into the output
//! folder. Photos with a valid face keep their name; everything else
//! becomes `closeup(n).ext`. A `manifest.json` describing each decision
//! is written beside the copies.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lookbook_core::face::{has_valid_face, FaceRules};
use lookbook_core::media::IMAGE_EXTENSIONS;
use lookbook_core::naming::{deduplicated_name, next_closeup_name, split_name};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::face::FaceDetector;
use crate::files::{file_name, walk_files};

pub const MANIFEST_FILE: &str = "manifest.json";

const KEPT_REASON: &str = "Face detected - kept original name";
const RENAMED_REASON: &str = "No valid face detected - renamed to closeup";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenameDetail {
    /// Path relative to the input folder.
    pub original_file: String,
    pub new_filename: String,
    pub renamed: bool,
    pub reason: String,
    pub face_detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenameManifest {
    pub total_images: usize,
    pub processed_images: usize,
    pub renamed_images: usize,
    /// Images that kept their original name.
    pub skipped_images: usize,
    pub errors: Vec<String>,
    pub processing_details: Vec<RenameDetail>,
}

pub struct RenamePipeline<'a> {
    detector: &'a dyn FaceDetector,
    rules: FaceRules,
}

impl<'a> RenamePipeline<'a> {
    pub fn new(detector: &'a dyn FaceDetector, rules: FaceRules) -> Self {
        Self { detector, rules }
    }

    /// Copy and rename every image under `input_dir` into `output_dir`.
    ///
    /// Per-image failures land in [`RenameManifest::errors`]; only I/O on
    /// the folders themselves fails the run.
    pub async fn run(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<RenameManifest, PipelineError> {
        let images = walk_files(input_dir, IMAGE_EXTENSIONS).await?;
        tracing::info!(count = images.len(), "Found images to rename");
        tokio::fs::create_dir_all(output_dir).await?;

        let mut manifest = RenameManifest {
            total_images: images.len(),
            ..RenameManifest::default()
        };
        let mut taken: HashSet<String> = HashSet::new();

        for image in &images {
            match self.process_image(input_dir, output_dir, image, &mut taken).await {
                Ok(detail) => {
                    manifest.processed_images += 1;
                    if detail.renamed {
                        manifest.renamed_images += 1;
                    } else {
                        manifest.skipped_images += 1;
                    }
                    tracing::info!(
                        original = %detail.original_file,
                        new = %detail.new_filename,
                        renamed = detail.renamed,
                        "Processed image",
                    );
                    manifest.processing_details.push(detail);
                }
                Err(e) => {
                    let message = format!("Error processing {}: {e}", image.display());
                    tracing::error!(error = %message, "Rename failed");
                    manifest.errors.push(message);
                }
            }
        }

        let json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| PipelineError::Worker(format!("manifest serialization: {e}")))?;
        tokio::fs::write(output_dir.join(MANIFEST_FILE), json).await?;

        tracing::info!(
            processed = manifest.processed_images,
            renamed = manifest.renamed_images,
            kept = manifest.skipped_images,
            errors = manifest.errors.len(),
            "Renaming finished",
        );
        Ok(manifest)
    }

    async fn process_image(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        image: &Path,
        taken: &mut HashSet<String>,
    ) -> Result<RenameDetail, PipelineError> {
        let filename = file_name(image);
        let face_detected = self.has_face(image, &filename).await?;

        let (new_filename, renamed, reason) = if face_detected {
            let name = deduplicated_name(&filename, |candidate| taken.contains(candidate));
            if name != filename {
                tracing::warn!(
                    file = %relative(input_dir, image),
                    output = %name,
                    "Kept filename already used in output, numbering it"
                );
            }
            (name, false, KEPT_REASON)
        } else {
            let (_, ext) = split_name(&filename);
            let name = next_closeup_name(ext, |candidate| taken.contains(candidate));
            (name, true, RENAMED_REASON)
        };
        taken.insert(new_filename.clone());

        tokio::fs::copy(image, output_dir.join(&new_filename)).await?;

        Ok(RenameDetail {
            original_file: relative(input_dir, image),
            new_filename,
            renamed,
            reason: reason.to_string(),
            face_detected,
        })
    }

    async fn has_face(&self, source: &Path, filename: &str) -> Result<bool, PipelineError> {
        let path = source.to_path_buf();
        let (_, height) = tokio::task::spawn_blocking(move || image::image_dimensions(&path))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?
            .map_err(|e| PipelineError::UnreadableImage {
                name: filename.to_string(),
                reason: e.to_string(),
            })?;

        let bytes = tokio::fs::read(source).await?;
        let faces = self.detector.detect(&bytes, filename).await?;

        Ok(has_valid_face(&faces, height, &self.rules))
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(PathBuf::from)
        .unwrap_or_else(|_| path.to_path_buf())
        .to_string_lossy()
        .replace('\\', "/")
}
