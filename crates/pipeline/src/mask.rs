//! Masking pipeline: one render job per input image.
//!
//! Each image goes through upload, graph mutation, submission, polling
//! and download before the next one starts. In batch mode a failed image
//! is recorded and the batch moves on; a single-image run propagates the
//! failure.

use std::path::{Path, PathBuf};

use lookbook_comfyui::engine::RenderEngine;
use lookbook_comfyui::job::{run_job, JobError, OutputSpec};
use lookbook_comfyui::uploader::{AssetKind, NameStrategy, Uploader};
use lookbook_core::batch::{BatchResult, ItemOutcome};
use lookbook_core::graph::{Assignments, JobGraph};

use crate::config::{load_template, MaskConfig};
use crate::error::PipelineError;
use crate::files::file_name;

/// Input key of the `LoadImage` node.
const IMAGE_INPUT: &str = "image";

pub struct MaskPipeline {
    config: MaskConfig,
    template: JobGraph,
    uploader: Uploader,
}

impl MaskPipeline {
    pub fn new(config: MaskConfig, template: JobGraph) -> Self {
        let uploader = Uploader::new(config.upload_policy.clone());
        Self {
            config,
            template,
            uploader,
        }
    }

    /// Load the template named by `config`.
    pub fn from_config(config: MaskConfig) -> Result<Self, PipelineError> {
        let template = load_template(&config.template_path)?;
        Ok(Self::new(config, template))
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Mask a single image, writing the result to `output_dir/{basename}`.
    pub async fn process_image(
        &self,
        engine: &dyn RenderEngine,
        input: &Path,
        output_dir: &Path,
    ) -> Result<PathBuf, JobError> {
        let asset = self
            .uploader
            .upload(engine, input, AssetKind::Input, NameStrategy::TimestampPrefix)
            .await?;

        let graph = self.template.mutate(&Assignments::new().set(
            self.config.input_node.clone(),
            IMAGE_INPUT,
            asset.remote_name,
        ));

        let destination = output_dir.join(file_name(input));
        let paths = run_job(
            engine,
            &graph,
            &self.config.poll,
            &OutputSpec {
                node: &self.config.output_node,
                destination: &destination,
                max_variants: 1,
            },
        )
        .await?;

        // The first variant is always written to `destination` itself.
        Ok(paths.into_iter().next().unwrap_or(destination))
    }

    /// Mask every image in `inputs`, in order.
    pub async fn process_batch(
        &self,
        engine: &dyn RenderEngine,
        inputs: &[PathBuf],
        output_dir: &Path,
    ) -> Result<BatchResult, PipelineError> {
        if inputs.is_empty() {
            return Err(PipelineError::NoImages);
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let mut batch = BatchResult::new();
        for (index, input) in inputs.iter().enumerate() {
            let item_id = file_name(input);
            tracing::info!(
                item = %item_id,
                position = index + 1,
                total = inputs.len(),
                "Masking image",
            );

            let outcome = match self.process_image(engine, input, output_dir).await {
                Ok(path) => ItemOutcome::succeeded(item_id, vec![path]),
                Err(e) => ItemOutcome::failed(item_id, e.to_string()),
            };
            batch.record(outcome);
        }

        tracing::info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            "Masking batch finished",
        );

        if batch.is_failure() {
            return Err(PipelineError::AllItemsFailed(batch));
        }
        Ok(batch)
    }
}
