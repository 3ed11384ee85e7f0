//! Background-replace pipeline.
//!
//! Batch-level setup runs once and is all-or-nothing: config check,
//! style resolution, background upload, style uploads. Only then are the
//! input/mask pairs rendered, one at a time, each failure recorded
//! without stopping the batch.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lookbook_comfyui::engine::RenderEngine;
use lookbook_comfyui::job::{run_job, JobError, OutputSpec};
use lookbook_comfyui::uploader::{AssetKind, NameStrategy, UploadedAsset, Uploader};
use lookbook_core::batch::{BatchResult, ItemOutcome};
use lookbook_core::graph::{Assignments, JobGraph};
use lookbook_core::media::COMPOSITE_IMAGE_EXTENSIONS;
use lookbook_core::naming::processed_name;
use lookbook_core::pairing::{pair_assets, AssetPair};
use lookbook_core::prompts::{required_styles, select_batch_prompt, BatchPrompt, PromptData};
use lookbook_core::style::resolve_styles;
use serde::Serialize;

use crate::config::{load_template, CompositeConfig};
use crate::error::PipelineError;
use crate::files::{file_name, list_files, walk_files};

/// Input key of every `LoadImage` node in the template.
const IMAGE_INPUT: &str = "image";

/// Subdirectory of the output folder that receives composited images.
pub const PROCESSED_DIR: &str = "processed_images";

/// Directories and prompt data for one batch.
#[derive(Debug, Clone, Copy)]
pub struct CompositeRequest<'a> {
    pub input_dir: &'a Path,
    pub mask_dir: &'a Path,
    pub output_dir: &'a Path,
    pub prompts: &'a PromptData,
    /// Product whose prompt and style apply to the whole batch.
    pub default_product: Option<&'a str>,
}

/// What a finished batch did.
#[derive(Debug, Clone, Serialize)]
pub struct CompositeReport {
    pub batch: BatchResult,
    pub prompt: BatchPrompt,
    /// Remote name of the style reference every pair used.
    pub style_image: String,
    pub background_image: String,
}

/// Shared assets uploaded once per batch.
struct BatchAssets {
    background: UploadedAsset,
    style_remote: String,
}

pub struct CompositePipeline {
    config: CompositeConfig,
    template: JobGraph,
    uploader: Uploader,
}

impl CompositePipeline {
    pub fn new(config: CompositeConfig, template: JobGraph) -> Self {
        let uploader = Uploader::new(config.upload_policy.clone());
        Self {
            config,
            template,
            uploader,
        }
    }

    /// Verify the configured files and load the template.
    pub fn from_config(config: CompositeConfig) -> Result<Self, PipelineError> {
        config.verify()?;
        let template = load_template(&config.template_path)?;
        Ok(Self::new(config, template))
    }

    pub fn config(&self) -> &CompositeConfig {
        &self.config
    }

    fn naming(&self) -> NameStrategy {
        if self.config.unique_uploads {
            NameStrategy::UniqueSuffix
        } else {
            NameStrategy::Original
        }
    }

    /// Run the whole batch.
    pub async fn run(
        &self,
        engine: &dyn RenderEngine,
        request: CompositeRequest<'_>,
    ) -> Result<CompositeReport, PipelineError> {
        self.config.verify()?;

        let required = required_styles(request.prompts);
        if required.is_empty() {
            return Err(PipelineError::NoStylesReferenced);
        }

        let candidates = walk_files(&self.config.style_dir, COMPOSITE_IMAGE_EXTENSIONS).await?;
        let resolution = resolve_styles(&required, &candidates);
        if !resolution.is_complete() {
            return Err(PipelineError::MissingStyles(resolution.missing));
        }

        let prompt = select_batch_prompt(request.prompts, request.default_product);
        let assets = self.upload_batch_assets(engine, &resolution.matches, &prompt).await?;

        let inputs = names(&list_files(request.input_dir, COMPOSITE_IMAGE_EXTENSIONS).await?);
        let masks = names(&list_files(request.mask_dir, COMPOSITE_IMAGE_EXTENSIONS).await?);
        let pairing = pair_assets(&inputs, &masks);
        if pairing.pairs.is_empty() {
            return Err(PipelineError::NoPairs);
        }

        let processed_dir = request.output_dir.join(PROCESSED_DIR);
        tokio::fs::create_dir_all(&processed_dir).await?;

        let mut batch = BatchResult::new();
        for item in pairing.skipped {
            batch.skip(item);
        }

        let total = pairing.pairs.len();
        for (index, pair) in pairing.pairs.iter().enumerate() {
            tracing::info!(
                input = %pair.input,
                mask = %pair.mask,
                position = index + 1,
                total,
                "Compositing pair",
            );
            let outcome = match self
                .process_pair(engine, &request, pair, &assets, &prompt, &processed_dir)
                .await
            {
                Ok(paths) => ItemOutcome::succeeded(&pair.input, paths),
                Err(e) => ItemOutcome::failed(&pair.input, e.to_string()),
            };
            batch.record(outcome);
        }

        tracing::info!(
            succeeded = batch.succeeded(),
            failed = batch.failed(),
            skipped = batch.skipped.len(),
            "Composite batch finished",
        );

        if batch.is_failure() {
            return Err(PipelineError::AllItemsFailed(batch));
        }

        Ok(CompositeReport {
            batch,
            prompt,
            style_image: assets.style_remote,
            background_image: assets.background.remote_name,
        })
    }

    async fn upload_batch_assets(
        &self,
        engine: &dyn RenderEngine,
        styles: &IndexMap<String, PathBuf>,
        prompt: &BatchPrompt,
    ) -> Result<BatchAssets, PipelineError> {
        let background = self
            .uploader
            .upload(
                engine,
                &self.config.background_image,
                AssetKind::Background,
                self.naming(),
            )
            .await
            .map_err(PipelineError::BackgroundUploadFailed)?;

        let mut uploaded: IndexMap<&str, String> = IndexMap::new();
        let mut failed = Vec::new();
        for (style_name, path) in styles {
            match self
                .uploader
                .upload(engine, path, AssetKind::Style, self.naming())
                .await
            {
                Ok(asset) => {
                    uploaded.insert(style_name.as_str(), asset.remote_name);
                }
                Err(e) => {
                    tracing::error!(style = %style_name, error = %e, "Style upload failed");
                    failed.push(style_name.clone());
                }
            }
        }
        if !failed.is_empty() {
            return Err(PipelineError::StyleUploadsFailed(failed));
        }

        let style_remote = match uploaded.get(prompt.style_name.as_str()) {
            Some(remote) => remote.clone(),
            None => {
                // Only reachable when the batch default names no style.
                let (name, remote) = uploaded
                    .first()
                    .ok_or(PipelineError::NoStylesReferenced)?;
                tracing::warn!(
                    wanted = %prompt.style_name,
                    using = %name,
                    "Default style not uploaded, using first available",
                );
                remote.clone()
            }
        };

        Ok(BatchAssets {
            background,
            style_remote,
        })
    }

    async fn process_pair(
        &self,
        engine: &dyn RenderEngine,
        request: &CompositeRequest<'_>,
        pair: &AssetPair,
        assets: &BatchAssets,
        prompt: &BatchPrompt,
        processed_dir: &Path,
    ) -> Result<Vec<PathBuf>, JobError> {
        let input = self
            .uploader
            .upload(
                engine,
                &request.input_dir.join(&pair.input),
                AssetKind::Input,
                self.naming(),
            )
            .await?;
        let mask = self
            .uploader
            .upload(
                engine,
                &request.mask_dir.join(&pair.mask),
                AssetKind::Mask,
                self.naming(),
            )
            .await?;

        let nodes = &self.config.nodes;
        let assignments = Assignments::new()
            .set(nodes.input.clone(), IMAGE_INPUT, input.remote_name)
            .set(nodes.mask.clone(), IMAGE_INPUT, mask.remote_name)
            .set(
                nodes.background.clone(),
                IMAGE_INPUT,
                assets.background.remote_name.clone(),
            )
            .set(nodes.style.clone(), IMAGE_INPUT, assets.style_remote.clone())
            .set(nodes.prompt.clone(), nodes.prompt_input.clone(), prompt.text.clone());
        let graph = self.template.mutate(&assignments);

        let destination = processed_dir.join(processed_name(&pair.input));
        run_job(
            engine,
            &graph,
            &self.config.poll,
            &OutputSpec {
                node: &nodes.output,
                destination: &destination,
                max_variants: self.config.max_variants,
            },
        )
        .await
    }
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| file_name(p)).collect()
}
