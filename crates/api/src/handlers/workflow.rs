//! Handlers for the background-replace workflow.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use lookbook_comfyui::api::ComfyUIApi;
use lookbook_core::job_store::{JobArtifact, JobKind};
use lookbook_core::media::COMPOSITE_IMAGE_EXTENSIONS;
use lookbook_core::prompts::{parse_prompt_data, PromptData};
use lookbook_core::types::JobId;
use lookbook_pipeline::composite::{CompositePipeline, CompositeReport, CompositeRequest};
use serde_json::{json, Value};

use crate::archive::{extract_images_blocking, zip_dir_blocking};
use crate::error::{AppError, AppResult};
use crate::multipart::MultipartForm;
use crate::response::{Attachment, DataResponse, ZIP_CONTENT_TYPE};
use crate::state::AppState;
use crate::tracking::{run_worker, spawn_detached, tracked, Tracked};
use crate::workspace::RequestWorkspace;

/// Download name of the composited archive.
pub const ARCHIVE_NAME: &str = "processed_images.zip";

/// Everything a batch needs once the form has been accepted.
struct PreparedBatch {
    pipeline: CompositePipeline,
    engine: ComfyUIApi,
    workspace: RequestWorkspace,
    prompts: PromptData,
    default_product: Option<String>,
}

impl PreparedBatch {
    /// Run the batch on a worker task.
    async fn run(self) -> AppResult<(CompositeReport, RequestWorkspace)> {
        let Self {
            pipeline,
            engine,
            workspace,
            prompts,
            default_product,
        } = self;

        run_worker(async move {
            let result = pipeline
                .run(
                    &engine,
                    CompositeRequest {
                        input_dir: workspace.input(),
                        mask_dir: workspace.masks(),
                        output_dir: workspace.output(),
                        prompts: &prompts,
                        default_product: default_product.as_deref(),
                    },
                )
                .await;
            result
                .map(|report| (report, workspace))
                .map_err(AppError::from)
        })
        .await
    }
}

fn summary(report: &CompositeReport) -> Value {
    json!({
        "succeeded": report.batch.succeeded(),
        "failed": report.batch.failed(),
        "skipped": report.batch.skipped.len(),
        "style_image": report.style_image,
        "prompt_source": report.prompt.source,
    })
}

async fn archive(workspace: &RequestWorkspace) -> AppResult<Vec<u8>> {
    Ok(zip_dir_blocking(workspace.output().to_path_buf(), None).await?)
}

async fn prepare(state: &AppState, form: &mut MultipartForm) -> AppResult<PreparedBatch> {
    let url = form
        .text("comfyui_url")
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("Missing field 'comfyui_url'".into()))?;
    let default_product = form.text("default_product").map(str::to_string);

    let prompt_bytes = match form.take_file("prompts_json") {
        Some(file) => file.bytes,
        None => form
            .text("prompts_json")
            .map(|t| t.as_bytes().to_vec())
            .ok_or_else(|| AppError::BadRequest("Missing field 'prompts_json'".into()))?,
    };
    let prompts = parse_prompt_data(&prompt_bytes)?;

    let images = form.require_file("images_zip")?;
    let masks = form.require_file("masks_zip")?;

    // Missing template, background or style folder fail before anything else.
    let pipeline = CompositePipeline::from_config((*state.composite).clone())?;

    let workspace = RequestWorkspace::create().await?;
    let input: PathBuf = workspace.input().to_path_buf();
    let mask_dir: PathBuf = workspace.masks().to_path_buf();
    let inputs = extract_images_blocking(images.bytes, input, COMPOSITE_IMAGE_EXTENSIONS).await?;
    let mask_files =
        extract_images_blocking(masks.bytes, mask_dir, COMPOSITE_IMAGE_EXTENSIONS).await?;
    tracing::info!(
        inputs = inputs.len(),
        masks = mask_files.len(),
        products = prompts.len(),
        "Accepted background-replace batch",
    );

    Ok(PreparedBatch {
        pipeline,
        engine: state.engine(&url),
        workspace,
        prompts,
        default_product,
    })
}

/// Background variant: the archive is kept as the job's artifact.
async fn run_detached(batch: PreparedBatch) -> AppResult<(Value, JobArtifact)> {
    let (report, workspace) = batch.run().await?;
    let bytes = archive(&workspace).await?;
    Ok((
        summary(&report),
        JobArtifact {
            filename: ARCHIVE_NAME.to_string(),
            content_type: ZIP_CONTENT_TYPE.to_string(),
            bytes,
        },
    ))
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// POST /api/v1/workflow/process-images
///
/// Multipart `images_zip`, `masks_zip`, `prompts_json` (file or text),
/// `comfyui_url`, and optional `return_zip` (default true),
/// `default_product`, `run_async` (default false).
///
/// With `run_async=true` the response is `202 { job_id }` and the
/// archive is fetched later from `/api/v1/jobs/{id}/download`.
pub async fn process_images(State(state): State<AppState>, multipart: Multipart) -> Response {
    let jobs = state.jobs.clone();
    tracked(&jobs, JobKind::Composite, |id| run_workflow(state, id, multipart)).await
}

async fn run_workflow(state: AppState, job_id: JobId, multipart: Multipart) -> AppResult<Tracked> {
    let mut form = MultipartForm::read(multipart).await?;
    let return_zip = form.flag("return_zip", true)?;
    let run_async = form.flag("run_async", false)?;
    let batch = prepare(&state, &mut form).await?;

    if run_async {
        tracing::info!(%job_id, "Running background-replace batch in the background");
        spawn_detached(Arc::clone(&state.jobs), job_id, run_detached(batch));
        return Ok(Tracked::deferred((
            StatusCode::ACCEPTED,
            Json(DataResponse {
                data: json!({ "job_id": job_id }),
            }),
        )));
    }

    let (report, workspace) = batch.run().await?;
    let stats = summary(&report);
    if return_zip {
        let bytes = archive(&workspace).await?;
        Ok(Tracked::with_summary(Attachment::zip(ARCHIVE_NAME, bytes), stats))
    } else {
        Ok(Tracked::with_summary(Json(DataResponse { data: report }), stats))
    }
}
