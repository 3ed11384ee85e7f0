//! Handlers for the masking endpoint.

use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lookbook_core::job_store::JobKind;
use lookbook_core::media::{is_image_file, is_zip_file, IMAGE_EXTENSIONS};
use lookbook_core::naming::processed_archive_name;
use lookbook_pipeline::mask::MaskPipeline;
use serde::Deserialize;
use serde_json::json;

use crate::archive::{extract_images_blocking, zip_dir_blocking};
use crate::error::{AppError, AppResult};
use crate::multipart::{MultipartForm, UploadedFile};
use crate::response::{Attachment, DataResponse};
use crate::state::AppState;
use crate::tracking::{run_worker, tracked, Tracked};
use crate::workspace::RequestWorkspace;

/// Header alternative to the `comfy_url` form field.
pub const ENGINE_URL_HEADER: &str = "x-comfy-url";

#[derive(Debug, Default, Deserialize)]
pub struct EngineQuery {
    pub comfy_url: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// First non-empty of form field, header, query parameter.
pub fn resolve_engine_url(
    form_value: Option<&str>,
    headers: &HeaderMap,
    query: &EngineQuery,
) -> Option<String> {
    non_empty(form_value)
        .or_else(|| non_empty(headers.get(ENGINE_URL_HEADER).and_then(|v| v.to_str().ok())))
        .or_else(|| non_empty(query.comfy_url.as_deref()))
}

// ---------------------------------------------------------------------------
// Process
// ---------------------------------------------------------------------------

/// POST /api/v1/mask
///
/// Multipart `file` (an image or a `.zip` of images), optional
/// `comfy_url` and `return_zip`. A single image comes back as the masked
/// image; an archive comes back as `{stem}_processed.zip`, or as the
/// batch outcome JSON when `return_zip=false`.
pub async fn process_mask(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EngineQuery>,
    multipart: Multipart,
) -> Response {
    let jobs = state.jobs.clone();
    tracked(&jobs, JobKind::Mask, |_| run_mask(state, headers, query, multipart)).await
}

async fn run_mask(
    state: AppState,
    headers: HeaderMap,
    query: EngineQuery,
    multipart: Multipart,
) -> AppResult<Tracked> {
    let mut form = MultipartForm::read(multipart).await?;
    let url = resolve_engine_url(form.text("comfy_url"), &headers, &query).ok_or_else(|| {
        AppError::BadRequest(
            "Render engine URL required (form field, x-comfy-url header or query)".into(),
        )
    })?;
    let file = form.require_file("file")?;
    let return_zip = form.flag("return_zip", true)?;

    let pipeline = MaskPipeline::from_config((*state.mask).clone())?;
    let workspace = RequestWorkspace::create().await?;

    if is_zip_file(&file.filename) {
        process_archive(&state, pipeline, &url, file, return_zip, &workspace).await
    } else {
        process_single(&state, pipeline, &url, file, &workspace).await
    }
}

async fn process_archive(
    state: &AppState,
    pipeline: MaskPipeline,
    url: &str,
    file: UploadedFile,
    return_zip: bool,
    workspace: &RequestWorkspace,
) -> AppResult<Tracked> {
    let images =
        extract_images_blocking(file.bytes, workspace.input().to_path_buf(), IMAGE_EXTENSIONS)
            .await?;
    tracing::info!(archive = %file.filename, images = images.len(), "Masking archive");

    let engine = state.engine(url);
    let output = workspace.output().to_path_buf();
    let batch = run_worker(async move {
        pipeline
            .process_batch(&engine, &images, &output)
            .await
            .map_err(AppError::from)
    })
    .await?;

    let summary = json!({ "succeeded": batch.succeeded(), "failed": batch.failed() });
    if return_zip {
        let bytes = zip_dir_blocking(workspace.output().to_path_buf(), None).await?;
        let name = processed_archive_name(&file.filename);
        Ok(Tracked::with_summary(Attachment::zip(name, bytes), summary))
    } else {
        Ok(Tracked::with_summary(Json(DataResponse { data: batch }), summary))
    }
}

async fn process_single(
    state: &AppState,
    pipeline: MaskPipeline,
    url: &str,
    file: UploadedFile,
    workspace: &RequestWorkspace,
) -> AppResult<Tracked> {
    if !is_image_file(&file.filename) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file type: {}",
            file.filename
        )));
    }

    let input = workspace.input().join(&file.filename);
    tokio::fs::write(&input, &file.bytes).await?;

    let engine = state.engine(url);
    let output = workspace.output().to_path_buf();
    let path = run_worker(async move {
        pipeline
            .process_image(&engine, &input, &output)
            .await
            .map_err(AppError::from)
    })
    .await?;

    let bytes = tokio::fs::read(&path).await?;
    Ok(Tracked::done(Attachment::binary(file.filename, bytes)))
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

/// GET /api/v1/mask/health
///
/// Reports the engine URL a request would use and the template settings.
pub async fn mask_health(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EngineQuery>,
) -> impl IntoResponse {
    let config = &state.mask;
    Json(DataResponse {
        data: json!({
            "status": "ok",
            "comfy_url": resolve_engine_url(None, &headers, &query),
            "template_path": config.template_path.display().to_string(),
            "template_exists": config.template_path.exists(),
            "input_node": config.input_node.as_str(),
            "output_node": config.output_node.as_str(),
        }),
    })
}
