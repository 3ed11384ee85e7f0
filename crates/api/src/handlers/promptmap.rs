//! Handlers for outfit prompt generation.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::Json;
use lookbook_core::job_store::JobKind;
use lookbook_core::media::is_zip_file;
use lookbook_core::types::JobId;
use lookbook_pipeline::promptmap::{FolderResult, PromptMapPipeline};
use serde::Serialize;
use serde_json::json;

use crate::archive::extract_tree_blocking;
use crate::error::{AppError, AppResult};
use crate::multipart::MultipartForm;
use crate::router::REQUEST_ID_HEADER;
use crate::state::AppState;
use crate::tracking::{run_worker, tracked, Tracked};
use crate::workspace::RequestWorkspace;

#[derive(Debug, Serialize)]
pub struct PromptMapResponse {
    pub success: bool,
    pub message: String,
    pub data: PromptMapData,
}

#[derive(Debug, Serialize)]
pub struct PromptMapData {
    pub total_folders: usize,
    pub results: Vec<FolderResult>,
    /// Seconds with millisecond precision, e.g. `"12.345s"`.
    pub processing_time: String,
    pub request_id: String,
}

/// POST /api/v1/promptmap/process-images
///
/// Multipart `file`, a `.zip` of outfit folders or loose images.
pub async fn process_images(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let jobs = state.jobs.clone();
    tracked(&jobs, JobKind::Promptmap, |id| {
        run_promptmap(state, headers, id, multipart)
    })
    .await
}

async fn run_promptmap(
    state: AppState,
    headers: HeaderMap,
    job_id: JobId,
    multipart: Multipart,
) -> AppResult<Tracked> {
    let started = Instant::now();
    let request_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| job_id.to_string());

    let mut form = MultipartForm::read(multipart).await?;
    let file = form.require_file("file")?;
    if !is_zip_file(&file.filename) {
        return Err(AppError::BadRequest("File must be a ZIP archive".into()));
    }

    let workspace = RequestWorkspace::create().await?;
    let extracted = extract_tree_blocking(file.bytes, workspace.input().to_path_buf()).await?;
    tracing::info!(%request_id, files = extracted, "Extracted outfit archive");

    let vision = state.vision.clone();
    let config = (*state.promptmap).clone();
    let root = workspace.input().to_path_buf();
    let results = run_worker(async move {
        PromptMapPipeline::new(vision.as_ref(), config)
            .run(&root)
            .await
            .map_err(AppError::from)
    })
    .await?;

    let total_folders = results.len();
    let response = PromptMapResponse {
        success: true,
        message: format!("Processed {total_folders} folders"),
        data: PromptMapData {
            total_folders,
            results,
            processing_time: format!("{:.3}s", started.elapsed().as_secs_f64()),
            request_id,
        },
    };
    Ok(Tracked::with_summary(
        Json(response),
        json!({ "total_folders": total_folders }),
    ))
}
