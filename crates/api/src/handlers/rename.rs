//! Handlers for face-presence renaming.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::Json;
use lookbook_core::face::FaceRules;
use lookbook_core::job_store::JobKind;
use lookbook_core::media::{is_image_file, is_hidden_or_system};
use lookbook_pipeline::face::FaceDetector;
use lookbook_pipeline::rename::RenamePipeline;
use serde_json::json;

use crate::archive::{extract_tree_blocking, zip_dir_blocking};
use crate::error::{AppError, AppResult};
use crate::multipart::MultipartForm;
use crate::response::{Attachment, DataResponse};
use crate::state::AppState;
use crate::tracking::{run_worker, tracked, Tracked};
use crate::workspace::RequestWorkspace;

pub const ARCHIVE_NAME: &str = "renamed_images.zip";

/// Threshold overrides from the form, defaulting field by field.
fn face_rules(form: &MultipartForm) -> AppResult<FaceRules> {
    let defaults = FaceRules::default();
    Ok(FaceRules {
        min_confidence: form.parse("min_confidence", defaults.min_confidence)?,
        max_face_bottom_ratio: form.parse("max_face_bottom_ratio", defaults.max_face_bottom_ratio)?,
        min_face_height_px: form.parse("min_face_height_px", defaults.min_face_height_px)?,
    })
}

/// POST /api/v1/rename/process
///
/// Multipart `zip_file` or one or more `files` (exactly one of the two),
/// optional `return_zip` (default true) and the face thresholds
/// `min_confidence`, `max_face_bottom_ratio`, `min_face_height_px`.
pub async fn process_rename(State(state): State<AppState>, multipart: Multipart) -> Response {
    let jobs = state.jobs.clone();
    tracked(&jobs, JobKind::Rename, |_| run_rename(state, multipart)).await
}

async fn run_rename(state: AppState, multipart: Multipart) -> AppResult<Tracked> {
    let detector: Arc<dyn FaceDetector> = state.face_detector.clone().ok_or_else(|| {
        AppError::ServiceUnavailable(
            "Face detection is not configured (set FACE_DETECTOR_URL)".into(),
        )
    })?;

    let mut form = MultipartForm::read(multipart).await?;
    let return_zip = form.flag("return_zip", true)?;
    let rules = face_rules(&form)?;
    let archive = form.take_file("zip_file");
    let files = form.take_files("files");

    let workspace = RequestWorkspace::create().await?;
    match (archive, files.is_empty()) {
        (Some(_), false) => {
            return Err(AppError::BadRequest(
                "Send either 'zip_file' or 'files', not both".into(),
            ))
        }
        (None, true) => {
            return Err(AppError::BadRequest(
                "Provide a 'zip_file' or at least one entry in 'files'".into(),
            ))
        }
        (Some(archive), true) => {
            extract_tree_blocking(archive.bytes, workspace.input().to_path_buf()).await?;
        }
        (None, false) => {
            for file in files {
                if is_hidden_or_system(&file.filename) || !is_image_file(&file.filename) {
                    tracing::debug!(file = %file.filename, "Ignoring non-image upload");
                    continue;
                }
                tokio::fs::write(workspace.input().join(&file.filename), &file.bytes).await?;
            }
        }
    }

    let input = workspace.input().to_path_buf();
    let output = workspace.output().to_path_buf();
    let manifest = run_worker(async move {
        RenamePipeline::new(detector.as_ref(), rules)
            .run(&input, &output)
            .await
            .map_err(AppError::from)
    })
    .await?;

    let summary = json!({
        "total_images": manifest.total_images,
        "renamed_images": manifest.renamed_images,
        "errors": manifest.errors.len(),
    });
    if return_zip {
        let bytes = zip_dir_blocking(workspace.output().to_path_buf(), None).await?;
        Ok(Tracked::with_summary(Attachment::zip(ARCHIVE_NAME, bytes), summary))
    } else {
        Ok(Tracked::with_summary(Json(DataResponse { data: manifest }), summary))
    }
}
