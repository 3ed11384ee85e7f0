//! Handlers for the `/jobs` resource.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use lookbook_core::error::CoreError;
use lookbook_core::job_store::{JobRecord, JobStatus};
use lookbook_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::{Attachment, DataResponse};
use crate::state::AppState;

async fn find_job(state: &AppState, id: JobId) -> AppResult<JobRecord> {
    state.jobs.get(id).await.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Job",
        id: id.to_string(),
    }))
}

/// GET /api/v1/jobs
///
/// Every job recorded since startup, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let jobs = state.jobs.list().await;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/jobs/{id}/download
///
/// The archive of a finished asynchronous job. 409 while the job is
/// still running or after it failed.
pub async fn download_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = find_job(&state, id).await?;

    match job.status {
        JobStatus::Running => {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Job {id} is still running"
            ))))
        }
        JobStatus::Failed => {
            return Err(AppError::Core(CoreError::Conflict(format!(
                "Job {id} failed: {}",
                job.error.unwrap_or_default()
            ))))
        }
        JobStatus::Completed => {}
    }

    let artifact = job.artifact.ok_or(AppError::Core(CoreError::NotFound {
        entity: "Job artifact",
        id: id.to_string(),
    }))?;
    Ok(Attachment {
        filename: artifact.filename,
        content_type: artifact.content_type,
        bytes: artifact.bytes,
    })
}
