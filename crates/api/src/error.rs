use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lookbook_comfyui::job::JobError;
use lookbook_comfyui::uploader::UploadError;
use lookbook_core::batch::{BatchResult, ItemStatus};
use lookbook_core::error::CoreError;
use lookbook_pipeline::PipelineError;
use serde_json::{json, Value};

use crate::archive::ArchiveError;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent
/// `{ "error": <message>, "code": <CODE> }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `lookbook_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A pipeline run that could not produce any result.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A single render job failed.
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An optional backing service is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(err.to_string())
    }
}

type Classified = (StatusCode, &'static str, String);

fn internal(msg: &str) -> Classified {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(core: &CoreError) -> Classified {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg.clone()),
        CoreError::Internal(msg) => internal(msg),
    }
}

fn classify_job(err: &JobError) -> Classified {
    match err {
        JobError::Timeout(e) => (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", e.to_string()),
        JobError::Upload(UploadError::NotFound { .. } | UploadError::Io { .. }) => {
            internal(&err.to_string())
        }
        JobError::Upload(_) | JobError::Submit(_) | JobError::Download(_) => {
            (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", err.to_string())
        }
    }
}

fn classify_pipeline(err: &PipelineError) -> Classified {
    let message = err.to_string();
    match err {
        PipelineError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", message),
        PipelineError::Core(core) => classify_core(core),
        PipelineError::NoStylesReferenced
        | PipelineError::NoPairs
        | PipelineError::NoImages
        | PipelineError::UnreadableImage { .. } => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
        PipelineError::MissingStyles(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
        PipelineError::BackgroundUploadFailed(_)
        | PipelineError::StyleUploadsFailed(_)
        | PipelineError::Face(_)
        | PipelineError::Vision(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message),
        PipelineError::Job(job) => classify_job(job),
        PipelineError::AllItemsFailed(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "BATCH_FAILED", message)
        }
        PipelineError::Io(_) | PipelineError::Worker(_) => internal(&message),
    }
}

fn classify_archive(err: &ArchiveError) -> Classified {
    match err {
        ArchiveError::Invalid(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", err.to_string()),
        ArchiveError::Io(_) | ArchiveError::Worker(_) => internal(&err.to_string()),
    }
}

/// Per-item failures of a batch, for the error body.
fn failed_items(batch: &BatchResult) -> Value {
    let items: Vec<Value> = batch
        .items
        .iter()
        .filter_map(|item| match &item.status {
            ItemStatus::Failed { error } => Some(json!({ "item_id": item.item_id, "error": error })),
            ItemStatus::Succeeded { .. } => None,
        })
        .collect();
    json!({ "failed_items": items, "skipped": batch.skipped })
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),
            AppError::Pipeline(err) => classify_pipeline(err),
            AppError::Job(err) => classify_job(err),
            AppError::Archive(err) => classify_archive(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::InternalError(msg) => internal(msg),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let AppError::Pipeline(PipelineError::AllItemsFailed(batch)) = &self {
            body["details"] = failed_items(batch);
        }

        (status, axum::Json(body)).into_response()
    }
}
