//! Job-store bookkeeping around pipeline requests.
//!
//! Synchronous requests run inside [`tracked`], which records the job,
//! finishes it with the handler's outcome and tags the response with
//! `x-job-id`. Asynchronous batches return early with
//! [`Tracked::deferred`] and finish the job from a spawned task through
//! [`spawn_detached`].

use std::future::Future;
use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};
use lookbook_core::job_store::{JobArtifact, JobKind, JobStore};
use lookbook_core::types::JobId;
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const JOB_ID_HEADER: HeaderName = HeaderName::from_static("x-job-id");

enum Finish {
    Now(Option<Value>),
    Later,
}

/// What a tracked handler produced.
pub struct Tracked {
    response: Response,
    finish: Finish,
}

impl Tracked {
    /// Finish the job now, without a summary.
    pub fn done(response: impl IntoResponse) -> Self {
        Self {
            response: response.into_response(),
            finish: Finish::Now(None),
        }
    }

    /// Finish the job now with `summary`.
    pub fn with_summary(response: impl IntoResponse, summary: Value) -> Self {
        Self {
            response: response.into_response(),
            finish: Finish::Now(Some(summary)),
        }
    }

    /// Leave the job running; a background task will finish it.
    pub fn deferred(response: impl IntoResponse) -> Self {
        Self {
            response: response.into_response(),
            finish: Finish::Later,
        }
    }
}

/// Run `work` as job `kind`, recording its outcome.
pub async fn tracked<F, Fut>(jobs: &Arc<dyn JobStore>, kind: JobKind, work: F) -> Response
where
    F: FnOnce(JobId) -> Fut,
    Fut: Future<Output = AppResult<Tracked>>,
{
    let job = jobs.create(kind).await;

    let mut response = match work(job.id).await {
        Ok(Tracked {
            response,
            finish: Finish::Now(summary),
        }) => {
            if let Err(e) = jobs.complete(job.id, summary, None).await {
                tracing::warn!(job_id = %job.id, error = %e, "Failed to complete job");
            }
            response
        }
        Ok(Tracked {
            response,
            finish: Finish::Later,
        }) => response,
        Err(err) => {
            record_failure(jobs.as_ref(), job.id, &err).await;
            err.into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&job.id.to_string()) {
        response.headers_mut().insert(JOB_ID_HEADER, value);
    }
    response
}

async fn record_failure(jobs: &dyn JobStore, id: JobId, err: &AppError) {
    if let Err(e) = jobs.fail(id, err.to_string()).await {
        tracing::warn!(job_id = %id, error = %e, "Failed to record job failure");
    }
}

/// Finish job `id` from a background task once `work` resolves.
pub fn spawn_detached<Fut>(jobs: Arc<dyn JobStore>, id: JobId, work: Fut)
where
    Fut: Future<Output = AppResult<(Value, JobArtifact)>> + Send + 'static,
{
    tokio::spawn(async move {
        match work.await {
            Ok((summary, artifact)) => {
                if let Err(e) = jobs.complete(id, Some(summary), Some(artifact)).await {
                    tracing::warn!(job_id = %id, error = %e, "Failed to complete job");
                }
            }
            Err(err) => {
                tracing::error!(job_id = %id, error = %err, "Background job failed");
                record_failure(jobs.as_ref(), id, &err).await;
            }
        }
    });
}

/// Run `work` on its own task and wait for it.
pub async fn run_worker<T, Fut>(work: Fut) -> AppResult<T>
where
    T: Send + 'static,
    Fut: Future<Output = AppResult<T>> + Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| AppError::InternalError(format!("Pipeline worker failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use lookbook_core::job_store::{InMemoryJobStore, JobStatus};

    fn store() -> Arc<dyn JobStore> {
        Arc::new(InMemoryJobStore::new())
    }

    fn job_id(response: &Response) -> JobId {
        response.headers()[JOB_ID_HEADER].to_str().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn success_completes_the_job() {
        let jobs = store();
        let response = tracked(&jobs, JobKind::Mask, |_| async {
            Ok(Tracked::with_summary("ok", serde_json::json!({ "succeeded": 1 })))
        })
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let record = jobs.get(job_id(&response)).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.summary.unwrap()["succeeded"], 1);
    }

    #[tokio::test]
    async fn error_fails_the_job_and_keeps_the_header() {
        let jobs = store();
        let response = tracked(&jobs, JobKind::Rename, |_| async {
            Err::<Tracked, _>(AppError::BadRequest("no files".into()))
        })
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let record = jobs.get(job_id(&response)).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Bad request: no files"));
    }

    #[tokio::test]
    async fn deferred_jobs_stay_running_until_detached_work_ends() {
        let jobs = store();
        let response = tracked(&jobs, JobKind::Composite, |id| {
            let jobs = Arc::clone(&jobs);
            async move {
                spawn_detached(jobs, id, async {
                    Ok((
                        serde_json::json!({}),
                        JobArtifact {
                            filename: "processed_images.zip".into(),
                            content_type: "application/zip".into(),
                            bytes: vec![1],
                        },
                    ))
                });
                Ok(Tracked::deferred(StatusCode::ACCEPTED))
            }
        })
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let id = job_id(&response);
        for _ in 0..100 {
            if jobs.get(id).await.unwrap().status == JobStatus::Completed {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(jobs.get(id).await.unwrap().has_artifact());
    }
}
