//! Process-local job tracking.
//!
//! Every pipeline request records a [`JobRecord`]; asynchronous batch
//! requests return the job id immediately and are polled through it.
//! Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Which pipeline a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Mask,
    Composite,
    Rename,
    Promptmap,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mask => "mask",
            Self::Composite => "composite",
            Self::Rename => "rename",
            Self::Promptmap => "promptmap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

/// A downloadable result kept alongside a completed job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobArtifact {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    /// Pipeline-specific summary (batch manifest, counts).
    pub summary: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(skip)]
    pub artifact: Option<JobArtifact>,
}

impl JobRecord {
    fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new_v4(),
            kind,
            status: JobStatus::Running,
            created_at: chrono::Utc::now(),
            completed_at: None,
            summary: None,
            error: None,
            artifact: None,
        }
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }
}

/// Keyed storage for job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Register a new running job.
    async fn create(&self, kind: JobKind) -> JobRecord;

    async fn get(&self, id: JobId) -> Option<JobRecord>;

    /// Mark a running job completed. Finishing a job twice is a conflict.
    async fn complete(
        &self,
        id: JobId,
        summary: Option<serde_json::Value>,
        artifact: Option<JobArtifact>,
    ) -> Result<JobRecord, CoreError>;

    async fn fail(&self, id: JobId, error: String) -> Result<JobRecord, CoreError>;

    /// All records, newest first.
    async fn list(&self) -> Vec<JobRecord>;
}

/// [`JobStore`] backed by a map behind a tokio `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn finish(
        &self,
        id: JobId,
        apply: impl FnOnce(&mut JobRecord) + Send,
    ) -> Result<JobRecord, CoreError> {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or_else(|| CoreError::NotFound {
            entity: "Job",
            id: id.to_string(),
        })?;

        if record.status != JobStatus::Running {
            return Err(CoreError::Conflict(format!("Job {id} has already finished")));
        }

        apply(record);
        record.completed_at = Some(chrono::Utc::now());
        Ok(record.clone())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, kind: JobKind) -> JobRecord {
        let record = JobRecord::new(kind);
        self.jobs.write().await.insert(record.id, record.clone());
        tracing::debug!(job_id = %record.id, kind = kind.as_str(), "Job created");
        record
    }

    async fn get(&self, id: JobId) -> Option<JobRecord> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn complete(
        &self,
        id: JobId,
        summary: Option<serde_json::Value>,
        artifact: Option<JobArtifact>,
    ) -> Result<JobRecord, CoreError> {
        let record = self
            .finish(id, move |r| {
                r.status = JobStatus::Completed;
                r.summary = summary;
                r.artifact = artifact;
            })
            .await?;
        tracing::info!(job_id = %id, kind = record.kind.as_str(), "Job completed");
        Ok(record)
    }

    async fn fail(&self, id: JobId, error: String) -> Result<JobRecord, CoreError> {
        let record = self
            .finish(id, move |r| {
                r.status = JobStatus::Failed;
                r.error = Some(error);
            })
            .await?;
        tracing::warn!(job_id = %id, kind = record.kind.as_str(), "Job failed");
        Ok(record)
    }

    async fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }
}
