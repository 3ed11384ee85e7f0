//! One render job end to end: submit a mutated graph, wait for it, and
//! download its outputs.

use std::path::{Path, PathBuf};

use lookbook_core::graph::{JobGraph, NodeId};

use crate::downloader::{download_outputs, DownloadError};
use crate::engine::RenderEngine;
use crate::poller::{await_completion, submit, PollConfig, SubmitError, TimeoutError};
use crate::uploader::UploadError;

/// Any failure of a single render job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

/// Where a job's results go and how many to keep.
#[derive(Debug, Clone)]
pub struct OutputSpec<'a> {
    pub node: &'a NodeId,
    pub destination: &'a Path,
    pub max_variants: usize,
}

/// Submit `graph`, poll until it completes and download its outputs.
///
/// The graph must already carry this job's asset names; nothing here
/// touches the template it was copied from.
pub async fn run_job(
    engine: &dyn RenderEngine,
    graph: &JobGraph,
    poll: &PollConfig,
    output: &OutputSpec<'_>,
) -> Result<Vec<PathBuf>, JobError> {
    let handle = submit(engine, graph).await?;
    let history = await_completion(engine, &handle.prompt_id, output.node, poll).await?;
    let paths = download_outputs(
        engine,
        &history,
        &handle.prompt_id,
        output.node,
        output.destination,
        output.max_variants,
    )
    .await?;
    Ok(paths)
}
