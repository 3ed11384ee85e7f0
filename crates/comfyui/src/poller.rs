//! Job Submitter/Poller.
//!
//! Submission is a single call with no retry. Polling queries the history
//! endpoint at a fixed interval until the prompt is present with output
//! images, or the deadline passes. Failed polls (non-200, transport
//! errors, malformed bodies) count as "not ready yet".

use std::time::Duration;

use lookbook_core::graph::{JobGraph, NodeId};
use lookbook_core::types::Timestamp;
use tokio::time::Instant;

use crate::api::ComfyUIApiError;
use crate::engine::RenderEngine;
use crate::history::PromptHistory;

/// Polling cadence and deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollConfig {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
        }
    }
}

/// A submitted job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub prompt_id: String,
    pub submitted_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Engine rejected the job: {0}")]
    Rejected(#[from] ComfyUIApiError),

    #[error("Engine did not return a prompt_id")]
    MissingPromptId,
}

#[derive(Debug, thiserror::Error)]
#[error("Timed out waiting for prompt {prompt_id} after {secs:.1}s ({polls} polls)", secs = .elapsed.as_secs_f64())]
pub struct TimeoutError {
    pub prompt_id: String,
    pub elapsed: Duration,
    pub polls: u32,
}

/// Submit a job graph. Fails immediately on a non-success status or a
/// response without a prompt id.
pub async fn submit(engine: &dyn RenderEngine, graph: &JobGraph) -> Result<JobHandle, SubmitError> {
    tracing::info!(engine = engine.base_url(), nodes = graph.len(), "Queueing prompt");

    let response = engine.submit(&graph.to_value()).await?;
    let prompt_id = response
        .prompt_id
        .filter(|id| !id.is_empty())
        .ok_or(SubmitError::MissingPromptId)?;

    tracing::info!(prompt_id = %prompt_id, queue_number = ?response.number, "Prompt queued");

    Ok(JobHandle {
        prompt_id,
        submitted_at: chrono::Utc::now(),
    })
}

/// Poll until `prompt_id` has output images on `output_node` (or, failing
/// that, on any node).
///
/// Returns the prompt's history entry. The full timeout is always
/// exhausted before failing; a poll never sleeps past the deadline.
pub async fn await_completion(
    engine: &dyn RenderEngine,
    prompt_id: &str,
    output_node: &NodeId,
    config: &PollConfig,
) -> Result<PromptHistory, TimeoutError> {
    let start = Instant::now();
    let mut polls = 0u32;

    tracing::info!(prompt_id, timeout_secs = config.timeout.as_secs(), "Polling for results");

    loop {
        polls += 1;

        match engine.history(prompt_id).await {
            Ok(history) => match history.into_entry(prompt_id) {
                Some(entry) if entry.has_output_images(output_node) => {
                    tracing::info!(
                        prompt_id,
                        polls,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Results received",
                    );
                    return Ok(entry);
                }
                Some(_) => {
                    tracing::debug!(prompt_id, poll = polls, "Prompt present without output images");
                }
                None => {
                    tracing::debug!(prompt_id, poll = polls, "Prompt not finished yet");
                }
            },
            Err(e) => {
                tracing::warn!(prompt_id, poll = polls, error = %e, "History poll failed");
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.timeout {
            tracing::error!(
                prompt_id,
                polls,
                elapsed_ms = elapsed.as_millis() as u64,
                "Timed out waiting for engine",
            );
            return Err(TimeoutError {
                prompt_id: prompt_id.to_string(),
                elapsed,
                polls,
            });
        }

        tokio::time::sleep(config.interval.min(config.timeout - elapsed)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_prompt_and_polls() {
        let err = TimeoutError {
            prompt_id: "abc".into(),
            elapsed: Duration::from_secs(120),
            polls: 25,
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for prompt abc after 120.0s (25 polls)"
        );
    }

    #[test]
    fn default_poll_config_matches_masking_path() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert_eq!(config.timeout, Duration::from_secs(120));
    }
}
