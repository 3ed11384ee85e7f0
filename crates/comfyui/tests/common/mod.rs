#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use lookbook_comfyui::api::{ComfyUIApiError, SubmitResponse, UploadResponse};
use lookbook_comfyui::engine::RenderEngine;
use lookbook_comfyui::history::{History, ImageRef, PromptHistory};
use lookbook_core::graph::NodeId;

/// Scriptable in-memory render engine.
#[derive(Default)]
pub struct FakeEngine {
    /// Upload calls that fail before uploads start succeeding.
    pub upload_failures: AtomicUsize,
    pub upload_attempts: AtomicUsize,
    pub uploaded: Mutex<Vec<String>>,

    pub omit_prompt_id: bool,
    pub reject_submit: bool,
    pub submitted: Mutex<Vec<serde_json::Value>>,

    /// Polls answered "not ready" before the outputs appear. `None` never
    /// completes.
    pub ready_after_polls: Option<usize>,
    /// Answer not-ready polls with HTTP 500 instead of `{}`.
    pub error_while_pending: bool,
    pub polls: AtomicUsize,
    pub outputs: Vec<(NodeId, Vec<ImageRef>)>,

    pub failing_views: HashSet<String>,
    pub viewed: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self {
            ready_after_polls: Some(0),
            ..Default::default()
        }
    }

    pub fn failing_uploads(mut self, failures: usize) -> Self {
        self.upload_failures = AtomicUsize::new(failures);
        self
    }

    pub fn ready_after(mut self, polls: Option<usize>) -> Self {
        self.ready_after_polls = polls;
        self
    }

    pub fn with_output(mut self, node: &str, filenames: &[&str]) -> Self {
        self.outputs.push((
            NodeId::from(node),
            filenames.iter().map(|f| ImageRef::new(*f)).collect(),
        ));
        self
    }

    pub fn failing_view(mut self, filename: &str) -> Self {
        self.failing_views.insert(filename.to_string());
        self
    }

    /// The history entry a completed poll would return.
    pub fn history_entry(&self) -> PromptHistory {
        PromptHistory::with_outputs(self.outputs.clone())
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

fn server_error(body: &str) -> ComfyUIApiError {
    ComfyUIApiError::ApiError {
        status: 500,
        body: body.to_string(),
    }
}

#[async_trait]
impl RenderEngine for FakeEngine {
    fn base_url(&self) -> &str {
        "http://fake-engine"
    }

    async fn upload_image(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        self.upload_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.upload_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.upload_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(server_error("upload exploded"));
        }
        self.uploaded.lock().unwrap().push(filename.to_string());
        Ok(UploadResponse {
            name: Some(filename.to_string()),
            subfolder: None,
        })
    }

    async fn submit(&self, graph: &serde_json::Value) -> Result<SubmitResponse, ComfyUIApiError> {
        if self.reject_submit {
            return Err(ComfyUIApiError::ApiError {
                status: 400,
                body: "invalid prompt".into(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(graph.clone());
        Ok(SubmitResponse {
            prompt_id: (!self.omit_prompt_id).then(|| format!("prompt-{}", submitted.len())),
            number: Some(submitted.len() as i64),
        })
    }

    async fn history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        let ready = matches!(self.ready_after_polls, Some(n) if poll >= n);

        if !ready {
            if self.error_while_pending {
                return Err(server_error("busy"));
            }
            return Ok(History::default());
        }

        let mut history = History::default();
        history.insert(prompt_id, PromptHistory::with_outputs(self.outputs.clone()));
        Ok(history)
    }

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        if self.failing_views.contains(&image.filename) {
            return Err(server_error("view failed"));
        }
        self.viewed.lock().unwrap().push(image.filename.clone());
        Ok(format!("bytes:{}", image.filename).into_bytes())
    }
}
