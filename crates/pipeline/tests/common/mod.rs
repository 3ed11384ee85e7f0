#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lookbook_comfyui::api::{ComfyUIApiError, SubmitResponse, UploadResponse};
use lookbook_comfyui::engine::RenderEngine;
use lookbook_comfyui::history::{History, ImageRef, PromptHistory};
use lookbook_comfyui::poller::PollConfig;
use lookbook_comfyui::retry::RetryPolicy;
use lookbook_core::face::FaceBox;
use lookbook_core::graph::NodeId;
use lookbook_core::promptmap::Gender;
use lookbook_pipeline::face::{FaceDetector, FaceError};
use lookbook_pipeline::vision::{VisionError, VisionModel};

/// Engine that completes every job immediately.
///
/// Each job exposes `images_per_job` outputs on `output_node`. Submissions
/// whose graph mentions any of `reject_markers` are refused, and uploads
/// whose name contains any of `failing_uploads` always fail.
pub struct PipelineEngine {
    pub output_node: NodeId,
    pub images_per_job: usize,
    pub reject_markers: Vec<String>,
    pub failing_uploads: Vec<String>,
    pub uploaded: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<serde_json::Value>>,
    pub jobs: AtomicUsize,
}

impl PipelineEngine {
    pub fn new(output_node: &str, images_per_job: usize) -> Self {
        Self {
            output_node: NodeId::from(output_node),
            images_per_job,
            reject_markers: Vec::new(),
            failing_uploads: Vec::new(),
            uploaded: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            jobs: AtomicUsize::new(0),
        }
    }

    pub fn rejecting(mut self, marker: &str) -> Self {
        self.reject_markers.push(marker.to_string());
        self
    }

    pub fn failing_upload(mut self, name_part: &str) -> Self {
        self.failing_uploads.push(name_part.to_string());
        self
    }

    pub fn uploads(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<serde_json::Value> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RenderEngine for PipelineEngine {
    fn base_url(&self) -> &str {
        "http://pipeline-engine"
    }

    async fn upload_image(
        &self,
        _bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        if self.failing_uploads.iter().any(|p| filename.contains(p.as_str())) {
            return Err(ComfyUIApiError::ApiError {
                status: 500,
                body: "disk full".into(),
            });
        }
        self.uploaded.lock().unwrap().push(filename.to_string());
        Ok(UploadResponse {
            name: Some(filename.to_string()),
            subfolder: None,
        })
    }

    async fn submit(&self, graph: &serde_json::Value) -> Result<SubmitResponse, ComfyUIApiError> {
        let text = graph.to_string();
        if self.reject_markers.iter().any(|m| text.contains(m.as_str())) {
            return Err(ComfyUIApiError::ApiError {
                status: 400,
                body: "invalid prompt".into(),
            });
        }
        self.submitted.lock().unwrap().push(graph.clone());
        let n = self.jobs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubmitResponse {
            prompt_id: Some(format!("job-{n}")),
            number: Some(n as i64),
        })
    }

    async fn history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        let images = (1..=self.images_per_job)
            .map(|i| ImageRef::new(format!("{prompt_id}_{i:05}_.png")))
            .collect();
        let mut history = History::default();
        history.insert(
            prompt_id,
            PromptHistory::with_outputs([(self.output_node.clone(), images)]),
        );
        Ok(history)
    }

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        Ok(format!("rendered:{}", image.filename).into_bytes())
    }
}

/// Poll config that completes on the first tick.
pub fn fast_poll() -> PollConfig {
    PollConfig::new(Duration::from_millis(1), Duration::from_secs(5))
}

/// A single attempt, no delay.
pub fn no_retry() -> RetryPolicy {
    RetryPolicy::fixed(1, Duration::ZERO)
}

pub fn write_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    std::fs::create_dir_all(dir).unwrap();
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            std::fs::write(&path, format!("bytes of {name}")).unwrap();
            path
        })
        .collect()
}

/// Write a real PNG `height` pixels tall.
pub fn write_png(path: &Path, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    image::RgbImage::from_pixel(8, height, image::Rgb([120, 120, 120]))
        .save(path)
        .unwrap();
}

/// Detector that reports a face for files whose name contains `face`.
pub struct NameFaceDetector {
    pub calls: AtomicUsize,
}

impl NameFaceDetector {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FaceDetector for NameFaceDetector {
    async fn detect(&self, _image: &[u8], filename: &str) -> Result<Vec<FaceBox>, FaceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if filename.contains("face") {
            Ok(vec![FaceBox {
                ymin: 0.125,
                height: 0.25,
                score: 0.9,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// Vision model with canned answers. Files whose name contains `broken`
/// fail to describe.
pub struct CannedVision {
    pub gender_answer: Option<Gender>,
    pub description: String,
    pub describe_calls: AtomicUsize,
}

impl CannedVision {
    pub fn new(gender_answer: Option<Gender>, description: &str) -> Self {
        Self {
            gender_answer,
            description: description.to_string(),
            describe_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisionModel for CannedVision {
    async fn describe(&self, image: &Path) -> Result<String, VisionError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if image.to_string_lossy().contains("broken") {
            return Err(VisionError::EmptyResponse);
        }
        Ok(self.description.clone())
    }

    async fn classify_gender(&self, _image: &Path) -> Result<Option<Gender>, VisionError> {
        Ok(self.gender_answer)
    }
}
