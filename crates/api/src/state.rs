use std::sync::Arc;

use lookbook_comfyui::api::ComfyUIApi;
use lookbook_core::job_store::{InMemoryJobStore, JobStore};
use lookbook_pipeline::config::{
    CompositeConfig, ConfigError, MaskConfig, PromptMapConfig, VisionConfig,
};
use lookbook_pipeline::face::{FaceDetector, RemoteFaceDetector};
use lookbook_pipeline::vision::{OpenAiVision, VisionModel};

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Connection pool shared by every per-request engine client.
    pub http: reqwest::Client,
    pub jobs: Arc<dyn JobStore>,
    pub mask: Arc<MaskConfig>,
    pub composite: Arc<CompositeConfig>,
    pub promptmap: Arc<PromptMapConfig>,
    pub vision: Arc<dyn VisionModel>,
    /// `None` when `FACE_DETECTOR_URL` is unset.
    pub face_detector: Option<Arc<dyn FaceDetector>>,
}

impl AppState {
    /// Build production state from the environment.
    pub fn from_env(config: ServerConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::new();

        let face_detector = config.face_detector_url.as_ref().map(|url| {
            Arc::new(RemoteFaceDetector::new(http.clone(), url.clone())) as Arc<dyn FaceDetector>
        });
        if face_detector.is_none() {
            tracing::warn!("FACE_DETECTOR_URL not set, renaming endpoint disabled");
        }

        Ok(Self {
            config: Arc::new(config),
            jobs: Arc::new(InMemoryJobStore::new()),
            mask: Arc::new(MaskConfig::from_env()?),
            composite: Arc::new(CompositeConfig::from_env()?),
            promptmap: Arc::new(PromptMapConfig::from_env()),
            vision: Arc::new(OpenAiVision::new(http.clone(), VisionConfig::from_env())),
            face_detector,
            http,
        })
    }

    /// Engine client for a caller-supplied URL, sharing the connection pool.
    pub fn engine(&self, url: &str) -> ComfyUIApi {
        ComfyUIApi::with_client(self.http.clone(), url)
    }
}
