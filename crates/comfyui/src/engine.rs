//! The render-engine seam.
//!
//! Uploader, poller and downloader talk to the engine only through
//! [`RenderEngine`], so pipelines can run against [`ComfyUIApi`] in
//! production and an in-memory fake in tests.

use async_trait::async_trait;

use crate::api::{ComfyUIApi, ComfyUIApiError, SubmitResponse, UploadResponse};
use crate::history::{History, ImageRef};

#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Base URL, for logging.
    fn base_url(&self) -> &str;

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError>;

    async fn submit(&self, graph: &serde_json::Value) -> Result<SubmitResponse, ComfyUIApiError>;

    async fn history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError>;

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError>;
}

#[async_trait]
impl RenderEngine for ComfyUIApi {
    fn base_url(&self) -> &str {
        self.api_url()
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        ComfyUIApi::upload_image(self, bytes, filename).await
    }

    async fn submit(&self, graph: &serde_json::Value) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submit_workflow(graph).await
    }

    async fn history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        self.get_history(prompt_id).await
    }

    async fn view(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.view_image(image).await
    }
}
