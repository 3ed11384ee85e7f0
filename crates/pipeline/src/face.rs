//! Face detection capability used by the renaming pipeline.

use std::time::Duration;

use async_trait::async_trait;
use lookbook_core::face::FaceBox;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum FaceError {
    #[error("Face detector request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Face detector error ({status}): {body}")]
    Service { status: u16, body: String },
}

/// Finds faces in an encoded image.
#[async_trait]
pub trait FaceDetector: Send + Sync {
    /// Boxes in coordinates relative to the image.
    async fn detect(&self, image: &[u8], filename: &str) -> Result<Vec<FaceBox>, FaceError>;
}

#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<FaceBox>,
}

/// Detector backed by an HTTP service.
///
/// Sends `POST {url}` with multipart field `image` and expects
/// `{"faces": [{"ymin", "height", "score"}]}` back.
#[derive(Debug, Clone)]
pub struct RemoteFaceDetector {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl RemoteFaceDetector {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FaceDetector for RemoteFaceDetector {
    async fn detect(&self, image: &[u8], filename: &str) -> Result<Vec<FaceBox>, FaceError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec()).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FaceError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DetectResponse = response.json().await?;
        Ok(parsed.faces)
    }
}
