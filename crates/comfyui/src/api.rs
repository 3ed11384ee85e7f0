//! Thin `reqwest` wrapper over the ComfyUI REST endpoints:
//! image upload, workflow submission, history retrieval and output
//! download using [`reqwest`]. Every call carries its own request timeout.

use std::time::Duration;

use serde::Deserialize;

use crate::history::{History, ImageRef};

/// Per-call request timeouts.
#[derive(Debug, Clone, Copy)]
pub struct ApiTimeouts {
    pub upload: Duration,
    pub submit: Duration,
    pub history: Duration,
    pub view: Duration,
}

impl Default for ApiTimeouts {
    fn default() -> Self {
        Self {
            upload: Duration::from_secs(60),
            submit: Duration::from_secs(60),
            history: Duration::from_secs(30),
            view: Duration::from_secs(60),
        }
    }
}

/// Client bound to one engine base URL.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    timeouts: ApiTimeouts,
}

/// Response returned by the ComfyUI `/prompt` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt. Missing when the
    /// engine accepted the request but did not queue anything.
    #[serde(default)]
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub number: Option<i64>,
}

/// Response returned by `/upload/image`.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Name the engine stored the file under.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
}

/// Transport, status and decoding failures of a single REST call.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    #[error("Request to engine failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ComfyUI responded {status}: {body}")]
    ApiError { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("Unexpected ComfyUI response: {0}")]
    Decode(String),
}

/// Normalise a user-supplied engine URL.
///
/// Adds `http://` when no scheme is present and strips trailing slashes.
///
/// ```
/// use lookbook_comfyui::api::normalize_base_url;
///
/// assert_eq!(normalize_base_url("gpu-box:8188/"), "http://gpu-box:8188");
/// assert_eq!(normalize_base_url(" https://comfy.example.com "), "https://comfy.example.com");
/// ```
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    }
}

impl ComfyUIApi {
    /// Client with its own connection pool. `api_url` is normalised with
    /// [`normalize_base_url`].
    pub fn new(api_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Client sharing `client`'s connection pool; the server builds one of
    /// these per request.
    pub fn with_client(client: reqwest::Client, api_url: &str) -> Self {
        Self {
            client,
            api_url: normalize_base_url(api_url),
            timeouts: ApiTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ApiTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload an image as multipart field `image` under `filename`.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("overwrite", "true");

        let response = self
            .client
            .post(self.endpoint("upload/image"))
            .multipart(form)
            .timeout(self.timeouts.upload)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Queue a graph: `POST /prompt` with `{"prompt": workflow}`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({ "prompt": workflow });

        let response = self
            .client
            .post(self.endpoint("prompt"))
            .json(&body)
            .timeout(self.timeouts.submit)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Sends `GET /history/{prompt_id}`. The engine answers `{}` until the
    /// prompt has finished.
    pub async fn get_history(&self, prompt_id: &str) -> Result<History, ComfyUIApiError> {
        let response = self
            .client
            .get(self.endpoint(&format!("history/{prompt_id}")))
            .timeout(self.timeouts.history)
            .send()
            .await?;

        Self::decode(response).await
    }

    /// Download one output image via `GET /view`.
    pub async fn view_image(&self, image: &ImageRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(self.endpoint("view"))
            .query(&[
                ("filename", image.filename.as_str()),
                ("subfolder", image.subfolder.as_str()),
                ("type", image.kind.as_str()),
            ])
            .timeout(self.timeouts.view)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.bytes().await?.to_vec())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    /// Turn a non-2xx response into [`ComfyUIApiError::ApiError`] carrying
    /// the body text.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("<body unavailable: {e}>"),
        };
        Err(ComfyUIApiError::ApiError {
            status: status.as_u16(),
            body,
        })
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let bytes = Self::check_status(response).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ComfyUIApiError::Decode(e.to_string()))
    }
}
