//! Vision-language model capability used by prompt generation.
//!
//! [`OpenAiVision`] talks to any OpenAI-compatible `chat/completions`
//! endpoint. Images are downscaled to at most 1024px on the long edge and
//! re-encoded as JPEG before being inlined as a base64 data URL.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use lookbook_comfyui::retry::{retry, RetryPolicy};
use lookbook_core::promptmap::Gender;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::VisionConfig;

/// Longest edge sent to the model.
pub const MAX_IMAGE_EDGE: u32 = 1024;
pub const JPEG_QUALITY: u8 = 85;

const GENDER_SYSTEM_PROMPT: &str = "You are a visual analysis expert. Identify the gender of the \
person or model in the image. Judge the person (face, hair, build), never the garments. \
Respond with ONLY 'Men' or 'Women'.";

const GENDER_USER_PROMPT: &str = "What is the gender of the person/model in this image? \
Respond with only 'Men' or 'Women'.";

const DESCRIBE_SYSTEM_PROMPT: &str =
    "You are a fashion analysis expert. Provide detailed, accurate clothing descriptions.";

const DESCRIBE_USER_PROMPT: &str = "Analyze this image and describe the outfit as completely \
as possible. It is one of several photos of the same outfit from different angles.\n\n\
Use exactly this format:\n\
'Wearing a [color] [fit] [type of upper clothing] with [notable design/detail], paired with \
[color] [fit] [type of lower clothing] with [notable design/detail], and completed with \
[footwear].'\n\n\
Be specific about colors, fit, fabric, design details and visible accessories. \
Respond with ONLY the description.";

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Vision request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Vision API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Vision API returned no content")]
    EmptyResponse,

    #[error("Failed to encode {}: {reason}", path.display())]
    Encode { path: PathBuf, reason: String },

    #[error("Vision call failed after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
}

/// Describes and classifies fashion photos.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Free-text outfit description, expected to start with "Wearing".
    async fn describe(&self, image: &Path) -> Result<String, VisionError>;

    /// `None` when the model's answer names neither gender.
    async fn classify_gender(&self, image: &Path) -> Result<Option<Gender>, VisionError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiVision {
    client: reqwest::Client,
    config: VisionConfig,
    policy: RetryPolicy,
    timeout: Duration,
}

impl OpenAiVision {
    pub fn new(client: reqwest::Client, config: VisionConfig) -> Self {
        Self {
            client,
            config,
            policy: RetryPolicy::exponential(3, Duration::from_secs(1)),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn complete(
        &self,
        label: &str,
        image: &Path,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, VisionError> {
        let encoded = encode_image(image).await?;
        let body = json!({
            "model": self.config.model,
            "max_tokens": max_tokens,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": [
                    { "type": "text", "text": user },
                    { "type": "image_url", "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") } }
                ]}
            ]
        });

        retry(&self.policy, label, |_| self.post(&body))
            .await
            .map_err(|exhausted| VisionError::Exhausted {
                attempts: exhausted.attempts,
                reason: exhausted.last_error.to_string(),
            })
    }

    async fn post(&self, body: &Value) -> Result<String, VisionError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        );
        let mut request = self.client.post(url).json(body).timeout(self.timeout);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(VisionError::EmptyResponse)
    }
}

#[async_trait]
impl VisionModel for OpenAiVision {
    async fn describe(&self, image: &Path) -> Result<String, VisionError> {
        let description = self
            .complete(
                "describe_outfit",
                image,
                DESCRIBE_SYSTEM_PROMPT,
                DESCRIBE_USER_PROMPT,
                200,
            )
            .await?;
        tracing::debug!(chars = description.len(), "Outfit described");
        Ok(description)
    }

    async fn classify_gender(&self, image: &Path) -> Result<Option<Gender>, VisionError> {
        let answer = self
            .complete(
                "classify_gender",
                image,
                GENDER_SYSTEM_PROMPT,
                GENDER_USER_PROMPT,
                15,
            )
            .await?;
        let gender = Gender::from_response(&answer);
        if gender.is_none() {
            tracing::warn!(answer = %answer, "Could not parse gender from response");
        }
        Ok(gender)
    }
}

/// Downscale and re-encode `path` as base64 JPEG.
pub async fn encode_image(path: &Path) -> Result<String, VisionError> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || encode_jpeg(&owned))
        .await
        .map_err(|e| VisionError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
}

fn encode_jpeg(path: &Path) -> Result<String, VisionError> {
    let encode_err = |reason: String| VisionError::Encode {
        path: path.to_path_buf(),
        reason,
    };

    let mut img = image::open(path).map_err(|e| encode_err(e.to_string()))?;
    if img.width().max(img.height()) > MAX_IMAGE_EDGE {
        img = img.thumbnail(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE);
    }
    let rgb = img.to_rgb8();

    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| encode_err(e.to_string()))?;

    tracing::debug!(
        file = %path.display(),
        width = rgb.width(),
        height = rgb.height(),
        bytes = buffer.get_ref().len(),
        "Image encoded for vision model",
    );
    Ok(STANDARD.encode(buffer.into_inner()))
}
