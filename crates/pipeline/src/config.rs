//! Pipeline configuration loaded from environment variables.
//!
//! Every value has a default suitable for a local checkout with
//! `workflows/` and `assets/` next to the binary. Malformed values are
//! reported as [`ConfigError::InvalidValue`] instead of panicking.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use lookbook_comfyui::poller::PollConfig;
use lookbook_comfyui::retry::RetryPolicy;
use lookbook_core::graph::{JobGraph, NodeId};

/// Fatal configuration problems, detected before any network call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required {description}: {}", path.display())]
    MissingFile { description: String, path: PathBuf },

    #[error("Invalid template {}: {reason}", path.display())]
    InvalidTemplate { path: PathBuf, reason: String },

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: String, value: String },
}

/// Read `var`, falling back to `default` when unset or empty.
pub fn env_or(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default.to_string(),
    }
}

/// Read and parse `var`, falling back to `default` when unset or empty.
pub fn parse_env<T: FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value,
            })
        }
        _ => Ok(default),
    }
}

/// Read an optional variable; unset and empty are both `None`.
pub fn optional_env(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn secs(var: &str, default: u64) -> Result<Duration, ConfigError> {
    parse_env(var, default).map(Duration::from_secs)
}

/// Load and validate a job graph template.
pub fn load_template(path: &Path) -> Result<JobGraph, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile {
            description: "job graph template".into(),
            path: path.to_path_buf(),
        });
    }
    JobGraph::load(path).map_err(|e| ConfigError::InvalidTemplate {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn require_exists(description: &str, path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConfigError::MissingFile {
            description: description.to_string(),
            path: path.to_path_buf(),
        })
    }
}

/// Upload retry budget shared by both render pipelines.
///
/// | Env Var                   | Default |
/// |---------------------------|---------|
/// | `UPLOAD_MAX_ATTEMPTS`     | `3`     |
/// | `UPLOAD_RETRY_DELAY_SECS` | `2`     |
pub fn upload_policy_from_env() -> Result<RetryPolicy, ConfigError> {
    Ok(RetryPolicy::fixed(
        parse_env("UPLOAD_MAX_ATTEMPTS", 3u32)?,
        secs("UPLOAD_RETRY_DELAY_SECS", 2)?,
    ))
}

// ---------------------------------------------------------------------------
// Masking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MaskConfig {
    pub template_path: PathBuf,
    /// `LoadImage` node that receives the uploaded image.
    pub input_node: NodeId,
    /// Node exposing the mask.
    pub output_node: NodeId,
    pub poll: PollConfig,
    pub upload_policy: RetryPolicy,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("workflows/mask.json"),
            input_node: NodeId::from("54"),
            output_node: NodeId::from("455"),
            poll: PollConfig::new(Duration::from_secs(5), Duration::from_secs(120)),
            upload_policy: RetryPolicy::default(),
        }
    }
}

impl MaskConfig {
    /// | Env Var                   | Default               |
    /// |---------------------------|-----------------------|
    /// | `MASK_WORKFLOW_JSON`      | `workflows/mask.json` |
    /// | `MASK_INPUT_NODE_ID`      | `54`                  |
    /// | `MASK_OUTPUT_NODE_ID`     | `455`                 |
    /// | `MASK_POLL_INTERVAL_SECS` | `5`                   |
    /// | `MASK_POLL_TIMEOUT_SECS`  | `120`                 |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            template_path: PathBuf::from(env_or("MASK_WORKFLOW_JSON", "workflows/mask.json")),
            input_node: NodeId::from(env_or("MASK_INPUT_NODE_ID", "54")),
            output_node: NodeId::from(env_or("MASK_OUTPUT_NODE_ID", "455")),
            poll: PollConfig::new(
                secs("MASK_POLL_INTERVAL_SECS", 5)?,
                secs("MASK_POLL_TIMEOUT_SECS", 120)?,
            ),
            upload_policy: upload_policy_from_env()?,
        })
    }
}

// ---------------------------------------------------------------------------
// Background replacement
// ---------------------------------------------------------------------------

/// Node IDs of the compositing template.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeNodes {
    pub input: NodeId,
    pub mask: NodeId,
    pub background: NodeId,
    pub style: NodeId,
    pub prompt: NodeId,
    /// Input key of the prompt node that receives the text.
    pub prompt_input: String,
    pub output: NodeId,
}

impl Default for CompositeNodes {
    fn default() -> Self {
        Self {
            input: NodeId::from("454"),
            mask: NodeId::from("439"),
            background: NodeId::from("256"),
            style: NodeId::from("110"),
            prompt: NodeId::from("448"),
            prompt_input: "string".to_string(),
            output: NodeId::from("15"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompositeConfig {
    pub template_path: PathBuf,
    pub background_image: PathBuf,
    pub style_dir: PathBuf,
    pub nodes: CompositeNodes,
    pub poll: PollConfig,
    pub max_variants: usize,
    /// Timestamp every upload so repeated names never collide on the engine.
    pub unique_uploads: bool,
    pub upload_policy: RetryPolicy,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("workflows/composite.json"),
            background_image: PathBuf::from("assets/background_template.png"),
            style_dir: PathBuf::from("assets/style_images"),
            nodes: CompositeNodes::default(),
            poll: PollConfig::new(Duration::from_secs(5), Duration::from_secs(500)),
            max_variants: 4,
            unique_uploads: true,
            upload_policy: RetryPolicy::default(),
        }
    }
}

impl CompositeConfig {
    /// | Env Var                        | Default                          |
    /// |--------------------------------|----------------------------------|
    /// | `COMPOSITE_WORKFLOW_JSON`      | `workflows/composite.json`       |
    /// | `COMPOSITE_BACKGROUND_IMAGE`   | `assets/background_template.png` |
    /// | `STYLE_IMAGE_DIR`              | `assets/style_images`            |
    /// | `COMPOSITE_POLL_INTERVAL_SECS` | `5`                              |
    /// | `COMPOSITE_POLL_TIMEOUT_SECS`  | `500`                            |
    /// | `COMPOSITE_MAX_VARIANTS`       | `4`                              |
    /// | `COMPOSITE_UNIQUE_UPLOADS`     | `true`                           |
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            template_path: PathBuf::from(env_or(
                "COMPOSITE_WORKFLOW_JSON",
                "workflows/composite.json",
            )),
            background_image: PathBuf::from(env_or(
                "COMPOSITE_BACKGROUND_IMAGE",
                "assets/background_template.png",
            )),
            style_dir: PathBuf::from(env_or("STYLE_IMAGE_DIR", "assets/style_images")),
            nodes: CompositeNodes::default(),
            poll: PollConfig::new(
                secs("COMPOSITE_POLL_INTERVAL_SECS", 5)?,
                secs("COMPOSITE_POLL_TIMEOUT_SECS", 500)?,
            ),
            max_variants: parse_env("COMPOSITE_MAX_VARIANTS", 4usize)?,
            unique_uploads: parse_env("COMPOSITE_UNIQUE_UPLOADS", true)?,
            upload_policy: upload_policy_from_env()?,
        })
    }

    /// Check that the template, background image and style folder exist.
    pub fn verify(&self) -> Result<(), ConfigError> {
        require_exists("background image", &self.background_image)?;
        require_exists("job graph template", &self.template_path)?;
        if !self.style_dir.is_dir() {
            return Err(ConfigError::MissingFile {
                description: "style folder".into(),
                path: self.style_dir.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Prompt generation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct VisionConfig {
    /// Base URL of an OpenAI-compatible API.
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl VisionConfig {
    /// | Env Var          | Default                     |
    /// |------------------|-----------------------------|
    /// | `VISION_API_URL` | `https://api.openai.com/v1` |
    /// | `VISION_API_KEY` | (none)                      |
    /// | `VISION_MODEL`   | `gpt-4o-mini`               |
    pub fn from_env() -> Self {
        Self {
            api_url: env_or("VISION_API_URL", "https://api.openai.com/v1"),
            api_key: optional_env("VISION_API_KEY"),
            model: env_or("VISION_MODEL", "gpt-4o-mini"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PromptMapConfig {
    pub library_path: PathBuf,
    /// Style folder whose file stems are the usable backgrounds.
    pub style_dir: PathBuf,
    /// Random picks tried before falling back to a gender-filtered choice.
    pub background_attempts: usize,
}

impl Default for PromptMapConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("assets/promptlib.json"),
            style_dir: PathBuf::from("assets/style_images"),
            background_attempts: 10,
        }
    }
}

impl PromptMapConfig {
    /// | Env Var               | Default                 |
    /// |-----------------------|-------------------------|
    /// | `PROMPT_LIBRARY_JSON` | `assets/promptlib.json` |
    /// | `STYLE_IMAGE_DIR`     | `assets/style_images`   |
    pub fn from_env() -> Self {
        Self {
            library_path: PathBuf::from(env_or("PROMPT_LIBRARY_JSON", "assets/promptlib.json")),
            style_dir: PathBuf::from(env_or("STYLE_IMAGE_DIR", "assets/style_images")),
            ..Self::default()
        }
    }
}
