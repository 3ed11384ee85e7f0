use lookbook_pipeline::config::{env_or, optional_env, parse_env, ConfigError};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Malformed
/// values are reported instead of panicking.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Batches are long (default: `3600`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body (default: 512 MiB).
    pub max_upload_bytes: usize,
    /// Face detection service used by the renaming endpoint.
    pub face_detector_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 3600,
            max_upload_bytes: 512 * 1024 * 1024,
            face_detector_url: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default     |
    /// |------------------------|-------------|
    /// | `HOST`                 | `0.0.0.0`   |
    /// | `PORT`                 | `8000`      |
    /// | `CORS_ORIGINS`         | `*`         |
    /// | `REQUEST_TIMEOUT_SECS` | `3600`      |
    /// | `MAX_UPLOAD_BYTES`     | `536870912` |
    /// | `FACE_DETECTOR_URL`    | (none)      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: env_or("HOST", &defaults.host),
            port: parse_env("PORT", defaults.port)?,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
            face_detector_url: optional_env("FACE_DETECTOR_URL"),
        })
    }

    /// Whether CORS should accept any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}
