//! Configuration types for PDF-to-illustration requests.
//!
//! Request-handling behaviour is controlled through [`IllustratorConfig`],
//! built via its [`IllustratorConfigBuilder`]. Provider credentials live
//! separately in [`ProviderSettings`] because they come from the process
//! environment and are only needed once, when the provider client is built.
//!
//! # Environment
//!
//! | Variable | Provider | Required | Default |
//! |----------|----------|----------|---------|
//! | `GOOGLE_CLOUD_PROJECT_ID` | vertex | yes | — |
//! | `GOOGLE_CLOUD_LOCATION` | vertex | no | `us-central1` |
//! | `GOOGLE_APPLICATION_CREDENTIALS` | vertex | no | ambient credentials |
//! | `PDF2IMG_VERTEX_MODEL` | vertex | no | `imagen-3.0-generate-001` |
//! | `GEMINI_API_KEY` | gemini | yes | — |
//! | `PDF2IMG_GEMINI_MODEL` | gemini | no | `gemini-2.0-flash-preview-image-generation` |

use crate::error::Pdf2ImgError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default Imagen model on Vertex AI.
pub const DEFAULT_VERTEX_MODEL: &str = "imagen-3.0-generate-001";

/// Default Gemini model able to return inline images.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Default Vertex AI region.
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Configuration for the illustration flow.
///
/// Built via [`IllustratorConfig::builder()`] or using
/// [`IllustratorConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2img::{IllustratorConfig, PromptPolicy};
///
/// let config = IllustratorConfig::builder()
///     .output_dir("public/output")
///     .prompt_policy(PromptPolicy::Generic)
///     .max_retries(1)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct IllustratorConfig {
    /// Holding area for uploaded PDFs. Default: `uploads`.
    ///
    /// Every upload is stored under a fresh random name, never the
    /// client-supplied filename. Files are kept after the request.
    pub upload_dir: PathBuf,

    /// Directory generated PNGs are written to. Default: `static/output`.
    pub output_dir: PathBuf,

    /// URL prefix under which `output_dir` is served. Default: `/static/output`.
    pub output_url_prefix: String,

    /// How the prompt is derived from topic, chapter text and grade.
    /// Default: [`PromptPolicy::KeywordSafe`].
    pub prompt_policy: PromptPolicy,

    /// Highest grade that still receives a canned prompt under
    /// [`PromptPolicy::KeywordSafe`]. Default: 3.
    pub young_grade_max: u32,

    /// Character budget for extracted chapter text. Default: 3000.
    pub max_text_chars: usize,

    /// Maximum accepted request body size in bytes. Default: 20 MiB.
    pub max_upload_bytes: usize,

    /// Per-attempt provider timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Extra attempts after a transient provider failure. Range 0–3. Default: 1.
    ///
    /// Only timeouts, rate limits, connection failures and 5xx answers are
    /// retried. A provider that answers "no image" is never retried: the same
    /// prompt will be filtered again.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,
}

impl Default for IllustratorConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("static/output"),
            output_url_prefix: "/static/output".to_string(),
            prompt_policy: PromptPolicy::default(),
            young_grade_max: 3,
            max_text_chars: 3000,
            max_upload_bytes: 20 * 1024 * 1024,
            api_timeout_secs: 60,
            max_retries: 1,
            retry_backoff_ms: 500,
        }
    }
}

impl fmt::Debug for IllustratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IllustratorConfig")
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("output_url_prefix", &self.output_url_prefix)
            .field("prompt_policy", &self.prompt_policy)
            .field("young_grade_max", &self.young_grade_max)
            .field("max_text_chars", &self.max_text_chars)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl IllustratorConfig {
    /// Create a new builder for `IllustratorConfig`.
    pub fn builder() -> IllustratorConfigBuilder {
        IllustratorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Create the upload and output directories if they do not exist.
    pub async fn ensure_directories(&self) -> Result<(), Pdf2ImgError> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| Pdf2ImgError::UploadWriteFailed {
                path: self.upload_dir.clone(),
                source: e,
            })?;
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| Pdf2ImgError::OutputWriteFailed {
                path: self.output_dir.clone(),
                source: e,
            })?;
        info!(
            "Storage ready: uploads in {}, images in {}",
            self.upload_dir.display(),
            self.output_dir.display()
        );
        Ok(())
    }
}

/// Builder for [`IllustratorConfig`].
#[derive(Debug)]
pub struct IllustratorConfigBuilder {
    config: IllustratorConfig,
}

impl IllustratorConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.config.output_url_prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    pub fn prompt_policy(mut self, policy: PromptPolicy) -> Self {
        self.config.prompt_policy = policy;
        self
    }

    pub fn young_grade_max(mut self, grade: u32) -> Self {
        self.config.young_grade_max = grade;
        self
    }

    pub fn max_text_chars(mut self, n: usize) -> Self {
        self.config.max_text_chars = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n.max(1024);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(3);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IllustratorConfig, Pdf2ImgError> {
        let c = &self.config;
        if c.max_text_chars == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "max_text_chars must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Pdf2ImgError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if c.upload_dir == c.output_dir {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "upload_dir and output_dir must differ (both are {})",
                c.upload_dir.display()
            )));
        }
        if !c.output_url_prefix.starts_with('/') {
            return Err(Pdf2ImgError::InvalidConfig(format!(
                "output_url_prefix must start with '/', got '{}'",
                c.output_url_prefix
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Prompt construction policy.
///
/// | Policy | Grade ≤ `young_grade_max` | Older grades |
/// |--------|---------------------------|--------------|
/// | `KeywordSafe` | canned prompt picked by topic keyword | structured template |
/// | `Generic` | structured template | structured template |
///
/// `KeywordSafe` deliberately ignores the chapter text for young grades:
/// free-form textbook content in the prompt trips provider safety filters,
/// while the canned descriptions pass reliably.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptPolicy {
    /// Canned prompt for young grades, structured template otherwise. (default)
    #[default]
    KeywordSafe,
    /// Structured template for every grade.
    Generic,
}

/// Which generative-image backend serves the requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Imagen on Vertex AI: list-of-images responses.
    Vertex,
    /// Gemini API: inline image bytes in the response.
    Gemini,
}

impl ProviderKind {
    /// Lower-case provider name used in logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Vertex => "vertex",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Prompt policy each backend was originally deployed with.
    pub fn default_prompt_policy(self) -> PromptPolicy {
        match self {
            ProviderKind::Vertex => PromptPolicy::KeywordSafe,
            ProviderKind::Gemini => PromptPolicy::Generic,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Provider settings ────────────────────────────────────────────────────

/// Settings for the Vertex AI Imagen backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexSettings {
    pub project_id: String,
    pub location: String,
    pub model: String,
    /// Service-account key file. `None` means ambient default credentials.
    pub credentials_path: Option<PathBuf>,
}

/// Settings for the Gemini API backend.
#[derive(Clone, PartialEq, Eq)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Provider selection plus its credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSettings {
    Vertex(VertexSettings),
    Gemini(GeminiSettings),
}

impl ProviderSettings {
    /// The backend these settings configure.
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSettings::Vertex(_) => ProviderKind::Vertex,
            ProviderSettings::Gemini(_) => ProviderKind::Gemini,
        }
    }

    /// Read settings for `kind` from the process environment.
    pub fn from_env(kind: ProviderKind) -> Result<Self, Pdf2ImgError> {
        Self::from_lookup(kind, |key| std::env::var(key).ok())
    }

    /// Read settings for `kind` through `lookup`.
    ///
    /// Empty values count as absent. A credentials path that does not exist
    /// is dropped with a warning so ambient credentials are used instead.
    pub fn from_lookup<F>(kind: ProviderKind, lookup: F) -> Result<Self, Pdf2ImgError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        match kind {
            ProviderKind::Vertex => {
                let project_id = get("GOOGLE_CLOUD_PROJECT_ID").ok_or_else(|| {
                    Pdf2ImgError::ProviderNotConfigured {
                        provider: kind.to_string(),
                        hint: "Set GOOGLE_CLOUD_PROJECT_ID (e.g. in a .env file).".to_string(),
                    }
                })?;
                let location =
                    get("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|| DEFAULT_LOCATION.to_string());
                let model =
                    get("PDF2IMG_VERTEX_MODEL").unwrap_or_else(|| DEFAULT_VERTEX_MODEL.to_string());

                let credentials_path = match get("GOOGLE_APPLICATION_CREDENTIALS") {
                    Some(p) if Path::new(&p).exists() => {
                        info!("Using service account from: {}", p);
                        Some(PathBuf::from(p))
                    }
                    Some(p) => {
                        warn!(
                            "Service account key file '{}' not found, using default credentials",
                            p
                        );
                        None
                    }
                    None => {
                        warn!("GOOGLE_APPLICATION_CREDENTIALS not set, using default credentials");
                        None
                    }
                };

                Ok(ProviderSettings::Vertex(VertexSettings {
                    project_id,
                    location,
                    model,
                    credentials_path,
                }))
            }
            ProviderKind::Gemini => {
                let api_key =
                    get("GEMINI_API_KEY").ok_or_else(|| Pdf2ImgError::ProviderNotConfigured {
                        provider: kind.to_string(),
                        hint: "Set GEMINI_API_KEY (e.g. in a .env file).".to_string(),
                    })?;
                let model =
                    get("PDF2IMG_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
                Ok(ProviderSettings::Gemini(GeminiSettings { api_key, model }))
            }
        }
    }
}
