//! Imagen on Vertex AI.
//!
//! One `:predict` call per prompt with `sampleCount = 1`. The response is a
//! list of predictions; an empty list (or a prediction carrying only a
//! `raiFilteredReason`) means the safety filter swallowed the image.
//!
//! Access tokens come from an [`AccessTokenSource`]. Production uses
//! [`GcpTokenSource`] (service-account key file or ambient credentials via
//! `gcp_auth`); tests inject a [`StaticToken`].

use super::{map_status_error, map_transport_error, GeneratedImage, ImageProvider};
use crate::config::VertexSettings;
use crate::error::{Pdf2ImgError, ProviderError};
use crate::pipeline::encode::decode_base64;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// OAuth scope required by the Vertex AI prediction endpoint.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Environment variable naming a service-account key file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Source of bearer tokens for Vertex AI calls.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ProviderError>;
}

/// Google credentials resolved through `gcp_auth`.
pub struct GcpTokenSource {
    inner: Arc<dyn gcp_auth::TokenProvider>,
}

impl GcpTokenSource {
    /// Load the service-account key at `key_file`, or fall back to the
    /// ambient credential chain when `None`.
    pub async fn new(key_file: Option<&Path>) -> Result<Self, Pdf2ImgError> {
        let inner: Arc<dyn gcp_auth::TokenProvider> = match key_file {
            Some(path) => {
                let account = gcp_auth::CustomServiceAccount::from_file(path).map_err(|e| {
                    Pdf2ImgError::ProviderNotConfigured {
                        provider: "vertex".to_string(),
                        hint: format!(
                            "Could not load service account key '{}': {}",
                            path.display(),
                            e
                        ),
                    }
                })?;
                Arc::new(account)
            }
            None => ambient_provider()
                .await
                .map_err(|detail| Pdf2ImgError::ProviderNotConfigured {
                    provider: "vertex".to_string(),
                    hint: format!(
                        "No Google credentials found ({}). Set {} to a service account key \
                         or run `gcloud auth application-default login`.",
                        detail, CREDENTIALS_ENV
                    ),
                })?,
        };
        Ok(Self { inner })
    }
}

/// Resolve ambient credentials in the usual Google order: key file from
/// [`CREDENTIALS_ENV`], gcloud application-default credentials, the metadata
/// server, then the `gcloud` CLI user.
///
/// A [`CREDENTIALS_ENV`] entry naming a missing file is skipped with a
/// warning instead of failing the whole chain.
async fn ambient_provider() -> Result<Arc<dyn gcp_auth::TokenProvider>, String> {
    if let Some(path) = std::env::var_os(CREDENTIALS_ENV).map(PathBuf::from) {
        if path.exists() {
            let account = gcp_auth::CustomServiceAccount::from_file(&path)
                .map_err(|e| format!("service account key '{}': {}", path.display(), e))?;
            return Ok(Arc::new(account));
        }
        if !path.as_os_str().is_empty() {
            warn!(
                "{} points at missing file '{}', trying other credentials",
                CREDENTIALS_ENV,
                path.display()
            );
        }
    }

    let mut failures = Vec::new();

    match gcp_auth::ConfigDefaultCredentials::new().await {
        Ok(creds) => {
            debug!("Using gcloud application-default credentials");
            return Ok(Arc::new(creds));
        }
        Err(e) => failures.push(format!("application-default: {e}")),
    }

    match gcp_auth::MetadataServiceAccount::new().await {
        Ok(account) => {
            debug!("Using metadata server credentials");
            return Ok(Arc::new(account));
        }
        Err(e) => failures.push(format!("metadata server: {e}")),
    }

    match gcp_auth::GCloudAuthorizedUser::new().await {
        Ok(user) => {
            debug!("Using gcloud CLI user credentials");
            return Ok(Arc::new(user));
        }
        Err(e) => failures.push(format!("gcloud: {e}")),
    }

    Err(failures.join("; "))
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn access_token(&self) -> Result<String, ProviderError> {
        let token = self
            .inner
            .token(&[CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|e| ProviderError::Auth {
                detail: e.to_string(),
            })?;
        Ok(token.as_str().to_string())
    }
}

/// A fixed bearer token.
#[derive(Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ProviderError> {
        Ok(self.0.clone())
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    instances: [Instance<'a>; 1],
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Instance<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Parameters {
    sample_count: u32,
    include_rai_reason: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
    rai_filtered_reason: Option<String>,
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Imagen adapter for the Vertex AI `:predict` endpoint.
pub struct VertexImagenProvider {
    client: reqwest::Client,
    settings: VertexSettings,
    tokens: Arc<dyn AccessTokenSource>,
    base_url: String,
}

impl VertexImagenProvider {
    pub fn new(
        client: reqwest::Client,
        settings: VertexSettings,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        let base_url = format!("https://{}-aiplatform.googleapis.com", settings.location);
        info!(
            "Vertex AI initialised: project={}, location={}, model={}",
            settings.project_id, settings.location, settings.model
        );
        Self {
            client,
            settings,
            tokens,
            base_url,
        }
    }

    /// Point the adapter at another host (regional proxy or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.base_url, self.settings.project_id, self.settings.location, self.settings.model
        )
    }
}

#[async_trait]
impl ImageProvider for VertexImagenProvider {
    fn name(&self) -> &str {
        "vertex"
    }

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let token = self.tokens.access_token().await?;
        let body = PredictRequest {
            instances: [Instance { prompt }],
            parameters: Parameters {
                sample_count: 1,
                include_rai_reason: true,
            },
        };

        debug!(
            "Vertex predict: model={}, prompt_chars={}",
            self.settings.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &headers, &text));
        }

        let parsed: PredictResponse = response.json().await.map_err(map_transport_error)?;
        let Some(first) = parsed.predictions.into_iter().next() else {
            warn!("Vertex returned no predictions");
            return Err(ProviderError::NoImage {
                reason: "empty prediction list".to_string(),
            });
        };

        let Some(data) = first.bytes_base64_encoded else {
            let reason = first
                .rai_filtered_reason
                .unwrap_or_else(|| "prediction without image bytes".to_string());
            warn!("Vertex prediction filtered: {}", reason);
            return Err(ProviderError::NoImage { reason });
        };

        let bytes = decode_base64(&data).map_err(|e| ProviderError::InvalidResponse {
            detail: format!("image bytes are not valid base64: {}", e),
        })?;
        let img = image::load_from_memory(&bytes).map_err(|e| ProviderError::InvalidResponse {
            detail: format!(
                "could not decode {} image: {}",
                first.mime_type.as_deref().unwrap_or("unknown"),
                e
            ),
        })?;

        debug!("Vertex image decoded: {}x{}", img.width(), img.height());
        Ok(GeneratedImage::Decoded(img))
    }
}
