//! Image provider adapters.
//!
//! Every backend implements [`ImageProvider`]: "generate one image for a
//! prompt, returning the image or a [`ProviderError`]". The two adapters
//! differ in what they hand back:
//!
//! | Adapter | Response shape | Returned as |
//! |---------|----------------|-------------|
//! | [`vertex::VertexImagenProvider`] | list of predictions | [`GeneratedImage::Decoded`] |
//! | [`gemini::GeminiImageProvider`] | inline image bytes | [`GeneratedImage::Encoded`] |
//!
//! Providers are explicit objects built by [`create_provider`] and injected
//! into [`crate::Illustrator`], so tests substitute a stub without touching
//! process-wide state.

pub mod gemini;
pub mod vertex;

use crate::config::ProviderSettings;
use crate::error::{Pdf2ImgError, ProviderError};
use async_trait::async_trait;
use image::DynamicImage;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use gemini::GeminiImageProvider;
pub use vertex::{AccessTokenSource, GcpTokenSource, StaticToken, VertexImagenProvider};

/// Longest provider error body kept in error messages.
const MAX_ERROR_DETAIL: usize = 300;

/// An image returned by a provider.
#[derive(Clone)]
pub enum GeneratedImage {
    /// A decoded image that still needs RGB conversion and PNG encoding.
    Decoded(DynamicImage),
    /// Encoded bytes ready to display, as sent by the provider.
    Encoded { bytes: Vec<u8>, mime_type: String },
}

impl fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratedImage::Decoded(img) => f
                .debug_struct("Decoded")
                .field("width", &img.width())
                .field("height", &img.height())
                .field("color", &img.color())
                .finish(),
            GeneratedImage::Encoded { bytes, mime_type } => f
                .debug_struct("Encoded")
                .field("bytes", &bytes.len())
                .field("mime_type", mime_type)
                .finish(),
        }
    }
}

/// A generative-image backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    /// Request exactly one image for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError>;
}

/// Build the provider selected by `settings`.
///
/// For Vertex this resolves credentials up front, so a missing or broken
/// credential setup fails at startup rather than on the first request.
pub async fn create_provider(
    settings: &ProviderSettings,
) -> Result<Arc<dyn ImageProvider>, Pdf2ImgError> {
    let client = http_client()?;
    match settings {
        ProviderSettings::Vertex(v) => {
            let tokens = GcpTokenSource::new(v.credentials_path.as_deref()).await?;
            Ok(Arc::new(VertexImagenProvider::new(
                client,
                v.clone(),
                Arc::new(tokens),
            )))
        }
        ProviderSettings::Gemini(g) => Ok(Arc::new(GeminiImageProvider::new(client, g.clone()))),
    }
}

/// Shared HTTP client for provider calls.
///
/// Only the connect phase is bounded here; the whole call is bounded by the
/// generation stage's per-attempt timeout.
pub fn http_client() -> Result<reqwest::Client, Pdf2ImgError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("edgequake-pdf2img/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Pdf2ImgError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport-level `reqwest` error.
pub(crate) fn map_transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Transport {
            detail: format!("request timed out: {}", e),
        }
    } else if e.is_decode() {
        ProviderError::InvalidResponse {
            detail: e.to_string(),
        }
    } else {
        ProviderError::Transport {
            detail: e.to_string(),
        }
    }
}

/// Map a non-success HTTP status and its body.
pub(crate) fn map_status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> ProviderError {
    let detail = summarize_body(body);
    match status.as_u16() {
        401 | 403 => ProviderError::Auth { detail },
        429 => ProviderError::RateLimited {
            retry_after_secs: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        },
        code => ProviderError::Api {
            status: code,
            detail,
        },
    }
}

/// Pull the `error.message` field out of a Google API error body, or keep
/// a bounded prefix of the raw body.
fn summarize_body(body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string));
    let text = message.unwrap_or_else(|| body.trim().to_string());
    crate::pipeline::extract::truncate_chars(&text, MAX_ERROR_DETAIL)
}
