//! Error types for the edgequake-pdf2img library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Pdf2ImgError`] — **Request-fatal or startup-fatal**: the illustration
//!   cannot be produced (missing form field, unreadable PDF, provider refused,
//!   disk full) or the service cannot start (provider not configured).
//!   Returned as `Err(Pdf2ImgError)` from [`crate::Illustrator::illustrate`].
//!
//! * [`ProviderError`] — the uniform signal every image provider adapter
//!   returns for a single call. The generation stage inspects it to decide
//!   whether another attempt is worthwhile before folding it into a
//!   [`Pdf2ImgError`].
//!
//! The web layer never shows raw provider payloads: it renders
//! [`Pdf2ImgError::user_message`] and logs the full `Display` form.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`Pdf2ImgError`].
///
/// Mirrors the request lifecycle: validation happens before any work,
/// extraction before the provider call, persistence last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or malformed form input. No downstream work was attempted.
    Validation,
    /// The uploaded file could not be read as a PDF.
    Extraction,
    /// The provider answered but produced no image (usually safety filtering).
    ProviderSoft,
    /// The provider request itself failed (network, auth, quota, timeout).
    ProviderHard,
    /// Writing the upload or the generated image failed.
    Persistence,
    /// Service misconfiguration or an internal bug.
    Configuration,
}

/// All request-fatal and startup-fatal errors of the edgequake-pdf2img library.
#[derive(Debug, Error)]
pub enum Pdf2ImgError {
    // ── Validation errors ─────────────────────────────────────────────────
    /// A required form field was absent or empty.
    #[error("Missing required field '{field}'")]
    MissingField { field: &'static str },

    /// The grade is neither `N` nor `Grade N`.
    #[error("Invalid grade '{input}': expected a number such as \"4\" or \"Grade 4\"")]
    InvalidGrade { input: String },

    /// The multipart body could not be parsed.
    #[error("Invalid upload: {reason}")]
    InvalidUpload { reason: String },

    /// The request body exceeded the configured upload limit.
    #[error("Upload exceeds the maximum allowed size of {limit} bytes")]
    UploadTooLarge { limit: usize },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The uploaded bytes do not start with the `%PDF` magic.
    #[error("Uploaded file is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The PDF parser rejected the file.
    #[error("PDF '{path}' could not be parsed: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Provider errors ───────────────────────────────────────────────────
    /// The provider answered without an image. Rewording usually helps.
    #[error("Provider '{provider}' produced no image: {reason}")]
    NoImageProduced { provider: String, reason: String },

    /// The provider call failed after all permitted attempts.
    #[error("Provider '{provider}' request failed after {attempts} attempt(s): {source}")]
    ProviderFailed {
        provider: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    // ── Persistence errors ────────────────────────────────────────────────
    /// The generated image could not be converted to PNG.
    #[error("Failed to encode generated image as PNG: {detail}")]
    ImageEncodeFailed { detail: String },

    /// Could not create or write the output PNG (or its directory).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not store the uploaded PDF in the upload holding area.
    #[error("Failed to store upload at '{path}': {source}")]
    UploadWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// The selected provider lacks required settings (project id, API key).
    #[error("Image provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Message shown when the provider answered without an image.
pub const NO_IMAGE_MESSAGE: &str = "Failed to generate image. The model may have filtered the content or encountered an issue. Try a different topic or more specific description.";

/// Message shown when the provider request failed outright.
pub const PROVIDER_FAILED_MESSAGE: &str =
    "The image generation service could not be reached or rejected the request. Please try again later.";

/// Message shown when the generated image could not be saved.
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save generated image";

impl Pdf2ImgError {
    /// Classify this error into one of the request-lifecycle buckets.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingField { .. }
            | Self::InvalidGrade { .. }
            | Self::InvalidUpload { .. }
            | Self::UploadTooLarge { .. } => ErrorKind::Validation,
            Self::NotAPdf { .. } | Self::CorruptPdf { .. } => ErrorKind::Extraction,
            Self::NoImageProduced { .. } => ErrorKind::ProviderSoft,
            Self::ProviderFailed { .. } => ErrorKind::ProviderHard,
            Self::ImageEncodeFailed { .. }
            | Self::OutputWriteFailed { .. }
            | Self::UploadWriteFailed { .. } => ErrorKind::Persistence,
            Self::ProviderNotConfigured { .. } | Self::InvalidConfig(_) | Self::Internal(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Human-readable message for the result page.
    ///
    /// Validation and extraction errors are shown verbatim so the user can
    /// fix their input. Provider and persistence errors use fixed wording.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Validation => self.to_string(),
            ErrorKind::Extraction => match self {
                Self::NotAPdf { .. } => "The uploaded file is not a valid PDF.".to_string(),
                _ => "Could not read text from the uploaded PDF. The file may be damaged or encrypted."
                    .to_string(),
            },
            ErrorKind::ProviderSoft => NO_IMAGE_MESSAGE.to_string(),
            ErrorKind::ProviderHard => PROVIDER_FAILED_MESSAGE.to_string(),
            ErrorKind::Persistence => SAVE_FAILED_MESSAGE.to_string(),
            ErrorKind::Configuration => "An internal error occurred. Please try again later.".to_string(),
        }
    }

    /// HTTP status the result page is rendered with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UploadTooLarge { .. } => 413,
            _ => match self.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::Extraction => 422,
                ErrorKind::ProviderSoft => 422,
                ErrorKind::ProviderHard => 502,
                ErrorKind::Persistence | ErrorKind::Configuration => 500,
            },
        }
    }
}

/// Outcome of a single failed provider call.
///
/// Adapters convert every transport, HTTP, and payload problem into one of
/// these variants; raw client errors never escape the adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ProviderError {
    /// The provider answered but returned no image (safety filter, text-only reply).
    #[error("no image produced: {reason}")]
    NoImage { reason: String },

    /// The call did not complete within the configured timeout.
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 429. `retry_after_secs` carries the server hint when present.
    #[error("rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// HTTP 401/403 or credential acquisition failure.
    #[error("authentication failed: {detail}")]
    Auth { detail: String },

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// Connection-level failure before a response arrived.
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// The response arrived but could not be understood.
    #[error("invalid response: {detail}")]
    InvalidResponse { detail: String },
}

impl ProviderError {
    /// `true` when the provider worked but produced nothing.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::NoImage { .. })
    }

    /// `true` for failures another attempt may fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Transport { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            Self::NoImage { .. } | Self::Auth { .. } | Self::InvalidResponse { .. } => false,
        }
    }

    /// Fold this provider outcome into a request-level error.
    pub fn into_request_error(self, provider: &str, attempts: u32) -> Pdf2ImgError {
        match self {
            Self::NoImage { reason } => Pdf2ImgError::NoImageProduced {
                provider: provider.to_string(),
                reason,
            },
            source => Pdf2ImgError::ProviderFailed {
                provider: provider.to_string(),
                attempts,
                source,
            },
        }
    }
}
