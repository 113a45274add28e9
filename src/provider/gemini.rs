//! Gemini `generateContent` with image output.
//!
//! The prompt goes in as a single user text part with response modalities
//! `TEXT` and `IMAGE`. The image comes back as an `inlineData` part holding
//! base64 bytes; text parts in the same reply are logged and ignored. A
//! reply without any inline image is a soft failure.

use super::{map_status_error, map_transport_error, GeneratedImage, ImageProvider};
use crate::config::GeminiSettings;
use crate::error::ProviderError;
use crate::pipeline::encode::decode_base64;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Public Gemini API host.
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: [&'static str; 2],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Gemini adapter returning the provider's encoded image bytes.
pub struct GeminiImageProvider {
    client: reqwest::Client,
    settings: GeminiSettings,
    base_url: String,
}

impl GeminiImageProvider {
    pub fn new(client: reqwest::Client, settings: GeminiSettings) -> Self {
        info!("Gemini image provider initialised: model={}", settings.model);
        Self {
            client,
            settings,
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Point the adapter at another host (proxy or test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.settings.model
        )
    }
}

#[async_trait]
impl ImageProvider for GeminiImageProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["TEXT", "IMAGE"],
            },
        };

        debug!(
            "Gemini generateContent: model={}, prompt_chars={}",
            self.settings.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.settings.api_key)
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

        let parsed: GenerateContentResponse =
            response.json().await.map_err(map_transport_error)?;
        extract_inline_image(parsed)
    }
}

/// Take the first inline image part from any candidate.
fn extract_inline_image(response: GenerateContentResponse) -> Result<GeneratedImage, ProviderError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!("Gemini blocked the prompt: {}", reason);
        return Err(ProviderError::NoImage {
            reason: format!("prompt blocked ({})", reason),
        });
    }

    let mut finish_reason = None;
    for candidate in response.candidates {
        if finish_reason.is_none() {
            finish_reason = candidate.finish_reason;
        }
        let Some(content) = candidate.content else {
            continue;
        };
        for part in content.parts {
            if let Some(text) = part.text.as_deref() {
                debug!("Gemini text part: {} chars", text.chars().count());
            }
            if let Some(inline) = part.inline_data {
                let bytes = decode_base64(&inline.data).map_err(|e| {
                    ProviderError::InvalidResponse {
                        detail: format!("inline data is not valid base64: {}", e),
                    }
                })?;
                return Ok(GeneratedImage::Encoded {
                    bytes,
                    mime_type: inline.mime_type,
                });
            }
        }
    }

    let reason = match finish_reason {
        Some(r) => format!("response contained no inline image (finish reason {})", r),
        None => "response contained no inline image".to_string(),
    };
    warn!("Gemini {}", reason);
    Err(ProviderError::NoImage { reason })
}
