//! # edgequake-pdf2img
//!
//! Illustrate textbook chapters: upload a PDF, name the topic and grade, get
//! back an image generated by Imagen on Vertex AI or by Gemini.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + topic + grade
//!  │
//!  ├─ 1. Validate  required fields, grade "N" or "Grade N"
//!  ├─ 2. Store     upload saved under a random name
//!  ├─ 3. Extract   page text via pdf-extract (spawn_blocking), 3000 chars
//!  ├─ 4. Prompt    canned keyword prompt (young grades) or structured template
//!  ├─ 5. Generate  provider call with timeout + bounded retry
//!  └─ 6. Persist   RGB PNG under static/output/<hex>.png
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2img::{
//!     create_provider, IllustrationRequest, Illustrator, IllustratorConfig, ProviderKind,
//!     ProviderSettings, UploadedPdf,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY (and optionally PDF2IMG_GEMINI_MODEL)
//!     let settings = ProviderSettings::from_env(ProviderKind::Gemini)?;
//!     let provider = create_provider(&settings).await?;
//!
//!     let config = IllustratorConfig::builder()
//!         .prompt_policy(ProviderKind::Gemini.default_prompt_policy())
//!         .build()?;
//!     config.ensure_directories().await?;
//!
//!     let illustrator = Illustrator::new(provider, config);
//!     let output = illustrator
//!         .illustrate(IllustrationRequest {
//!             pdf: Some(UploadedPdf {
//!                 file_name: Some("chapter.pdf".into()),
//!                 bytes: std::fs::read("chapter.pdf")?,
//!             }),
//!             topic: "Photosynthesis".into(),
//!             grade: "Grade 6".into(),
//!         })
//!         .await?;
//!     println!("{}", output.image_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2img` binary (clap + anyhow + tracing-subscriber + dotenv) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! edgequake-pdf2img = { version = "0.1", default-features = false }
//! ```
//!
//! ## Choosing a Provider
//!
//! | Provider | Model | Credentials | Default prompt policy |
//! |----------|-------|-------------|-----------------------|
//! | `vertex` | `imagen-3.0-generate-001` | `GOOGLE_CLOUD_PROJECT_ID` + service account or ADC | `keyword-safe` |
//! | `gemini` | `gemini-2.0-flash-preview-image-generation` | `GEMINI_API_KEY` | `generic` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod illustrate;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GeminiSettings, IllustratorConfig, IllustratorConfigBuilder, PromptPolicy, ProviderKind,
    ProviderSettings, VertexSettings,
};
pub use error::{ErrorKind, Pdf2ImgError, ProviderError};
pub use illustrate::{
    preview_prompt, IllustrationRequest, Illustrator, RequestStage, UploadedPdf, ValidatedRequest,
};
pub use output::{IllustrationOutput, IllustrationStats};
pub use provider::{create_provider, GeneratedImage, ImageProvider};
