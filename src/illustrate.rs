//! Request flow: validate → store → extract → prompt → generate → persist.
//!
//! [`Illustrator`] owns the provider and configuration and runs one request
//! at a time through the pipeline stages. Each request is strictly linear:
//! the first failing stage aborts the rest and its error is returned to the
//! caller, who decides how to render it. Nothing is shared between requests
//! except the two directories on disk.

use crate::config::IllustratorConfig;
use crate::error::Pdf2ImgError;
use crate::output::{IllustrationOutput, IllustrationStats};
use crate::pipeline::{extract, generate, input, persist};
use crate::prompts::{build_prompt, parse_grade};
use crate::provider::ImageProvider;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};
use uuid::Uuid;

/// An uploaded PDF as received from the client.
#[derive(Clone)]
pub struct UploadedPdf {
    /// Client-supplied filename. Informational only.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for UploadedPdf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedPdf")
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// The raw form submission.
#[derive(Debug, Clone, Default)]
pub struct IllustrationRequest {
    pub pdf: Option<UploadedPdf>,
    pub topic: String,
    pub grade: String,
}

/// A request whose fields are all present and whose grade parsed.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub pdf: UploadedPdf,
    pub topic: String,
    pub grade: i64,
}

impl IllustrationRequest {
    /// Check required fields and parse the grade.
    ///
    /// Runs before any disk or network work. Fields are checked in form
    /// order: file, topic, grade.
    pub fn validate(self) -> Result<ValidatedRequest, Pdf2ImgError> {
        let pdf = self
            .pdf
            .filter(|p| !p.bytes.is_empty())
            .ok_or(Pdf2ImgError::MissingField { field: "pdf" })?;

        let topic = self.topic.trim();
        if topic.is_empty() {
            return Err(Pdf2ImgError::MissingField { field: "topic" });
        }
        if self.grade.trim().is_empty() {
            return Err(Pdf2ImgError::MissingField { field: "grade" });
        }
        let grade = parse_grade(&self.grade)?;

        Ok(ValidatedRequest {
            pdf,
            topic: topic.to_string(),
            grade,
        })
    }
}

/// Where a request is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStage {
    Received,
    Extracted,
    Prompted,
    Generated,
    Persisted,
}

impl RequestStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStage::Received => "received",
            RequestStage::Extracted => "extracted",
            RequestStage::Prompted => "prompted",
            RequestStage::Generated => "generated",
            RequestStage::Persisted => "persisted",
        }
    }
}

impl fmt::Display for RequestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns PDF chapters into illustrations with one image provider.
#[derive(Clone)]
pub struct Illustrator {
    provider: Arc<dyn ImageProvider>,
    config: IllustratorConfig,
}

impl fmt::Debug for Illustrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Illustrator")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

impl Illustrator {
    pub fn new(provider: Arc<dyn ImageProvider>, config: IllustratorConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &IllustratorConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Run one request through every stage.
    ///
    /// # Errors
    /// Returns the first stage's `Pdf2ImgError`. Validation errors are
    /// returned before anything touches the disk or the provider. A failed
    /// request never leaves an output image behind.
    pub async fn illustrate(
        &self,
        request: IllustrationRequest,
    ) -> Result<IllustrationOutput, Pdf2ImgError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("illustrate", request_id = %request_id.simple());
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: IllustrationRequest) -> Result<IllustrationOutput, Pdf2ImgError> {
        let total_start = Instant::now();
        let request = request.validate().inspect_err(|e| {
            info!("Rejected request: {}", e);
        })?;

        let mut stage = None;
        let result = self.run_stages(request, total_start, &mut stage).await;
        if let Err(ref e) = result {
            let reached = stage.map(RequestStage::as_str).unwrap_or("validated");
            error!("Request failed after stage '{}': {}", reached, e);
        }
        result
    }

    async fn run_stages(
        &self,
        request: ValidatedRequest,
        total_start: Instant,
        stage: &mut Option<RequestStage>,
    ) -> Result<IllustrationOutput, Pdf2ImgError> {
        let config = &self.config;

        // ── Step 1: Store upload ─────────────────────────────────────────
        let stored = input::store_upload(
            &config.upload_dir,
            request.pdf.file_name.as_deref(),
            &request.pdf.bytes,
        )
        .await?;
        *stage = Some(RequestStage::Received);
        info!(
            "Received {:?} ({} bytes), topic={:?}, grade={}",
            stored.original_name.as_deref().unwrap_or("<unnamed>"),
            stored.size,
            request.topic,
            request.grade
        );

        // ── Step 2: Extract text ─────────────────────────────────────────
        let extract_start = Instant::now();
        let text = extract::extract_text(&stored.path, config.max_text_chars).await?;
        let extract_ms = extract_start.elapsed().as_millis() as u64;
        *stage = Some(RequestStage::Extracted);
        info!("Extracted {} chars in {}ms", text.chars().count(), extract_ms);

        // ── Step 3: Build prompt ─────────────────────────────────────────
        let prompt = build_prompt(
            config.prompt_policy,
            &request.topic,
            &text,
            request.grade,
            config.young_grade_max,
        );
        *stage = Some(RequestStage::Prompted);
        debug!("Prompt ({} chars): {}", prompt.chars().count(), prompt);

        // ── Step 4: Generate image ───────────────────────────────────────
        let outcome = generate::generate_image(self.provider.as_ref(), &prompt, config).await?;
        *stage = Some(RequestStage::Generated);
        info!(
            "{} produced an image in {}ms ({} attempt(s))",
            self.provider.name(),
            outcome.duration_ms,
            outcome.attempts
        );

        // ── Step 5: Persist PNG ──────────────────────────────────────────
        let saved =
            persist::persist_image(outcome.image, &config.output_dir, &config.output_url_prefix)
                .await?;
        *stage = Some(RequestStage::Persisted);

        let stats = IllustrationStats {
            extracted_chars: text.chars().count(),
            prompt_chars: prompt.chars().count(),
            attempts: outcome.attempts,
            extract_ms,
            generate_ms: outcome.duration_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        };
        info!("Illustration ready at {} in {}ms", saved.url, stats.total_ms);

        Ok(IllustrationOutput {
            image_url: saved.url,
            image_path: saved.path,
            prompt,
            stats,
        })
    }

    /// The prompt [`Illustrator::illustrate`] would send for this PDF.
    pub async fn preview_prompt(
        &self,
        pdf_path: &Path,
        topic: &str,
        grade: &str,
    ) -> Result<String, Pdf2ImgError> {
        preview_prompt(pdf_path, topic, grade, &self.config).await
    }
}

/// Extract text and build the prompt without calling any provider.
pub async fn preview_prompt(
    pdf_path: &Path,
    topic: &str,
    grade: &str,
    config: &IllustratorConfig,
) -> Result<String, Pdf2ImgError> {
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(Pdf2ImgError::MissingField { field: "topic" });
    }
    let grade = parse_grade(grade)?;
    let text = extract::extract_text(pdf_path, config.max_text_chars).await?;
    Ok(build_prompt(
        config.prompt_policy,
        topic,
        &text,
        grade,
        config.young_grade_max,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ProviderError};
    use crate::provider::GeneratedImage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts calls and always fails; validation tests must never reach it.
    struct Unreachable(AtomicU32);

    #[async_trait]
    impl ImageProvider for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ProviderError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(ProviderError::Transport {
                detail: "should not be called".into(),
            })
        }
    }

    fn pdf() -> Option<UploadedPdf> {
        Some(UploadedPdf {
            file_name: Some("chapter.pdf".into()),
            bytes: b"%PDF-1.4\n".to_vec(),
        })
    }

    fn request(pdf: Option<UploadedPdf>, topic: &str, grade: &str) -> IllustrationRequest {
        IllustrationRequest {
            pdf,
            topic: topic.into(),
            grade: grade.into(),
        }
    }

    #[test]
    fn validate_accepts_complete_request() {
        let v = request(pdf(), "  plants  ", "Grade 2").validate().unwrap();
        assert_eq!(v.topic, "plants");
        assert_eq!(v.grade, 2);
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let err = request(None, "", "").validate().unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MissingField { field: "pdf" }));

        let empty = Some(UploadedPdf {
            file_name: Some("x.pdf".into()),
            bytes: Vec::new(),
        });
        let err = request(empty, "t", "2").validate().unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MissingField { field: "pdf" }));

        let err = request(pdf(), "   ", "2").validate().unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MissingField { field: "topic" }));

        let err = request(pdf(), "t", " ").validate().unwrap_err();
        assert!(matches!(err, Pdf2ImgError::MissingField { field: "grade" }));
    }

    #[test]
    fn validate_rejects_bad_grade() {
        let err = request(pdf(), "t", "second").validate().unwrap_err();
        assert!(matches!(err, Pdf2ImgError::InvalidGrade { .. }));
    }

    #[tokio::test]
    async fn invalid_request_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = IllustratorConfig::builder()
            .upload_dir(dir.path().join("uploads"))
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        config.ensure_directories().await.unwrap();

        let provider = Arc::new(Unreachable(AtomicU32::new(0)));
        let illustrator = Illustrator::new(provider.clone(), config.clone());

        let err = illustrator
            .illustrate(request(pdf(), "plants", "Grade two"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(&config.upload_dir).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn corrupt_pdf_stops_before_provider() {
        let dir = tempfile::tempdir().unwrap();
        let config = IllustratorConfig::builder()
            .upload_dir(dir.path().join("uploads"))
            .output_dir(dir.path().join("output"))
            .build()
            .unwrap();
        config.ensure_directories().await.unwrap();

        let provider = Arc::new(Unreachable(AtomicU32::new(0)));
        let illustrator = Illustrator::new(provider.clone(), config.clone());

        let broken = Some(UploadedPdf {
            file_name: None,
            bytes: b"%PDF-1.4\ngarbage without any objects".to_vec(),
        });
        let err = illustrator
            .illustrate(request(broken, "plants", "5"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert_eq!(provider.0.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn stage_names() {
        assert_eq!(RequestStage::Received.to_string(), "received");
        assert_eq!(RequestStage::Persisted.as_str(), "persisted");
    }
}
