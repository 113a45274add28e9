//! Shared fixtures for integration tests: real PDFs built with `lopdf` and
//! stub image providers.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2img::{GeneratedImage, IllustratorConfig, ImageProvider, ProviderError};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::Mutex;

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// Build a PDF with one page per entry, each page showing its lines of text.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = Vec::new();
        if !lines.is_empty() {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
            operations.push(Operation::new("Td", vec![50.into(), 780.into()]));
            for line in *lines {
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("Td", vec![0.into(), (-14).into()]));
            }
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serialises");
    bytes
}

/// One-page PDF with a single line of text.
pub fn single_page_pdf(text: &str) -> Vec<u8> {
    pdf_with_pages(&[&[text]])
}

// ── Config ───────────────────────────────────────────────────────────────────

/// Config rooted in `dir`, with directories created and fast retries.
pub fn test_config(dir: &Path) -> IllustratorConfig {
    let config = IllustratorConfig::builder()
        .upload_dir(dir.join("uploads"))
        .output_dir(dir.join("static/output"))
        .retry_backoff_ms(1)
        .api_timeout_secs(5)
        .build()
        .expect("valid test config");
    std::fs::create_dir_all(&config.upload_dir).expect("upload dir");
    std::fs::create_dir_all(&config.output_dir).expect("output dir");
    config
}

/// Names of the PNG files currently in `dir`.
pub fn png_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("readable dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".png"))
        .collect();
    names.sort();
    names
}

// ── Providers ────────────────────────────────────────────────────────────────

/// Returns a 10×10 solid-colour image and records every prompt.
#[derive(Default)]
pub struct SolidImageProvider {
    prompts: Mutex<Vec<String>>,
}

impl SolidImageProvider {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for SolidImageProvider {
    fn name(&self) -> &str {
        "solid-stub"
    }

    async fn generate(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(GeneratedImage::Decoded(DynamicImage::ImageRgb8(
            RgbImage::from_pixel(10, 10, Rgb([30, 144, 255])),
        )))
    }
}

/// Always fails with the given error.
pub struct FailingProvider(pub ProviderError);

#[async_trait]
impl ImageProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing-stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<GeneratedImage, ProviderError> {
        Err(self.0.clone())
    }
}
