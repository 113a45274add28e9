//! Text extraction: concatenate the text of every page, then truncate.
//!
//! `pdf-extract` is synchronous and CPU-bound, so extraction runs on the
//! blocking pool. The parser can panic on malformed input rather than
//! returning an error; panics are caught and reported as
//! [`Pdf2ImgError::CorruptPdf`] so one bad upload cannot take down a worker.

use crate::error::Pdf2ImgError;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::debug;

/// Extract the text of the PDF at `path`, at most `max_chars` characters.
///
/// Pages are concatenated in document order with no separators beyond what
/// the parser emits. Surrounding whitespace is trimmed, so a PDF without any
/// text yields the empty string.
pub async fn extract_text(path: &Path, max_chars: usize) -> Result<String, Pdf2ImgError> {
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_text_blocking(&path, max_chars))
        .await
        .map_err(|e| Pdf2ImgError::Internal(format!("Extraction task failed: {}", e)))?
}

/// Blocking implementation of [`extract_text`].
fn extract_text_blocking(path: &Path, max_chars: usize) -> Result<String, Pdf2ImgError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text(path)));

    let text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(Pdf2ImgError::CorruptPdf {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })
        }
        Err(payload) => {
            return Err(Pdf2ImgError::CorruptPdf {
                path: path.to_path_buf(),
                detail: format!("parser panicked: {}", panic_message(payload.as_ref())),
            })
        }
    };

    let truncated = truncate_chars(text.trim(), max_chars);
    debug!(
        "Extracted {} chars from {} (kept {})",
        text.chars().count(),
        path.display(),
        truncated.chars().count()
    );
    Ok(truncated)
}

/// Keep the first `max_chars` characters of `text`, never splitting a char.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
