//! Input storage: move an uploaded PDF into the upload holding area.
//!
//! The on-disk name is always a fresh UUID. The client-supplied filename is
//! kept only for logging, so two users uploading `chapter1.pdf` at the same
//! time never overwrite each other's input. The `%PDF` magic is checked
//! before anything touches the disk so the extractor only ever sees
//! plausible PDF files.

use super::persist::write_new;
use crate::error::Pdf2ImgError;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// A PDF written to the upload holding area.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Random identifier the file is stored under.
    pub id: Uuid,
    /// Absolute or config-relative path of the stored file.
    pub path: PathBuf,
    /// Filename the client sent, if any. Never used to build paths.
    pub original_name: Option<String>,
    /// Size in bytes.
    pub size: usize,
}

/// Check the `%PDF` magic bytes.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Validate and store an uploaded PDF under a unique name.
pub async fn store_upload(
    upload_dir: &Path,
    original_name: Option<&str>,
    bytes: &[u8],
) -> Result<StoredUpload, Pdf2ImgError> {
    if bytes.is_empty() {
        return Err(Pdf2ImgError::MissingField { field: "pdf" });
    }
    if !is_pdf(bytes) {
        return Err(Pdf2ImgError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        });
    }

    let id = Uuid::new_v4();
    let path = upload_dir.join(format!("{}.pdf", id.simple()));

    write_new(&path, bytes)
        .await
        .map_err(|e| Pdf2ImgError::UploadWriteFailed {
            path: path.clone(),
            source: e,
        })?;

    debug!(
        "Stored upload {:?} ({} bytes) as {}",
        original_name.unwrap_or("<unnamed>"),
        bytes.len(),
        path.display()
    );

    Ok(StoredUpload {
        id,
        path,
        original_name: original_name.map(str::to_string),
        size: bytes.len(),
    })
}
