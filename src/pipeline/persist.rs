//! Output persistence: write one PNG per request under a fresh name.
//!
//! Files are created with `create_new`, so an existing file is never
//! overwritten even if two UUIDs collided. A failed write removes the
//! partial file before the error is returned, leaving no half-written
//! image behind for the static route to serve.

use crate::error::Pdf2ImgError;
use crate::pipeline::encode::encode_png;
use crate::provider::GeneratedImage;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fresh names tried before giving up on collisions.
const MAX_NAME_ATTEMPTS: usize = 3;

/// A PNG written to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedImage {
    /// `<32 hex chars>.png`
    pub file_name: String,
    pub path: PathBuf,
    /// Relative URL the static route serves the file under.
    pub url: String,
}

/// Convert `image` to PNG bytes.
///
/// Provider-encoded PNG passes through untouched. Anything else is decoded
/// and re-encoded as 8-bit RGB PNG.
pub fn to_png_bytes(image: GeneratedImage) -> Result<Vec<u8>, Pdf2ImgError> {
    let encode_failed = |e: image::ImageError| Pdf2ImgError::ImageEncodeFailed {
        detail: e.to_string(),
    };

    match image {
        GeneratedImage::Decoded(img) => encode_png(&img).map_err(encode_failed),
        GeneratedImage::Encoded { bytes, mime_type } => {
            if matches!(image::guess_format(&bytes), Ok(image::ImageFormat::Png)) {
                return Ok(bytes);
            }
            debug!("Re-encoding {} provider image as PNG", mime_type);
            let img = image::load_from_memory(&bytes).map_err(encode_failed)?;
            encode_png(&img).map_err(encode_failed)
        }
    }
}

/// Encode `image` and write it to `output_dir` under a fresh random name.
pub async fn persist_image(
    image: GeneratedImage,
    output_dir: &Path,
    url_prefix: &str,
) -> Result<PersistedImage, Pdf2ImgError> {
    let png = to_png_bytes(image)?;

    let mut last_err = None;
    for _ in 0..MAX_NAME_ATTEMPTS {
        let file_name = format!("{}.png", Uuid::new_v4().simple());
        let path = output_dir.join(&file_name);

        match write_new(&path, &png).await {
            Ok(()) => {
                let url = format!("{}/{}", url_prefix.trim_end_matches('/'), file_name);
                info!("Saved image: {} ({} bytes)", path.display(), png.len());
                return Ok(PersistedImage {
                    file_name,
                    path,
                    url,
                });
            }
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                warn!("Output name collision at {}, picking another", path.display());
                last_err = Some((path, e));
            }
            Err(e) => return Err(Pdf2ImgError::OutputWriteFailed { path, source: e }),
        }
    }

    let (path, source) = last_err.ok_or_else(|| {
        Pdf2ImgError::Internal("no output name attempted".to_string())
    })?;
    Err(Pdf2ImgError::OutputWriteFailed { path, source })
}

/// Create `path` exclusively and write `bytes`, removing it on failure.
pub(crate) async fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        if let Err(rm) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial file {}: {}", path.display(), rm);
        }
        return Err(e);
    }
    Ok(())
}
