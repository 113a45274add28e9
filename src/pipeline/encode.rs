//! Image encoding: `DynamicImage` → 3-channel RGB PNG bytes.
//!
//! Providers hand back images in whatever colour mode they like (RGBA,
//! grayscale, 16-bit). The static output is always 8-bit RGB PNG so every
//! browser renders it the same way, hence the explicit conversion before
//! encoding.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Convert `img` to RGB and encode it as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(buf)
}

/// Decode base64 image data as returned in provider JSON payloads.
pub fn decode_base64(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(data.trim())
}
