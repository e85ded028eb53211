//! Image normalisation: raw bytes → grayscale [`Bitmap`] of bounded width.
//!
//! Both decode paths use the `image` crate's codecs:
//!
//! 1. `image::load_from_memory`: format sniffed from magic bytes, default
//!    allocation limits.
//! 2. A retry through `ImageReader` that takes the format from the caller's
//!    content hint (extension or MIME type) when one is given, and lifts the
//!    allocation limits. It only rescues input whose magic is unrecognised
//!    but whose hint names a known format, or very large scans that trip the
//!    default limits. Without a hint, unrecognised bytes fail here too.
//!
//! Width above `max_dimension` is reduced with area averaging
//! ([`image::imageops::thumbnail`]) keeping the aspect ratio.

use crate::error::ScanError;
use crate::output::{Bitmap, Technique};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Decode `bytes` into the canonical grayscale bitmap.
pub fn normalize(
    bytes: &[u8],
    content_hint: Option<&str>,
    max_dimension: u32,
) -> Result<Bitmap, ScanError> {
    let image = match image::load_from_memory(bytes) {
        Ok(img) => img,
        Err(primary) => {
            debug!("Sniffed decode failed ({}), retrying with hint and no limits", primary);
            decode_secondary(bytes, content_hint).map_err(|secondary| ScanError::Unreadable {
                detail: format!("{primary}; fallback: {secondary}"),
            })?
        }
    };

    let gray = downscale(to_gray(image), max_dimension);
    debug!("Normalised image → {}x{} px", gray.width(), gray.height());
    Ok(Bitmap::gray(gray, Technique::Original))
}

/// Convert any decoded image to 8-bit luminance.
pub fn to_gray(image: DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray,
        other => other.to_luma8(),
    }
}

/// Shrink `gray` so its width is at most `max_width`, preserving aspect ratio.
pub fn downscale(gray: GrayImage, max_width: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w <= max_width || w == 0 {
        return gray;
    }
    let new_h = ((h as f64) * (max_width as f64) / (w as f64)).round().max(1.0) as u32;
    debug!("Downscaling {}x{} → {}x{}", w, h, max_width, new_h);
    image::imageops::thumbnail(&gray, max_width, new_h)
}

/// Map a content hint (`"png"`, `".JPG"`, `"image/webp"`) to an image format.
pub fn hinted_format(hint: &str) -> Option<ImageFormat> {
    let hint = hint.trim();
    if hint.contains('/') {
        return ImageFormat::from_mime_type(hint);
    }
    ImageFormat::from_extension(hint.trim_start_matches('.').to_ascii_lowercase())
}

fn decode_secondary(bytes: &[u8], content_hint: Option<&str>) -> Result<DynamicImage, String> {
    let mut reader = match content_hint.and_then(hinted_format) {
        Some(format) => ImageReader::with_format(Cursor::new(bytes), format),
        None => ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())?,
    };
    if reader.format().is_none() {
        return Err("unknown image format".to_string());
    }
    reader.no_limits();
    reader.decode().map_err(|e| e.to_string())
}
