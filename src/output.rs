//! Data types flowing through and out of the decode pipeline.
//!
//! [`Bitmap`] and [`Page`] are per-invocation values: created by the
//! normalizer or rasterizer, consumed by the aggregator, dropped when the
//! call returns. [`DecodeResult`] is what callers keep.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;

// ── Techniques ───────────────────────────────────────────────────────────

/// The preprocessing technique that produced a [`Bitmap`].
///
/// Variants are listed in the fixed order the
/// [`crate::pipeline::variants`] stage emits them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// Grayscale input, unchanged.
    Original,
    /// Global binary threshold.
    Threshold,
    /// Gaussian-weighted local threshold.
    AdaptiveThreshold,
    /// 3×3 Gaussian smoothing.
    GaussianBlur,
    /// Global histogram equalisation.
    EqualizeHist,
}

impl Technique {
    /// All techniques in emission order.
    pub const ALL: [Technique; 5] = [
        Technique::Original,
        Technique::Threshold,
        Technique::AdaptiveThreshold,
        Technique::GaussianBlur,
        Technique::EqualizeHist,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Original => "original",
            Technique::Threshold => "threshold",
            Technique::AdaptiveThreshold => "adaptive_threshold",
            Technique::GaussianBlur => "gaussian_blur",
            Technique::EqualizeHist => "equalize_hist",
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Bitmap ───────────────────────────────────────────────────────────────

/// Pixel layout of a [`Bitmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Single-channel 8-bit luminance.
    Gray8,
    /// Three-channel 8-bit colour.
    Rgb8,
}

#[derive(Debug, Clone)]
enum Pixels {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// An owned, immutable raster plus the technique that produced it.
///
/// Every transform yields a new `Bitmap`; nothing mutates one in place.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: Pixels,
    technique: Technique,
}

impl Bitmap {
    pub fn gray(image: GrayImage, technique: Technique) -> Self {
        Self {
            pixels: Pixels::Gray(image),
            technique,
        }
    }

    pub fn rgb(image: RgbImage, technique: Technique) -> Self {
        Self {
            pixels: Pixels::Rgb(image),
            technique,
        }
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.width(),
            Pixels::Rgb(img) => img.width(),
        }
    }

    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Gray(img) => img.height(),
            Pixels::Rgb(img) => img.height(),
        }
    }

    pub fn format(&self) -> PixelFormat {
        match &self.pixels {
            Pixels::Gray(_) => PixelFormat::Gray8,
            Pixels::Rgb(_) => PixelFormat::Rgb8,
        }
    }

    pub fn technique(&self) -> Technique {
        self.technique
    }

    /// Luminance view of the pixels. Borrowed for grayscale bitmaps,
    /// converted for colour ones.
    pub fn luma(&self) -> Cow<'_, GrayImage> {
        match &self.pixels {
            Pixels::Gray(img) => Cow::Borrowed(img),
            Pixels::Rgb(img) => Cow::Owned(image::imageops::grayscale(img)),
        }
    }

    /// Consume the bitmap and return its grayscale form.
    pub fn into_gray(self) -> Bitmap {
        match self.pixels {
            Pixels::Gray(_) => self,
            Pixels::Rgb(img) => Bitmap::gray(image::imageops::grayscale(&img), self.technique),
        }
    }
}

// ── Page ─────────────────────────────────────────────────────────────────

/// One rendered page of a document.
#[derive(Debug, Clone)]
pub struct Page {
    /// 0-based position in the source document.
    pub index: usize,
    pub bitmap: Bitmap,
}

impl Page {
    /// 1-based page number, as shown to users.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

// ── Payload ──────────────────────────────────────────────────────────────

/// A decoded QR payload plus where it was first seen.
///
/// Equality is on `text` alone; `technique`, `decoder` and `page` are
/// diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    pub text: String,
    pub technique: Technique,
    pub decoder: String,
    /// 1-based page number for document input, `None` for single images.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Payload {}

// ── DecodeResult ─────────────────────────────────────────────────────────

/// Timing and effort counters for one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Bitmaps scanned: 1 for an image, the page count for a document.
    pub pages: usize,
    /// Pages that failed to render and contributed nothing.
    pub failed_pages: usize,
    pub variants_tried: usize,
    pub decoder_calls: usize,
    pub duration_ms: u64,
}

/// Ordered, duplicate-free payloads for one `decode_image` or
/// `decode_document` call.
///
/// Order is first-discovery order: technique order within a page, then
/// page order. An empty result means "no code found" and is a success.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodeResult {
    payloads: Vec<Payload>,
    /// Absorbed per-attempt failures, rendered as text.
    pub diagnostics: Vec<String>,
    pub stats: ScanStats,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl DecodeResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// Payload texts in discovery order.
    pub fn texts(&self) -> Vec<&str> {
        self.payloads.iter().map(|p| p.text.as_str()).collect()
    }

    pub fn into_texts(self) -> Vec<String> {
        self.payloads.into_iter().map(|p| p.text).collect()
    }

    pub fn contains(&self, text: &str) -> bool {
        self.seen.contains(text)
    }

    pub fn len(&self) -> usize {
        self.payloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    /// Append `payload` unless its text is already present.
    /// Returns `true` when it was added.
    pub(crate) fn push_unique(&mut self, payload: Payload) -> bool {
        if self.seen.contains(&payload.text) {
            return false;
        }
        self.seen.insert(payload.text.clone());
        self.payloads.push(payload);
        true
    }
}

impl PartialEq for DecodeResult {
    fn eq(&self, other: &Self) -> bool {
        self.payloads == other.payloads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(text: &str, technique: Technique) -> Payload {
        Payload {
            text: text.into(),
            technique,
            decoder: "test".into(),
            page: None,
        }
    }

    #[test]
    fn push_unique_keeps_first_seen() {
        let mut r = DecodeResult::new();
        assert!(r.push_unique(payload("A", Technique::Threshold)));
        assert!(!r.push_unique(payload("A", Technique::Original)));
        assert!(r.push_unique(payload("B", Technique::Original)));
        assert_eq!(r.texts(), vec!["A", "B"]);
        assert_eq!(r.payloads()[0].technique, Technique::Threshold);
    }

    #[test]
    fn payload_equality_ignores_provenance() {
        assert_eq!(
            payload("X", Technique::Original),
            payload("X", Technique::EqualizeHist)
        );
    }

    #[test]
    fn rgb_bitmap_converts_to_gray() {
        let rgb = RgbImage::from_pixel(4, 3, image::Rgb([255, 255, 255]));
        let bmp = Bitmap::rgb(rgb, Technique::Original);
        assert_eq!(bmp.format(), PixelFormat::Rgb8);
        assert_eq!(bmp.luma().get_pixel(0, 0).0[0], 255);

        let gray = bmp.into_gray();
        assert_eq!(gray.format(), PixelFormat::Gray8);
        assert_eq!((gray.width(), gray.height()), (4, 3));
    }

    #[test]
    fn technique_names_are_snake_case() {
        let names: Vec<_> = Technique::ALL.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "original",
                "threshold",
                "adaptive_threshold",
                "gaussian_blur",
                "equalize_hist"
            ]
        );
    }

    #[test]
    fn serialises_without_seen_set() {
        let mut r = DecodeResult::new();
        r.push_unique(payload("HELLO", Technique::Original));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["payloads"][0]["text"], "HELLO");
        assert_eq!(json["payloads"][0]["technique"], "original");
        assert!(json.get("seen").is_none());
    }
}
