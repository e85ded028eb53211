//! # edgequake-qrscan
//!
//! Recover QR code payloads from raster images and PDF documents.
//!
//! ## Why this crate?
//!
//! Real-world QR codes arrive as phone photos with uneven lighting, low-contrast
//! photocopies, and small symbols on scanned multi-page PDFs. A single decoder
//! call on a single image misses many of them. This crate runs every page
//! through five cheap preprocessing variants and a chain of decoders, then
//! returns every distinct payload in the order it was first found.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes
//!  │
//!  ├─ 1. Normalize  decode image (two codecs), cap width at 2000 px, grayscale
//!  │    or Render   rasterise each PDF page at 300 DPI via pdfium
//!  ├─ 2. Variants   original · threshold · adaptive · blur · equalised
//!  ├─ 3. Decode     rqrr on every variant; fallbacks only if all were empty
//!  └─ 4. Aggregate  first-seen order, no duplicate text across the document
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_qrscan::{ScanConfig, Scanner};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = Scanner::new(ScanConfig::default())?;
//!     let result = scanner.decode_file("invoice.pdf")?;
//!     if result.is_empty() {
//!         eprintln!("no QR code found");
//!     }
//!     for payload in result.payloads() {
//!         println!("{} (via {} on {})", payload.text, payload.decoder, payload.technique);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Errors
//!
//! Fatal input problems are [`ScanError`]s. Per-attempt failures (a decoder
//! erroring, an external tool timing out, one page failing to render) never
//! abort a scan; they are listed in [`DecodeResult::diagnostics`] and reported
//! to the [`DiagnosticsSink`]. No code found is `Ok` with an empty result.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qrscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-qrscan = { version = "0.1", default-features = false }
//! ```
//!
//! ## Document input
//!
//! PDF rendering needs the pdfium shared library at run time. Point
//! [`ScanConfig::pdfium_lib_path`] or `PDFIUM_LIB_PATH` at it, or install it
//! on the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExternalDecoderConfig, ScanConfig, ScanConfigBuilder};
pub use diagnostics::{DiagnosticsSink, NoopSink, SharedSink, TracingSink};
pub use error::{AttemptError, ScanError};
pub use output::{Bitmap, DecodeResult, Page, Payload, PixelFormat, ScanStats, Technique};
pub use pipeline::decoders::{Decoder, DecoderEngine};
pub use scan::{decode_document, decode_image, Scanner};
