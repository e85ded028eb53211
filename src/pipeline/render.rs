//! Document rasterisation: render every page to a bitmap via pdfium.
//!
//! ## Binding
//!
//! The pdfium shared library is located in this order:
//! 1. [`ScanConfig::pdfium_lib_path`](crate::ScanConfig::pdfium_lib_path)
//! 2. the `PDFIUM_LIB_PATH` environment variable
//! 3. the system library search path
//!
//! Failure to bind is [`ScanError::BackendUnavailable`]: the caller asked for
//! document input and the backend for it is missing.
//!
//! ## Failure granularity
//!
//! Opening the container is all-or-nothing: a document pdfium cannot parse
//! yields [`ScanError::UnsupportedOrCorrupt`] and no pages. Once open, each
//! page renders independently; a page that fails becomes an
//! [`AttemptError::RenderFailed`] in its slot and the rest still render.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Page sizes vary wildly: an A0 poster at 300 DPI would produce a
//! 14,000 × 10,000 px bitmap. `max_render_dimension` caps the longest edge
//! regardless of physical size, keeping memory bounded.

use crate::config::ScanConfig;
use crate::error::{AttemptError, ScanError};
use crate::output::{Bitmap, Page, Technique};
use crate::pipeline::aggregate::PageOutcome;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Render settings extracted from [`ScanConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub dpi: u32,
    pub max_dimension: u32,
    pub password: Option<String>,
    pub lib_path: Option<PathBuf>,
}

impl From<&ScanConfig> for RenderOptions {
    fn from(config: &ScanConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_dimension: config.max_render_dimension,
            password: config.password.clone(),
            lib_path: config.pdfium_lib_path.clone(),
        }
    }
}

impl RenderOptions {
    /// Page scale factor: PDF user space is 72 units per inch.
    pub fn scale(&self) -> f32 {
        self.dpi as f32 / 72.0
    }
}

/// Bind to the pdfium library.
pub fn bind_pdfium(lib_path: Option<&std::path::Path>) -> Result<Pdfium, ScanError> {
    let unavailable = |detail: String| ScanError::BackendUnavailable {
        backend: "pdfium".into(),
        detail,
    };

    let explicit = lib_path
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match explicit {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
                .map_err(|e| unavailable(format!("{}: {:?}", path.display(), e)))?
        }
        None => Pdfium::bind_to_system_library().map_err(|e| unavailable(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Render every page of `bytes`, in document order.
///
/// The returned vector has exactly one entry per page.
pub fn rasterize(bytes: &[u8], opts: &RenderOptions) -> Result<Vec<PageOutcome>, ScanError> {
    let pdfium = bind_pdfium(opts.lib_path.as_deref())?;
    let password = opts.password.as_deref();

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(&e, password.is_some()))?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("Document loaded: {} page(s)", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(opts.scale())
        .set_maximum_width(opts.max_dimension as i32)
        .set_maximum_height(opts.max_dimension as i32);

    let mut results = Vec::with_capacity(total_pages);
    for idx in 0..total_pages {
        match render_page(&pages, idx, &render_config) {
            Ok(image) => {
                debug!(
                    "Rendered page {} → {}x{} px",
                    idx + 1,
                    image.width(),
                    image.height()
                );
                let bitmap = Bitmap::rgb(image.to_rgb8(), Technique::Original).into_gray();
                results.push(Ok(Page { index: idx, bitmap }));
            }
            Err(e) => {
                warn!("Page {} failed to render: {:?}", idx + 1, e);
                results.push(Err(AttemptError::RenderFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }));
            }
        }
    }

    Ok(results)
}

fn render_page(
    pages: &PdfPages<'_>,
    idx: usize,
    config: &PdfRenderConfig,
) -> Result<DynamicImage, PdfiumError> {
    let page = pages.get(idx as u16)?;
    let bitmap = page.render_with_config(config)?;
    Ok(bitmap.as_image())
}

fn classify_load_error(e: &PdfiumError, had_password: bool) -> ScanError {
    let err_str = format!("{:?}", e);
    if err_str.contains("Password") || err_str.contains("password") {
        if had_password {
            ScanError::WrongPassword
        } else {
            ScanError::PasswordRequired
        }
    } else {
        ScanError::UnsupportedOrCorrupt { detail: err_str }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = ScanConfig::builder()
            .dpi(150)
            .password("pw")
            .build()
            .unwrap();
        let opts = RenderOptions::from(&config);
        assert_eq!(opts.dpi, 150);
        assert_eq!(opts.max_dimension, 10_000);
        assert_eq!(opts.password.as_deref(), Some("pw"));
        assert!((opts.scale() - 150.0 / 72.0).abs() < f32::EPSILON);
    }

    #[test]
    fn default_scale_is_300_dpi() {
        let opts = RenderOptions::from(&ScanConfig::default());
        assert!((opts.scale() - 300.0 / 72.0).abs() < 1e-6);
    }

    #[test]
    fn missing_library_is_backend_unavailable() {
        let err = bind_pdfium(Some(std::path::Path::new(
            "/nonexistent/libpdfium-qrscan-test.so",
        )))
        .err()
        .expect("bind must fail");
        assert!(
            matches!(err, ScanError::BackendUnavailable { ref backend, .. } if backend == "pdfium"),
            "got {err:?}"
        );
    }

    #[test]
    fn password_errors_are_classified() {
        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(classify_load_error(&e, false), ScanError::PasswordRequired));
        assert!(matches!(classify_load_error(&e, true), ScanError::WrongPassword));

        let e = PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        assert!(matches!(
            classify_load_error(&e, false),
            ScanError::UnsupportedOrCorrupt { .. }
        ));
    }
}
