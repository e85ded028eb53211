//! The [`Scanner`]: entry points for image and document decoding.
//!
//! ## Sync core, async wrappers
//!
//! Every stage is CPU-bound or blocks on a child process, so the core API is
//! synchronous. The `_async` variants move the same call onto
//! `tokio::task::spawn_blocking` so Tokio worker threads never stall on
//! rasterisation or an external decoder.
//!
//! ## Sharing
//!
//! A `Scanner` holds only its configuration, a stateless [`DecoderEngine`]
//! and a diagnostics sink. Cloning is cheap and clones may run concurrently;
//! each call owns its bitmaps, pages and temporary files.

use crate::config::ScanConfig;
use crate::diagnostics::{SharedSink, TracingSink};
use crate::error::ScanError;
use crate::output::DecodeResult;
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::decoders::DecoderEngine;
use crate::pipeline::input::{self, InputKind};
use crate::pipeline::normalize::normalize;
use crate::pipeline::render::{rasterize, RenderOptions};
use crate::pipeline::variants::VariantParams;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Multi-variant, multi-decoder QR scanner.
///
/// # Example
/// ```rust,no_run
/// use edgequake_qrscan::{ScanConfig, Scanner};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let scanner = Scanner::new(ScanConfig::default())?;
/// let bytes = std::fs::read("ticket.png")?;
/// let result = scanner.decode_image(&bytes, Some("png"))?;
/// for text in result.texts() {
///     println!("{text}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scanner {
    config: Arc<ScanConfig>,
    engine: DecoderEngine,
    sink: SharedSink,
}

impl Scanner {
    /// Build a scanner with the standard decoder chain.
    ///
    /// # Errors
    /// [`ScanError::InvalidConfig`] when `config` breaks a constraint,
    /// [`ScanError::BackendUnavailable`] when an external decoder is
    /// configured but cannot be spawned.
    pub fn new(config: ScanConfig) -> Result<Self, ScanError> {
        config.validate()?;
        let engine = DecoderEngine::from_config(&config)?;
        Self::with_engine(config, engine)
    }

    /// Build a scanner around a custom decoder chain.
    ///
    /// # Errors
    /// [`ScanError::InvalidConfig`] when `config` breaks a constraint.
    pub fn with_engine(config: ScanConfig, engine: DecoderEngine) -> Result<Self, ScanError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            engine,
            sink: Arc::new(TracingSink),
        })
    }

    /// Replace the diagnostics sink (default: [`TracingSink`]).
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn engine(&self) -> &DecoderEngine {
        &self.engine
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::new(
            &self.engine,
            VariantParams::from(&*self.config),
            self.sink.as_ref(),
        )
    }

    /// Decode every QR code in one raster image.
    ///
    /// `content_hint` is a file extension or MIME type (`"png"`,
    /// `"image/jpeg"`) used when the format cannot be sniffed.
    ///
    /// # Errors
    /// [`ScanError::Unreadable`] when the bytes are not a decodable image.
    /// Finding no code is `Ok` with an empty result.
    pub fn decode_image(
        &self,
        bytes: &[u8],
        content_hint: Option<&str>,
    ) -> Result<DecodeResult, ScanError> {
        let start = Instant::now();
        let gray = normalize(bytes, content_hint, self.config.max_dimension)?;
        let mut result = self.aggregator().decode_image(&gray);
        result.stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Image scan: {} payload(s) in {}ms",
            result.len(),
            result.stats.duration_ms
        );
        Ok(result)
    }

    /// Decode every QR code on every page of a PDF document.
    ///
    /// # Errors
    /// [`ScanError::UnsupportedOrCorrupt`] when the container cannot be
    /// parsed, [`ScanError::PasswordRequired`] / [`ScanError::WrongPassword`]
    /// for encrypted documents, [`ScanError::BackendUnavailable`] when pdfium
    /// cannot be loaded. Pages that fail to render are skipped and listed in
    /// [`DecodeResult::diagnostics`].
    pub fn decode_document(&self, bytes: &[u8]) -> Result<DecodeResult, ScanError> {
        let start = Instant::now();
        let pages = rasterize(bytes, &RenderOptions::from(&*self.config))?;
        let mut result = self.aggregator().decode_document(pages);
        result.stats.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Document scan: {} payload(s) from {} page(s) in {}ms",
            result.len(),
            result.stats.pages,
            result.stats.duration_ms
        );
        Ok(result)
    }

    /// Read `path` and dispatch to [`Self::decode_image`] or
    /// [`Self::decode_document`].
    ///
    /// Accepts `.png`, `.jpg`, `.jpeg` and `.pdf`; a `%PDF` header routes to
    /// the document path whatever the extension says.
    pub fn decode_file(&self, path: impl AsRef<Path>) -> Result<DecodeResult, ScanError> {
        let loaded = input::load(path.as_ref())?;
        match loaded.kind {
            InputKind::Image => self.decode_image(&loaded.bytes, loaded.hint.as_deref()),
            InputKind::Document => self.decode_document(&loaded.bytes),
        }
    }

    /// [`Self::decode_image`] on the blocking thread pool.
    pub async fn decode_image_async(
        &self,
        bytes: Vec<u8>,
        content_hint: Option<String>,
    ) -> Result<DecodeResult, ScanError> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.decode_image(&bytes, content_hint.as_deref()))
            .await
            .map_err(|e| ScanError::Internal(format!("Image scan task panicked: {}", e)))?
    }

    /// [`Self::decode_document`] on the blocking thread pool.
    pub async fn decode_document_async(&self, bytes: Vec<u8>) -> Result<DecodeResult, ScanError> {
        let scanner = self.clone();
        tokio::task::spawn_blocking(move || scanner.decode_document(&bytes))
            .await
            .map_err(|e| ScanError::Internal(format!("Document scan task panicked: {}", e)))?
    }

    /// [`Self::decode_file`] on the blocking thread pool.
    pub async fn decode_file_async(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<DecodeResult, ScanError> {
        let scanner = self.clone();
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || scanner.decode_file(&path))
            .await
            .map_err(|e| ScanError::Internal(format!("File scan task panicked: {}", e)))?
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("config", &self.config)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

/// Convenience: scan one image with the default configuration.
pub fn decode_image(bytes: &[u8], content_hint: Option<&str>) -> Result<DecodeResult, ScanError> {
    Scanner::new(ScanConfig::default())?.decode_image(bytes, content_hint)
}

/// Convenience: scan one PDF document with the default configuration.
pub fn decode_document(bytes: &[u8]) -> Result<DecodeResult, ScanError> {
    Scanner::new(ScanConfig::default())?.decode_document(bytes)
}
