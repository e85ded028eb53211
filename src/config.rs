//! Configuration types for QR decoding.
//!
//! All pipeline behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. The config is plain data: it can be cloned across
//! threads, serialised for logging, and compared between runs.

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a [`crate::Scanner`].
///
/// # Example
/// ```rust
/// use edgequake_qrscan::{ExternalDecoderConfig, ScanConfig};
///
/// let config = ScanConfig::builder()
///     .dpi(200)
///     .max_dimension(1600)
///     .external_decoder(ExternalDecoderConfig::zbarimg())
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Maximum image width in pixels before the normalizer downscales. Default: 2000.
    ///
    /// Large phone photos and flatbed scans carry far more pixels than a QR
    /// detector needs. Capping the width keeps the five-variant sweep cheap.
    pub max_dimension: u32,

    /// Rasterisation DPI for document pages. Range: 72–600. Default: 300.
    ///
    /// 300 DPI resolves the modules of typical printed QR codes; lower values
    /// start losing small symbols.
    pub dpi: u32,

    /// Upper bound on the longest rendered page edge in pixels. Default: 10 000.
    ///
    /// An A0 poster at 300 DPI would otherwise allocate ~14 000 × 10 000 px.
    pub max_render_dimension: u32,

    /// Global threshold cut for the `threshold` variant. Default: 127.
    pub threshold: u8,

    /// Neighbourhood size of the adaptive threshold (odd, ≥ 3). Default: 11.
    pub adaptive_block_size: u32,

    /// Constant subtracted from the local weighted mean. Default: 2.
    pub adaptive_offset: i32,

    /// Password for encrypted documents.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library.
    ///
    /// When `None`, `PDFIUM_LIB_PATH` is consulted, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Out-of-process decoder used as the last fallback. Default: disabled.
    pub external_decoder: Option<ExternalDecoderConfig>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_dimension: 2000,
            dpi: 300,
            max_render_dimension: 10_000,
            threshold: 127,
            adaptive_block_size: 11,
            adaptive_offset: 2,
            password: None,
            pdfium_lib_path: None,
            external_decoder: None,
        }
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every constraint the builder enforces.
    ///
    /// Configs loaded through serde or written as struct literals never pass
    /// through [`ScanConfigBuilder::build`]; [`crate::Scanner`] calls this on
    /// construction so they are held to the same rules.
    pub fn validate(&self) -> Result<(), ScanError> {
        if self.max_dimension < 100 {
            return Err(ScanError::InvalidConfig(format!(
                "Max dimension must be ≥ 100, got {}",
                self.max_dimension
            )));
        }
        if !(72..=600).contains(&self.dpi) {
            return Err(ScanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                self.dpi
            )));
        }
        if self.adaptive_block_size < 3 || self.adaptive_block_size % 2 == 0 {
            return Err(ScanError::InvalidConfig(format!(
                "Adaptive block size must be odd and ≥ 3, got {}",
                self.adaptive_block_size
            )));
        }
        if self.max_render_dimension < 100 {
            return Err(ScanError::InvalidConfig(format!(
                "Max render dimension must be ≥ 100, got {}",
                self.max_render_dimension
            )));
        }
        if let Some(ref ext) = self.external_decoder {
            if ext.program.as_os_str().is_empty() {
                return Err(ScanError::InvalidConfig(
                    "External decoder program must not be empty".into(),
                ));
            }
            if ext.timeout_secs == 0 {
                return Err(ScanError::InvalidConfig(
                    "External decoder timeout must be ≥ 1s".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Builder for [`ScanConfig`].
#[derive(Debug)]
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(100);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_render_dimension(mut self, px: u32) -> Self {
        self.config.max_render_dimension = px;
        self
    }

    pub fn threshold(mut self, cut: u8) -> Self {
        self.config.threshold = cut;
        self
    }

    pub fn adaptive_block_size(mut self, size: u32) -> Self {
        self.config.adaptive_block_size = size;
        self
    }

    pub fn adaptive_offset(mut self, offset: i32) -> Self {
        self.config.adaptive_offset = offset;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn external_decoder(mut self, decoder: ExternalDecoderConfig) -> Self {
        self.config.external_decoder = Some(decoder);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, ScanError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// An out-of-process decoding tool.
///
/// The bitmap is written to a temporary PNG whose path is appended after
/// `args`; payloads are read from the tool's standard output, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalDecoderConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Wall-clock limit for one invocation; the child is killed past it.
    pub timeout_secs: u64,
}

impl ExternalDecoderConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_secs: 10,
        }
    }

    /// `zbarimg --quiet --raw <file>` with a 10 s limit.
    pub fn zbarimg() -> Self {
        Self::new("zbarimg").args(["--quiet", "--raw"])
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Short display name, e.g. `zbarimg`.
    pub fn name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}
