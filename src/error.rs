//! Error types for the edgequake-qrscan library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ScanError`] — **Fatal**: the invocation cannot proceed at all
//!   (bytes are not an image, document container is corrupt, pdfium cannot
//!   be bound). Returned as `Err(ScanError)` from the `decode_*` entry points.
//!
//! * [`AttemptError`] — **Non-fatal**: a single decoder call or a single page
//!   render failed, but every other variant, strategy and page still runs.
//!   Recorded in [`crate::output::DecodeResult::diagnostics`] and reported to
//!   the [`crate::diagnostics::DiagnosticsSink`].
//!
//! "No QR code found" is neither: it is a successful, empty
//! [`crate::output::DecodeResult`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-qrscan library.
///
/// Per-attempt failures use [`AttemptError`] and never abort an invocation.
#[derive(Debug, Error)]
pub enum ScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Neither the primary nor the secondary image codec could decode the bytes.
    #[error("Input is not a readable image: {detail}")]
    Unreadable { detail: String },

    /// The document container could not be parsed, so no page was rendered.
    #[error("Document is unsupported or corrupt: {detail}")]
    UnsupportedOrCorrupt { detail: String },

    /// The document is encrypted and no password was configured.
    #[error("Document is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was configured but the document rejected it.
    #[error("Wrong password for encrypted document")]
    WrongPassword,

    // ── Path helper errors ────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not in the accepted set.
    #[error("Unsupported input '{path}': {reason}")]
    UnsupportedInput { path: PathBuf, reason: String },

    // ── Backend errors ────────────────────────────────────────────────────
    /// A decoding or rendering backend is configured but cannot be used.
    #[error(
        "Backend '{backend}' is unavailable: {detail}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or --pdfium-lib) for document input,\n\
or check that the external decoder binary is installed and on PATH.\n"
    )]
    BackendUnavailable { backend: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for one decoder attempt or one page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// The decoder reported a failure for this bitmap.
    #[error("{decoder}: decode failed: {detail}")]
    DecoderFailed { decoder: String, detail: String },

    /// The decoder panicked; the panic was caught and the attempt discarded.
    #[error("{decoder}: decoder panicked")]
    DecoderPanicked { decoder: String },

    /// The external decoder did not finish in time and was killed.
    #[error("{decoder}: timed out after {secs}s")]
    Timeout { decoder: String, secs: u64 },

    /// The external decoder exited with a failure status.
    #[error("{decoder}: exited with status {code}: {stderr}")]
    NonZeroExit {
        decoder: String,
        code: i32,
        stderr: String,
    },

    /// A single page failed to render after the container was opened.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_display() {
        let e = ScanError::Unreadable {
            detail: "bad magic".into(),
        };
        assert!(e.to_string().contains("bad magic"));
    }

    #[test]
    fn backend_unavailable_display() {
        let e = ScanError::BackendUnavailable {
            backend: "pdfium".into(),
            detail: "library not found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("pdfium"), "got: {msg}");
        assert!(msg.contains("library not found"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = AttemptError::Timeout {
            decoder: "zbarimg".into(),
            secs: 10,
        };
        assert_eq!(e.to_string(), "zbarimg: timed out after 10s");
    }

    #[test]
    fn non_zero_exit_display() {
        let e = AttemptError::NonZeroExit {
            decoder: "zbarimg".into(),
            code: 4,
            stderr: "no symbols".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("status 4"), "got: {msg}");
        assert!(msg.contains("no symbols"), "got: {msg}");
    }

    #[test]
    fn render_failed_display() {
        let e = AttemptError::RenderFailed {
            page: 2,
            detail: "bitmap alloc".into(),
        };
        assert!(e.to_string().starts_with("Page 2"));
    }
}
