//! Input resolution: read a user-supplied path into bytes and decide which
//! entry point handles it.
//!
//! The decode core only ever sees byte buffers. This helper is the path-based
//! convenience on top: it enforces the accepted extensions and sniffs the
//! `%PDF` magic so a mislabelled document still reaches the rasterizer.

use crate::error::ScanError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions accepted by [`load`], lower-case.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

const PDF_MAGIC: &[u8] = b"%PDF";

/// Which pipeline entry point an input belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Image,
    Document,
}

/// File contents plus routing information.
#[derive(Debug)]
pub struct LoadedInput {
    pub path: PathBuf,
    pub kind: InputKind,
    pub bytes: Vec<u8>,
    /// Lower-cased extension, passed to the image normalizer as a hint.
    pub hint: Option<String>,
}

/// Read `path` and classify it.
pub fn load(path: &Path) -> Result<LoadedInput, ScanError> {
    let ext = extension(path);
    match ext.as_deref() {
        Some(e) if ACCEPTED_EXTENSIONS.contains(&e) => {}
        _ => {
            return Err(ScanError::UnsupportedInput {
                path: path.to_path_buf(),
                reason: format!(
                    "expected one of: {}",
                    ACCEPTED_EXTENSIONS.join(", ")
                ),
            })
        }
    }

    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ScanError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => ScanError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ScanError::Internal(format!("Failed to read {}: {}", path.display(), e)),
    })?;

    let kind = classify(path, &bytes)?;
    debug!("Resolved {} as {:?} ({} bytes)", path.display(), kind, bytes.len());

    Ok(LoadedInput {
        path: path.to_path_buf(),
        kind,
        bytes,
        hint: ext,
    })
}

/// Route `bytes` by magic first, extension second.
///
/// A `.pdf` file without the `%PDF` header is rejected here rather than
/// handed to pdfium.
pub fn classify(path: &Path, bytes: &[u8]) -> Result<InputKind, ScanError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(InputKind::Document);
    }
    if extension(path).as_deref() == Some("pdf") {
        let magic: Vec<String> = bytes.iter().take(4).map(|b| format!("{b:02x}")).collect();
        return Err(ScanError::UnsupportedInput {
            path: path.to_path_buf(),
            reason: format!("missing %PDF header (found {})", magic.join(" ")),
        });
    }
    Ok(InputKind::Image)
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        f.write_all(bytes).unwrap();
        f
    }

    #[test]
    fn rejects_unlisted_extension() {
        let f = write_temp(".gif", b"GIF89a");
        let err = load(f.path()).unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedInput { .. }), "got {err:?}");
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let f = write_temp(".PNG", b"\x89PNG\r\n\x1a\n");
        let input = load(f.path()).unwrap();
        assert_eq!(input.kind, InputKind::Image);
        assert_eq!(input.hint.as_deref(), Some("png"));
    }

    #[test]
    fn pdf_magic_wins_over_extension() {
        let f = write_temp(".jpg", b"%PDF-1.7\n");
        assert_eq!(load(f.path()).unwrap().kind, InputKind::Document);
    }

    #[test]
    fn pdf_extension_without_magic_is_rejected() {
        let err = classify(Path::new("scan.pdf"), b"\xff\xd8\xff\xe0").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ff d8 ff e0"), "got: {msg}");
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = load(Path::new("/nonexistent/qrscan/input.png")).unwrap_err();
        assert!(matches!(err, ScanError::FileNotFound { .. }), "got {err:?}");
    }
}
