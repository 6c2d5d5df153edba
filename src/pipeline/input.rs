//! Input validation: make sure the user-supplied path is a readable PDF.
//!
//! pdfium reports a missing or non-PDF file as a generic load failure. We
//! check existence, read permission and the `%PDF` magic bytes first so the
//! caller gets a precise [`ConvertError`] instead.

use crate::error::ConvertError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate a local PDF path and return it unchanged.
pub fn resolve_local(path: impl AsRef<Path>) -> Result<PathBuf, ConvertError> {
    let path = path.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(ConvertError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
                return Err(ConvertError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConvertError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ConvertError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}
