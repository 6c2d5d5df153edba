//! Error types for the pdf-to-markdown library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ConvertError`]: **Fatal**: the conversion cannot proceed at all
//!   (missing input, unreadable PDF, output directory not writable).
//!   Returned as `Err(ConvertError)` from the top-level `convert*` functions.
//!
//! * [`ImageError`]: **Non-fatal**: a single embedded image could not be
//!   extracted or saved. The page extractor logs it and skips that image;
//!   every other block on the page is still emitted.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf-to-markdown library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The page selection matched none of the document's pages.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create the document or images output directory.
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Place libpdfium next to the binary or in the working directory.\n\
  • Install pdfium system-wide.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single embedded image.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImageError {
    /// The reference id does not resolve to an object.
    #[error("image {id}: object not found")]
    NotFound { id: String },

    /// The object exists but is not an image stream.
    #[error("image {id}: not an image XObject")]
    NotAnImage { id: String },

    /// The colour space or bit depth cannot be turned into pixels.
    #[error("image {id}: unsupported encoding: {detail}")]
    Unsupported { id: String, detail: String },

    /// Stream data is missing, truncated or does not decode.
    #[error("image {id}: decode failed: {detail}")]
    Decode { id: String, detail: String },

    /// Writing the image file failed (even the raw-byte fallback).
    #[error("image {path}: write failed: {detail}")]
    Write { path: PathBuf, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_not_found_display() {
        let e = ConvertError::FileNotFound {
            path: PathBuf::from("/tmp/missing.pdf"),
        };
        assert!(e.to_string().contains("/tmp/missing.pdf"));
    }

    #[test]
    fn page_out_of_range_display() {
        let e = ConvertError::PageOutOfRange { page: 9, total: 3 };
        let msg = e.to_string();
        assert!(msg.contains("Page 9"), "got: {msg}");
        assert!(msg.contains("3 pages"), "got: {msg}");
    }

    #[test]
    fn output_write_failed_keeps_source() {
        use std::error::Error as _;
        let e = ConvertError::OutputWriteFailed {
            path: PathBuf::from("out/doc/document.md"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.to_string().contains("disk full"));
        assert!(e.source().is_some());
    }

    #[test]
    fn image_error_display() {
        let e = ImageError::Decode {
            id: "12 0 R".into(),
            detail: "truncated stream".into(),
        };
        assert!(e.to_string().contains("12 0 R"));
        assert!(e.to_string().contains("truncated stream"));
    }
}
