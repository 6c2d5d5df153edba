//! Optional OCR of extracted images through the `tesseract` binary.
//!
//! OCR never fails a conversion: an unavailable engine disables it, and a
//! failed or noisy recognition yields an empty string.

use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Minimum alphabetic characters for OCR output to count as text.
pub const MIN_ALPHA_CHARS: usize = 4;

/// An OCR engine: `image path -> text`.
pub trait OcrEngine: Send + Sync {
    fn is_available(&self) -> bool;

    /// Recognised text, trimmed; `""` on any failure or noise.
    fn recognise(&self, image: &Path) -> String;
}

/// Tesseract via its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrEngine for TesseractOcr {
    fn is_available(&self) -> bool {
        which::which("tesseract").is_ok()
    }

    fn recognise(&self, image: &Path) -> String {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output();
        match output {
            Ok(out) if out.status.success() => {
                filter_noise(&String::from_utf8_lossy(&out.stdout))
            }
            Ok(out) => {
                debug!(
                    "tesseract exited with {} on {}",
                    out.status,
                    image.display()
                );
                String::new()
            }
            Err(e) => {
                debug!("tesseract could not run on {}: {}", image.display(), e);
                String::new()
            }
        }
    }
}

/// Trim `raw`, or return `""` when it has fewer than [`MIN_ALPHA_CHARS`]
/// alphabetic characters.
pub fn filter_noise(raw: &str) -> String {
    let text = raw.trim();
    if text.chars().filter(|c| c.is_alphabetic()).count() < MIN_ALPHA_CHARS {
        return String::new();
    }
    text.to_string()
}
