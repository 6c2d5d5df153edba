//! Result types returned by the conversion entry points.

use crate::pipeline::fonts::FontStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything produced by one conversion.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// The assembled Markdown, identical to the file at `markdown_path`.
    pub markdown: String,
    pub markdown_path: PathBuf,
    pub images_dir: PathBuf,
    pub font_stats: FontStats,
    /// One entry per converted page, in document order.
    pub pages: Vec<PageSummary>,
    pub metadata: DocumentMetadata,
    pub stats: ConversionStats,
}

/// Per-page counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    /// 1-indexed page number in the source document.
    pub page_num: usize,
    pub text_blocks: usize,
    pub images: usize,
    /// Set when the page could not be loaded and was emitted empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversionStats {
    /// Pages in the source document.
    pub total_pages: usize,
    /// Selected pages that loaded successfully.
    pub processed_pages: usize,
    /// Selected pages that failed to load (emitted empty).
    pub failed_pages: usize,
    /// Pages not selected.
    pub skipped_pages: usize,
    pub text_blocks: usize,
    pub images: usize,
    /// Image blocks that received OCR text.
    pub ocr_annotated: usize,
    pub extract_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Document-level information read from the PDF info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_summary_omits_missing_error() {
        let s = PageSummary {
            page_num: 2,
            text_blocks: 5,
            images: 1,
            error: None,
        };
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("error"), "got: {json}");
        assert!(json.contains("\"page_num\":2"));
    }

    #[test]
    fn metadata_default_is_empty() {
        let m = DocumentMetadata::default();
        assert_eq!(m.page_count, 0);
        assert!(m.title.is_none());
    }
}
