//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Every knob lives in one struct so a
//! run can be logged or diffed against another in a single `{:?}`.

use crate::error::ConvertError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default minimum width/height (px) for an embedded image to be kept.
pub const DEFAULT_MIN_IMAGE_DIM: u32 = 40;

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf_to_markdown::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("converted")
///     .min_image_dim(64)
///     .ocr(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.min_image_dim, 64);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Parent directory for output. A sub-directory named after the PDF
    /// (without extension) is created inside it. Default: `out`.
    pub output_dir: PathBuf,

    /// File name of the generated Markdown. Default: `document.md`.
    pub markdown_filename: String,

    /// Images narrower or shorter than this (px) are dropped. Default: 40.
    ///
    /// Filters bullets, rule lines and icons without touching content figures.
    pub min_image_dim: u32,

    /// Run OCR on extracted images and append the text in a collapsible
    /// block. Default: false. Silently disabled when no engine is installed.
    pub ocr: bool,

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`. Default: `eng`.
    pub ocr_language: String,

    /// Title for the `# ...` header. Default: the input file stem.
    pub title: Option<String>,

    /// Page selection. Default: All pages.
    pub pages: PageSelection,

    /// Optional per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            markdown_filename: "document.md".to_string(),
            min_image_dim: DEFAULT_MIN_IMAGE_DIM,
            ocr: false,
            ocr_language: "eng".to_string(),
            title: None,
            pages: PageSelection::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("markdown_filename", &self.markdown_filename)
            .field("min_image_dim", &self.min_image_dim)
            .field("ocr", &self.ocr)
            .field("ocr_language", &self.ocr_language)
            .field("title", &self.title)
            .field("pages", &self.pages)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// `{output_dir}/{stem}` for the given input file.
    pub fn document_dir(&self, input: &Path) -> PathBuf {
        self.output_dir.join(document_stem(input))
    }

    /// Title used for the document header: the override, else the file stem.
    pub fn title_for(&self, input: &Path) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| document_stem(input))
    }
}

/// File stem of `input`, or `document` when it has none.
pub fn document_stem(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn markdown_filename(mut self, name: impl Into<String>) -> Self {
        self.config.markdown_filename = name.into();
        self
    }

    pub fn min_image_dim(mut self, px: u32) -> Self {
        self.config.min_image_dim = px;
        self
    }

    pub fn ocr(mut self, enabled: bool) -> Self {
        self.config.ocr = enabled;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = Some(title.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let c = &self.config;
        let name = c.markdown_filename.trim();
        if name.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Markdown file name must not be empty".into(),
            ));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(ConvertError::InvalidConfig(format!(
                "Markdown file name must be a bare file name, got '{}'",
                c.markdown_filename
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || end < start {
                return Err(ConvertError::InvalidConfig(format!(
                    "Invalid page range {}-{}",
                    start, end
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to convert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Convert all pages (default).
    #[default]
    All,
    /// Convert a single page (1-indexed).
    Single(usize),
    /// Convert a contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Convert specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Parse a CLI page selection: `3`, `2-5` or `1,3,7`.
    pub fn parse(spec: &str) -> Result<Self, ConvertError> {
        let spec = spec.trim();
        let bad = || ConvertError::InvalidConfig(format!("Invalid page selection '{}'", spec));
        if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if spec.contains(',') {
            let pages = spec
                .split(',')
                .map(|p| p.trim().parse::<usize>().map_err(|_| bad()))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        if let Some((a, b)) = spec.split_once('-') {
            let start = a.trim().parse().map_err(|_| bad())?;
            let end = b.trim().parse().map_err(|_| bad())?;
            return Ok(PageSelection::Range(start, end));
        }
        spec.parse().map(PageSelection::Single).map_err(|_| bad())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("out"));
        assert_eq!(c.markdown_filename, "document.md");
        assert_eq!(c.min_image_dim, 40);
        assert!(!c.ocr);
        assert_eq!(c.ocr_language, "eng");
        assert_eq!(c.pages, PageSelection::All);
    }

    #[test]
    fn builder_sets_fields() {
        let c = ConversionConfig::builder()
            .output_dir("/tmp/md")
            .markdown_filename("README.md")
            .min_image_dim(10)
            .ocr(true)
            .ocr_language("deu")
            .title("Manual")
            .pages(PageSelection::Range(2, 4))
            .build()
            .unwrap();
        assert_eq!(c.output_dir, PathBuf::from("/tmp/md"));
        assert_eq!(c.markdown_filename, "README.md");
        assert_eq!(c.min_image_dim, 10);
        assert!(c.ocr);
        assert_eq!(c.ocr_language, "deu");
        assert_eq!(c.title.as_deref(), Some("Manual"));
    }

    #[test]
    fn builder_rejects_nested_markdown_name() {
        let err = ConversionConfig::builder()
            .markdown_filename("sub/doc.md")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_inverted_range() {
        assert!(ConversionConfig::builder()
            .pages(PageSelection::Range(5, 2))
            .build()
            .is_err());
    }

    #[test]
    fn document_dir_and_title_use_stem() {
        let c = ConversionConfig::builder().output_dir("out").build().unwrap();
        let input = Path::new("/data/BriefCASE Tutorial.pdf");
        assert_eq!(c.document_dir(input), PathBuf::from("out/BriefCASE Tutorial"));
        assert_eq!(c.title_for(input), "BriefCASE Tutorial");

        let titled = ConversionConfig::builder().title("Override").build().unwrap();
        assert_eq!(titled.title_for(input), "Override");
    }

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(5), vec![0, 1, 2, 3, 4]);
        assert_eq!(PageSelection::Single(3).to_indices(5), vec![2]);
        assert_eq!(PageSelection::Single(6).to_indices(5), Vec::<usize>::new());
        assert_eq!(PageSelection::Range(2, 4).to_indices(5), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Set(vec![3, 1, 3]).to_indices(5),
            vec![0, 2] // deduplicated and sorted
        );
    }

    #[test]
    fn page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(PageSelection::parse("4").unwrap(), PageSelection::Single(4));
        assert_eq!(
            PageSelection::parse("2-5").unwrap(),
            PageSelection::Range(2, 5)
        );
        assert_eq!(
            PageSelection::parse("1, 3,7").unwrap(),
            PageSelection::Set(vec![1, 3, 7])
        );
        assert!(PageSelection::parse("x-2").is_err());
    }
}
