//! # pdf-to-markdown
//!
//! Convert PDF documents to Markdown with extracted images, font-based
//! heading detection and optional OCR of embedded images.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path and %PDF magic
//!  ├─ 2. Source    text spans via pdfium, image XObjects via lopdf
//!  ├─ 3. Extract   text blocks + saved images, reading order per page
//!  ├─ 4. Fonts     body size and heading thresholds across the document
//!  ├─ 5. Assemble  headings, figure/caption pairing, optional OCR blocks
//!  └─ 6. Output    {output_dir}/{stem}/document.md + images/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_to_markdown::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().output_dir("out").build()?;
//!     let output = convert("document.pdf", &config).await?;
//!     println!("Markdown written to: {}", output.markdown_path.display());
//!     eprintln!("{} images, body text {:.1}pt",
//!         output.stats.images,
//!         output.font_stats.body);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-to-markdown` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf-to-markdown = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirements
//!
//! A pdfium shared library must be loadable (`PDFIUM_LIB_PATH`, the working
//! directory, or a system install). OCR additionally needs the `tesseract`
//! binary on `PATH`; without it OCR is skipped with a warning.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PageSelection};
pub use convert::{convert, convert_sync, inspect, render_document, RenderedDocument};
pub use error::{ConvertError, ImageError};
pub use model::{BlockContent, ContentBlock, ImageBlock, PageContent, Position, TextBlock};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageSummary};
pub use pipeline::extract::ExtractContext;
pub use pipeline::fonts::FontStats;
pub use pipeline::ocr::{OcrEngine, TesseractOcr};
pub use pipeline::source::PageSource;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
