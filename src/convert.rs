//! Conversion entry points.
//!
//! [`convert`] drives a real PDF end to end: it validates the input, prepares
//! `{output_dir}/{stem}/images/`, runs the blocking extraction on a worker
//! thread and writes the Markdown atomically. [`render_document`] is the
//! backend-agnostic core it delegates to, usable with any [`PageSource`].

use crate::config::{ConversionConfig, PageSelection};
use crate::error::ConvertError;
use crate::model::PageContent;
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata, PageSummary};
use crate::pipeline::assemble;
use crate::pipeline::extract::{self, ExtractContext, IMAGES_DIR_NAME};
use crate::pipeline::fonts::{self, FontStats};
use crate::pipeline::input;
use crate::pipeline::ocr::{OcrEngine, TesseractOcr};
use crate::pipeline::pdfium::{self, PdfSource};
use crate::pipeline::source::{ImageSource, PageSource};
use crate::progress::ConversionProgressCallback;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything [`render_document`] produces for one document.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    /// Extracted pages in selection order; failed pages are empty.
    pub pages: Vec<PageContent>,
    pub summaries: Vec<PageSummary>,
    pub font_stats: FontStats,
    pub markdown: String,
    /// Images that received an OCR block.
    pub ocr_annotated: usize,
}

impl RenderedDocument {
    pub fn failed_pages(&self) -> usize {
        self.summaries.iter().filter(|s| s.error.is_some()).count()
    }
}

/// Extract the selected pages of `source`, compute font statistics and
/// assemble the Markdown.
///
/// `indices` are 0-based page indices. A page that fails to load is logged,
/// reported through `progress` and rendered as an empty page. Progress
/// events carry the document page number and the document page count.
pub fn render_document(
    source: &dyn PageSource,
    indices: &[usize],
    title: &str,
    ctx: &ExtractContext,
    ocr: Option<&dyn OcrEngine>,
    progress: Option<&dyn ConversionProgressCallback>,
) -> RenderedDocument {
    let total = source.page_count();
    let images: &dyn ImageSource = source;
    let mut pages = Vec::with_capacity(indices.len());
    let mut summaries = Vec::with_capacity(indices.len());

    for &index in indices {
        let page_num = index + 1;
        if let Some(cb) = progress {
            cb.on_page_start(page_num, total);
        }

        match source.load_page(index) {
            Ok(raw) => {
                let page = extract::extract_page(&raw, images, ctx);
                debug!(
                    "page {}: {} text blocks, {} images",
                    page_num,
                    page.text_blocks().count(),
                    page.image_blocks().count()
                );
                if let Some(cb) = progress {
                    cb.on_page_complete(page_num, total, page.blocks().len());
                }
                summaries.push(PageSummary {
                    page_num,
                    text_blocks: page.text_blocks().count(),
                    images: page.image_blocks().count(),
                    error: None,
                });
                pages.push(page);
            }
            Err(e) => {
                warn!("page {}: could not be loaded, emitting it empty: {}", page_num, e);
                if let Some(cb) = progress {
                    cb.on_page_error(page_num, total, &e.to_string());
                }
                summaries.push(PageSummary {
                    page_num,
                    text_blocks: 0,
                    images: 0,
                    error: Some(e.to_string()),
                });
                pages.push(PageContent::new(page_num, 0.0, 0.0, Vec::new()));
            }
        }
    }

    let font_stats = fonts::compute_font_stats(&pages);
    debug!(
        "font stats: body {:.1}pt, h2 >= {:.1}pt, h3 >= {:.1}pt",
        font_stats.body, font_stats.h2_min, font_stats.h3_min
    );

    let recognise = |path: &Path| {
        ocr.map(|engine| engine.recognise(path))
            .unwrap_or_default()
    };
    let ocr_fn: Option<&dyn Fn(&Path) -> String> = match ocr {
        Some(_) => Some(&recognise),
        None => None,
    };
    let assembled = assemble::assemble(&pages, title, &font_stats, ocr_fn);

    RenderedDocument {
        pages,
        summaries,
        font_stats,
        markdown: assembled.markdown,
        ocr_annotated: assembled.ocr_annotated,
    }
}

/// Convert a PDF file to Markdown with extracted images.
///
/// This is the primary entry point for the library. Output lands in
/// `{output_dir}/{stem}/{markdown_filename}` with images under
/// `{output_dir}/{stem}/images/`.
///
/// # Errors
/// Returns `Err(ConvertError)` only for fatal errors:
/// - File not found / permission denied / not a PDF
/// - pdfium cannot be bound or the document cannot be opened
/// - The page selection matches no page (an empty document with the
///   default selection is not an error)
/// - The output directory or Markdown file cannot be written
///
/// Unreadable pages and images are skipped, never fatal.
pub async fn convert(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    let total_start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {}", input.display());

    // ── Step 1: Validate input ───────────────────────────────────────────
    let pdf_path = input::resolve_local(input)?;

    // ── Step 2: Prepare output directories ───────────────────────────────
    let document_dir = config.document_dir(&pdf_path);
    let images_dir = document_dir.join(IMAGES_DIR_NAME);
    tokio::fs::create_dir_all(&images_dir)
        .await
        .map_err(|e| ConvertError::OutputDirFailed {
            path: images_dir.clone(),
            source: e,
        })?;
    debug!("Images directory: {}", images_dir.display());

    // ── Step 3: Resolve OCR engine ───────────────────────────────────────
    let ocr = if config.ocr {
        resolve_ocr(TesseractOcr::new(config.ocr_language.clone()))
    } else {
        None
    };
    if let Some(ref engine) = ocr {
        info!("OCR enabled (tesseract, language '{}')", engine.language());
    }

    // ── Step 4: Extract and assemble (CPU-bound, blocking) ───────────────
    let extract_start = Instant::now();
    let title = config.title_for(&pdf_path);
    let ctx = ExtractContext::new(&images_dir, config.min_image_dim);
    let selection = config.pages.clone();
    let progress = config.progress_callback.clone();
    let path = pdf_path.clone();

    let (metadata, rendered, selected) = tokio::task::spawn_blocking(
        move || -> Result<(DocumentMetadata, RenderedDocument, usize), ConvertError> {
            let pdfium = pdfium::bind_pdfium()?;
            let source = PdfSource::open(&pdfium, &path)?;
            let metadata = source.metadata();

            let indices = select_pages(&selection, metadata.page_count)?;
            debug!("Selected {} of {} pages", indices.len(), metadata.page_count);

            if let Some(cb) = progress.as_deref() {
                cb.on_conversion_start(indices.len());
            }
            let rendered = render_document(
                &source,
                &indices,
                &title,
                &ctx,
                ocr.as_ref().map(|e| e as &dyn OcrEngine),
                progress.as_deref(),
            );
            Ok((metadata, rendered, indices.len()))
        },
    )
    .await
    .map_err(|e| ConvertError::Internal(format!("extraction task failed: {}", e)))??;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} pages in {}ms",
        rendered.pages.len(),
        extract_duration_ms
    );

    // ── Step 5: Write Markdown atomically ────────────────────────────────
    let markdown_path = document_dir.join(&config.markdown_filename);
    write_atomic(&markdown_path, &rendered.markdown).await?;

    // ── Step 6: Compute stats ────────────────────────────────────────────
    let failed = rendered.failed_pages();
    let processed = rendered.summaries.len() - failed;
    let stats = ConversionStats {
        total_pages: metadata.page_count,
        processed_pages: processed,
        failed_pages: failed,
        skipped_pages: metadata.page_count.saturating_sub(selected),
        text_blocks: rendered.summaries.iter().map(|s| s.text_blocks).sum(),
        images: rendered.summaries.iter().map(|s| s.images).sum(),
        ocr_annotated: rendered.ocr_annotated,
        extract_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Conversion complete: {}/{} pages, {} images, {}ms total",
        processed, selected, stats.images, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(selected, processed);
    }

    Ok(ConversionOutput {
        markdown: rendered.markdown,
        markdown_path,
        images_dir,
        font_stats: rendered.font_stats,
        pages: rendered.summaries,
        metadata,
        stats,
    })
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, ConvertError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ConvertError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, config))
}

/// Extract PDF metadata without converting content.
pub async fn inspect(input: impl AsRef<Path>) -> Result<DocumentMetadata, ConvertError> {
    let pdf_path = input::resolve_local(input)?;
    tokio::task::spawn_blocking(move || pdfium::read_metadata(&pdf_path))
        .await
        .map_err(|e| ConvertError::Internal(format!("metadata task failed: {}", e)))?
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Write `contents` to a sibling temp file, then rename it over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), ConvertError> {
    let write_err = |e| ConvertError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let tmp_path = temp_sibling(path);
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

/// Keep `engine` if it can run; otherwise warn and continue without OCR.
fn resolve_ocr<E: OcrEngine>(engine: E) -> Option<E> {
    if engine.is_available() {
        Some(engine)
    } else {
        warn!("OCR requested but no OCR engine was found; continuing without OCR");
        None
    }
}

/// 0-based indices for `selection`.
///
/// A document without pages still converts under [`PageSelection::All`]
/// (the output is the title alone). Any other selection that matches no
/// page is an error.
fn select_pages(selection: &PageSelection, page_count: usize) -> Result<Vec<usize>, ConvertError> {
    let indices = selection.to_indices(page_count);
    if indices.is_empty() && !(*selection == PageSelection::All && page_count == 0) {
        return Err(ConvertError::PageOutOfRange {
            page: first_requested_page(selection),
            total: page_count,
        });
    }
    Ok(indices)
}

/// The page reported when a selection matches nothing.
fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) => *p,
        PageSelection::Range(start, _) => *start,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}
