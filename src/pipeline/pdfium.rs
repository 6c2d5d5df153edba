//! The concrete [`PageSource`]: pdfium for text, lopdf for images.
//!
//! pdfium is not async-safe. Everything here is blocking; callers move it
//! onto `tokio::task::spawn_blocking` (see [`crate::convert`]).

use crate::error::{ConvertError, ImageError};
use crate::output::DocumentMetadata;
use crate::pipeline::layout;
use crate::pipeline::source::{
    EncodedImage, ImageId, ImageSource, PageSource, RawPage, RawSpan, Rect,
};
use crate::pipeline::xobject::{Matrix, XObjectImages};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a pdfium library file or the directory
/// holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to a pdfium library: `PDFIUM_LIB_PATH`, then `./`, then the system.
pub fn bind_pdfium() -> Result<Pdfium, ConvertError> {
    if let Some(path) = std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        let path = PathBuf::from(path);
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&path)
        } else {
            path.clone()
        };
        debug!("binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{}: {:?}", lib.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{:?}", e)))
}

fn open_document<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ConvertError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// A PDF opened through both backends.
pub struct PdfSource<'a> {
    path: PathBuf,
    document: PdfDocument<'a>,
    images: XObjectImages,
}

impl<'a> PdfSource<'a> {
    pub fn open(pdfium: &'a Pdfium, path: &Path) -> Result<Self, ConvertError> {
        let document = open_document(pdfium, path)?;
        let images = XObjectImages::load(path)?;
        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Self {
            path: path.to_path_buf(),
            document,
            images,
        })
    }
}

impl ImageSource for PdfSource<'_> {
    fn extract_image(&self, id: ImageId) -> Result<EncodedImage, ImageError> {
        self.images.extract(id)
    }
}

impl PageSource for PdfSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn load_page(&self, index: usize) -> Result<RawPage, ConvertError> {
        let total = self.page_count();
        if index >= total {
            return Err(ConvertError::PageOutOfRange {
                page: index + 1,
                total,
            });
        }
        let page = self
            .document
            .pages()
            .get(index as u16)
            .map_err(|e| ConvertError::CorruptPdf {
                path: self.path.clone(),
                detail: format!("page {}: {:?}", index + 1, e),
            })?;

        let width = page.width().value;
        let height = page.height().value;
        let spans = text_spans(&page, height);
        debug!("page {}: {} text objects", index + 1, spans.len());

        Ok(RawPage {
            number: index + 1,
            width,
            height,
            text_blocks: layout::group_spans(spans),
            images: self.images.page_images(index + 1, height),
        })
    }

    fn metadata(&self) -> DocumentMetadata {
        document_metadata(&self.document)
    }
}

/// Deepest form XObject nesting followed when collecting text.
const MAX_FORM_DEPTH: usize = 12;

/// One span per text object, in top-down coordinates. Text inside form
/// XObjects is collected too.
fn text_spans(page: &PdfPage, page_height: f32) -> Vec<RawSpan> {
    let mut spans = Vec::new();
    for object in page.objects().iter() {
        collect_text(&object, &Matrix::IDENTITY, page_height, 0, &mut spans);
    }
    spans
}

fn collect_text(
    object: &PdfPageObject,
    ctm: &Matrix,
    page_height: f32,
    depth: usize,
    spans: &mut Vec<RawSpan>,
) {
    if let Some(form) = object.as_x_object_form_object() {
        if depth >= MAX_FORM_DEPTH {
            debug!("form XObject nested deeper than {}, skipping its text", MAX_FORM_DEPTH);
            return;
        }
        // Children report bounds in form space.
        let inner = match form.matrix() {
            Ok(m) => form_matrix(&m).then(ctm),
            Err(_) => *ctm,
        };
        for index in 0..form.len() {
            if let Ok(child) = form.get(index) {
                collect_text(&child, &inner, page_height, depth + 1, spans);
            }
        }
        return;
    }

    let Some(text_object) = object.as_text_object() else {
        return;
    };
    let text = text_object.text();
    if text.is_empty() {
        return;
    }
    let Ok(bounds) = object.bounds() else {
        return;
    };
    let font = text_object.font();
    spans.push(RawSpan {
        text,
        size: text_object.scaled_font_size().value,
        font_name: font.name(),
        bold: is_bold_weight(font.weight().ok()),
        bbox: ctm.rect_top_down(
            bounds.left().value,
            bounds.bottom().value,
            bounds.right().value,
            bounds.top().value,
            page_height,
        ),
    });
}

fn form_matrix(m: &PdfMatrix) -> Matrix {
    Matrix::new([m.a(), m.b(), m.c(), m.d(), m.e(), m.f()])
}

fn is_bold_weight(weight: Option<PdfFontWeight>) -> bool {
    match weight {
        Some(PdfFontWeight::Weight700Bold | PdfFontWeight::Weight800 | PdfFontWeight::Weight900) => {
            true
        }
        Some(PdfFontWeight::Custom(w)) => w >= 700,
        _ => false,
    }
}

fn document_metadata(document: &PdfDocument) -> DocumentMetadata {
    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
        modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    }
}

/// Read document metadata without extracting any page.
pub fn read_metadata(path: &Path) -> Result<DocumentMetadata, ConvertError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, path)?;
    Ok(document_metadata(&document))
}
