//! Raw page data and the traits a PDF backend implements to supply it.
//!
//! The extractor only ever sees the types in this module, so every stage
//! after it can be tested against a synthetic [`PageSource`] without a
//! real PDF or a pdfium library on the machine.

use crate::error::{ConvertError, ImageError};
use crate::output::DocumentMetadata;
use serde::Serialize;
use std::fmt;

/// Axis-aligned rectangle in top-down page space (points).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

/// A run of text drawn with one font at one size.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpan {
    pub text: String,
    pub size: f32,
    pub font_name: String,
    /// Explicit bold style flag from the font descriptor.
    pub bold: bool,
    pub bbox: Rect,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawLine {
    pub spans: Vec<RawSpan>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTextBlock {
    pub bbox: Rect,
    pub lines: Vec<RawLine>,
}

/// Document-internal reference id of an image object (object number,
/// generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ImageId(pub u32, pub u16);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.0, self.1)
    }
}

/// One reference to an embedded image from a page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImageRef {
    pub id: ImageId,
    pub smask: Option<ImageId>,
    /// Where the image is drawn on the page, in content-stream order.
    pub placements: Vec<Rect>,
}

/// Encoded bytes of one image object plus its intrinsic pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub width: u32,
    pub height: u32,
    /// Declared format: `jpeg`, `jpx`, `png`, `jb2`, `fax`, ...
    pub format: String,
    pub bytes: Vec<u8>,
}

/// Everything the extractor needs from one page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawPage {
    /// 1-based page number.
    pub number: usize,
    pub width: f32,
    pub height: f32,
    pub text_blocks: Vec<RawTextBlock>,
    /// Image references in page order; may repeat the same id.
    pub images: Vec<RawImageRef>,
}

/// Resolves image reference ids to encoded image data.
pub trait ImageSource {
    fn extract_image(&self, id: ImageId) -> Result<EncodedImage, ImageError>;
}

/// A paginated document that yields raw pages.
pub trait PageSource: ImageSource {
    fn page_count(&self) -> usize;

    /// Load the page at the 0-based `index`.
    fn load_page(&self, index: usize) -> Result<RawPage, ConvertError>;

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            page_count: self.page_count(),
            ..DocumentMetadata::default()
        }
    }
}
