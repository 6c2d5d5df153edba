//! Content model shared by the extractor, font model and assembler.
//!
//! A page is a sequence of [`ContentBlock`]s in reading order. Each block is
//! either text or an image; the payload is a sum type so a text block can
//! never carry image fields and vice versa.

use serde::Serialize;
use std::cmp::Ordering;
use std::path::PathBuf;

/// Top-left corner of a block in page space (points, y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub top: f32,
    pub left: f32,
}

impl Position {
    pub fn new(top: f32, left: f32) -> Self {
        Self { top, left }
    }
}

/// A text fragment: one layout block of one or more lines.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    /// Lines joined with `\n`, trailing whitespace trimmed per line.
    pub text: String,
    /// Arithmetic mean of the constituent span sizes.
    pub font_size: f32,
    /// Majority vote over spans.
    pub is_bold: bool,
}

/// An embedded image saved to the images directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageBlock {
    /// Path relative to the Markdown file, e.g. `images/p003_img01.png`.
    pub relative_path: String,
    /// Location on disk, used for OCR.
    pub absolute_path: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BlockContent {
    Text(TextBlock),
    Image(ImageBlock),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlock {
    pub position: Position,
    pub content: BlockContent,
}

impl ContentBlock {
    pub fn text(position: Position, block: TextBlock) -> Self {
        Self {
            position,
            content: BlockContent::Text(block),
        }
    }

    pub fn image(position: Position, block: ImageBlock) -> Self {
        Self {
            position,
            content: BlockContent::Image(block),
        }
    }

    pub fn as_text(&self) -> Option<&TextBlock> {
        match &self.content {
            BlockContent::Text(t) => Some(t),
            BlockContent::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageBlock> {
        match &self.content {
            BlockContent::Image(i) => Some(i),
            BlockContent::Text(_) => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self.content, BlockContent::Image(_))
    }
}

/// Compare two positions in reading order: `(round(top, 1), left)` ascending.
///
/// Rounding applies to `top` only so fragments on the same visual line are
/// ordered by their exact left edge regardless of sub-pixel baseline jitter.
pub fn reading_order(a: &Position, b: &Position) -> Ordering {
    round_tenth(a.top)
        .total_cmp(&round_tenth(b.top))
        .then_with(|| a.left.total_cmp(&b.left))
}

/// Round to one decimal place.
pub fn round_tenth(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Stable-sort blocks into reading order.
pub fn sort_reading_order(blocks: &mut [ContentBlock]) {
    blocks.sort_by(|a, b| reading_order(&a.position, &b.position));
}

/// One page's content in reading order. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageContent {
    number: usize,
    width: f32,
    height: f32,
    blocks: Vec<ContentBlock>,
}

impl PageContent {
    /// Build a page; `blocks` are sorted into reading order here.
    pub fn new(number: usize, width: f32, height: f32, mut blocks: Vec<ContentBlock>) -> Self {
        sort_reading_order(&mut blocks);
        Self {
            number,
            width,
            height,
            blocks,
        }
    }

    /// 1-based page number in the source document.
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        &self.blocks
    }

    pub fn text_blocks(&self) -> impl Iterator<Item = &TextBlock> {
        self.blocks.iter().filter_map(ContentBlock::as_text)
    }

    pub fn image_blocks(&self) -> impl Iterator<Item = &ImageBlock> {
        self.blocks.iter().filter_map(ContentBlock::as_image)
    }
}
