//! Span grouping: loose positioned spans → lines → blocks.
//!
//! pdfium reports text objects individually with no notion of lines or
//! paragraphs. This module rebuilds both from geometry alone:
//!
//! * spans whose baselines (bbox bottoms) differ by at most
//!   [`BASELINE_TOLERANCE`] × font size share a line, ordered by left edge;
//! * a space is inserted between neighbouring spans separated by more than
//!   [`WORD_GAP`] × font size when neither side already carries whitespace;
//! * consecutive lines stay in one block until the vertical gap exceeds
//!   [`PARAGRAPH_GAP`] × line height, the font size changes by more than
//!   [`SIZE_BREAK`] points, or the left margin moves more than
//!   [`INDENT_BREAK`] points.

use crate::pipeline::source::{RawLine, RawSpan, RawTextBlock, Rect};

pub const BASELINE_TOLERANCE: f32 = 0.3;
pub const WORD_GAP: f32 = 0.25;
pub const PARAGRAPH_GAP: f32 = 0.6;
pub const SIZE_BREAK: f32 = 1.0;
pub const INDENT_BREAK: f32 = 20.0;

/// A line under construction.
struct LineGroup {
    spans: Vec<RawSpan>,
    bbox: Rect,
    baseline: f32,
    size: f32,
}

impl LineGroup {
    fn start(span: RawSpan) -> Self {
        Self {
            bbox: span.bbox,
            baseline: span.bbox.bottom,
            size: span.size,
            spans: vec![span],
        }
    }

    fn accepts(&self, span: &RawSpan) -> bool {
        let tolerance = BASELINE_TOLERANCE * self.size.max(span.size);
        (span.bbox.bottom - self.baseline).abs() <= tolerance
    }

    fn push(&mut self, span: RawSpan) {
        self.bbox = self.bbox.union(&span.bbox);
        self.size = self.size.max(span.size);
        self.spans.push(span);
    }

    fn finish(mut self) -> (RawLine, Rect, f32) {
        self.spans.sort_by(|a, b| a.bbox.left.total_cmp(&b.bbox.left));
        insert_word_gaps(&mut self.spans);
        (RawLine { spans: self.spans }, self.bbox, self.size)
    }
}

/// Group spans into text blocks in top-to-bottom order.
pub fn group_spans(mut spans: Vec<RawSpan>) -> Vec<RawTextBlock> {
    spans.retain(|s| !s.text.is_empty());
    if spans.is_empty() {
        return Vec::new();
    }

    spans.sort_by(|a, b| {
        a.bbox
            .bottom
            .total_cmp(&b.bbox.bottom)
            .then_with(|| a.bbox.left.total_cmp(&b.bbox.left))
    });

    let mut lines: Vec<(RawLine, Rect, f32)> = Vec::new();
    let mut current: Option<LineGroup> = None;
    for span in spans {
        match current.as_mut() {
            Some(line) if line.accepts(&span) => line.push(span),
            _ => {
                if let Some(done) = current.take() {
                    lines.push(done.finish());
                }
                current = Some(LineGroup::start(span));
            }
        }
    }
    if let Some(done) = current {
        lines.push(done.finish());
    }

    let mut blocks: Vec<RawTextBlock> = Vec::new();
    let mut prev: Option<(Rect, f32)> = None;
    for (line, bbox, size) in lines {
        let breaks = match prev {
            Some((prev_bbox, prev_size)) => starts_new_block(&prev_bbox, prev_size, &bbox, size),
            None => true,
        };
        match blocks.last_mut() {
            Some(block) if !breaks => {
                block.bbox = block.bbox.union(&bbox);
                block.lines.push(line);
            }
            _ => blocks.push(RawTextBlock {
                bbox,
                lines: vec![line],
            }),
        }
        prev = Some((bbox, size));
    }
    blocks
}

fn starts_new_block(prev: &Rect, prev_size: f32, next: &Rect, next_size: f32) -> bool {
    let gap = next.top - prev.bottom;
    let line_height = prev.height().max(prev_size);
    gap > PARAGRAPH_GAP * line_height
        || (next_size - prev_size).abs() > SIZE_BREAK
        || (next.left - prev.left).abs() > INDENT_BREAK
}

fn insert_word_gaps(spans: &mut [RawSpan]) {
    for i in 1..spans.len() {
        let (before, after) = spans.split_at_mut(i);
        let prev = &before[i - 1];
        let span = &mut after[0];
        let gap = span.bbox.left - prev.bbox.right;
        let threshold = WORD_GAP * prev.size.max(span.size);
        let prev_spaced = prev.text.ends_with(char::is_whitespace);
        let next_spaced = span.text.starts_with(char::is_whitespace);
        if gap > threshold && !prev_spaced && !next_spaced {
            span.text.insert(0, ' ');
        }
    }
}
