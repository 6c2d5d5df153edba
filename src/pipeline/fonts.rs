//! Font statistics: the body size and the two heading thresholds.
//!
//! The body size is the mode of a histogram keyed by block font size
//! (rounded to 0.1pt) and weighted by character count, so a handful of large
//! headings never outvote pages of body text.

use crate::model::PageContent;
use serde::Serialize;

/// Multiple of the body size at or above which text becomes `###`.
pub const H2_FACTOR: f32 = 1.55;
/// Multiple of the body size at or above which bold text becomes `####`.
pub const H3_FACTOR: f32 = 1.20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FontStats {
    pub body: f32,
    pub h2_min: f32,
    pub h3_min: f32,
}

impl Default for FontStats {
    /// Used when the document has no sized text at all.
    fn default() -> Self {
        Self {
            body: 11.0,
            h2_min: 16.0,
            h3_min: 13.0,
        }
    }
}

impl FontStats {
    pub fn from_body(body: f32) -> Self {
        Self {
            body,
            h2_min: body * H2_FACTOR,
            h3_min: body * H3_FACTOR,
        }
    }
}

/// Compute document-wide font statistics from every extracted page.
pub fn compute_font_stats(pages: &[PageContent]) -> FontStats {
    // (size in tenths of a point, characters); insertion order breaks ties.
    let mut histogram: Vec<(i64, usize)> = Vec::new();
    for block in pages.iter().flat_map(|p| p.text_blocks()) {
        if block.font_size <= 0.0 {
            continue;
        }
        let key = (block.font_size * 10.0).round() as i64;
        let chars = block.text.chars().count();
        match histogram.iter_mut().find(|(k, _)| *k == key) {
            Some((_, weight)) => *weight += chars,
            None => histogram.push((key, chars)),
        }
    }

    let mut best: Option<(i64, usize)> = None;
    for &(key, weight) in &histogram {
        if best.is_none_or(|(_, w)| weight > w) {
            best = Some((key, weight));
        }
    }

    match best {
        Some((key, _)) => FontStats::from_body(key as f32 / 10.0),
        None => FontStats::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentBlock, Position, TextBlock};

    fn page(blocks: &[(&str, f32)]) -> PageContent {
        let blocks = blocks
            .iter()
            .enumerate()
            .map(|(i, (text, size))| {
                ContentBlock::text(
                    Position::new(i as f32 * 20.0, 0.0),
                    TextBlock {
                        text: text.to_string(),
                        font_size: *size,
                        is_bold: false,
                    },
                )
            })
            .collect();
        PageContent::new(1, 612.0, 792.0, blocks)
    }

    #[test]
    fn empty_document_uses_defaults() {
        assert_eq!(compute_font_stats(&[]), FontStats::default());
        assert_eq!(compute_font_stats(&[page(&[("zero", 0.0)])]), FontStats::default());
    }

    #[test]
    fn character_weight_beats_block_count() {
        let body = "x".repeat(80);
        let heading = "y".repeat(20);
        let pages = vec![page(&[
            (&heading[..5], 24.0),
            (&heading[5..10], 24.0),
            (&heading[10..], 24.0),
            (&body, 11.0),
        ])];
        let stats = compute_font_stats(&pages);
        assert_eq!(stats.body, 11.0);
        assert_eq!(stats.h2_min, 11.0 * 1.55);
        assert_eq!(stats.h3_min, 11.0 * 1.20);
    }

    #[test]
    fn sizes_are_bucketed_to_a_tenth() {
        let pages = vec![page(&[("aaaa", 10.04), ("bbbb", 9.96), ("cccccc", 12.0)])];
        assert_eq!(compute_font_stats(&pages).body, 10.0);
    }

    #[test]
    fn ties_go_to_first_size_seen() {
        let pages = vec![
            page(&[("abcd", 14.0)]),
            page(&[("wxyz", 9.0)]),
        ];
        assert_eq!(compute_font_stats(&pages).body, 14.0);
    }

    #[test]
    fn image_blocks_are_ignored() {
        let mut blocks = page(&[("body text", 10.0)]).blocks().to_vec();
        blocks.push(ContentBlock::image(
            Position::new(500.0, 0.0),
            crate::model::ImageBlock {
                relative_path: "images/p001_img01.png".into(),
                absolute_path: None,
                width: 100,
                height: 100,
            },
        ));
        let pages = vec![PageContent::new(1, 612.0, 792.0, blocks)];
        assert_eq!(compute_font_stats(&pages).body, 10.0);
    }
}
