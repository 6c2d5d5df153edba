//! Document assembler: ordered pages + font statistics → Markdown.
//!
//! Output shape:
//!
//! ```text
//! # {title}
//!
//!
//! ---
//!
//! ## Page {n}
//!
//! {block}
//! ...
//! ```
//!
//! Every rendered piece ends in a newline and pieces are separated by one
//! more, so each block is followed by a blank line.
//!
//! Figure captions are paired with images in a single forward pass
//! ([`plan_units`]): a text block matching `Figure N` followed directly by an
//! image becomes one [`RenderUnit::Captioned`], and the image gets the alt
//! text `Figure N`. Every other block renders on its own.

use crate::model::{BlockContent, ContentBlock, ImageBlock, PageContent, TextBlock};
use crate::pipeline::fonts::FontStats;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Text blocks at least this long (chars, trimmed) are never headings.
pub const HEADING_MAX_CHARS: usize = 200;

static FIGURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Figure\s*(\d+)\s*[.:\-–—]").unwrap());

/// How a text block renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    /// `### ...`
    Heading3,
    /// `#### ...`
    Heading4,
    Paragraph,
}

/// Classify a text block against the document's font thresholds.
pub fn classify(text: &str, font_size: f32, is_bold: bool, stats: &FontStats) -> TextKind {
    let short = text.trim().chars().count() < HEADING_MAX_CHARS;
    if short && font_size >= stats.h2_min {
        TextKind::Heading3
    } else if short && is_bold && font_size >= stats.h3_min {
        TextKind::Heading4
    } else {
        TextKind::Paragraph
    }
}

/// The figure number of the first `Figure N.`/`:`/`-`/`–`/`—` in `text`.
pub fn figure_number(text: &str) -> Option<&str> {
    FIGURE_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// One rendering step over a page's blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderUnit<'a> {
    Text(&'a TextBlock),
    Image(&'a ImageBlock),
    /// A figure caption immediately followed by its image.
    Captioned {
        caption: &'a TextBlock,
        image: &'a ImageBlock,
        alt: String,
    },
}

/// Pair captions with the image right after them; everything else is a
/// singleton unit. Each block appears in exactly one unit.
pub fn plan_units(blocks: &[ContentBlock]) -> Vec<RenderUnit<'_>> {
    let mut units = Vec::with_capacity(blocks.len());
    let mut i = 0;
    while i < blocks.len() {
        match &blocks[i].content {
            BlockContent::Text(text) => {
                let next_image = blocks.get(i + 1).and_then(ContentBlock::as_image);
                match (figure_number(&text.text), next_image) {
                    (Some(n), Some(image)) => {
                        units.push(RenderUnit::Captioned {
                            caption: text,
                            image,
                            alt: format!("Figure {}", n),
                        });
                        i += 2;
                        continue;
                    }
                    _ => units.push(RenderUnit::Text(text)),
                }
            }
            BlockContent::Image(image) => units.push(RenderUnit::Image(image)),
        }
        i += 1;
    }
    units
}

/// Markdown plus counters gathered while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub markdown: String,
    /// Image blocks that received a non-empty OCR block.
    pub ocr_annotated: usize,
}

/// Render the whole document. See [`assemble`] for the counters.
pub fn build_markdown(
    pages: &[PageContent],
    title: &str,
    stats: &FontStats,
    ocr: Option<&dyn Fn(&Path) -> String>,
) -> String {
    assemble(pages, title, stats, ocr).markdown
}

/// Render the whole document, calling `ocr` at most once per image path.
pub fn assemble(
    pages: &[PageContent],
    title: &str,
    stats: &FontStats,
    ocr: Option<&dyn Fn(&Path) -> String>,
) -> Assembled {
    let mut out = Renderer {
        pieces: vec![format!("# {}\n", title)],
        stats,
        ocr,
        ocr_cache: HashMap::new(),
        ocr_annotated: 0,
    };

    for page in pages {
        out.pieces.push(format!("\n---\n\n## Page {}\n", page.number()));
        for unit in plan_units(page.blocks()) {
            match unit {
                RenderUnit::Text(text) => out.text(text),
                RenderUnit::Image(image) => out.image(image, ""),
                RenderUnit::Captioned {
                    caption,
                    image,
                    alt,
                } => {
                    out.text(caption);
                    out.image(image, &alt);
                }
            }
        }
    }

    Assembled {
        markdown: out.pieces.join("\n"),
        ocr_annotated: out.ocr_annotated,
    }
}

struct Renderer<'a> {
    pieces: Vec<String>,
    stats: &'a FontStats,
    ocr: Option<&'a dyn Fn(&Path) -> String>,
    ocr_cache: HashMap<PathBuf, String>,
    ocr_annotated: usize,
}

impl Renderer<'_> {
    fn text(&mut self, block: &TextBlock) {
        let text = block.text.trim();
        if text.is_empty() {
            return;
        }
        let piece = match classify(text, block.font_size, block.is_bold, self.stats) {
            TextKind::Heading3 => format!("### {}\n", one_line(text)),
            TextKind::Heading4 => format!("#### {}\n", one_line(text)),
            TextKind::Paragraph => format!("{}\n", text),
        };
        self.pieces.push(piece);
    }

    fn image(&mut self, block: &ImageBlock, alt: &str) {
        self.pieces.push(format!("![{}]({})\n", alt, block.relative_path));

        let (Some(ocr), Some(path)) = (self.ocr, block.absolute_path.as_ref()) else {
            return;
        };
        let text = self
            .ocr_cache
            .entry(path.clone())
            .or_insert_with(|| ocr(path.as_path()));
        if !text.is_empty() {
            let piece = format!(
                "<details>\n<summary>Image text (OCR)</summary>\n\n```\n{}\n```\n\n</details>\n",
                text
            );
            self.pieces.push(piece);
            self.ocr_annotated += 1;
        }
    }
}

/// Collapse all whitespace runs (including newlines) to single spaces.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use std::cell::RefCell;

    fn stats() -> FontStats {
        FontStats::from_body(11.0)
    }

    fn text(top: f32, s: &str, size: f32, bold: bool) -> ContentBlock {
        ContentBlock::text(
            Position::new(top, 0.0),
            TextBlock {
                text: s.into(),
                font_size: size,
                is_bold: bold,
            },
        )
    }

    fn image(top: f32, rel: &str) -> ContentBlock {
        ContentBlock::image(
            Position::new(top, 0.0),
            ImageBlock {
                relative_path: rel.into(),
                absolute_path: Some(PathBuf::from("/out/doc").join(rel)),
                width: 100,
                height: 80,
            },
        )
    }

    fn page(n: usize, blocks: Vec<ContentBlock>) -> PageContent {
        PageContent::new(n, 612.0, 792.0, blocks)
    }

    #[test]
    fn empty_document_is_just_the_title() {
        assert_eq!(build_markdown(&[], "Report", &stats(), None), "# Report\n");
    }

    #[test]
    fn empty_page_still_gets_rule_and_header() {
        let md = build_markdown(&[page(1, vec![])], "T", &stats(), None);
        assert_eq!(md, "# T\n\n\n---\n\n## Page 1\n");
    }

    #[test]
    fn page_layout() {
        let md = build_markdown(
            &[page(
                2,
                vec![
                    text(10.0, "Introduction", 20.0, false),
                    text(40.0, "First line\nsecond line", 11.0, false),
                ],
            )],
            "Doc",
            &stats(),
            None,
        );
        assert_eq!(
            md,
            "# Doc\n\n\n---\n\n## Page 2\n\n### Introduction\n\nFirst line\nsecond line\n"
        );
    }

    #[test]
    fn heading_length_gate() {
        let s = stats();
        let short = "h".repeat(150);
        let long = "h".repeat(250);
        assert_eq!(classify(&short, 20.0, false, &s), TextKind::Heading3);
        assert_eq!(classify(&short, 20.0, true, &s), TextKind::Heading3);
        assert_eq!(classify(&long, 20.0, true, &s), TextKind::Paragraph);
        assert_eq!(classify(&"h".repeat(199), 20.0, false, &s), TextKind::Heading3);
        assert_eq!(classify(&"h".repeat(200), 20.0, false, &s), TextKind::Paragraph);
    }

    #[test]
    fn bold_heading_needs_h3_size() {
        let s = stats();
        assert_eq!(classify("Setup", 13.5, true, &s), TextKind::Heading4);
        assert_eq!(classify("Setup", 13.5, false, &s), TextKind::Paragraph);
        assert_eq!(classify("Setup", 12.0, true, &s), TextKind::Paragraph);
    }

    #[test]
    fn headings_are_collapsed_to_one_line() {
        let md = build_markdown(
            &[page(1, vec![text(0.0, "  Getting\n   Started ", 20.0, false)])],
            "T",
            &stats(),
            None,
        );
        assert!(md.contains("### Getting Started\n"), "got: {md}");
    }

    #[test]
    fn figure_pattern() {
        assert_eq!(figure_number("Figure 3: widget"), Some("3"));
        assert_eq!(figure_number("see FIGURE 12."), Some("12"));
        assert_eq!(figure_number("figure10 - x"), Some("10"));
        assert_eq!(figure_number("Figure 4 – dash"), Some("4"));
        assert_eq!(figure_number("Figure 5—em"), Some("5"));
        assert_eq!(figure_number("Figure 2 and Figure 7: b"), Some("7"));
        assert_eq!(figure_number("Figure 3 shows"), None);
        assert_eq!(figure_number("Figures"), None);
    }

    #[test]
    fn caption_then_image_pairs() {
        let md = build_markdown(
            &[page(
                1,
                vec![
                    text(10.0, "Figure 3: widget", 11.0, false),
                    image(20.0, "images/p001_img01.png"),
                ],
            )],
            "T",
            &stats(),
            None,
        );
        assert!(
            md.contains("Figure 3: widget\n\n![Figure 3](images/p001_img01.png)\n"),
            "got: {md}"
        );
    }

    #[test]
    fn image_then_caption_gets_no_alt() {
        let md = build_markdown(
            &[page(
                1,
                vec![
                    image(10.0, "images/p001_img01.png"),
                    text(20.0, "Figure 1. below", 11.0, false),
                ],
            )],
            "T",
            &stats(),
            None,
        );
        assert!(md.contains("![](images/p001_img01.png)\n"), "got: {md}");
    }

    #[test]
    fn pairing_ignores_heading_length_gate() {
        let long_caption = format!("Figure 9: {}", "w".repeat(300));
        let md = build_markdown(
            &[page(
                1,
                vec![
                    text(10.0, &long_caption, 11.0, false),
                    image(20.0, "images/p001_img01.png"),
                ],
            )],
            "T",
            &stats(),
            None,
        );
        assert!(md.contains("![Figure 9](images/p001_img01.png)"));
    }

    #[test]
    fn adjacent_caption_and_image_render_once() {
        let blocks = vec![
            text(10.0, "Figure 1: a", 11.0, false),
            image(20.0, "images/p001_img01.png"),
            text(30.0, "Figure 2: b", 11.0, false),
            image(40.0, "images/p001_img02.png"),
            image(50.0, "images/p001_img03.png"),
        ];
        let pg = page(1, blocks);
        let units = plan_units(pg.blocks());
        assert_eq!(units.len(), 3);

        let md = build_markdown(&[pg], "T", &stats(), None);
        assert_eq!(md.matches("Figure 1: a").count(), 1);
        assert_eq!(md.matches("Figure 2: b").count(), 1);
        assert_eq!(md.matches("![Figure 1]").count(), 1);
        assert_eq!(md.matches("![Figure 2]").count(), 1);
        assert_eq!(md.matches("![](images/p001_img03.png)").count(), 1);
        assert_eq!(md.matches("](images/").count(), 3);
    }

    #[test]
    fn ocr_is_memoised_per_path() {
        let calls = RefCell::new(0usize);
        let ocr = |_: &Path| {
            *calls.borrow_mut() += 1;
            "Recognised label".to_string()
        };
        let pages = vec![
            page(1, vec![image(10.0, "images/p001_img01.png")]),
            page(2, vec![image(10.0, "images/p001_img01.png")]),
        ];
        let out = assemble(&pages, "T", &stats(), Some(&ocr));
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(out.ocr_annotated, 2);
        assert_eq!(
            out.markdown
                .matches("<details>\n<summary>Image text (OCR)</summary>\n\n```\nRecognised label\n```\n\n</details>\n")
                .count(),
            2
        );
    }

    #[test]
    fn empty_ocr_result_emits_nothing() {
        let ocr = |_: &Path| String::new();
        let pages = vec![page(1, vec![image(10.0, "images/p001_img01.png")])];
        let out = assemble(&pages, "T", &stats(), Some(&ocr));
        assert!(!out.markdown.contains("<details>"));
        assert_eq!(out.ocr_annotated, 0);
    }
}
