//! Page extractor: one [`RawPage`] → one [`PageContent`].
//!
//! Text blocks come straight from the raw block/line/span structure. Image
//! references are deduplicated, filtered by size, saved under
//! `p{page:03}_img{n:02}.{ext}` and positioned at their first placement.
//! A failing image is logged and skipped; it never fails the page.

use crate::error::ImageError;
use crate::model::{ContentBlock, ImageBlock, PageContent, Position, TextBlock};
use crate::pipeline::codec::{self, SaveMode};
use crate::pipeline::source::{ImageSource, RawImageRef, RawPage, RawTextBlock};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the images directory beside the Markdown file.
pub const IMAGES_DIR_NAME: &str = "images";

/// Per-conversion extractor settings.
#[derive(Debug, Clone)]
pub struct ExtractContext {
    /// Directory images are written to; also the `images/` prefix of the
    /// relative paths used in the Markdown.
    pub images_dir: PathBuf,
    pub min_image_dim: u32,
}

impl ExtractContext {
    pub fn new(images_dir: impl Into<PathBuf>, min_image_dim: u32) -> Self {
        Self {
            images_dir: images_dir.into(),
            min_image_dim,
        }
    }
}

/// Output file name for the `counter`-th image on `page`.
pub fn image_filename(page: usize, counter: usize, ext: &str) -> String {
    format!("p{:03}_img{:02}.{}", page, counter, ext)
}

/// Build the reading-ordered content of one page, saving its images.
pub fn extract_page(raw: &RawPage, images: &dyn ImageSource, ctx: &ExtractContext) -> PageContent {
    let mut blocks: Vec<ContentBlock> = raw.text_blocks.iter().filter_map(text_block).collect();

    let mut seen = HashSet::new();
    let mut counter = 0usize;
    for image_ref in &raw.images {
        if !seen.insert(image_ref.id) {
            continue;
        }
        match extract_image(raw.number, image_ref, images, ctx, &blocks, &mut counter) {
            Ok(Some(block)) => blocks.push(block),
            Ok(None) => {}
            Err(e) => warn!("page {}: skipping image: {}", raw.number, e),
        }
    }

    PageContent::new(raw.number, raw.width, raw.height, blocks)
}

fn text_block(block: &RawTextBlock) -> Option<ContentBlock> {
    let mut lines = Vec::with_capacity(block.lines.len());
    let mut size_sum = 0.0f32;
    let mut spans = 0usize;
    let mut bold_spans = 0usize;

    for line in &block.lines {
        let mut joined = String::new();
        for span in &line.spans {
            joined.push_str(&span.text);
            size_sum += span.size;
            spans += 1;
            if span.bold || span.font_name.to_lowercase().contains("bold") {
                bold_spans += 1;
            }
        }
        let trimmed = joined.trim_end();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }

    let text = lines.join("\n");
    if text.trim().is_empty() {
        return None;
    }

    let font_size = if spans > 0 {
        size_sum / spans as f32
    } else {
        0.0
    };
    Some(ContentBlock::text(
        Position::new(block.bbox.top, block.bbox.left),
        TextBlock {
            text,
            font_size,
            is_bold: bold_spans * 2 > spans,
        },
    ))
}

fn extract_image(
    page: usize,
    image_ref: &RawImageRef,
    images: &dyn ImageSource,
    ctx: &ExtractContext,
    placed: &[ContentBlock],
    counter: &mut usize,
) -> Result<Option<ContentBlock>, ImageError> {
    let encoded = images.extract_image(image_ref.id)?;
    if encoded.bytes.is_empty() {
        return Err(ImageError::Decode {
            id: image_ref.id.to_string(),
            detail: "empty image stream".into(),
        });
    }
    if encoded.width < ctx.min_image_dim || encoded.height < ctx.min_image_dim {
        debug!(
            "page {}: dropping {}x{} image {}",
            page, encoded.width, encoded.height, image_ref.id
        );
        return Ok(None);
    }

    let ext = codec::normalize_extension(&encoded.format);
    let position = match image_ref.placements.first() {
        Some(rect) => Position::new(rect.top, rect.left),
        None => {
            let below = placed
                .iter()
                .map(|b| b.position.top)
                .reduce(f32::max)
                .unwrap_or(0.0);
            Position::new(below + 1.0, 0.0)
        }
    };

    *counter += 1;
    let filename = match image_ref.smask {
        Some(mask_id) => {
            let png = image_filename(page, *counter, "png");
            let dest = ctx.images_dir.join(&png);
            let mask = match images.extract_image(mask_id) {
                Ok(m) => Some(m.bytes),
                Err(e) => {
                    debug!("page {}: soft mask {} unavailable: {}", page, mask_id, e);
                    None
                }
            };
            match codec::save_with_alpha(&encoded.bytes, mask.as_deref(), &dest) {
                Ok(()) => png,
                Err(e) => {
                    debug!("page {}: alpha composite failed ({}), writing raw", page, e);
                    // The encoder may have left a partial file behind.
                    if dest.exists() {
                        let _ = std::fs::remove_file(&dest);
                    }
                    let raw_name = image_filename(page, *counter, ext);
                    codec::write_raw(&encoded.bytes, &ctx.images_dir.join(&raw_name))?;
                    raw_name
                }
            }
        }
        None => {
            let name = image_filename(page, *counter, ext);
            let mode = codec::save_image(&encoded.bytes, ext, &ctx.images_dir.join(&name))?;
            if mode == SaveMode::Raw {
                debug!("page {}: {} written as raw bytes", page, name);
            }
            name
        }
    };

    let absolute_path = ctx.images_dir.join(&filename);
    Ok(Some(ContentBlock::image(
        position,
        ImageBlock {
            relative_path: relative_image_path(&ctx.images_dir, &filename),
            absolute_path: Some(absolute_path),
            width: encoded.width,
            height: encoded.height,
        },
    )))
}

/// `images/<file>` using the images directory's own name.
fn relative_image_path(images_dir: &Path, filename: &str) -> String {
    let dir = images_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| IMAGES_DIR_NAME.to_string());
    format!("{}/{}", dir, filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::source::{EncodedImage, ImageId, RawLine, RawSpan, Rect};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeImages(HashMap<ImageId, EncodedImage>);

    impl FakeImages {
        fn with_png(mut self, id: ImageId, w: u32, h: u32) -> Self {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
            let mut bytes = Vec::new();
            img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
                .unwrap();
            self.0.insert(
                id,
                EncodedImage {
                    width: w,
                    height: h,
                    format: "png".into(),
                    bytes,
                },
            );
            self
        }
    }

    impl ImageSource for FakeImages {
        fn extract_image(&self, id: ImageId) -> Result<EncodedImage, ImageError> {
            self.0.get(&id).cloned().ok_or(ImageError::NotFound {
                id: id.to_string(),
            })
        }
    }

    fn span(text: &str, size: f32, font: &str, bold: bool) -> RawSpan {
        RawSpan {
            text: text.into(),
            size,
            font_name: font.into(),
            bold,
            bbox: Rect::default(),
        }
    }

    fn block(top: f32, left: f32, lines: Vec<Vec<RawSpan>>) -> RawTextBlock {
        RawTextBlock {
            bbox: Rect::new(left, top, left + 100.0, top + 20.0),
            lines: lines.into_iter().map(|spans| RawLine { spans }).collect(),
        }
    }

    fn image_ref(id: u32, placement: Option<Rect>) -> RawImageRef {
        RawImageRef {
            id: ImageId(id, 0),
            smask: None,
            placements: placement.into_iter().collect(),
        }
    }

    fn ctx(dir: &TempDir) -> ExtractContext {
        let images = dir.path().join("images");
        std::fs::create_dir_all(&images).unwrap();
        ExtractContext::new(images, 40)
    }

    #[test]
    fn text_lines_are_trimmed_and_joined() {
        let raw = RawPage {
            number: 1,
            text_blocks: vec![block(
                10.0,
                5.0,
                vec![
                    vec![span("Hello ", 10.0, "Times", false), span("world   ", 12.0, "Times", false)],
                    vec![span("   ", 10.0, "Times", false)],
                    vec![span("second", 12.0, "Times", false)],
                ],
            )],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let page = extract_page(&raw, &FakeImages::default(), &ctx(&dir));
        let t = page.blocks()[0].as_text().unwrap();
        assert_eq!(t.text, "Hello world\nsecond");
        assert_eq!(t.font_size, 11.0);
        assert!(!t.is_bold);
        assert_eq!(page.blocks()[0].position, Position::new(10.0, 5.0));
    }

    #[test]
    fn whitespace_only_blocks_are_dropped() {
        let raw = RawPage {
            number: 1,
            text_blocks: vec![block(10.0, 5.0, vec![vec![span(" \t ", 10.0, "Times", false)]])],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let page = extract_page(&raw, &FakeImages::default(), &ctx(&dir));
        assert!(page.blocks().is_empty());
    }

    #[test]
    fn bold_needs_strict_majority() {
        let half = block(
            0.0,
            0.0,
            vec![vec![span("a", 10.0, "Arial-BoldMT", false), span("b", 10.0, "Arial", false)]],
        );
        let most = block(
            50.0,
            0.0,
            vec![vec![
                span("a", 10.0, "Arial-BoldMT", false),
                span("b", 10.0, "Arial", true),
                span("c", 10.0, "Arial", false),
            ]],
        );
        let raw = RawPage {
            number: 1,
            text_blocks: vec![half, most],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let page = extract_page(&raw, &FakeImages::default(), &ctx(&dir));
        let bold: Vec<bool> = page.text_blocks().map(|t| t.is_bold).collect();
        assert_eq!(bold, vec![false, true]);
    }

    #[test]
    fn images_are_deduplicated_filtered_and_named() {
        let images = FakeImages::default()
            .with_png(ImageId(5, 0), 64, 64)
            .with_png(ImageId(6, 0), 16, 200)
            .with_png(ImageId(7, 0), 80, 50);
        let raw = RawPage {
            number: 3,
            images: vec![
                image_ref(5, Some(Rect::new(10.0, 100.0, 74.0, 164.0))),
                image_ref(5, Some(Rect::new(10.0, 300.0, 74.0, 364.0))),
                image_ref(6, Some(Rect::new(0.0, 0.0, 16.0, 200.0))),
                image_ref(7, Some(Rect::new(200.0, 400.0, 280.0, 450.0))),
            ],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let page = extract_page(&raw, &images, &c);
        let paths: Vec<&str> = page.image_blocks().map(|i| i.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["images/p003_img01.png", "images/p003_img02.png"]);
        assert!(c.images_dir.join("p003_img01.png").exists());
        assert!(c.images_dir.join("p003_img02.png").exists());
        assert_eq!(page.blocks()[0].position, Position::new(100.0, 10.0));
    }

    #[test]
    fn unplaced_image_goes_below_existing_text() {
        let images = FakeImages::default().with_png(ImageId(9, 0), 50, 50);
        let raw = RawPage {
            number: 1,
            text_blocks: vec![
                block(30.0, 5.0, vec![vec![span("top", 10.0, "Times", false)]]),
                block(250.0, 5.0, vec![vec![span("bottom", 10.0, "Times", false)]]),
            ],
            images: vec![image_ref(9, None)],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let page = extract_page(&raw, &images, &ctx(&dir));
        let last = page.blocks().last().unwrap();
        assert!(last.is_image());
        assert_eq!(last.position, Position::new(251.0, 0.0));
    }

    #[test]
    fn failing_image_does_not_abort_page() {
        let images = FakeImages::default().with_png(ImageId(2, 0), 60, 60);
        let raw = RawPage {
            number: 1,
            images: vec![image_ref(1, None), image_ref(2, None)],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let page = extract_page(&raw, &images, &ctx(&dir));
        let paths: Vec<&str> = page.image_blocks().map(|i| i.relative_path.as_str()).collect();
        assert_eq!(paths, vec!["images/p001_img01.png"]);
    }

    #[test]
    fn soft_mask_forces_png_output() {
        let mut images = FakeImages::default()
            .with_png(ImageId(4, 0), 48, 48)
            .with_png(ImageId(40, 0), 48, 48);
        if let Some(base) = images.0.get_mut(&ImageId(4, 0)) {
            let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 48, Rgb([1, 2, 3])));
            let mut bytes = Vec::new();
            img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
                .unwrap();
            base.bytes = bytes;
            base.format = "jpeg".into();
        }
        let raw = RawPage {
            number: 2,
            images: vec![RawImageRef {
                id: ImageId(4, 0),
                smask: Some(ImageId(40, 0)),
                placements: vec![Rect::new(0.0, 0.0, 48.0, 48.0)],
            }],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let page = extract_page(&raw, &images, &c);
        let img = page.image_blocks().next().unwrap();
        assert_eq!(img.relative_path, "images/p002_img01.png");
        let saved = image::open(c.images_dir.join("p002_img01.png")).unwrap();
        assert!(saved.color().has_alpha());
    }

    #[test]
    fn broken_composite_falls_back_to_raw_under_original_extension() {
        let mut images = FakeImages::default().with_png(ImageId(40, 0), 48, 48);
        images.0.insert(
            ImageId(4, 0),
            EncodedImage {
                width: 48,
                height: 48,
                format: "jpeg".into(),
                bytes: b"not really a jpeg".to_vec(),
            },
        );
        let raw = RawPage {
            number: 1,
            images: vec![RawImageRef {
                id: ImageId(4, 0),
                smask: Some(ImageId(40, 0)),
                placements: Vec::new(),
            }],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        let page = extract_page(&raw, &images, &c);
        let img = page.image_blocks().next().unwrap();
        assert_eq!(img.relative_path, "images/p001_img01.jpg");
        assert_eq!(
            std::fs::read(c.images_dir.join("p001_img01.jpg")).unwrap(),
            b"not really a jpeg"
        );
    }

    #[test]
    fn broken_composite_leaves_no_partial_png() {
        let mut images = FakeImages::default().with_png(ImageId(41, 0), 48, 48);
        images.0.insert(
            ImageId(5, 0),
            EncodedImage {
                width: 48,
                height: 48,
                format: "jpeg".into(),
                bytes: b"truncated".to_vec(),
            },
        );
        let raw = RawPage {
            number: 1,
            images: vec![RawImageRef {
                id: ImageId(5, 0),
                smask: Some(ImageId(41, 0)),
                placements: Vec::new(),
            }],
            ..RawPage::default()
        };
        let dir = TempDir::new().unwrap();
        let c = ctx(&dir);
        // Half-written output from an interrupted encode.
        std::fs::write(c.images_dir.join("p001_img01.png"), b"\x89PNG\r\n").unwrap();

        extract_page(&raw, &images, &c);

        let mut names: Vec<String> = std::fs::read_dir(&c.images_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["p001_img01.jpg"]);
    }
}
