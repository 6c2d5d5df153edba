//! Embedded image access through lopdf.
//!
//! pdfium renders images but hides the object graph: soft-mask references,
//! object ids and the encoded stream bytes are only reachable from the raw
//! document. This module supplies those three things.
//!
//! * [`XObjectImages::page_images`] replays a page's content stream
//!   (`q`/`Q`/`cm`/`Do`) to find every image drawn on it and where, recursing
//!   into form XObjects. Image XObjects present in the resources but never
//!   drawn are appended with no placement.
//! * [`XObjectImages::extract`] returns encoded bytes: JPEG and JPEG 2000
//!   streams pass through untouched, JBIG2 and CCITT streams pass through raw,
//!   and everything else is decompressed and rebuilt as a PNG.

use crate::error::{ConvertError, ImageError};
use crate::pipeline::source::{EncodedImage, ImageId, RawImageRef, Rect};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Deepest form XObject nesting followed when looking for images.
const MAX_FORM_DEPTH: usize = 12;

/// Affine transform `[a b c d e f]` as used by the `cm` operator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix([f32; 6]);

impl Matrix {
    pub const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(m: [f32; 6]) -> Self {
        Matrix(m)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = other.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Bounding box of the unit square under this transform, flipped into
    /// top-down coordinates for a page of `page_height`.
    pub fn unit_square_top_down(&self, page_height: f32) -> Rect {
        self.rect_top_down(0.0, 0.0, 1.0, 1.0, page_height)
    }

    /// Bounding box of the bottom-up rectangle `(x0, y0)-(x1, y1)` under this
    /// transform, flipped into top-down coordinates.
    pub fn rect_top_down(&self, x0: f32, y0: f32, x1: f32, y1: f32, page_height: f32) -> Rect {
        let corners = [
            self.apply(x0, y0),
            self.apply(x1, y0),
            self.apply(x0, y1),
            self.apply(x1, y1),
        ];
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for (x, y) in corners {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        Rect::new(min_x, page_height - max_y, max_x, page_height - min_y)
    }
}

/// Image side of the document, backed by a parsed lopdf [`Document`].
pub struct XObjectImages {
    doc: Document,
}

impl XObjectImages {
    pub fn load(path: &Path) -> Result<Self, ConvertError> {
        let doc = Document::load(path).map_err(|e| ConvertError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self { doc })
    }

    pub fn from_document(doc: Document) -> Self {
        Self { doc }
    }

    /// Images referenced by the 1-based `page_number`, in drawing order.
    pub fn page_images(&self, page_number: usize, page_height: f32) -> Vec<RawImageRef> {
        let pages = self.doc.get_pages();
        let Some(&page_id) = pages.get(&(page_number as u32)) else {
            return Vec::new();
        };

        let mut walker = Walker {
            doc: &self.doc,
            page_height,
            found: Vec::new(),
            visited_forms: HashSet::new(),
        };

        let resources = page_resources(&self.doc, page_id);
        match self.doc.get_page_content(page_id) {
            Ok(data) => {
                if let Some(res) = resources {
                    walker.walk(&data, res, Matrix::IDENTITY, 0);
                }
            }
            Err(e) => debug!("page {}: no content stream ({})", page_number, e),
        }

        if let Some(res) = resources {
            walker.collect_unplaced(res);
        }
        walker.found
    }

    /// Encoded bytes and intrinsic size of the image object `id`.
    pub fn extract(&self, id: ImageId) -> Result<EncodedImage, ImageError> {
        let key = id.to_string();
        let obj = self
            .doc
            .get_object((id.0, id.1))
            .map_err(|_| ImageError::NotFound { id: key.clone() })?;
        let stream = match obj {
            Object::Stream(s) if is_image(&s.dict) => s,
            _ => return Err(ImageError::NotAnImage { id: key }),
        };

        let dict = &stream.dict;
        let width = self.int(dict, b"Width").unwrap_or(0).max(0) as u32;
        let height = self.int(dict, b"Height").unwrap_or(0).max(0) as u32;
        let filters = filter_names(dict);

        let passthrough = match filters.last().map(String::as_str) {
            Some("DCTDecode") => Some("jpeg"),
            Some("JPXDecode") => Some("jpx"),
            Some("JBIG2Decode") => Some("jb2"),
            Some("CCITTFaxDecode") => Some("fax"),
            _ => None,
        };

        if let Some(format) = passthrough {
            let bytes = if filters.len() > 1 {
                stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone())
            } else {
                stream.content.clone()
            };
            return Ok(EncodedImage {
                width,
                height,
                format: format.to_string(),
                bytes,
            });
        }

        let data = stream_bytes(stream);
        let bytes = self.rebuild_png(&key, dict, width, height, &data)?;
        Ok(EncodedImage {
            width,
            height,
            format: "png".to_string(),
            bytes,
        })
    }

    fn int(&self, dict: &Dictionary, key: &[u8]) -> Option<i64> {
        dict.get(key)
            .ok()
            .map(|o| resolve(&self.doc, o))
            .and_then(|o| o.as_i64().ok())
    }

    fn rebuild_png(
        &self,
        key: &str,
        dict: &Dictionary,
        width: u32,
        height: u32,
        data: &[u8],
    ) -> Result<Vec<u8>, ImageError> {
        let is_mask = dict
            .get(b"ImageMask")
            .ok()
            .and_then(|o| o.as_bool().ok())
            .unwrap_or(false);
        let bpc = if is_mask {
            1
        } else {
            self.int(dict, b"BitsPerComponent").unwrap_or(8) as u8
        };
        if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
            return Err(ImageError::Unsupported {
                id: key.to_string(),
                detail: format!("{} bits per component", bpc),
            });
        }

        let space = if is_mask {
            ColorSpace::Gray
        } else {
            let cs = dict.get(b"ColorSpace").map_err(|_| ImageError::Unsupported {
                id: key.to_string(),
                detail: "missing colour space".into(),
            })?;
            parse_color_space(&self.doc, cs).ok_or_else(|| ImageError::Unsupported {
                id: key.to_string(),
                detail: format!("colour space {:?}", cs),
            })?
        };

        let layout = PixelLayout {
            width,
            height,
            channels: space.channels(),
            bits: bpc,
        };
        let samples = unpack_samples(data, &layout, !space.is_indexed()).ok_or_else(|| {
            ImageError::Decode {
                id: key.to_string(),
                detail: format!(
                    "expected {} bytes of pixel data, got {}",
                    layout.expected_len(),
                    data.len()
                ),
            }
        })?;

        let img = to_dynamic_image(&space, width, height, samples).ok_or_else(|| {
            ImageError::Decode {
                id: key.to_string(),
                detail: "pixel buffer does not match dimensions".into(),
            }
        })?;

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| ImageError::Decode {
                id: key.to_string(),
                detail: e.to_string(),
            })?;
        Ok(buf)
    }
}

// ── Content walking ──────────────────────────────────────────────────────

struct Walker<'a> {
    doc: &'a Document,
    page_height: f32,
    found: Vec<RawImageRef>,
    visited_forms: HashSet<ObjectId>,
}

impl<'a> Walker<'a> {
    fn walk(&mut self, content: &[u8], resources: &'a Dictionary, base: Matrix, depth: usize) {
        let ops = match Content::decode(content) {
            Ok(c) => c.operations,
            Err(e) => {
                debug!("content stream decode error: {}", e);
                return;
            }
        };
        let xobjects = xobject_dict(self.doc, resources);

        let mut ctm = base;
        let mut stack: Vec<Matrix> = Vec::new();
        for op in ops {
            match op.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => ctm = stack.pop().unwrap_or(base),
                "cm" => {
                    if let Some(m) = matrix_from(&op.operands) {
                        ctm = m.then(&ctm);
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    let Some(xobjects) = xobjects else { continue };
                    let Ok(Object::Reference(id)) = xobjects.get(name) else {
                        continue;
                    };
                    self.draw(*id, resources, ctm, depth);
                }
                _ => {}
            }
        }
    }

    fn draw(&mut self, id: ObjectId, parent_res: &'a Dictionary, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let Ok(Object::Stream(stream)) = doc.get_object(id) else {
            return;
        };
        if is_image(&stream.dict) {
            let rect = ctm.unit_square_top_down(self.page_height);
            self.record(id, &stream.dict, Some(rect));
            return;
        }
        if !is_form(&stream.dict) || depth >= MAX_FORM_DEPTH || !self.visited_forms.insert(id) {
            return;
        }
        let form_matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(doc, o).as_array().ok())
            .and_then(|a| matrix_from(a))
            .unwrap_or(Matrix::IDENTITY);
        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
            .unwrap_or(parent_res);
        let data = stream_bytes(stream);
        self.walk(&data, resources, form_matrix.then(&ctm), depth + 1);
        self.visited_forms.remove(&id);
    }

    fn record(&mut self, id: ObjectId, dict: &Dictionary, placement: Option<Rect>) {
        let image_id = ImageId(id.0, id.1);
        if let Some(existing) = self.found.iter_mut().find(|r| r.id == image_id) {
            existing.placements.extend(placement);
            return;
        }
        let smask = match dict.get(b"SMask") {
            Ok(Object::Reference(m)) => Some(ImageId(m.0, m.1)),
            _ => None,
        };
        self.found.push(RawImageRef {
            id: image_id,
            smask,
            placements: placement.into_iter().collect(),
        });
    }

    fn collect_unplaced(&mut self, resources: &Dictionary) {
        let Some(xobjects) = xobject_dict(self.doc, resources) else {
            return;
        };
        for (_, obj) in xobjects.iter() {
            let Object::Reference(id) = obj else { continue };
            if let Ok(Object::Stream(s)) = self.doc.get_object(*id) {
                if is_image(&s.dict) {
                    self.record(*id, &s.dict, None);
                }
            }
        }
    }
}

// ── Object helpers ───────────────────────────────────────────────────────

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// The page's `Resources`, following the `Parent` chain when inherited.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..32 {
        if let Ok(res) = node.get(b"Resources") {
            return resolve_dict(doc, res);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve_dict(doc, parent)?;
    }
    None
}

fn xobject_dict<'a>(doc: &'a Document, resources: &'a Dictionary) -> Option<&'a Dictionary> {
    resolve_dict(doc, resources.get(b"XObject").ok()?)
}

fn subtype_is(dict: &Dictionary, name: &[u8]) -> bool {
    dict.get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .is_some_and(|n| n == name)
}

fn is_image(dict: &Dictionary) -> bool {
    subtype_is(dict, b"Image")
}

fn is_form(dict: &Dictionary) -> bool {
    subtype_is(dict, b"Form")
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(arr)) => arr
            .iter()
            .filter_map(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .collect(),
        _ => Vec::new(),
    }
}

fn stream_bytes(stream: &Stream) -> Vec<u8> {
    if stream.dict.get(b"Filter").is_err() {
        return stream.content.clone();
    }
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f),
        _ => None,
    }
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0f32; 6];
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = number(obj)?;
    }
    Some(Matrix(m))
}

// ── Pixel decoding ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `base` colours, one index sample per pixel.
    Indexed { base: Box<ColorSpace>, palette: Vec<u8> },
}

impl ColorSpace {
    fn channels(&self) -> u8 {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    fn is_indexed(&self) -> bool {
        matches!(self, ColorSpace::Indexed { .. })
    }
}

fn parse_color_space(doc: &Document, obj: &Object) -> Option<ColorSpace> {
    match resolve(doc, obj) {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Some(ColorSpace::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Some(ColorSpace::Cmyk),
            _ => None,
        },
        Object::Array(arr) => {
            let family = arr.first()?.as_name().ok()?;
            match family {
                b"ICCBased" => {
                    let Object::Stream(icc) = resolve(doc, arr.get(1)?) else {
                        return None;
                    };
                    match icc.dict.get(b"N").ok()?.as_i64().ok()? {
                        1 => Some(ColorSpace::Gray),
                        3 => Some(ColorSpace::Rgb),
                        4 => Some(ColorSpace::Cmyk),
                        _ => None,
                    }
                }
                b"CalGray" => Some(ColorSpace::Gray),
                b"CalRGB" | b"Lab" => Some(ColorSpace::Rgb),
                b"Indexed" | b"I" => {
                    let base = parse_color_space(doc, arr.get(1)?)?;
                    let palette = match resolve(doc, arr.get(3)?) {
                        Object::String(bytes, _) => bytes.clone(),
                        Object::Stream(s) => stream_bytes(s),
                        _ => return None,
                    };
                    Some(ColorSpace::Indexed {
                        base: Box::new(base),
                        palette,
                    })
                }
                _ => None,
            }
        }
        _ => None,
    }
}

struct PixelLayout {
    width: u32,
    height: u32,
    channels: u8,
    bits: u8,
}

impl PixelLayout {
    fn row_len(&self) -> usize {
        let bits = self.width as usize * self.channels as usize * self.bits as usize;
        bits.div_ceil(8)
    }

    fn expected_len(&self) -> usize {
        self.row_len() * self.height as usize
    }
}

/// Unpack rows of `bits`-wide samples into one byte per sample.
///
/// With `scale`, samples are stretched to 0–255; without it they are kept
/// as-is (palette indices). 16-bit samples keep their high byte.
fn unpack_samples(data: &[u8], layout: &PixelLayout, scale: bool) -> Option<Vec<u8>> {
    if data.len() < layout.expected_len() || layout.width == 0 || layout.height == 0 {
        return None;
    }
    let per_row = layout.width as usize * layout.channels as usize;
    let row_len = layout.row_len();
    let bits = layout.bits;
    let mut out = Vec::with_capacity(per_row * layout.height as usize);

    for row in data.chunks_exact(row_len).take(layout.height as usize) {
        match bits {
            8 => out.extend_from_slice(&row[..per_row]),
            16 => out.extend(row.chunks_exact(2).take(per_row).map(|p| p[0])),
            _ => {
                let max = (1u16 << bits) - 1;
                let per_byte = 8 / bits as usize;
                let mut taken = 0;
                'row: for &byte in row {
                    for i in 0..per_byte {
                        if taken == per_row {
                            break 'row;
                        }
                        let shift = 8 - bits as usize * (i + 1);
                        let v = (byte >> shift) as u16 & max;
                        out.push(if scale { (v * 255 / max) as u8 } else { v as u8 });
                        taken += 1;
                    }
                }
            }
        }
    }
    Some(out)
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let k = px[3] as u16;
        for &c in &px[..3] {
            rgb.push(255u16.saturating_sub((c as u16 + k).min(255)) as u8);
        }
    }
    rgb
}

fn to_dynamic_image(
    space: &ColorSpace,
    width: u32,
    height: u32,
    samples: Vec<u8>,
) -> Option<image::DynamicImage> {
    use image::{DynamicImage, GrayImage, RgbImage};
    match space {
        ColorSpace::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
        ColorSpace::Cmyk => {
            RgbImage::from_raw(width, height, cmyk_to_rgb(&samples)).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Indexed { base, palette } => {
            let n = base.channels() as usize;
            let mut expanded = Vec::with_capacity(samples.len() * n);
            for idx in samples {
                let start = idx as usize * n;
                match palette.get(start..start + n) {
                    Some(entry) => expanded.extend_from_slice(entry),
                    None => expanded.extend(std::iter::repeat(0).take(n)),
                }
            }
            to_dynamic_image(base, width, height, expanded)
        }
    }
}
