//! Image codec: decode embedded image bytes and write them to disk.
//!
//! Every write has a raw-byte fallback. A JBIG2 stream or a CMYK JPEG the
//! decoder rejects still lands on disk byte-for-byte, so the Markdown never
//! points at a missing file.

use crate::error::ImageError;
use image::{DynamicImage, ImageFormat};
use std::path::Path;
use tracing::debug;

/// How a file ended up on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Decoded and re-encoded in the target format.
    Encoded,
    /// Written verbatim after decoding or encoding failed.
    Raw,
}

/// Map a declared image format onto the extension used for the output file.
///
/// `jpeg`/`jpx` become `jpg`; `png`, `jpg`, `bmp` and `tiff` are kept;
/// anything else is written as `png`.
pub fn normalize_extension(format: &str) -> &'static str {
    match format.to_ascii_lowercase().as_str() {
        "jpeg" | "jpx" | "jpg" => "jpg",
        "bmp" => "bmp",
        "tiff" => "tiff",
        _ => "png",
    }
}

fn target_format(ext: &str) -> ImageFormat {
    match ext {
        "jpg" => ImageFormat::Jpeg,
        "bmp" => ImageFormat::Bmp,
        "tiff" => ImageFormat::Tiff,
        _ => ImageFormat::Png,
    }
}

/// Write `bytes` verbatim.
pub fn write_raw(bytes: &[u8], dest: &Path) -> Result<(), ImageError> {
    std::fs::write(dest, bytes).map_err(|e| ImageError::Write {
        path: dest.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Decode `bytes` and save them as `ext`, falling back to a raw write.
pub fn save_image(bytes: &[u8], ext: &str, dest: &Path) -> Result<SaveMode, ImageError> {
    match encode_to(bytes, ext, dest) {
        Ok(()) => Ok(SaveMode::Encoded),
        Err(e) => {
            debug!("re-encode of {} failed ({}), writing raw bytes", dest.display(), e);
            write_raw(bytes, dest).map(|()| SaveMode::Raw)
        }
    }
}

fn encode_to(bytes: &[u8], ext: &str, dest: &Path) -> Result<(), image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    let format = target_format(ext);
    let img = match (format, &img) {
        (ImageFormat::Jpeg, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)) => img,
        // JPEG carries neither alpha nor wide samples.
        (ImageFormat::Jpeg, _) => DynamicImage::ImageRgb8(img.to_rgb8()),
        _ => img,
    };
    img.save_with_format(dest, format)
}

/// Composite `base` with a single-channel soft mask and write a PNG.
///
/// A mask whose dimensions differ from the base is ignored and the base is
/// written without alpha. No raw fallback happens here; the caller decides.
pub fn save_with_alpha(base: &[u8], mask: Option<&[u8]>, dest: &Path) -> Result<(), ImageError> {
    let fail = |e: image::ImageError| ImageError::Decode {
        id: dest.display().to_string(),
        detail: e.to_string(),
    };
    let base = image::load_from_memory(base).map_err(fail)?;
    let out = match mask {
        Some(mask) => {
            let mask = image::load_from_memory(mask).map_err(fail)?;
            composite_alpha(base, &mask)
        }
        None => base,
    };
    out.save_with_format(dest, ImageFormat::Png).map_err(|e| ImageError::Write {
        path: dest.to_path_buf(),
        detail: e.to_string(),
    })
}

/// Use the luma channel of `mask` as the alpha channel of `base`.
pub fn composite_alpha(base: DynamicImage, mask: &DynamicImage) -> DynamicImage {
    if base.width() != mask.width() || base.height() != mask.height() {
        return base;
    }
    let alpha = mask.to_luma8();
    let mut rgba = base.to_rgba8();
    for (px, a) in rgba.pixels_mut().zip(alpha.pixels()) {
        px.0[3] = a.0[0];
    }
    DynamicImage::ImageRgba8(rgba)
}
