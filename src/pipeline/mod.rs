//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own; everything after [`source`] works on synthetic pages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdfium/xobject ──▶ extract ──▶ fonts ──▶ assemble
//! (path)    (raw pages)        (blocks)    (sizes)   (Markdown, + ocr)
//! ```
//!
//! 1. [`input`]: validate the user-supplied path (exists, readable, `%PDF`)
//! 2. [`pdfium`]: the concrete [`source::PageSource`]: text spans via
//!    pdfium, grouped by [`layout`]; images via [`xobject`] (lopdf)
//! 3. [`extract`]: per page: text blocks, saved images ([`codec`]),
//!    reading order
//! 4. [`fonts`]: body size and heading thresholds across all pages
//! 5. [`assemble`]: Markdown with headings, figure pairing and optional
//!    [`ocr`] blocks

pub mod assemble;
pub mod codec;
pub mod extract;
pub mod fonts;
pub mod input;
pub mod layout;
pub mod ocr;
pub mod pdfium;
pub mod source;
pub mod xobject;
