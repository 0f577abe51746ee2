//! Extraction entry points
//!
//! - `text`: per-page text with offsets into the joined document text
//! - `images`: embedded image XObjects, written to disk or inlined

mod decode;
pub mod images;
pub mod text;

pub use images::{extract_images, ImageExtraction, ImageRecord, OutputMode};
pub use text::{extract_text, PageRecord, TextExtraction};
