//! Extractor arguments
//!
//! Any parse failure (missing path, `--help`, unknown flag) is reported as
//! the JSON usage error instead of clap's own output, so callers always get
//! one JSON object on stdout.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::output::UsageError;

pub const TEXT_USAGE: &str = "extract-pdf-text <pdf_file_path>";
pub const IMAGES_USAGE: &str = "extract-pdf-images <pdf_file_path> [output_directory]";

#[derive(Parser, Debug, PartialEq)]
#[command(name = "extract-pdf-text")]
#[command(about = "Extract per-page text from a PDF as JSON")]
pub struct TextArgs {
    /// PDF to read
    pub pdf_file_path: PathBuf,
}

#[derive(Parser, Debug, PartialEq)]
#[command(name = "extract-pdf-images")]
#[command(about = "Extract embedded images from a PDF as JSON")]
pub struct ImagesArgs {
    /// PDF to read
    pub pdf_file_path: PathBuf,

    /// Write images here instead of inlining them as base64
    pub output_directory: Option<PathBuf>,
}

fn parse<P, I, T>(args: I, usage: &str) -> Result<P, UsageError>
where
    P: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    P::try_parse_from(args).map_err(|e| {
        tracing::debug!("Argument error: {:?}", e.kind());
        UsageError::new(usage)
    })
}

impl TextArgs {
    pub fn parse_args<I, T>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        parse(args, TEXT_USAGE)
    }
}

impl ImagesArgs {
    pub fn parse_args<I, T>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        parse(args, IMAGES_USAGE)
    }
}
