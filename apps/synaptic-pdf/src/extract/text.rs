//! Text extraction
//!
//! Extracts plain text page by page and joins the non-blank pages with a
//! blank line. Each page record carries `[startOffset, endOffset)` in
//! characters into the joined text, so callers can map a match in the
//! full text back to its page.
//!
//! Blank pages are skipped without reserving any gap: the next included
//! page starts exactly two characters after the previous one ended.

use std::path::Path;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::TextLimits;
use crate::document::{DocumentError, PdfSource};
use crate::output::{serialize_enveloped, Failure, Outcome};

/// Placed between consecutive included pages
pub const PAGE_SEPARATOR: &str = "\n\n";

const SEPARATOR_CHARS: usize = 2;

/// Text of one included page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// 1-indexed source page
    pub page_number: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub text: String,
    /// All pages in the document, including skipped blank ones
    pub page_count: usize,
    pub pages: Vec<PageRecord>,
}

/// Result of a text extraction run
#[derive(Debug, Clone, PartialEq)]
pub enum TextExtraction {
    Success(ExtractedText),
    Failure(Failure),
}

impl Serialize for TextExtraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TextExtraction::Success(body) => serialize_enveloped(true, body, serializer),
            TextExtraction::Failure(body) => serialize_enveloped(false, body, serializer),
        }
    }
}

impl Outcome for TextExtraction {
    fn is_success(&self) -> bool {
        matches!(self, TextExtraction::Success(_))
    }
}

#[derive(Debug, Error)]
pub enum TextError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// Opened fine, but there is (almost) no text layer
    #[error("No text could be extracted from this PDF. It might be a scanned document or contain only images. Consider using OCR software.")]
    InsufficientText { page_count: usize },
}

impl From<mupdf::Error> for TextError {
    fn from(err: mupdf::Error) -> Self {
        TextError::Document(err.into())
    }
}

impl TextError {
    fn into_failure(self) -> Failure {
        let page_count = match &self {
            TextError::InsufficientText { page_count } => Some(*page_count),
            TextError::Document(_) => None,
        };

        match self {
            TextError::Document(e) => Failure::new(e.describe("Unable to parse PDF")),
            insufficient => Failure {
                error: insufficient.to_string(),
                page_count,
            },
        }
    }
}

/// Extract text from the PDF at `path`. Never panics on bad input.
pub fn extract_text(path: &Path, limits: &TextLimits) -> TextExtraction {
    match run(path, limits) {
        Ok(extracted) => {
            tracing::debug!(
                pages = extracted.page_count,
                included = extracted.pages.len(),
                chars = extracted.pages.last().map_or(0, |p| p.end_offset),
                "Extracted text"
            );
            TextExtraction::Success(extracted)
        }
        Err(e) => {
            tracing::warn!("Text extraction failed for {}: {}", path.display(), e);
            TextExtraction::Failure(e.into_failure())
        }
    }
}

fn run(path: &Path, limits: &TextLimits) -> Result<ExtractedText, TextError> {
    let doc = PdfSource::new(path).open().map_err(DocumentError::from)?;
    let page_count = doc.page_count()?.max(0) as usize;

    let mut page_texts = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let page = doc.load_page(index as i32)?;
        page_texts.push(page.to_text()?);
    }

    let (text, pages) = join_pages(page_texts);

    if text.is_empty() || text.trim().chars().count() < limits.min_chars {
        return Err(TextError::InsufficientText { page_count });
    }

    Ok(ExtractedText {
        text,
        page_count,
        pages,
    })
}

/// Join page texts, dropping blank pages and recording character offsets
pub fn join_pages<I>(page_texts: I) -> (String, Vec<PageRecord>)
where
    I: IntoIterator<Item = String>,
{
    let mut full = String::new();
    let mut pages: Vec<PageRecord> = Vec::new();
    let mut offset = 0usize;

    for (index, text) in page_texts.into_iter().enumerate() {
        if text.trim().is_empty() {
            continue;
        }

        if !pages.is_empty() {
            full.push_str(PAGE_SEPARATOR);
        }
        full.push_str(&text);

        let start_offset = offset;
        let end_offset = start_offset + text.chars().count();
        offset = end_offset + SEPARATOR_CHARS;

        pages.push(PageRecord {
            page_number: index + 1,
            text,
            start_offset,
            end_offset,
        });
    }

    (full, pages)
}
