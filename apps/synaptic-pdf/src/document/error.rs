//! Document error types
//!
//! Errors produced while opening a PDF or reading its objects.

use thiserror::Error;

/// Why a document could not be opened
///
/// The kinds matter to callers: an empty upload and a corrupt upload are
/// reported with different messages.
#[derive(Debug, Error)]
pub enum OpenError {
    /// Zero-byte file
    #[error("PDF file is empty: cannot open empty file: {0}")]
    Empty(String),

    /// MuPDF refused the bytes
    #[error("Invalid or corrupted PDF file: {0}")]
    Corrupt(String),

    /// File missing or unreadable
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl OpenError {
    /// True for the kinds that carry their own caller-facing prefix
    pub fn is_specific(&self) -> bool {
        matches!(self, OpenError::Empty(_) | OpenError::Corrupt(_))
    }
}

/// Failure while reading an already opened document
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The document could not be opened at all
    #[error(transparent)]
    Open(#[from] OpenError),

    /// MuPDF error while loading pages or objects
    #[error("MuPDF error: {0}")]
    MuPdf(String),
}

/// Result type alias for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::MuPdf(err.to_string())
    }
}

impl DocumentError {
    /// Render for a caller, using `generic_prefix` for errors that are not
    /// one of the specific open kinds.
    pub fn describe(&self, generic_prefix: &str) -> String {
        match self {
            DocumentError::Open(e) if e.is_specific() => e.to_string(),
            other => format!("{}: {}", generic_prefix, other),
        }
    }
}
