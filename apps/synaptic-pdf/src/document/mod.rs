//! PDF document access
//!
//! Opening goes through [`PdfSource`], which classifies failures before
//! MuPDF ever sees the file:
//!
//! 1. Missing or unreadable path → [`OpenError::Io`]
//! 2. Zero-byte file → [`OpenError::Empty`]
//! 3. MuPDF rejects the bytes → [`OpenError::Corrupt`]
//!
//! Each extractor run opens the document once and drops it at the end of
//! the run; nothing is shared between threads.

mod error;
mod pages;

use std::path::{Path, PathBuf};

use mupdf::pdf::PdfDocument;
use mupdf::Document;

pub use error::{DocumentError, DocumentResult, OpenError};
pub use pages::{page_count, page_object, PageObject};

/// A PDF on disk, validated before opening
#[derive(Debug, Clone)]
pub struct PdfSource {
    path: PathBuf,
}

impl PdfSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check the file exists, is a regular file and is not empty
    fn validate(&self) -> Result<(), OpenError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("no such file: '{}': {}", self.path.display(), e),
            )
        })?;

        if meta.is_dir() {
            return Err(OpenError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("'{}' is no file", self.path.display()),
            )));
        }

        if meta.len() == 0 {
            return Err(OpenError::Empty(format!("'{}'", self.path.display())));
        }

        Ok(())
    }

    /// Open for page-level operations (text)
    pub fn open(&self) -> Result<Document, OpenError> {
        self.validate()?;
        let path_str = self.path.to_string_lossy();
        Document::open(&*path_str).map_err(|e| OpenError::Corrupt(e.to_string()))
    }

    /// Open for object-level operations (image XObjects)
    pub fn open_pdf(&self) -> Result<PdfDocument, OpenError> {
        self.validate()?;
        let path_str = self.path.to_string_lossy();
        PdfDocument::open(&*path_str).map_err(|e| OpenError::Corrupt(e.to_string()))
    }
}
