//! Page objects
//!
//! Pages are located through MuPDF's page tree lookup, so image extraction
//! sees the same pages, in the same order, as text extraction (repaired
//! files included).

use mupdf::pdf::{PdfDocument, PdfObject};
use mupdf::Matrix;

use super::error::DocumentResult;

/// A page dictionary and its 1-indexed position
pub struct PageObject {
    pub number: usize,
    pub object: PdfObject,
}

/// Number of pages as MuPDF counts them
pub fn page_count(doc: &PdfDocument) -> DocumentResult<usize> {
    Ok(doc.page_count()?.max(0) as usize)
}

/// Look up the page at 0-based `index`
pub fn page_object(doc: &PdfDocument, index: usize) -> DocumentResult<PageObject> {
    Ok(PageObject {
        number: index + 1,
        object: doc.find_page(index as i32)?,
    })
}

impl PageObject {
    /// Effective `/Resources`, own or inherited from the page tree
    pub fn resources(&self) -> DocumentResult<Option<PdfObject>> {
        Ok(self.object.get_dict_inheritable("Resources")?)
    }

    /// Maps PDF user space to top-left-origin page space.
    ///
    /// Accounts for the CropBox origin, `/Rotate` and `/UserUnit`.
    pub fn transform(&self) -> DocumentResult<Matrix> {
        Ok(self.object.page_ctm()?)
    }

    /// Decoded page content, with multiple content streams joined
    pub fn content(&self) -> DocumentResult<Vec<u8>> {
        let contents = match self.object.get_dict("Contents")? {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        if !contents.is_array()? {
            return Ok(contents.read_stream()?);
        }

        let mut data = Vec::new();
        for i in 0..contents.len()? {
            if let Some(part) = contents.get_array(i as i32)? {
                data.extend_from_slice(&part.read_stream()?);
                // Streams may split tokens only at their boundaries
                data.push(b'\n');
            }
        }
        Ok(data)
    }
}
