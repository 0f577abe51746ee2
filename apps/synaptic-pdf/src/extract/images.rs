//! Image extraction
//!
//! Walks every page in order, lists the image XObjects in its resources
//! (including those of nested Form XObjects) and turns each into an
//! [`ImageRecord`].
//!
//! # Rules
//!
//! - Images are listed per page in `/XObject` dictionary order, once per
//!   `xref` (PDF object number).
//! - `bbox` comes from the first place the page content paints the image,
//!   and is omitted for images that are never painted.
//! - `imageIndex` is the position in that list; skipped images still use
//!   up their index, so filenames stay stable.
//! - Images narrower or shorter than `min_size` are skipped.
//! - A failure on one image skips that image only.
//! - Extraction stops as soon as `max_images` records are collected.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use mupdf::pdf::PdfObject;
use mupdf::Matrix;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::decode;
use crate::config::ImageLimits;
use crate::content;
use crate::document::{self, DocumentError, DocumentResult, PageObject, PdfSource};
use crate::output::{serialize_enveloped, Failure, Outcome};

/// Form XObjects nested deeper than this are not followed
const MAX_FORM_DEPTH: usize = 8;

/// Where accepted images go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Base64 in the JSON result
    Inline,
    /// Written to this directory (created if missing)
    Directory(PathBuf),
}

impl OutputMode {
    pub fn from_arg(dir: Option<PathBuf>) -> Self {
        match dir {
            Some(dir) => OutputMode::Directory(dir),
            None => OutputMode::Inline,
        }
    }
}

/// Metadata for one accepted image
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    /// 1-indexed page
    pub page_number: usize,
    /// 0-indexed position among the page's images
    pub image_index: usize,
    pub filename: String,
    pub width: u32,
    pub height: u32,
    /// Colour components (1 gray, 3 RGB, 4 CMYK, 0 unknown)
    pub colorspace: u32,
    pub bits_per_component: u32,
    pub xref: i32,
    pub extension: String,
    pub size_bytes: usize,
    /// `[x0, y0, x1, y1]`, origin at the top-left of the page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f32; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedImages {
    pub images: Vec<ImageRecord>,
    pub total_images: usize,
    /// All pages, not just those that contributed images
    pub page_count: usize,
}

/// Result of an image extraction run
#[derive(Debug, Clone, PartialEq)]
pub enum ImageExtraction {
    Success(ExtractedImages),
    Failure(Failure),
}

impl Serialize for ImageExtraction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ImageExtraction::Success(body) => serialize_enveloped(true, body, serializer),
            ImageExtraction::Failure(body) => serialize_enveloped(false, body, serializer),
        }
    }
}

impl Outcome for ImageExtraction {
    fn is_success(&self) -> bool {
        matches!(self, ImageExtraction::Success(_))
    }
}

/// Why a single image was left out
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("{width}x{height} is below the {min}px minimum")]
    TooSmall { width: u32, height: u32, min: u32 },

    #[error("Unsupported colorspace: {0}")]
    UnsupportedColorspace(String),

    #[error("Cannot decode image: {0}")]
    Undecodable(String),

    #[error("Cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Per-image result; skipped images never abort the run
#[derive(Debug)]
pub enum ImageOutcome {
    Accepted(ImageRecord),
    Skipped { xref: i32, reason: SkipReason },
}

#[derive(Debug, Error)]
enum ImageError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Unable to create output directory {path}: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<mupdf::Error> for ImageError {
    fn from(err: mupdf::Error) -> Self {
        ImageError::Document(err.into())
    }
}

impl ImageError {
    fn into_failure(self) -> Failure {
        match self {
            ImageError::Document(e) => Failure::new(e.describe("Unable to extract images")),
            other => Failure::new(other.to_string()),
        }
    }
}

/// An image declared on a page
struct Candidate {
    xref: i32,
    object: PdfObject,
    /// CTM of the first placement; `None` if the page never paints it
    ctm: Option<Matrix>,
}

enum XObjectKind {
    /// Object number of the image stream
    Image(i32),
    Form(Option<i32>),
    Other,
}

/// Extract images from the PDF at `path`. Never panics on bad input.
pub fn extract_images(path: &Path, output: &OutputMode, limits: &ImageLimits) -> ImageExtraction {
    match run(path, output, limits) {
        Ok(extracted) => {
            tracing::debug!(
                pages = extracted.page_count,
                images = extracted.total_images,
                "Extracted images"
            );
            ImageExtraction::Success(extracted)
        }
        Err(e) => {
            tracing::warn!("Image extraction failed for {}: {}", path.display(), e);
            ImageExtraction::Failure(e.into_failure())
        }
    }
}

fn run(path: &Path, output: &OutputMode, limits: &ImageLimits) -> Result<ExtractedImages, ImageError> {
    if let OutputMode::Directory(dir) = output {
        std::fs::create_dir_all(dir).map_err(|source| ImageError::OutputDir {
            path: dir.display().to_string(),
            source,
        })?;
    }

    let doc = PdfSource::new(path).open_pdf().map_err(DocumentError::from)?;
    let page_count = document::page_count(&doc)?;

    let mut images: Vec<ImageRecord> = Vec::new();

    'pages: for index in 0..page_count {
        if images.len() >= limits.max_images {
            break;
        }

        let page = match document::page_object(&doc, index) {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(page = index + 1, "Skipping unreadable page: {}", e);
                continue;
            }
        };
        let transform = match page.transform() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::debug!(page = page.number, "No page transform: {}", e);
                None
            }
        };

        for (image_index, candidate) in page_candidates(&page).into_iter().enumerate() {
            if images.len() >= limits.max_images {
                break 'pages;
            }

            let bbox = match (&candidate.ctm, &transform) {
                (Some(ctm), Some(page_transform)) => bbox_on_page(ctm, page_transform),
                _ => None,
            };

            match process_candidate(&candidate, bbox, page.number, image_index, output, limits) {
                ImageOutcome::Accepted(record) => images.push(record),
                ImageOutcome::Skipped { xref, reason } => {
                    tracing::debug!(page = page.number, xref, "Skipping image: {}", reason);
                }
            }
        }
    }

    Ok(ExtractedImages {
        total_images: images.len(),
        images,
        page_count,
    })
}

/// Images declared on `page`, with their first placement if painted
fn page_candidates(page: &PageObject) -> Vec<Candidate> {
    let resources = match page.resources() {
        Ok(Some(r)) => r,
        Ok(None) => return Vec::new(),
        Err(e) => {
            tracing::debug!(page = page.number, "Unreadable resources: {}", e);
            return Vec::new();
        }
    };

    let mut declared = Vec::new();
    list_images(&resources, 0, &mut HashSet::new(), &mut declared);
    if declared.is_empty() {
        return declared;
    }

    let mut first_placement = HashMap::new();
    match page.content() {
        Ok(content) => find_placements(
            &content,
            &resources,
            Matrix::IDENTITY,
            0,
            &mut HashSet::new(),
            &mut first_placement,
        ),
        Err(e) => tracing::debug!(page = page.number, "Unreadable page content: {}", e),
    }

    for candidate in &mut declared {
        candidate.ctm = first_placement.remove(&candidate.xref);
    }
    declared
}

/// Entries of the `/XObject` dictionary in `resources`, in dictionary order
fn xobject_entries(resources: &PdfObject) -> DocumentResult<Vec<(String, PdfObject)>> {
    let dict = match resources.get_dict("XObject")? {
        Some(d) if d.is_dict()? => d,
        _ => return Ok(Vec::new()),
    };

    let mut entries = Vec::new();
    for i in 0..dict.dict_len()? as i32 {
        if let (Some(key), Some(value)) = (dict.get_dict_key(i)?, dict.get_dict_val(i)?) {
            entries.push((String::from_utf8_lossy(key.as_name()?).into_owned(), value));
        }
    }
    Ok(entries)
}

fn classify(xobj: &PdfObject) -> DocumentResult<XObjectKind> {
    let subtype = match xobj.get_dict("Subtype")? {
        Some(s) if s.is_name()? => s.as_name()?.to_vec(),
        _ => return Ok(XObjectKind::Other),
    };
    let xref = if xobj.is_indirect()? {
        Some(xobj.as_indirect()?)
    } else {
        None
    };

    Ok(match (subtype.as_slice(), xref) {
        // Image streams are always indirect; the object number is the xref
        (b"Image", Some(xref)) => XObjectKind::Image(xref),
        (b"Form", xref) => XObjectKind::Form(xref),
        _ => XObjectKind::Other,
    })
}

/// Collect images from `resources` and the resources of its forms.
///
/// `seen` holds the xrefs of images and forms already visited.
fn list_images(
    resources: &PdfObject,
    depth: usize,
    seen: &mut HashSet<i32>,
    out: &mut Vec<Candidate>,
) {
    let entries = match xobject_entries(resources) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!("Unreadable /XObject resources: {}", e);
            return;
        }
    };

    for (name, xobj) in entries {
        match classify(&xobj) {
            Ok(XObjectKind::Image(xref)) => {
                if seen.insert(xref) {
                    out.push(Candidate {
                        xref,
                        object: xobj,
                        ctm: None,
                    });
                }
            }
            Ok(XObjectKind::Form(xref)) => {
                if depth >= MAX_FORM_DEPTH || !xref.map_or(true, |x| seen.insert(x)) {
                    continue;
                }
                match xobj.get_dict("Resources") {
                    Ok(Some(own)) => list_images(&own, depth + 1, seen, out),
                    Ok(None) => {}
                    Err(e) => tracing::debug!("Skipping resources of form /{}: {}", name, e),
                }
            }
            Ok(XObjectKind::Other) => {}
            Err(e) => tracing::debug!("Skipping XObject /{}: {}", name, e),
        }
    }
}

/// Record the CTM of the first `Do` of each image in `content`.
///
/// A form is followed only the first time it is painted, since later
/// placements cannot come before the ones already recorded.
fn find_placements(
    content: &[u8],
    resources: &PdfObject,
    base: Matrix,
    depth: usize,
    visited_forms: &mut HashSet<i32>,
    first: &mut HashMap<i32, Matrix>,
) {
    let xobjects: HashMap<String, PdfObject> = match xobject_entries(resources) {
        Ok(entries) => entries.into_iter().collect(),
        Err(e) => {
            tracing::debug!("Unreadable /XObject resources: {}", e);
            return;
        }
    };
    if xobjects.is_empty() {
        return;
    }

    for placement in content::scan(content, base) {
        let xobj = match xobjects.get(&placement.name) {
            Some(x) => x,
            None => continue,
        };

        match classify(xobj) {
            Ok(XObjectKind::Image(xref)) => {
                first.entry(xref).or_insert(placement.ctm);
            }
            Ok(XObjectKind::Form(xref)) => {
                if depth >= MAX_FORM_DEPTH || !xref.map_or(true, |x| visited_forms.insert(x)) {
                    continue;
                }
                let followed = place_form(
                    xobj,
                    placement.ctm.clone(),
                    resources,
                    depth,
                    visited_forms,
                    first,
                );
                if let Err(e) = followed {
                    tracing::debug!("Skipping form /{}: {}", placement.name, e);
                }
            }
            Ok(XObjectKind::Other) => {}
            Err(e) => tracing::debug!("Skipping XObject /{}: {}", placement.name, e),
        }
    }
}

fn place_form(
    form: &PdfObject,
    ctm: Matrix,
    parent_resources: &PdfObject,
    depth: usize,
    visited_forms: &mut HashSet<i32>,
    first: &mut HashMap<i32, Matrix>,
) -> DocumentResult<()> {
    let mut base = match form_matrix(form)? {
        Some(m) => m,
        None => {
            tracing::debug!("Ignoring form with a malformed /Matrix");
            return Ok(());
        }
    };
    base.concat(ctm);

    let content = form.read_stream()?;
    let own_resources = form.get_dict("Resources")?;
    find_placements(
        &content,
        own_resources.as_ref().unwrap_or(parent_resources),
        base,
        depth + 1,
        visited_forms,
        first,
    );
    Ok(())
}

/// The form's `/Matrix`: identity when absent, `None` when malformed
fn form_matrix(form: &PdfObject) -> DocumentResult<Option<Matrix>> {
    let array = match form.get_dict("Matrix")? {
        Some(a) => a,
        None => return Ok(Some(Matrix::IDENTITY)),
    };
    if !array.is_array()? || array.len()? != 6 {
        return Ok(None);
    }

    let mut values = [0.0f32; 6];
    for (i, slot) in values.iter_mut().enumerate() {
        match array.get_array(i as i32)? {
            Some(v) if v.is_number()? => *slot = v.as_float()?,
            _ => return Ok(None),
        }
    }

    let [a, b, c, d, e, f] = values;
    Ok(Some(Matrix::new(a, b, c, d, e, f)))
}

/// Bounds of a placement in top-left-origin page coordinates
fn bbox_on_page(ctm: &Matrix, page_transform: &Matrix) -> Option<[f32; 4]> {
    let mut to_page = ctm.clone();
    to_page.concat(page_transform.clone());

    let r = content::unit_square_bounds(&to_page);
    let bbox = [r.x0, r.y0, r.x1, r.y1];
    bbox.iter().all(|v| v.is_finite()).then_some(bbox)
}

fn process_candidate(
    candidate: &Candidate,
    bbox: Option<[f32; 4]>,
    page_number: usize,
    image_index: usize,
    output: &OutputMode,
    limits: &ImageLimits,
) -> ImageOutcome {
    match build_record(candidate, bbox, page_number, image_index, output, limits) {
        Ok(record) => ImageOutcome::Accepted(record),
        Err(reason) => ImageOutcome::Skipped {
            xref: candidate.xref,
            reason,
        },
    }
}

fn build_record(
    candidate: &Candidate,
    bbox: Option<[f32; 4]>,
    page_number: usize,
    image_index: usize,
    output: &OutputMode,
    limits: &ImageLimits,
) -> Result<ImageRecord, SkipReason> {
    let info = decode::read_info(&candidate.object)?;

    if info.width < limits.min_size || info.height < limits.min_size {
        return Err(SkipReason::TooSmall {
            width: info.width,
            height: info.height,
            min: limits.min_size,
        });
    }

    let encoded = decode::encode(&candidate.object, &info)?;
    let filename = format!(
        "page_{}_img_{}.{}",
        page_number, image_index, encoded.extension
    );

    let mut record = ImageRecord {
        page_number,
        image_index,
        filename,
        width: info.width,
        height: info.height,
        colorspace: info.colorspace.components().unwrap_or(0),
        bits_per_component: info.bits_per_component,
        xref: candidate.xref,
        extension: encoded.extension.to_string(),
        size_bytes: encoded.bytes.len(),
        bbox,
        filepath: None,
        base64: None,
        mime_type: None,
    };

    match output {
        OutputMode::Directory(dir) => {
            let path = dir.join(&record.filename);
            std::fs::write(&path, &encoded.bytes).map_err(|source| SkipReason::Write {
                path: path.display().to_string(),
                source,
            })?;
            record.filepath = Some(path.to_string_lossy().into_owned());
        }
        OutputMode::Inline => {
            record.base64 = Some(STANDARD.encode(&encoded.bytes));
            record.mime_type = Some(format!("image/{}", encoded.extension));
        }
    }

    Ok(record)
}
