//! Test fixtures
//!
//! Builds small PDFs in memory with `lopdf` so tests don't depend on
//! binary files checked into the repository.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tempfile::TempDir;

/// How an image's bytes are stored in the fixture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageData {
    /// Uncompressed 8-bit DeviceGray samples
    Gray,
    /// 8-bit DeviceRGB samples
    Rgb,
    /// Baseline JPEG with `/DCTDecode`
    Jpeg,
    /// 8-bit indices into [`INDEXED_PALETTE`], alternating 0 and 1
    Indexed,
    /// DeviceGray with only half of the samples present
    Truncated,
}

/// Two RGB entries: red, then blue
pub const INDEXED_PALETTE: [u8; 6] = [255, 0, 0, 0, 0, 255];

/// One image XObject and where it is painted
#[derive(Debug, Clone)]
pub struct ImageSpec {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
    /// `cm` operands for each `Do`; empty means one default placement
    pub placements: Vec<[i64; 6]>,
    /// `/Decode` array, if any
    pub decode: Option<Vec<i64>>,
    /// Whether the page content paints the image at all
    pub painted: bool,
}

impl ImageSpec {
    pub fn gray(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: ImageData::Gray,
            placements: Vec::new(),
            decode: None,
            painted: true,
        }
    }

    pub fn rgb(width: u32, height: u32) -> Self {
        Self {
            data: ImageData::Rgb,
            ..Self::gray(width, height)
        }
    }

    pub fn jpeg(width: u32, height: u32) -> Self {
        Self {
            data: ImageData::Jpeg,
            ..Self::gray(width, height)
        }
    }

    pub fn indexed(width: u32, height: u32) -> Self {
        Self {
            data: ImageData::Indexed,
            ..Self::gray(width, height)
        }
    }

    pub fn truncated(width: u32, height: u32) -> Self {
        Self {
            data: ImageData::Truncated,
            ..Self::gray(width, height)
        }
    }

    /// `/Decode [1 0]`
    pub fn inverted(mut self) -> Self {
        self.decode = Some(vec![1, 0]);
        self
    }

    /// Declared in the page resources but never drawn
    pub fn unpainted(mut self) -> Self {
        self.painted = false;
        self
    }

    /// Paint at `(x, y)` with size `w x h` in page units
    pub fn placed_at(mut self, x: i64, y: i64, w: i64, h: i64) -> Self {
        self.placements.push([w, 0, 0, h, x, y]);
        self
    }

    /// Expected stream bytes, as stored in the file
    pub fn stream_bytes(&self) -> Vec<u8> {
        let pixels = (self.width * self.height) as usize;
        match self.data {
            ImageData::Gray => (0..pixels).map(|i| (i % 251) as u8).collect(),
            ImageData::Rgb => (0..pixels * 3).map(|i| (i % 253) as u8).collect(),
            ImageData::Indexed => (0..pixels).map(|i| (i % 2) as u8).collect(),
            ImageData::Truncated => (0..pixels / 2).map(|i| (i % 251) as u8).collect(),
            ImageData::Jpeg => {
                let img = image::GrayImage::from_fn(self.width, self.height, |x, y| {
                    image::Luma([((x * 7 + y * 3) % 256) as u8])
                });
                let mut out = Vec::new();
                image::DynamicImage::ImageLuma8(img)
                    .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)
                    .unwrap();
                out
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct PageSpec {
    lines: Vec<String>,
    images: Vec<ImageSpec>,
    /// Paint the images from inside a Form XObject
    in_form: bool,
    crop_box: Option<[i64; 4]>,
    /// Add XObjects with a numeric `/Subtype` and a non-numeric `/Matrix`
    broken_xobjects: bool,
}

/// Fluent builder for fixture PDFs
#[derive(Debug, Clone, Default)]
pub struct PdfBuilder {
    pages: Vec<PageSpec>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page with one text line per `\n`-separated line of `text`
    pub fn text_page(mut self, text: &str) -> Self {
        self.pages.push(PageSpec {
            lines: text.lines().map(str::to_string).collect(),
            ..Default::default()
        });
        self
    }

    /// Page with an empty content stream
    pub fn blank_page(mut self) -> Self {
        self.pages.push(PageSpec::default());
        self
    }

    pub fn image_page(mut self, images: Vec<ImageSpec>) -> Self {
        self.pages.push(PageSpec {
            images,
            ..Default::default()
        });
        self
    }

    /// Page whose images are painted by a Form XObject placed at (100, 100)
    pub fn form_page(mut self, images: Vec<ImageSpec>) -> Self {
        self.pages.push(PageSpec {
            images,
            in_form: true,
            ..Default::default()
        });
        self
    }

    /// Give the last page a CropBox
    pub fn cropped(mut self, x0: i64, y0: i64, x1: i64, y1: i64) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.crop_box = Some([x0, y0, x1, y1]);
        }
        self
    }

    /// Add malformed XObjects, painted first, to the last page
    pub fn with_broken_xobjects(mut self) -> Self {
        if let Some(page) = self.pages.last_mut() {
            page.broken_xobjects = true;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });

        let mut kids = Vec::new();
        for spec in &self.pages {
            let page_id = add_page(&mut doc, spec, pages_id, font_id);
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

fn add_page(doc: &mut Document, spec: &PageSpec, pages_id: ObjectId, font_id: ObjectId) -> ObjectId {
    let mut content = String::new();

    if !spec.lines.is_empty() {
        content.push_str("BT /F1 11 Tf 14 TL 50 750 Td\n");
        for line in &spec.lines {
            content.push_str(&format!("({}) Tj T*\n", escape(line)));
        }
        content.push_str("ET\n");
    }

    let mut image_names = Dictionary::new();
    let mut image_ops = String::new();
    for (i, img) in spec.images.iter().enumerate() {
        let name = format!("Im{}", i);
        let id = add_image(doc, img);
        image_names.set(name.as_bytes().to_vec(), Object::Reference(id));

        if !img.painted {
            continue;
        }
        let default = [img.width as i64, 0, 0, img.height as i64, 50, 50];
        let placements = if img.placements.is_empty() {
            vec![default]
        } else {
            img.placements.clone()
        };
        for [a, b, c, d, e, f] in placements {
            image_ops.push_str(&format!("q {a} {b} {c} {d} {e} {f} cm /{name} Do Q\n"));
        }
    }

    let mut resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };

    let mut xobjects = Dictionary::new();
    if spec.broken_xobjects {
        add_broken_xobjects(doc, &mut xobjects);
        content.push_str("/Bad0 Do /Bad1 Do\n");
    }

    if spec.in_form && !spec.images.is_empty() {
        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => media_box(),
                "Resources" => dictionary! { "XObject" => image_names },
            },
            image_ops.into_bytes(),
        );
        let form_id = doc.add_object(form);
        xobjects.set("Fm0", form_id);
        content.push_str("q 1 0 0 1 100 100 cm /Fm0 Do Q\n");
    } else {
        xobjects.extend(&image_names);
        content.push_str(&image_ops);
    }

    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }

    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut page = dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box(),
        "Resources" => resources,
        "Contents" => content_id,
    };
    if let Some(crop) = spec.crop_box {
        page.set("CropBox", crop.into_iter().map(Object::Integer).collect::<Vec<_>>());
    }
    doc.add_object(page)
}

fn add_broken_xobjects(doc: &mut Document, xobjects: &mut Dictionary) {
    let numeric_subtype = Stream::new(
        dictionary! { "Type" => "XObject", "Subtype" => 5i64 },
        Vec::new(),
    );
    let text_matrix: Vec<Object> = ["a", "b", "c", "d", "e", "f"]
        .into_iter()
        .map(Object::string_literal)
        .collect();
    let bad_form = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "BBox" => media_box(),
            "Matrix" => text_matrix,
        },
        Vec::new(),
    );
    xobjects.set("Bad0", doc.add_object(numeric_subtype));
    xobjects.set("Bad1", doc.add_object(bad_form));
}

fn add_image(doc: &mut Document, img: &ImageSpec) -> ObjectId {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => img.width as i64,
        "Height" => img.height as i64,
        "BitsPerComponent" => 8i64,
    };
    match img.data {
        ImageData::Gray => {
            dict.set("ColorSpace", "DeviceGray");
        }
        ImageData::Rgb => {
            dict.set("ColorSpace", "DeviceRGB");
        }
        ImageData::Jpeg => {
            dict.set("ColorSpace", "DeviceGray");
            dict.set("Filter", "DCTDecode");
        }
        ImageData::Indexed => {
            dict.set(
                "ColorSpace",
                vec![
                    Object::Name(b"Indexed".to_vec()),
                    Object::Name(b"DeviceRGB".to_vec()),
                    Object::Integer(1),
                    Object::String(INDEXED_PALETTE.to_vec(), StringFormat::Hexadecimal),
                ],
            );
        }
        ImageData::Truncated => {
            dict.set("ColorSpace", "DeviceGray");
        }
    }
    if let Some(decode) = &img.decode {
        dict.set("Decode", decode.iter().copied().map(Object::Integer).collect::<Vec<_>>());
    }
    doc.add_object(Stream::new(dict, img.stream_bytes()))
}

fn media_box() -> Vec<Object> {
    [0, 0, 612, 792].into_iter().map(Object::Integer).collect()
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Several lines of prose, comfortably above the minimum text length
pub fn paragraph(tag: &str) -> String {
    (1..=4)
        .map(|i| format!("{} line {} of sample prose for extraction tests", tag, i))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_pdf(dir: &TempDir, builder: &PdfBuilder) -> PathBuf {
    write_file(dir, "fixture.pdf", &builder.build())
}

/// Whether `path` exists and holds exactly `len` bytes
pub fn file_len_is(path: &Path, len: usize) -> bool {
    std::fs::metadata(path)
        .map(|m| m.len() as usize == len)
        .unwrap_or(false)
}
