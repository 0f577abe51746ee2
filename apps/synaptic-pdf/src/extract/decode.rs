//! Image XObject decoding
//!
//! JPEG (`DCTDecode`) and JPEG 2000 (`JPXDecode`) streams are already
//! standalone image files and are returned exactly as stored. Everything
//! else is decoded by MuPDF into raw samples and re-encoded as PNG, with
//! `/Decode` applied and palette (`/Indexed`) images expanded through
//! their lookup table.

use std::io::Cursor;

use mupdf::pdf::PdfObject;

use super::images::SkipReason;

/// Stream metadata read from the image dictionary
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub bits_per_component: u32,
    pub colorspace: ColorSpace,
    pub encoding: Encoding,
    /// `/Decode` ranges, one `[min, max]` pair per component
    pub decode: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette of `hival + 1` entries in `base`
    Indexed {
        base: Box<ColorSpace>,
        hival: u32,
        lookup: Vec<u8>,
    },
    /// Not declared (JPX streams may carry their own)
    Unspecified,
    Unsupported(String),
}

impl ColorSpace {
    /// Colour components per pixel
    pub fn components(&self) -> Option<u32> {
        match self {
            ColorSpace::Gray => Some(1),
            ColorSpace::Rgb => Some(3),
            ColorSpace::Cmyk => Some(4),
            ColorSpace::Indexed { base, .. } => base.components(),
            ColorSpace::Unspecified | ColorSpace::Unsupported(_) => None,
        }
    }

    fn from_name(name: &[u8]) -> Self {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => ColorSpace::Gray,
            b"DeviceRGB" | b"RGB" | b"CalRGB" => ColorSpace::Rgb,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
            other => ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned()),
        }
    }

    fn from_icc_components(n: i32) -> Self {
        match n {
            1 => ColorSpace::Gray,
            3 => ColorSpace::Rgb,
            4 => ColorSpace::Cmyk,
            other => ColorSpace::Unsupported(format!("ICCBased with N={}", other)),
        }
    }
}

/// How the stream bytes become an image file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoding {
    Jpeg,
    Jpx,
    /// Decode samples, encode PNG
    Samples,
}

impl Encoding {
    fn from_filters(filters: &[Vec<u8>]) -> Self {
        match filters {
            [only] if only == b"DCTDecode" || only == b"DCT" => Encoding::Jpeg,
            [only] if only == b"JPXDecode" => Encoding::Jpx,
            _ => Encoding::Samples,
        }
    }
}

/// Image file bytes ready to be written or inlined
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EncodedImage {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

fn undecodable(err: mupdf::Error) -> SkipReason {
    SkipReason::Undecodable(err.to_string())
}

fn int_entry(obj: &PdfObject, keys: &[&str]) -> Result<Option<i32>, mupdf::Error> {
    for key in keys {
        if let Some(value) = obj.get_dict(*key)? {
            return Ok(Some(value.as_int()?));
        }
    }
    Ok(None)
}

/// Read the image dictionary
pub(crate) fn read_info(obj: &PdfObject) -> Result<ImageInfo, SkipReason> {
    let width = int_entry(obj, &["Width", "W"]).map_err(undecodable)?;
    let height = int_entry(obj, &["Height", "H"]).map_err(undecodable)?;
    let (width, height) = match (width, height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w as u32, h as u32),
        _ => return Err(SkipReason::Undecodable("missing or invalid dimensions".into())),
    };

    let is_mask = obj
        .get_dict("ImageMask")
        .map_err(undecodable)?
        .map(|m| m.as_bool().unwrap_or(false))
        .unwrap_or(false);

    let (colorspace, bits_per_component) = if is_mask {
        // Stencil masks are 1-bit, single channel
        (ColorSpace::Gray, 1)
    } else {
        let cs = read_colorspace(obj).map_err(undecodable)?;
        let bpc = int_entry(obj, &["BitsPerComponent", "BPC"])
            .map_err(undecodable)?
            .unwrap_or(8);
        (cs, bpc.max(0) as u32)
    };

    let encoding = Encoding::from_filters(&read_filters(obj).map_err(undecodable)?);
    let decode = read_decode(obj).map_err(undecodable)?;

    Ok(ImageInfo {
        width,
        height,
        bits_per_component,
        colorspace,
        encoding,
        decode,
    })
}

fn read_colorspace(obj: &PdfObject) -> Result<ColorSpace, mupdf::Error> {
    match obj.get_dict("ColorSpace")? {
        Some(cs) => parse_colorspace(&cs, false),
        None => Ok(ColorSpace::Unspecified),
    }
}

/// `in_palette` is set while reading the base of an `/Indexed` space,
/// which may not itself be indexed
fn parse_colorspace(cs: &PdfObject, in_palette: bool) -> Result<ColorSpace, mupdf::Error> {
    if cs.is_name()? {
        return Ok(ColorSpace::from_name(cs.as_name()?));
    }

    if !cs.is_array()? {
        return Ok(ColorSpace::Unsupported("unrecognized colorspace object".into()));
    }

    let family = match cs.get_array(0)? {
        Some(f) => f.as_name()?.to_vec(),
        None => return Ok(ColorSpace::Unsupported("empty array".into())),
    };

    Ok(match family.as_slice() {
        b"ICCBased" => {
            let n = match cs.get_array(1)? {
                Some(profile) => profile.get_dict("N")?.map(|n| n.as_int()).transpose()?,
                None => None,
            };
            ColorSpace::from_icc_components(n.unwrap_or(0))
        }
        b"CalGray" => ColorSpace::Gray,
        b"CalRGB" => ColorSpace::Rgb,
        b"Indexed" | b"I" if !in_palette => read_indexed(cs)?,
        other => ColorSpace::Unsupported(String::from_utf8_lossy(other).into_owned()),
    })
}

/// `[/Indexed base hival lookup]`
fn read_indexed(cs: &PdfObject) -> Result<ColorSpace, mupdf::Error> {
    let base = match cs.get_array(1)? {
        Some(b) => parse_colorspace(&b, true)?,
        None => return Ok(ColorSpace::Unsupported("Indexed without base".into())),
    };
    if base.components().is_none() {
        return Ok(ColorSpace::Unsupported("Indexed over an unsupported base".into()));
    }

    let hival = cs
        .get_array(2)?
        .map(|h| h.as_int())
        .transpose()?
        .unwrap_or(0)
        .clamp(0, 255) as u32;

    // Either a byte string or a stream
    let lookup = match cs.get_array(3)? {
        Some(table) if table.is_stream()? => table.read_stream()?,
        Some(table) => table.as_bytes()?.to_vec(),
        None => Vec::new(),
    };

    Ok(ColorSpace::Indexed {
        base: Box::new(base),
        hival,
        lookup,
    })
}

fn read_decode(obj: &PdfObject) -> Result<Option<Vec<f32>>, mupdf::Error> {
    let array = match obj.get_dict("Decode")? {
        Some(a) if a.is_array()? => a,
        _ => return Ok(None),
    };

    let mut values = Vec::with_capacity(array.len()?);
    for i in 0..array.len()? {
        if let Some(v) = array.get_array(i as i32)? {
            values.push(v.as_float()?);
        }
    }
    Ok(Some(values))
}

fn read_filters(obj: &PdfObject) -> Result<Vec<Vec<u8>>, mupdf::Error> {
    let filter = match obj.get_dict("Filter")? {
        Some(f) => f,
        None => return Ok(Vec::new()),
    };

    if filter.is_array()? {
        let mut names = Vec::new();
        for i in 0..filter.len()? {
            if let Some(item) = filter.get_array(i as i32)? {
                names.push(item.as_name()?.to_vec());
            }
        }
        Ok(names)
    } else {
        Ok(vec![filter.as_name()?.to_vec()])
    }
}

/// Produce the image file bytes for a stream described by `info`
pub(crate) fn encode(obj: &PdfObject, info: &ImageInfo) -> Result<EncodedImage, SkipReason> {
    match info.encoding {
        Encoding::Jpeg => Ok(EncodedImage {
            bytes: obj.read_raw_stream().map_err(undecodable)?,
            extension: "jpeg",
        }),
        Encoding::Jpx => Ok(EncodedImage {
            bytes: obj.read_raw_stream().map_err(undecodable)?,
            extension: "jpx",
        }),
        Encoding::Samples => {
            let data = obj.read_stream().map_err(undecodable)?;
            let bpc = info.bits_per_component;
            let decode = info.decode.as_deref();
            let short_data = || {
                SkipReason::Undecodable(format!(
                    "{} bytes of sample data do not cover {}x{} at {} bpc",
                    data.len(),
                    info.width,
                    info.height,
                    bpc
                ))
            };

            let (components, samples) = match &info.colorspace {
                ColorSpace::Unsupported(name) => {
                    return Err(SkipReason::UnsupportedColorspace(name.clone()))
                }
                ColorSpace::Unspecified => {
                    return Err(SkipReason::UnsupportedColorspace("unspecified".into()))
                }
                ColorSpace::Indexed {
                    base,
                    hival,
                    lookup,
                } => {
                    let n = base.components().unwrap_or(1);
                    let indices = unpack_samples(&data, info.width, info.height, bpc, 1)
                        .ok_or_else(short_data)?;
                    let expanded = expand_indexed(&indices, bpc, decode, *hival, lookup, n)
                        .ok_or_else(|| {
                            SkipReason::Undecodable("palette lookup table is too short".into())
                        })?;
                    (n, expanded)
                }
                cs => {
                    let n = cs.components().unwrap_or(1);
                    let raw = unpack_samples(&data, info.width, info.height, bpc, n)
                        .ok_or_else(short_data)?;
                    (n, scale_samples(&raw, bpc, n, decode))
                }
            };

            let bytes = encode_png(info.width, info.height, components, samples)
                .map_err(SkipReason::Undecodable)?;

            Ok(EncodedImage {
                bytes,
                extension: "png",
            })
        }
    }
}

/// Unpack samples to one value per component.
///
/// Rows are byte-aligned. Returns `None` for unsupported depths or short
/// data.
pub(crate) fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    bits_per_component: u32,
    components: u32,
) -> Option<Vec<u16>> {
    let (width, height) = (width as usize, height as usize);
    let per_row = width * components as usize;
    let bpc = bits_per_component as usize;
    let row_bytes = (per_row * bpc + 7) / 8;

    if !matches!(bpc, 1 | 2 | 4 | 8 | 16) || row_bytes == 0 || data.len() < row_bytes * height {
        return None;
    }

    let mut out = Vec::with_capacity(per_row * height);
    for row in data.chunks_exact(row_bytes).take(height) {
        match bpc {
            8 => out.extend(row[..per_row].iter().map(|&b| b as u16)),
            16 => out.extend(
                row.chunks_exact(2)
                    .take(per_row)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]])),
            ),
            _ => {
                let mask = (1u16 << bpc) - 1;
                for s in 0..per_row {
                    let bit = s * bpc;
                    let shift = 8 - bpc - (bit % 8);
                    out.push((row[bit / 8] as u16 >> shift) & mask);
                }
            }
        }
    }

    Some(out)
}

/// Map raw samples to 8-bit values, honouring `/Decode` when present
pub(crate) fn scale_samples(
    raw: &[u16],
    bits_per_component: u32,
    components: u32,
    decode: Option<&[f32]>,
) -> Vec<u8> {
    let max = (1u32 << bits_per_component) - 1;
    let n = components as usize;

    match decode {
        Some(ranges) if ranges.len() >= 2 * n => raw
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let (lo, hi) = (ranges[2 * (i % n)], ranges[2 * (i % n) + 1]);
                let x = lo + v as f32 * (hi - lo) / max as f32;
                (x.clamp(0.0, 1.0) * 255.0).round() as u8
            })
            .collect(),
        _ => raw.iter().map(|&v| (v as u32 * 255 / max) as u8).collect(),
    }
}

/// Replace palette indices with their `components`-byte lookup entries.
///
/// Returns `None` if an index points past the end of `lookup`.
pub(crate) fn expand_indexed(
    indices: &[u16],
    bits_per_component: u32,
    decode: Option<&[f32]>,
    hival: u32,
    lookup: &[u8],
    components: u32,
) -> Option<Vec<u8>> {
    let max = ((1u32 << bits_per_component) - 1) as f32;
    let n = components as usize;
    let mut out = Vec::with_capacity(indices.len() * n);

    for &v in indices {
        let index = match decode {
            Some(&[lo, hi, ..]) => (lo + v as f32 * (hi - lo) / max).round().max(0.0) as u32,
            _ => v as u32,
        };
        let start = index.min(hival) as usize * n;
        out.extend_from_slice(lookup.get(start..start + n)?);
    }

    Some(out)
}

/// Naive CMYK to RGB, good enough for previews
pub(crate) fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let k = 255 - px[3] as u32;
        for &c in &px[..3] {
            rgb.push(((255 - c as u32) * k / 255) as u8);
        }
    }
    rgb
}

/// Encode 8-bit samples as PNG
pub(crate) fn encode_png(
    width: u32,
    height: u32,
    components: u32,
    samples: Vec<u8>,
) -> Result<Vec<u8>, String> {
    let img = match components {
        1 => image::GrayImage::from_raw(width, height, samples).map(image::DynamicImage::ImageLuma8),
        3 => image::RgbImage::from_raw(width, height, samples).map(image::DynamicImage::ImageRgb8),
        4 => image::RgbImage::from_raw(width, height, cmyk_to_rgb(&samples))
            .map(image::DynamicImage::ImageRgb8),
        n => return Err(format!("cannot encode {} components", n)),
    }
    .ok_or_else(|| "Failed to create image buffer".to_string())?;

    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(output)
}
