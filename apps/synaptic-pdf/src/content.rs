//! Content stream placements
//!
//! Decodes a page (or form) content stream with `lopdf` and follows the
//! current transformation matrix through it to find where XObjects are
//! painted. Only the operators that affect placement are interpreted:
//!
//! ```text
//! q                push graphics state
//! Q                pop graphics state
//! a b c d e f cm   concatenate matrix
//! /Name Do         paint XObject
//! ```
//!
//! Inline images (`BI .. ID .. EI`) are cut out before decoding, since
//! their binary payload would stop the operator parser.

use std::borrow::Cow;

use lopdf::content::{Content, Operation};
use lopdf::Object;
use mupdf::{Matrix, Point, Rect};

/// An XObject painted by `Do`, with the CTM in effect at that point
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Resource name without the leading slash
    pub name: String,
    pub ctm: Matrix,
}

/// Scan a content stream, starting from `base` as the CTM
pub fn scan(content: &[u8], base: Matrix) -> Vec<Placement> {
    let content = strip_inline_images(content);
    let operations = match Content::decode(&content) {
        Ok(decoded) => decoded.operations,
        Err(e) => {
            tracing::debug!("Undecodable content stream: {}", e);
            return Vec::new();
        }
    };

    let mut ctm = base;
    let mut saved: Vec<Matrix> = Vec::new();
    let mut placements = Vec::new();

    for Operation { operator, operands } in &operations {
        match operator.as_str() {
            "q" => saved.push(ctm.clone()),
            "Q" => {
                // Unbalanced Q is ignored, as viewers do
                if let Some(previous) = saved.pop() {
                    ctm = previous;
                }
            }
            "cm" => {
                if let Some(mut m) = matrix_from_operands(operands) {
                    m.concat(ctm);
                    ctm = m;
                }
            }
            "Do" => {
                if let Some(Ok(name)) = operands.first().map(Object::as_name) {
                    placements.push(Placement {
                        name: String::from_utf8_lossy(name).into_owned(),
                        ctm: ctm.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    placements
}

fn matrix_from_operands(operands: &[Object]) -> Option<Matrix> {
    let values = operands
        .iter()
        .map(Object::as_float)
        .collect::<Result<Vec<f32>, _>>()
        .ok()?;

    match values.as_slice() {
        &[a, b, c, d, e, f] => Some(Matrix::new(a, b, c, d, e, f)),
        _ => None,
    }
}

/// Bounds of the unit square under `ctm`.
///
/// Images are painted into the unit square, so this is the area an image
/// covers in whatever space `ctm` maps to.
pub fn unit_square_bounds(ctm: &Matrix) -> Rect {
    let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
        .map(|(x, y)| Point::new(x, y).transform(ctm));

    corners.iter().skip(1).fold(
        Rect::new(corners[0].x, corners[0].y, corners[0].x, corners[0].y),
        |r, p| Rect::new(r.x0.min(p.x), r.y0.min(p.y), r.x1.max(p.x), r.y1.max(p.y)),
    )
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

/// Position of `token` at or after `from`, delimited by whitespace
fn find_token(content: &[u8], token: &[u8], from: usize) -> Option<usize> {
    let len = token.len();
    (from..content.len().saturating_sub(len - 1)).find(|&i| {
        &content[i..i + len] == token
            && (i == 0 || is_whitespace(content[i - 1]))
            && content.get(i + len).map_or(true, |&b| is_whitespace(b))
    })
}

/// Remove `BI <dict> ID <data> EI` sections
fn strip_inline_images(content: &[u8]) -> Cow<'_, [u8]> {
    let mut stripped: Option<Vec<u8>> = None;
    let mut copied_to = 0;
    let mut pos = 0;

    while let Some(start) = find_token(content, b"BI", pos) {
        // An inline image dictionary always opens with a key
        let dict_start = (start + 2..content.len())
            .find(|&i| !is_whitespace(content[i]))
            .unwrap_or(content.len());
        if content.get(dict_start) != Some(&b'/') {
            pos = start + 2;
            continue;
        }

        let id = match find_token(content, b"ID", dict_start) {
            Some(id) => id,
            None => break,
        };
        // One whitespace byte separates ID from the data
        let data_start = (id + 3).min(content.len());
        let end = find_token(content, b"EI", data_start).map_or(content.len(), |ei| ei + 2);

        let out = stripped.get_or_insert_with(|| Vec::with_capacity(content.len()));
        out.extend_from_slice(&content[copied_to..start]);
        out.push(b'\n');
        copied_to = end;
        pos = end;
    }

    match stripped {
        Some(mut out) => {
            out.extend_from_slice(&content[copied_to..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(content),
    }
}
