//! Overlay merge
//!
//! Each annotated page gets its original content wrapped in `q`/`Q`, so whatever graphics
//! state it leaves behind cannot leak into the markers, followed by one marker stream.
//! Pages without markers are not touched.

use crate::{inherited, resolve, PdfEngineError};
use bubble_core::{Marker, MarkerStyle, PageOverlay};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

/// Font resource name the marker labels are set in.
pub const MARKER_FONT_RESOURCE: &[u8] = b"BblF1";

/// Bezier control distance for a quarter circle of unit radius.
const KAPPA: f32 = 0.552_284_8;

fn malformed(page: u32, reason: &str) -> PdfEngineError {
    PdfEngineError::MalformedPage { page, reason: reason.to_owned() }
}

/// Merges `overlays` into a copy of the document in `source` and serializes it.
///
/// Either every overlay is merged or an error is returned; there is no partial result.
pub fn compose_overlays(
    source: &[u8],
    overlays: &[PageOverlay],
    style: &MarkerStyle,
) -> Result<Vec<u8>, PdfEngineError> {
    if overlays.iter().all(|overlay| overlay.markers.is_empty()) {
        return Ok(source.to_vec());
    }

    let mut doc = Document::load_mem(source)?;
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let restore_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));

    for overlay in overlays.iter().filter(|overlay| !overlay.markers.is_empty()) {
        let page = u32::try_from(overlay.page).unwrap_or(u32::MAX);
        let page_id = pages
            .get(&page.saturating_add(1))
            .copied()
            .ok_or(PdfEngineError::PageOutOfRange { page, page_count })?;

        install_font(&mut doc, page_id, page, font_id)?;

        let content = Content { operations: marker_operations(&overlay.markers, style) };
        let overlay_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        wrap_contents(&mut doc, page_id, page, (save_id, restore_id), overlay_id)?;

        debug!(page, markers = overlay.markers.len(), "overlay merged");
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

/// Gives the page its own Resources dictionary with the marker font added.
///
/// Shared or inherited resources are copied rather than edited, so other pages keep theirs.
fn install_font(
    doc: &mut Document,
    page_id: ObjectId,
    page: u32,
    font_id: ObjectId,
) -> Result<(), PdfEngineError> {
    let mut resources = match inherited(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict.clone(),
        Some(_) => return Err(malformed(page, "Resources is not a dictionary")),
        None => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font").ok().map(|fonts| resolve(doc, fonts)) {
        Some(Some(Object::Dictionary(dict))) => dict.clone(),
        Some(_) => return Err(malformed(page, "Font resources are not a dictionary")),
        None => Dictionary::new(),
    };

    fonts.set(MARKER_FONT_RESOURCE, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn wrap_contents(
    doc: &mut Document,
    page_id: ObjectId,
    page: u32,
    (save_id, restore_id): (ObjectId, ObjectId),
    overlay_id: ObjectId,
) -> Result<(), PdfEngineError> {
    let original: Vec<ObjectId> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => vec![*id],
        Ok(Object::Array(items)) => items
            .iter()
            .map(|item| item.as_reference().map_err(|_| malformed(page, "Contents array holds a direct object")))
            .collect::<Result<_, _>>()?,
        Ok(_) => return Err(malformed(page, "Contents is neither a stream nor an array of streams")),
        Err(_) => Vec::new(),
    };

    for id in &original {
        if !matches!(doc.get_object(*id), Ok(Object::Stream(_))) {
            return Err(malformed(page, "Contents refers to something that is not a stream"));
        }
    }

    let mut contents = Vec::with_capacity(original.len() + 3);
    if !original.is_empty() {
        contents.push(Object::Reference(save_id));
        contents.extend(original.into_iter().map(Object::Reference));
        contents.push(Object::Reference(restore_id));
    }
    contents.push(Object::Reference(overlay_id));

    doc.get_object_mut(page_id)?.as_dict_mut()?.set("Contents", Object::Array(contents));
    Ok(())
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn marker_operations(markers: &[Marker], style: &MarkerStyle) -> Vec<Operation> {
    let (r, g, b) = style.color.to_normalized();
    let mut ops = vec![
        Operation::new("q", vec![]),
        Operation::new("RG", vec![real(r), real(g), real(b)]),
        Operation::new("rg", vec![real(r), real(g), real(b)]),
        Operation::new("w", vec![real(style.stroke_width)]),
    ];

    for marker in markers {
        push_circle(&mut ops, marker.center, style.radius);
        ops.push(Operation::new("S", vec![]));

        let label = marker.label();
        let (cx, cy) = marker.center;
        let x = cx - style.label_width(&label) / 2.0;
        let y = cy - style.label_drop;
        ops.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(MARKER_FONT_RESOURCE.to_vec()), real(style.font_size)]),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ]);
    }

    ops.push(Operation::new("Q", vec![]));
    ops
}

/// Closed circle path from four Bezier quadrants, starting at the rightmost point.
fn push_circle(ops: &mut Vec<Operation>, (cx, cy): (f32, f32), r: f32) {
    let k = r * KAPPA;
    let curve = |points: [f32; 6]| Operation::new("c", points.into_iter().map(real).collect());

    ops.push(Operation::new("m", vec![real(cx + r), real(cy)]));
    ops.push(curve([cx + r, cy + k, cx + k, cy + r, cx, cy + r]));
    ops.push(curve([cx - k, cy + r, cx - r, cy + k, cx - r, cy]));
    ops.push(curve([cx - r, cy - k, cx - k, cy - r, cx, cy - r]));
    ops.push(curve([cx + k, cy - r, cx + r, cy - k, cx + r, cy]));
    ops.push(Operation::new("h", vec![]));
}
