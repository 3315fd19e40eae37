use bubble_core::{MarkerStyle, PageBox, PageOverlay};
use image::{ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

mod compose;
mod document;
#[cfg(feature = "pdfium")]
mod pdfium_backend;
mod write;

pub use compose::{compose_overlays, MARKER_FONT_RESOURCE};
pub use document::OpenDocument;
#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumEngine;
pub use write::write_document;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Parent chains longer than this are treated as cyclic.
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    /// Pixels per page unit.
    pub zoom: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, zoom: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("page {page} is malformed: {reason}")]
    MalformedPage { page: u32, reason: String },
    #[error("invalid zoom {0}")]
    InvalidZoom(f32),
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_box(&self, handle: DocumentHandle, page_index: u32)
        -> Result<PageBox, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    /// Serialized copy of the document with `overlays` merged into their pages.
    fn compose(
        &self,
        handle: DocumentHandle,
        overlays: &[PageOverlay],
        style: &MarkerStyle,
    ) -> Result<Vec<u8>, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    page_boxes: Vec<PageBox>,
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_boxes(bytes: &[u8]) -> Result<Vec<PageBox>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut boxes = Vec::with_capacity(pages.len());

        for (number, object_id) in pages {
            let page = number.saturating_sub(1);
            let page_box = media_box(&doc, object_id).ok_or_else(|| PdfEngineError::MalformedPage {
                page,
                reason: "missing or invalid MediaBox".to_owned(),
            })?;
            boxes.push(page_box);
        }

        if boxes.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        Ok(boxes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_boxes = Self::parse_boxes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        debug!(handle = handle.raw(), pages = page_boxes.len(), "document loaded");
        self.docs.insert(handle, DocumentRecord { bytes, page_boxes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_boxes.len() as u32)
    }

    fn page_box(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageBox, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_boxes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_boxes.len() as u32,
        })
    }

    /// Blank page-sized raster with a grey border. Page content is not painted; build with
    /// the `pdfium` feature and use `PdfiumEngine` for that.
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        if !request.zoom.is_finite() || request.zoom <= 0.0 {
            return Err(PdfEngineError::InvalidZoom(request.zoom));
        }
        let page_box = self.page_box(handle, request.page_index)?;

        let width = (page_box.width * request.zoom).round().max(1.0) as u32;
        let height = (page_box.height * request.zoom).round().max(1.0) as u32;

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn compose(
        &self,
        handle: DocumentHandle,
        overlays: &[PageOverlay],
        style: &MarkerStyle,
    ) -> Result<Vec<u8>, PdfEngineError> {
        compose_overlays(&self.record(handle)?.bytes, overlays, style)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Follows one level of indirection.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Looks `key` up on the page dictionary, then on its ancestors in the page tree.
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut dict: &Dictionary = doc.get_dictionary(page_id).ok()?;

    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }

    None
}

fn media_box(doc: &Document, page_id: ObjectId) -> Option<PageBox> {
    let array = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut corners = [0.0f32; 4];
    for (corner, value) in corners.iter_mut().zip(array) {
        *corner = resolve(doc, value)?.as_float().ok()?;
    }
    let [x0, y0, x1, y1] = corners;

    let page_box = PageBox {
        x0: x0.min(x1),
        y0: y0.min(y1),
        width: (x1 - x0).abs(),
        height: (y1 - y0).abs(),
    };
    (page_box.width > 0.0 && page_box.height > 0.0).then_some(page_box)
}


#[cfg(test)]
mod tests {
    use super::test_support::{sample_pdf, sample_pdf_bytes};
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn opens_pdf_and_reads_page_boxes() {
        let mut engine = LopdfEngine::new();
        let handle = engine
            .open(OpenSource::Bytes(sample_pdf_bytes(&[(612, 792), (842, 595)])))
            .expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
        assert_eq!(engine.page_box(handle, 1).expect("box should resolve"), PageBox::new(842.0, 595.0));
        assert!(matches!(
            engine.page_box(handle, 2),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 2 })
        ));
    }

    #[test]
    fn media_box_is_inherited_from_page_tree() {
        let mut doc = sample_pdf(&[(100, 100)]);
        let page_id = *doc.get_pages().get(&1).expect("page 1");
        let pages_id = doc
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Parent"))
            .and_then(Object::as_reference)
            .expect("parent");

        doc.get_object_mut(page_id).and_then(Object::as_dict_mut).expect("page").remove(b"MediaBox");
        doc.get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .expect("pages")
            .set(
                "MediaBox",
                vec![Object::Integer(10), Object::Integer(20), Object::Integer(310), Object::Integer(420)],
            );

        let page_box = media_box(&doc, page_id).expect("inherited box");
        assert_eq!(page_box, PageBox { x0: 10.0, y0: 20.0, width: 300.0, height: 400.0 });
    }

    #[test]
    fn page_without_media_box_is_malformed() {
        let mut doc = sample_pdf(&[(100, 100)]);
        let page_id = *doc.get_pages().get(&1).expect("page 1");
        doc.get_object_mut(page_id).and_then(Object::as_dict_mut).expect("page").remove(b"MediaBox");
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save");

        let err = LopdfEngine::new().open(OpenSource::Bytes(bytes)).expect_err("should fail");
        assert!(matches!(err, PdfEngineError::MalformedPage { page: 0, .. }));
    }

    #[test]
    fn render_matches_page_size_at_zoom() {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(sample_pdf_bytes(&[(300, 150)]))).expect("open");

        let image = engine.render_page(handle, RenderRequest { page_index: 0, zoom: 2.0 }).expect("render");
        assert_eq!(image.dimensions(), (600, 300));
        assert_eq!(image.get_pixel(10, 10), &Rgba([255, 255, 255, 255]));

        assert!(matches!(
            engine.render_page(handle, RenderRequest { page_index: 0, zoom: 0.0 }),
            Err(PdfEngineError::InvalidZoom(_))
        ));
    }

    #[test]
    fn encrypted_documents_are_refused() {
        let mut doc = sample_pdf(&[(100, 100)]);
        let encrypt_id = doc.add_object(dictionary! { "Filter" => "Standard" });
        doc.trailer.set("Encrypt", encrypt_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("save");

        let err = LopdfEngine::new().open(OpenSource::Bytes(bytes)).expect_err("should refuse");
        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn closed_handle_is_invalid() {
        let mut engine = LopdfEngine::new();
        let handle = engine.open(OpenSource::Bytes(sample_pdf_bytes(&[(100, 100)]))).expect("open");
        engine.close(handle).expect("close");
        assert!(matches!(engine.close(handle), Err(PdfEngineError::InvalidHandle(_))));
    }
}
