use crate::{write_document, DocumentHandle, LopdfEngine, OpenSource, PdfEngine, PdfEngineError, RenderRequest};
use bubble_core::{DocumentSource, MarkerStyle, PageBox, PageOverlay};
use image::RgbaImage;
use std::path::Path;
use tracing::{debug, info};

/// A document held open by an engine, usable as the session's document collaborator.
///
/// The handle is closed when this value is dropped.
pub struct OpenDocument<E: PdfEngine = LopdfEngine> {
    engine: E,
    handle: DocumentHandle,
    page_count: usize,
}

impl OpenDocument<LopdfEngine> {
    pub fn open(source: impl Into<OpenSource>) -> Result<Self, PdfEngineError> {
        Self::with_engine(LopdfEngine::new(), source)
    }
}

impl<E: PdfEngine> OpenDocument<E> {
    pub fn with_engine(mut engine: E, source: impl Into<OpenSource>) -> Result<Self, PdfEngineError> {
        let handle = engine.open(source.into())?;
        let page_count = engine.page_count(handle)? as usize;
        info!(page_count, "PDF opened");
        Ok(Self { engine, handle, page_count })
    }

    pub fn page_boxes(&self) -> Result<Vec<PageBox>, PdfEngineError> {
        (0..self.page_count).map(|page| DocumentSource::page_box(self, page)).collect()
    }

    fn page_index(&self, page: usize) -> Result<u32, PdfEngineError> {
        u32::try_from(page).ok().filter(|_| page < self.page_count).ok_or(PdfEngineError::PageOutOfRange {
            page: u32::try_from(page).unwrap_or(u32::MAX),
            page_count: self.page_count as u32,
        })
    }
}

impl<E: PdfEngine> DocumentSource for OpenDocument<E> {
    type Error = PdfEngineError;

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_box(&self, page: usize) -> Result<PageBox, PdfEngineError> {
        self.engine.page_box(self.handle, self.page_index(page)?)
    }

    fn render_page(&self, page: usize, zoom: f32) -> Result<RgbaImage, PdfEngineError> {
        self.engine.render_page(self.handle, RenderRequest { page_index: self.page_index(page)?, zoom })
    }

    fn export_overlay(
        &self,
        overlays: &[PageOverlay],
        style: &MarkerStyle,
        output: &Path,
    ) -> Result<(), PdfEngineError> {
        let bytes = self.engine.compose(self.handle, overlays, style)?;
        write_document(&bytes, output)
    }
}

impl<E: PdfEngine> Drop for OpenDocument<E> {
    fn drop(&mut self) {
        if let Err(error) = self.engine.close(self.handle) {
            debug!(%error, "closing document failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_pdf_bytes;
    use bubble_core::{DevicePoint, Session};
    use lopdf::Document;

    #[test]
    fn exposes_pages_to_the_session() {
        let document = OpenDocument::open(sample_pdf_bytes(&[(612, 792), (842, 595)])).expect("open");

        assert_eq!(DocumentSource::page_count(&document), 2);
        assert_eq!(
            document.page_boxes().expect("boxes"),
            vec![PageBox::new(612.0, 792.0), PageBox::new(842.0, 595.0)]
        );
        assert!(matches!(
            DocumentSource::page_box(&document, 2),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 2 })
        ));
    }

    #[test]
    fn session_exports_annotated_copy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("annotated.pdf");

        let mut session = Session::new();
        session
            .open(OpenDocument::open(sample_pdf_bytes(&[(612, 792), (842, 595)])).expect("open"))
            .expect("session opens");
        session.press(DevicePoint::new(20.0, 40.0)).expect("place");
        session.next_page().expect("next");
        session.press(DevicePoint::new(10.0, 10.0)).expect("place");

        assert_eq!(session.export(&output).expect("export"), 2);

        let doc = Document::load(&output).expect("exported file parses");
        assert_eq!(doc.get_pages().len(), 2);
        let page_id = *doc.get_pages().get(&2).expect("page 2");
        let labels: Vec<Vec<u8>> = doc
            .get_and_decode_page_content(page_id)
            .expect("content decodes")
            .operations
            .into_iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| op.operands.first().and_then(|text| text.as_str().ok()).map(<[u8]>::to_vec))
            .collect();
        assert_eq!(labels.last().map(Vec::as_slice), Some(&b"2"[..]));
    }
}
