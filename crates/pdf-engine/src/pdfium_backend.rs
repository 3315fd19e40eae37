//! Page rasterization through PDFium.
//!
//! Geometry, overlay merge and writing stay on lopdf. Only `render_page` differs: it
//! paints the real page content, so captured regions carry what is drawn on the sheet.

use crate::{
    DocumentHandle, LopdfEngine, OpenSource, PdfEngine, PdfEngineError, RenderRequest, RgbaImage,
};
use bubble_core::{MarkerStyle, PageBox, PageOverlay};
use pdfium_render::prelude::*;
use tracing::debug;

pub struct PdfiumEngine {
    pdfium: Pdfium,
    inner: LopdfEngine,
}

impl PdfiumEngine {
    /// Binds the PDFium library.
    ///
    /// Search order: the executable's directory, the working directory, then the
    /// system library paths.
    pub fn bind() -> Result<Self, PdfEngineError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

        if let Some(ref dir) = exe_dir {
            if let Ok(bindings) =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            {
                return Ok(Self::with_bindings(bindings));
            }
        }

        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|err| backend_error("failed to bind pdfium library", err))?;

        Ok(Self::with_bindings(bindings))
    }

    fn with_bindings(bindings: Box<dyn PdfiumLibraryBindings>) -> Self {
        debug!("pdfium bound");
        Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::new() }
    }
}

fn backend_error(what: &str, err: PdfiumError) -> PdfEngineError {
    PdfEngineError::Backend(format!("{what}: {err}"))
}

impl PdfEngine for PdfiumEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        self.inner.open(source)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        self.inner.page_count(handle)
    }

    fn page_box(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageBox, PdfEngineError> {
        self.inner.page_box(handle, page_index)
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        if !request.zoom.is_finite() || request.zoom <= 0.0 {
            return Err(PdfEngineError::InvalidZoom(request.zoom));
        }
        let page_box = self.inner.page_box(handle, request.page_index)?;
        let record = self.inner.record(handle)?;

        let index = u16::try_from(request.page_index).map_err(|_| PdfEngineError::PageOutOfRange {
            page: request.page_index,
            page_count: record.page_boxes.len() as u32,
        })?;

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&record.bytes, None)
            .map_err(|err| backend_error("pdfium failed to load document", err))?;
        let page = document
            .pages()
            .get(index)
            .map_err(|err| backend_error("pdfium failed to load page", err))?;

        let width = (page_box.width * request.zoom).round().max(1.0) as u32;
        let height = (page_box.height * request.zoom).round().max(1.0) as u32;
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|err| backend_error("pdfium failed to render page", err))?;

        RgbaImage::from_raw(bitmap.width() as u32, bitmap.height() as u32, bitmap.as_rgba_bytes().to_vec())
            .ok_or_else(|| PdfEngineError::Backend("pdfium returned a short bitmap".to_owned()))
    }

    fn compose(
        &self,
        handle: DocumentHandle,
        overlays: &[PageOverlay],
        style: &MarkerStyle,
    ) -> Result<Vec<u8>, PdfEngineError> {
        self.inner.compose(handle, overlays, style)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.inner.close(handle)
    }
}
