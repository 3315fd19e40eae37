//! Session controller
//!
//! Owns the loaded document, the page on screen and the annotation store, and turns
//! discrete pointer and keyboard events into store mutations. Every handler runs to
//! completion on the caller's thread; only text recognition is handed off.

use crate::capture::{crop_raster, Capture, SelectionGesture};
use crate::display::{page_display_ops, DisplayOp};
use crate::geometry::{to_page_space, DevicePoint, PageBox, Scale, TransformError};
use crate::listing::{bubble_listing, page_label};
use crate::ocr::{OcrDispatcher, OcrError, OcrJob, OcrOutcome};
use crate::overlay::{plan_overlay, PageOverlay};
use crate::store::{AnnotationStore, BubbleId, Region};
use crate::style::{MarkerStyle, ScreenStyle};
use image::RgbaImage;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Zoom used to rasterize pages for display.
pub const DEFAULT_ZOOM: f32 = 2.0;

/// The document collaborator: page geometry, rasterization and overlay export.
pub trait DocumentSource {
    type Error: std::error::Error + Send + Sync + 'static;

    fn page_count(&self) -> usize;

    fn page_box(&self, page: usize) -> Result<PageBox, Self::Error>;

    /// Rasterizes `page` at `zoom` pixels per page unit.
    fn render_page(&self, page: usize, zoom: f32) -> Result<RgbaImage, Self::Error>;

    /// Writes a copy of the document with `overlays` merged in. Must not leave a partial file.
    fn export_overlay(
        &self,
        overlays: &[PageOverlay],
        style: &MarkerStyle,
        output: &Path,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No PDF loaded")]
    NoDocument,
    #[error("document has no pages")]
    EmptyDocument,
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Document(Box<dyn std::error::Error + Send + Sync>),
}

fn document_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> SessionError {
    SessionError::Document(Box::new(error))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    Placing,
    Selecting,
}

/// Discrete input events, in device pixels of the raster on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionAction {
    Press(DevicePoint),
    MoveTo(DevicePoint),
    Release(DevicePoint),
    ToggleSelectionMode,
    NextPage,
    PreviousPage,
    ClearPage,
    ClearAll,
}

/// What an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    BubblePlaced(BubbleId),
    SelectionStarted,
    SelectionMoved,
    RegionCaptured(Capture),
    ModeChanged(Mode),
    PageShown(usize),
    Cleared,
    Ignored,
}

/// Report of one finished recognition, for the user.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrNotice {
    Recognized { bubble: BubbleId, text: String },
    Failed { bubble: BubbleId, message: String },
}

/// The page on screen and the raster it was drawn from.
#[derive(Debug, Clone)]
pub struct PageView {
    pub page: usize,
    pub page_box: PageBox,
    pub raster: RgbaImage,
    pub scale: Scale,
}

pub struct Session<D: DocumentSource> {
    document: Option<D>,
    view: Option<PageView>,
    zoom: f32,
    store: AnnotationStore,
    selection_mode: bool,
    gesture: Option<SelectionGesture>,
    ocr: Option<OcrDispatcher>,
    marker_style: MarkerStyle,
    screen_style: ScreenStyle,
}

impl<D: DocumentSource> Default for Session<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DocumentSource> Session<D> {
    pub fn new() -> Self {
        Self {
            document: None,
            view: None,
            zoom: DEFAULT_ZOOM,
            store: AnnotationStore::new(),
            selection_mode: false,
            gesture: None,
            ocr: None,
            marker_style: MarkerStyle::default(),
            screen_style: ScreenStyle::default(),
        }
    }

    /// Uses `dispatcher` for recognizing captured regions. Without one, regions are kept
    /// but never get text.
    pub fn with_ocr(mut self, dispatcher: OcrDispatcher) -> Self {
        self.ocr = Some(dispatcher);
        self
    }

    pub fn with_zoom(mut self, zoom: f32) -> Result<Self, SessionError> {
        Scale::new(zoom)?;
        self.zoom = zoom;
        Ok(self)
    }

    pub fn with_marker_style(mut self, style: MarkerStyle) -> Self {
        self.marker_style = style;
        self
    }

    pub fn with_screen_style(mut self, style: ScreenStyle) -> Self {
        self.screen_style = style;
        self
    }

    /// Loads `document` and shows its first page. Every bubble of the previous document is discarded.
    pub fn open(&mut self, document: D) -> Result<(), SessionError> {
        if document.page_count() == 0 {
            return Err(SessionError::EmptyDocument);
        }

        self.store.clear_all();
        self.gesture = None;
        self.view = None;
        self.document = Some(document);
        self.show_page(0)?;

        info!(page_count = self.page_count(), "document opened");
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        match (&self.document, self.selection_mode) {
            (None, _) => Mode::Idle,
            (Some(_), false) => Mode::Placing,
            (Some(_), true) => Mode::Selecting,
        }
    }

    pub fn apply(&mut self, action: SessionAction) -> Result<EventOutcome, SessionError> {
        match action {
            SessionAction::Press(point) => self.press(point),
            SessionAction::MoveTo(point) => self.move_to(point),
            SessionAction::Release(point) => self.release(point),
            SessionAction::ToggleSelectionMode => self.toggle_selection_mode().map(EventOutcome::ModeChanged),
            SessionAction::NextPage => self.next_page().map(EventOutcome::PageShown),
            SessionAction::PreviousPage => self.previous_page().map(EventOutcome::PageShown),
            SessionAction::ClearPage => self.clear_page().map(|()| EventOutcome::Cleared),
            SessionAction::ClearAll => self.clear_all().map(|()| EventOutcome::Cleared),
        }
    }

    /// Left button down. Places a bubble, or starts a selection drag in selection mode.
    pub fn press(&mut self, point: DevicePoint) -> Result<EventOutcome, SessionError> {
        let view = self.view.as_ref().ok_or(SessionError::NoDocument)?;

        if self.selection_mode {
            self.gesture = Some(SelectionGesture::begin(&self.store, view.page, point));
            return Ok(EventOutcome::SelectionStarted);
        }

        let position = to_page_space(point, view.scale);
        let id = self.store.add_bubble(view.page, position);
        debug!(page = id.page, local_index = id.local_index, x = position.x, y = position.y, "bubble placed");
        Ok(EventOutcome::BubblePlaced(id))
    }

    pub fn move_to(&mut self, point: DevicePoint) -> Result<EventOutcome, SessionError> {
        if self.view.is_none() {
            return Err(SessionError::NoDocument);
        }

        match self.gesture.as_mut() {
            Some(gesture) => {
                gesture.update(point);
                Ok(EventOutcome::SelectionMoved)
            }
            None => Ok(EventOutcome::Ignored),
        }
    }

    /// Left button up. Completes a selection drag; selection mode stays on.
    pub fn release(&mut self, point: DevicePoint) -> Result<EventOutcome, SessionError> {
        let view = self.view.as_ref().ok_or(SessionError::NoDocument)?;
        let Some(gesture) = self.gesture.take() else {
            return Ok(EventOutcome::Ignored);
        };

        let Some(capture) = gesture.finish(point, view.scale) else {
            debug!(page = view.page, "selection ignored: no bubble on this page yet");
            return Ok(EventOutcome::Ignored);
        };

        let Some(image) = crop_raster(&view.raster, capture.device_rect) else {
            debug!(page = view.page, "selection ignored: empty rectangle");
            return Ok(EventOutcome::Ignored);
        };

        if let Some(ocr) = &self.ocr {
            let job = OcrJob { bubble: capture.target, epoch: self.store.epoch(capture.target.page) };
            ocr.submit(job, &image);
        }
        self.store.attach_region(capture.target, Region { rect: capture.page_rect, image });

        Ok(EventOutcome::RegionCaptured(capture))
    }

    pub fn toggle_selection_mode(&mut self) -> Result<Mode, SessionError> {
        if self.document.is_none() {
            return Err(SessionError::NoDocument);
        }

        self.selection_mode = !self.selection_mode;
        if !self.selection_mode {
            self.gesture = None;
        }
        Ok(self.mode())
    }

    /// Shows the next page. Stays on the last page without error.
    pub fn next_page(&mut self) -> Result<usize, SessionError> {
        let current = self.current_page().ok_or(SessionError::NoDocument)?;
        let last = self.page_count().saturating_sub(1);
        self.go_to_page((current + 1).min(last))
    }

    /// Shows the previous page. Stays on the first page without error.
    pub fn previous_page(&mut self) -> Result<usize, SessionError> {
        let current = self.current_page().ok_or(SessionError::NoDocument)?;
        self.go_to_page(current.saturating_sub(1))
    }

    /// Re-rasterizes the current page at a new zoom.
    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), SessionError> {
        Scale::new(zoom)?;
        self.zoom = zoom;
        if let Some(page) = self.current_page() {
            self.gesture = None;
            self.show_page(page)?;
        }
        Ok(())
    }

    pub fn clear_page(&mut self) -> Result<(), SessionError> {
        let page = self.current_page().ok_or(SessionError::NoDocument)?;
        self.store.clear_page(page);
        self.gesture = None;
        debug!(page, "page cleared");
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<(), SessionError> {
        if self.document.is_none() {
            return Err(SessionError::NoDocument);
        }
        self.store.clear_all();
        self.gesture = None;
        debug!("all bubbles cleared");
        Ok(())
    }

    /// Applies recognition results that have arrived since the last poll.
    pub fn poll_ocr(&mut self) -> Vec<OcrNotice> {
        let Some(ocr) = &self.ocr else {
            return Vec::new();
        };
        ocr.drain().into_iter().filter_map(|outcome| apply_outcome(&mut self.store, outcome)).collect()
    }

    /// Blocks until every submitted recognition has reported or `timeout` elapses.
    pub fn wait_for_ocr(&mut self, timeout: Duration) -> Vec<OcrNotice> {
        let Some(ocr) = &self.ocr else {
            return Vec::new();
        };

        let deadline = Instant::now() + timeout;
        let mut notices = Vec::new();

        while ocr.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match ocr.wait(remaining) {
                Some(outcome) => notices.extend(apply_outcome(&mut self.store, outcome)),
                None => {
                    warn!(in_flight = ocr.in_flight(), "gave up waiting for OCR");
                    break;
                }
            }
        }

        notices.extend(ocr.drain().into_iter().filter_map(|outcome| apply_outcome(&mut self.store, outcome)));
        notices
    }

    /// Writes a copy of the document with every bubble printed on it.
    ///
    /// Runs on a shared borrow, so no event can mutate the store while it is in progress.
    pub fn export(&self, output: &Path) -> Result<usize, SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;

        let page_boxes = (0..document.page_count())
            .map(|page| document.page_box(page))
            .collect::<Result<Vec<_>, _>>()
            .map_err(document_error)?;

        let overlays = plan_overlay(&self.store, &page_boxes);
        let markers: usize = overlays.iter().map(|overlay| overlay.markers.len()).sum();

        document.export_overlay(&overlays, &self.marker_style, output).map_err(document_error)?;

        info!(path = %output.display(), markers, "annotated document exported");
        Ok(markers)
    }

    /// Draw operations for the page on screen.
    pub fn display_ops(&self) -> Result<Vec<DisplayOp>, SessionError> {
        let view = self.view.as_ref().ok_or(SessionError::NoDocument)?;
        let selection = self.gesture.as_ref().map(SelectionGesture::device_rect);
        Ok(page_display_ops(&self.store, view.page, view.scale, selection, &self.screen_style))
    }

    pub fn listing(&self) -> String {
        bubble_listing(&self.store)
    }

    pub fn page_label(&self) -> String {
        page_label(self.current_page(), self.page_count())
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn view(&self) -> Option<&PageView> {
        self.view.as_ref()
    }

    pub fn current_page(&self) -> Option<usize> {
        self.view.as_ref().map(|view| view.page)
    }

    pub fn page_count(&self) -> usize {
        self.document.as_ref().map_or(0, DocumentSource::page_count)
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn ocr_in_flight(&self) -> usize {
        self.ocr.as_ref().map_or(0, OcrDispatcher::in_flight)
    }

    fn go_to_page(&mut self, page: usize) -> Result<usize, SessionError> {
        if self.current_page() != Some(page) {
            self.gesture = None;
            self.show_page(page)?;
        }
        Ok(page)
    }

    fn show_page(&mut self, page: usize) -> Result<(), SessionError> {
        let document = self.document.as_ref().ok_or(SessionError::NoDocument)?;
        let page_box = document.page_box(page).map_err(document_error)?;
        let raster = document.render_page(page, self.zoom).map_err(document_error)?;
        let scale = Scale::from_raster(raster.width(), page_box.width)?;

        debug!(page, width = raster.width(), height = raster.height(), scale = scale.factor(), "page rasterized");
        self.view = Some(PageView { page, page_box, raster, scale });
        Ok(())
    }
}

fn apply_outcome(store: &mut AnnotationStore, outcome: OcrOutcome) -> Option<OcrNotice> {
    let OcrOutcome { job, result } = outcome;
    let OcrJob { bubble, epoch } = job;

    if !store.contains(bubble) || store.epoch(bubble.page) != epoch {
        debug!(page = bubble.page, local_index = bubble.local_index, "stale OCR result dropped");
        return None;
    }

    match result {
        Ok(text) => {
            store.set_text(bubble, epoch, text.clone());
            debug!(page = bubble.page, local_index = bubble.local_index, "OCR text stored");
            Some(OcrNotice::Recognized { bubble, text })
        }
        Err(error) => {
            warn!(page = bubble.page, local_index = bubble.local_index, %error, "OCR failed");
            Some(OcrNotice::Failed { bubble, message: describe(&error) })
        }
    }
}

fn describe(error: &OcrError) -> String {
    format!("OCR failed: {error}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DisplayOp;
    use crate::geometry::PagePoint;
    use crate::ocr::Recognizer;
    use image::{GrayImage, Rgba};
    use std::cell::RefCell;
    use std::sync::Arc;

    #[derive(Debug, thiserror::Error)]
    #[error("fake document failure")]
    struct FakeError;

    #[derive(Default)]
    struct FakeDocument {
        boxes: Vec<PageBox>,
        exported: RefCell<Vec<Vec<PageOverlay>>>,
    }

    impl FakeDocument {
        fn with_pages(boxes: &[PageBox]) -> Self {
            Self { boxes: boxes.to_vec(), exported: RefCell::default() }
        }
    }

    impl DocumentSource for &FakeDocument {
        type Error = FakeError;

        fn page_count(&self) -> usize {
            self.boxes.len()
        }

        fn page_box(&self, page: usize) -> Result<PageBox, FakeError> {
            self.boxes.get(page).copied().ok_or(FakeError)
        }

        fn render_page(&self, page: usize, zoom: f32) -> Result<RgbaImage, FakeError> {
            let page_box = self.page_box(page)?;
            let width = (page_box.width * zoom).round() as u32;
            let height = (page_box.height * zoom).round() as u32;
            Ok(RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])))
        }

        fn export_overlay(&self, overlays: &[PageOverlay], _style: &MarkerStyle, _output: &Path) -> Result<(), FakeError> {
            self.exported.borrow_mut().push(overlays.to_vec());
            Ok(())
        }
    }

    struct Echo;

    impl Recognizer for Echo {
        fn recognize(&self, image: &GrayImage) -> Result<String, OcrError> {
            Ok(format!(" {}x{} \n", image.width(), image.height()))
        }
    }

    struct Broken;

    impl Recognizer for Broken {
        fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            Err(OcrError::Disconnected)
        }
    }

    fn two_pages() -> FakeDocument {
        FakeDocument::with_pages(&[PageBox::new(100.0, 200.0), PageBox::new(300.0, 100.0)])
    }

    fn opened(document: &FakeDocument) -> Session<&FakeDocument> {
        let mut session = Session::new();
        session.open(document).expect("fake document opens");
        session
    }

    fn click(session: &mut Session<&FakeDocument>, x: f32, y: f32) -> EventOutcome {
        let point = DevicePoint::new(x, y);
        let outcome = session.press(point).expect("press");
        session.release(point).expect("release");
        outcome
    }

    fn drag(session: &mut Session<&FakeDocument>, from: (f32, f32), to: (f32, f32)) -> EventOutcome {
        session.press(DevicePoint::new(from.0, from.1)).expect("press");
        session.move_to(DevicePoint::new(to.0, to.1)).expect("move");
        session.release(DevicePoint::new(to.0, to.1)).expect("release")
    }

    #[test]
    fn idle_session_rejects_everything() {
        let mut session: Session<&FakeDocument> = Session::new();

        assert_eq!(session.mode(), Mode::Idle);
        assert!(matches!(session.press(DevicePoint::new(1.0, 1.0)), Err(SessionError::NoDocument)));
        assert!(matches!(session.next_page(), Err(SessionError::NoDocument)));
        assert!(matches!(session.toggle_selection_mode(), Err(SessionError::NoDocument)));
        assert!(matches!(session.export(Path::new("out.pdf")), Err(SessionError::NoDocument)));
        assert_eq!(SessionError::NoDocument.to_string(), "No PDF loaded");
        assert!(session.store().is_empty());
    }

    #[test]
    fn empty_document_is_rejected() {
        let document = FakeDocument::default();
        let mut session = Session::new();
        assert!(matches!(session.open(&document), Err(SessionError::EmptyDocument)));
        assert_eq!(session.mode(), Mode::Idle);
    }

    #[test]
    fn click_places_bubble_in_page_space() {
        let document = two_pages();
        let mut session = opened(&document);

        assert_eq!(session.mode(), Mode::Placing);
        assert_eq!(session.view().map(|view| view.scale.factor()), Some(2.0));

        let outcome = click(&mut session, 20.0, 40.0);
        assert_eq!(outcome, EventOutcome::BubblePlaced(BubbleId::new(0, 0)));
        assert_eq!(session.store().bubbles_on_page(0), &[PagePoint::new(10.0, 20.0)]);
    }

    #[test]
    fn navigation_is_clamped_and_keeps_bubbles() {
        let document = two_pages();
        let mut session = opened(&document);
        click(&mut session, 2.0, 2.0);

        assert_eq!(session.previous_page().unwrap(), 0);
        assert_eq!(session.next_page().unwrap(), 1);
        assert_eq!(session.next_page().unwrap(), 1);
        assert_eq!(session.page_label(), "Page: 2/2");
        assert_eq!(session.view().map(|view| view.raster.width()), Some(600));

        click(&mut session, 6.0, 6.0);
        assert_eq!(session.store().bubbles_on_page(0).len(), 1);
        assert_eq!(session.store().bubbles_on_page(1), &[PagePoint::new(3.0, 3.0)]);
    }

    #[test]
    fn selection_attaches_region_to_latest_bubble() {
        let document = two_pages();
        let mut session = opened(&document);
        click(&mut session, 10.0, 10.0);
        click(&mut session, 30.0, 30.0);

        assert_eq!(session.toggle_selection_mode().unwrap(), Mode::Selecting);
        let outcome = drag(&mut session, (40.0, 60.0), (20.0, 20.0));

        let EventOutcome::RegionCaptured(capture) = outcome else {
            panic!("expected a capture, got {outcome:?}");
        };
        assert_eq!(capture.target, BubbleId::new(0, 1));

        let region = session.store().region(BubbleId::new(0, 1)).expect("region stored");
        assert_eq!(region.rect.min, PagePoint::new(10.0, 10.0));
        assert_eq!(region.rect.max, PagePoint::new(20.0, 30.0));
        assert_eq!(region.image.dimensions(), (20, 40));

        // Selection mode persists after a capture.
        assert_eq!(session.mode(), Mode::Selecting);
    }

    #[test]
    fn selection_on_page_without_bubbles_is_ignored() {
        let document = two_pages();
        let mut session = opened(&document);
        session.toggle_selection_mode().unwrap();

        assert_eq!(drag(&mut session, (0.0, 0.0), (10.0, 10.0)), EventOutcome::Ignored);
        assert!(session.store().is_empty());
    }

    #[test]
    fn rubber_band_is_displayed_while_dragging() {
        let document = two_pages();
        let mut session = opened(&document);
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();

        session.press(DevicePoint::new(0.0, 0.0)).unwrap();
        session.move_to(DevicePoint::new(8.0, 8.0)).unwrap();

        let ops = session.display_ops().unwrap();
        assert!(matches!(ops.first(), Some(DisplayOp::Rect { .. })));
        assert_eq!(ops.len(), 3);

        session.toggle_selection_mode().unwrap();
        assert_eq!(session.display_ops().unwrap().len(), 2);
    }

    #[test]
    fn ocr_text_lands_on_captured_bubble() {
        let document = two_pages();
        let mut session = opened(&document);
        session = session.with_ocr(OcrDispatcher::new(Arc::new(Echo), 2));
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();
        drag(&mut session, (0.0, 0.0), (6.0, 4.0));

        let notices = session.wait_for_ocr(Duration::from_secs(5));

        let bubble = BubbleId::new(0, 0);
        assert_eq!(notices, vec![OcrNotice::Recognized { bubble, text: "6x4".to_owned() }]);
        assert_eq!(session.store().text(bubble), Some("6x4"));
        assert!(session.listing().contains("1: (5.00, 5.00) - Text: 6x4"));
    }

    #[test]
    fn ocr_failure_is_reported_and_leaves_text_unset() {
        let document = two_pages();
        let mut session = opened(&document).with_ocr(OcrDispatcher::new(Arc::new(Broken), 2));
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();
        drag(&mut session, (0.0, 0.0), (6.0, 4.0));

        let notices = session.wait_for_ocr(Duration::from_secs(5));

        assert!(matches!(notices.as_slice(), [OcrNotice::Failed { .. }]));
        assert_eq!(session.store().text(BubbleId::new(0, 0)), None);
        assert!(session.store().region(BubbleId::new(0, 0)).is_some());
    }

    #[test]
    fn late_ocr_for_cleared_page_is_dropped() {
        let document = two_pages();
        let mut session = opened(&document).with_ocr(OcrDispatcher::new(Arc::new(Echo), 2));
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();
        drag(&mut session, (0.0, 0.0), (6.0, 4.0));

        session.clear_page().unwrap();
        session.toggle_selection_mode().unwrap();
        click(&mut session, 50.0, 50.0);

        let notices = session.wait_for_ocr(Duration::from_secs(5));
        assert!(notices.is_empty());
        assert_eq!(session.store().text(BubbleId::new(0, 0)), None);
    }

    #[test]
    fn late_failure_for_cleared_bubble_is_silent() {
        let document = two_pages();
        let mut session = opened(&document).with_ocr(OcrDispatcher::new(Arc::new(Broken), 2));
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();
        drag(&mut session, (0.0, 0.0), (6.0, 4.0));

        session.clear_all().unwrap();

        assert!(session.wait_for_ocr(Duration::from_secs(5)).is_empty());
        assert_eq!(session.ocr_in_flight(), 0);
    }

    #[test]
    fn waiting_returns_as_soon_as_every_capture_reported() {
        let document = two_pages();
        let mut session = opened(&document).with_ocr(OcrDispatcher::new(Arc::new(Echo), 2));
        click(&mut session, 10.0, 10.0);
        session.toggle_selection_mode().unwrap();

        for _ in 0..20 {
            drag(&mut session, (0.0, 0.0), (6.0, 4.0));
            let started = Instant::now();
            let notices = session.wait_for_ocr(Duration::from_secs(2));

            assert_eq!(notices.len(), 1);
            assert!(started.elapsed() < Duration::from_secs(1), "waited {:?}", started.elapsed());
            assert_eq!(session.ocr_in_flight(), 0);
        }
    }

    #[test]
    fn reopening_resets_bubbles() {
        let document = two_pages();
        let mut session = opened(&document);
        session.next_page().unwrap();
        click(&mut session, 10.0, 10.0);

        session.open(&document).unwrap();

        assert!(session.store().is_empty());
        assert_eq!(session.current_page(), Some(0));
    }

    #[test]
    fn export_plans_every_page_with_bubbles() {
        let document = two_pages();
        let mut session = opened(&document);
        click(&mut session, 20.0, 40.0);
        session.next_page().unwrap();
        click(&mut session, 10.0, 10.0);

        let markers = session.export(Path::new("annotated.pdf")).expect("export");
        assert_eq!(markers, 2);

        let exported = document.exported.borrow();
        let overlays = &exported[0];
        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].markers[0].center, (10.0, 180.0));
        assert_eq!(overlays[1].markers[0].number, 2);
        assert_eq!(overlays[1].markers[0].center, (5.0, 95.0));
    }

    #[test]
    fn zoom_change_rescales_the_view() {
        let document = two_pages();
        let mut session = opened(&document);
        session.set_zoom(1.0).unwrap();
        click(&mut session, 20.0, 40.0);

        assert_eq!(session.store().bubbles_on_page(0), &[PagePoint::new(20.0, 40.0)]);
        assert!(matches!(session.set_zoom(0.0), Err(SessionError::Transform(_))));
        assert_eq!(session.zoom(), 1.0);
    }

    #[test]
    fn actions_dispatch_to_handlers() {
        let document = two_pages();
        let mut session = opened(&document);

        assert_eq!(session.apply(SessionAction::NextPage).unwrap(), EventOutcome::PageShown(1));
        assert_eq!(
            session.apply(SessionAction::Press(DevicePoint::new(4.0, 4.0))).unwrap(),
            EventOutcome::BubblePlaced(BubbleId::new(1, 0))
        );
        assert_eq!(session.apply(SessionAction::ClearAll).unwrap(), EventOutcome::Cleared);
        assert!(session.store().is_empty());
    }
}
