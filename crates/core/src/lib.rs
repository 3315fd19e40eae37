//! Bubblemark Core Library
//!
//! Annotation state and interaction model for numbering features on engineering drawings.

pub mod capture;
pub mod display;
pub mod geometry;
pub mod listing;
pub mod ocr;
pub mod overlay;
pub mod session;
pub mod store;
pub mod style;

pub use capture::{crop_raster, Capture, SelectionGesture};
pub use display::{page_display_ops, DisplayOp};
pub use geometry::{
    rect_to_device_space, rect_to_page_space, to_device_space, to_page_space, DevicePoint,
    DeviceRect, PageBox, PagePoint, PageRect, Scale, TransformError,
};
pub use listing::{bubble_listing, page_label};
pub use ocr::{
    OcrConfig, OcrDispatcher, OcrError, OcrJob, OcrOutcome, Recognizer, TesseractRecognizer,
};
pub use overlay::{plan_overlay, Marker, PageOverlay};
pub use session::{
    DocumentSource, EventOutcome, Mode, OcrNotice, PageView, Session, SessionAction,
    SessionError, DEFAULT_ZOOM,
};
pub use store::{AnnotationStore, BubbleId, BubbleView, Region};
pub use style::{Color, MarkerStyle, ScreenStyle};
