//! Region capture
//!
//! A selection drag attaches a rectangle of the current page to one bubble. The target is
//! frozen when the drag starts; later bubbles, on this page or any other, cannot steal it.

use crate::geometry::{rect_to_page_space, DevicePoint, DeviceRect, PageRect, Scale};
use crate::store::{AnnotationStore, BubbleId};
use image::RgbaImage;

/// An in-progress selection drag.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionGesture {
    page: usize,
    target: Option<BubbleId>,
    start: DevicePoint,
    current: DevicePoint,
}

/// Result of a completed drag that had a bubble to attach to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capture {
    pub target: BubbleId,
    pub device_rect: DeviceRect,
    pub page_rect: PageRect,
}

impl SelectionGesture {
    /// Starts a drag on `page`, targeting the bubble most recently created there.
    pub fn begin(store: &AnnotationStore, page: usize, start: DevicePoint) -> Self {
        Self { page, target: store.latest_on_page(page), start, current: start }
    }

    pub fn update(&mut self, point: DevicePoint) {
        self.current = point;
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn target(&self) -> Option<BubbleId> {
        self.target
    }

    /// Rectangle spanned so far, for drawing the rubber band.
    pub fn device_rect(&self) -> DeviceRect {
        DeviceRect::from_corners(self.start, self.current)
    }

    /// Completes the drag at `end`.
    ///
    /// Returns `None` when the page had no bubble at the time the drag began.
    pub fn finish(mut self, end: DevicePoint, scale: Scale) -> Option<Capture> {
        self.current = end;
        let target = self.target?;
        let device_rect = self.device_rect();

        Some(Capture { target, device_rect, page_rect: rect_to_page_space(device_rect, scale) })
    }
}

/// Crops the displayed raster to a device-space rectangle.
///
/// Returns `None` when the rectangle covers no whole pixel of the raster.
pub fn crop_raster(raster: &RgbaImage, rect: DeviceRect) -> Option<RgbaImage> {
    let (x, y, width, height) = rect.pixel_bounds(raster.width(), raster.height())?;
    Some(image::imageops::crop_imm(raster, x, y, width, height).to_image())
}
