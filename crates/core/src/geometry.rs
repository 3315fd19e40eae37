//! Device-space and page-space geometry
//!
//! Device space is the pixel grid of the raster currently on screen and changes with
//! zoom. Page space is the document's own unit system for one page and never does.
//! Both spaces have their origin at the top-left with y growing downwards; the flip to
//! the bottom-left PDF convention happens once, in [`crate::overlay`].
//!
//! Nothing here rounds. Callers round only when they finally address pixels.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("invalid scale factor {0}: no page is loaded")]
    InvalidScale(f32),
}

/// Ratio between rendered pixels and page units for the page on screen.
///
/// Only positive, finite factors can be constructed, so every transform taking a
/// `Scale` is well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale(f32);

impl Scale {
    pub fn new(factor: f32) -> Result<Self, TransformError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(TransformError::InvalidScale(factor))
        }
    }

    /// Scale of a freshly rasterized page: `pixel_width / page_width`.
    ///
    /// Must be recomputed every time a page is rasterized, since pages of one
    /// document can have different intrinsic sizes at the same zoom.
    pub fn from_raster(pixel_width: u32, page_width: f32) -> Result<Self, TransformError> {
        Self::new(pixel_width as f32 / page_width)
    }

    pub fn factor(self) -> f32 {
        self.0
    }
}

/// A point in raster pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: f32,
    pub y: f32,
}

impl DevicePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point in page units, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle in raster pixels. `min` is always the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceRect {
    pub min: DevicePoint,
    pub max: DevicePoint,
}

impl DeviceRect {
    /// Builds a rectangle from any two opposite corners.
    pub fn from_corners(a: DevicePoint, b: DevicePoint) -> Self {
        Self {
            min: DevicePoint::new(a.x.min(b.x), a.y.min(b.y)),
            max: DevicePoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Integer pixel bounds `(x, y, width, height)` clipped to a raster of the given size.
    ///
    /// Returns `None` when nothing of the rectangle lands on a pixel.
    pub fn pixel_bounds(&self, raster_width: u32, raster_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.min.x.round().clamp(0.0, raster_width as f32) as u32;
        let y0 = self.min.y.round().clamp(0.0, raster_height as f32) as u32;
        let x1 = self.max.x.round().clamp(0.0, raster_width as f32) as u32;
        let y1 = self.max.y.round().clamp(0.0, raster_height as f32) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Axis-aligned rectangle in page units. `min` is always the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageRect {
    pub min: PagePoint,
    pub max: PagePoint,
}

impl PageRect {
    pub fn from_corners(a: PagePoint, b: PagePoint) -> Self {
        Self {
            min: PagePoint::new(a.x.min(b.x), a.y.min(b.y)),
            max: PagePoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// Intrinsic box of one page in PDF user space.
///
/// `x0`/`y0` is the lower-left corner of the MediaBox; most documents use the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub width: f32,
    pub height: f32,
}

impl PageBox {
    pub fn new(width: f32, height: f32) -> Self {
        Self { x0: 0.0, y0: 0.0, width, height }
    }

    /// Converts a top-left page-space point into the bottom-left PDF convention.
    pub fn flip(&self, point: PagePoint) -> (f32, f32) {
        (self.x0 + point.x, self.y0 + self.height - point.y)
    }
}

impl Default for PageBox {
    fn default() -> Self {
        Self::new(612.0, 792.0)
    }
}

pub fn to_page_space(point: DevicePoint, scale: Scale) -> PagePoint {
    PagePoint::new(point.x / scale.0, point.y / scale.0)
}

pub fn to_device_space(point: PagePoint, scale: Scale) -> DevicePoint {
    DevicePoint::new(point.x * scale.0, point.y * scale.0)
}

pub fn rect_to_page_space(rect: DeviceRect, scale: Scale) -> PageRect {
    PageRect::from_corners(to_page_space(rect.min, scale), to_page_space(rect.max, scale))
}

pub fn rect_to_device_space(rect: PageRect, scale: Scale) -> DeviceRect {
    DeviceRect::from_corners(to_device_space(rect.min, scale), to_device_space(rect.max, scale))
}
