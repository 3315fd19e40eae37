//! Draw instructions for the display surface
//!
//! The core never writes pixels. It hands the surface geometric operations in device
//! space, already transformed with the scale of the raster on screen.

use crate::geometry::{to_device_space, DevicePoint, DeviceRect, Scale};
use crate::store::AnnotationStore;
use crate::style::{Color, ScreenStyle};

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOp {
    Circle { center: DevicePoint, radius: f32, color: Color, stroke_width: f32 },
    Text { origin: DevicePoint, text: String, font_size: f32, color: Color },
    Rect { rect: DeviceRect, color: Color, stroke_width: f32 },
}

/// Operations that paint the bubbles of `page`, plus the rubber band of an active selection.
pub fn page_display_ops(
    store: &AnnotationStore,
    page: usize,
    scale: Scale,
    selection: Option<DeviceRect>,
    style: &ScreenStyle,
) -> Vec<DisplayOp> {
    let mut ops = Vec::new();

    if let Some(rect) = selection {
        ops.push(DisplayOp::Rect {
            rect,
            color: style.selection_color,
            stroke_width: style.selection_width,
        });
    }

    for view in store.page_views(page) {
        let center = to_device_space(view.position, scale);
        ops.push(DisplayOp::Circle {
            center,
            radius: style.radius,
            color: style.color,
            stroke_width: style.stroke_width,
        });
        ops.push(DisplayOp::Text {
            origin: DevicePoint::new(center.x + style.label_offset.0, center.y + style.label_offset.1),
            text: view.number.to_string(),
            font_size: style.font_size,
            color: style.color,
        });
    }

    ops
}
