//! Marker appearance on screen and in the exported document

use serde::{Deserialize, Serialize};

/// RGBA color representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0, a: 255 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255, a: 255 };

    /// Create an opaque color
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Components in the 0.0..=1.0 range used by PDF color operators
    pub fn to_normalized(&self) -> (f32, f32, f32) {
        (self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0)
    }
}

/// How bubbles are printed into the exported document, in page units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStyle {
    pub radius: f32,
    pub stroke_width: f32,
    pub color: Color,
    pub font_size: f32,
    /// Distance from the circle centre down to the label baseline.
    pub label_drop: f32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self { radius: 10.0, stroke_width: 1.0, color: Color::RED, font_size: 8.0, label_drop: 3.0 }
    }
}

impl MarkerStyle {
    /// Advance width of a numeric label in Helvetica.
    ///
    /// Every Helvetica digit is 556/1000 em wide, which is all a bubble number needs.
    pub fn label_width(&self, label: &str) -> f32 {
        label.chars().count() as f32 * 0.556 * self.font_size
    }
}

/// How bubbles are drawn over the raster on screen, in device pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenStyle {
    pub radius: f32,
    pub stroke_width: f32,
    pub color: Color,
    pub font_size: f32,
    /// Label origin relative to the bubble centre.
    pub label_offset: (f32, f32),
    pub selection_color: Color,
    pub selection_width: f32,
}

impl Default for ScreenStyle {
    fn default() -> Self {
        Self {
            radius: 5.0,
            stroke_width: 1.0,
            color: Color::RED,
            font_size: 8.0,
            label_offset: (-3.0, 3.0),
            selection_color: Color::BLUE,
            selection_width: 2.0,
        }
    }
}
