//! Overlay rendering.
//!
//! The display owns exactly one `OverlayLayer`. Each render replaces the whole
//! element set (clear-before-add), so the layer never holds more elements
//! than the latest batch had rectangles. `compose` rasterizes a layer onto a
//! base image for output.

mod layer;
mod raster;

pub use layer::{OverlayElement, OverlayLayer};
pub use raster::{compose, draw_outline};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// RGBA stroke color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const RED: Color = Color([255, 0, 0, 255]);
    pub const GREEN: Color = Color([0, 255, 0, 255]);

    /// Parse `#rrggbb` or `#rrggbbaa`.
    pub fn parse_hex(value: &str) -> Result<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow!("invalid color '{}', expected #rrggbb[aa]", value));
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Ok(Color([byte(0)?, byte(2)?, byte(4)?, alpha]))
    }
}

/// Outline style for overlay rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
}

impl StrokeStyle {
    /// Thin outline for live camera overlays.
    pub fn camera() -> Self {
        Self {
            color: Color::RED,
            width: 2.0,
        }
    }

    /// Heavy outline burned into still images.
    pub fn still() -> Self {
        Self {
            color: Color::RED,
            width: 12.0,
        }
    }
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self::camera()
    }
}
