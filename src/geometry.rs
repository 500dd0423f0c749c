//! Coordinate pipeline.
//!
//! Detections arrive as `NormalizedRect`s (fractions of the source image).
//! The display needs `PixelRect`s in the coordinate space of its surface.
//! `scale` is the only bridge between the two and is a pure multiplication:
//! it neither clamps nor validates. Clamping is an explicit, separate step
//! (`NormalizedRect::clamped`) selected by `ClampPolicy`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Bounding box expressed as fractions (0..1) of image width/height.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Rectangle in destination-surface pixel (or point) coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Size of a destination surface.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Origin convention of a normalized box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    #[default]
    TopLeft,
    BottomLeft,
}

/// What the display loop does with boxes that leave the unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClampPolicy {
    #[default]
    PassThrough,
    Clamp,
}

impl ClampPolicy {
    pub fn apply(self, rect: NormalizedRect) -> NormalizedRect {
        match self {
            ClampPolicy::PassThrough => rect,
            ClampPolicy::Clamp => rect.clamped(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pass_through" | "passthrough" | "none" => Ok(ClampPolicy::PassThrough),
            "clamp" => Ok(ClampPolicy::Clamp),
            other => Err(anyhow!("unknown clamp policy '{}'", other)),
        }
    }
}

impl Size {
    /// Validated constructor. Both dimensions must be finite and > 0.
    pub fn new(width: f32, height: f32) -> Result<Self> {
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(anyhow!(
                "surface size must be positive, got {}x{}",
                width,
                height
            ));
        }
        Ok(Self { width, height })
    }

    pub fn from_pixels(width: u32, height: u32) -> Result<Self> {
        Self::new(width as f32, height as f32)
    }
}

/// Convert a normalized rectangle into destination-surface coordinates.
///
/// Out-of-range components are scaled as-is.
pub fn scale(rect: NormalizedRect, dest: Size) -> PixelRect {
    PixelRect {
        x: rect.x * dest.width,
        y: rect.y * dest.height,
        width: rect.width * dest.width,
        height: rect.height * dest.height,
    }
}

impl NormalizedRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The full frame.
    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Clamp into the unit square. NaN components become 0.
    pub fn clamped(&self) -> Self {
        let unit = |v: f32| if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let x0 = unit(self.x);
        let y0 = unit(self.y);
        let x1 = unit(self.x + self.width).max(x0);
        let y1 = unit(self.y + self.height).max(y0);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Convert between top-left and bottom-left origin. Applying it twice is a no-op.
    pub fn flipped_vertically(&self) -> Self {
        Self::new(self.x, 1.0 - self.y - self.height, self.width, self.height)
    }

    /// Express the box in top-left origin given the convention it was produced in.
    pub fn to_top_left(&self, origin: Origin) -> Self {
        match origin {
            Origin::TopLeft => *self,
            Origin::BottomLeft => self.flipped_vertically(),
        }
    }

    /// Intersection over union. Zero when the union is empty.
    pub fn iou(&self, other: &NormalizedRect) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let intersection = if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0.0
        };
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl PixelRect {
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}
