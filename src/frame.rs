//! Frame container.
//!
//! - `Frame`: RGB24 pixels plus pixel dimensions, capture sequence number and
//!   EXIF orientation. Produced by the ingest layer, read by detector backends.
//! - `Orientation`: how the stored pixels must be rotated/mirrored to appear
//!   upright on the display surface.
//!
//! Detection boxes are always expressed relative to the *upright* image, which
//! is also what the display shows, so `display_size()` is the size boxes are
//! scaled against.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};
use serde::{Deserialize, Serialize};

use crate::geometry::Size;
use crate::ingest::normalize::{normalize_to_rgb, PixelFormat};

/// EXIF orientation tags 1..=8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    LeftMirrored,
    Right,
    RightMirrored,
    Left,
}

impl Orientation {
    pub fn from_exif(tag: u8) -> Result<Self> {
        Ok(match tag {
            1 => Orientation::Up,
            2 => Orientation::UpMirrored,
            3 => Orientation::Down,
            4 => Orientation::DownMirrored,
            5 => Orientation::LeftMirrored,
            6 => Orientation::Right,
            7 => Orientation::RightMirrored,
            8 => Orientation::Left,
            other => return Err(anyhow!("invalid EXIF orientation {}", other)),
        })
    }

    pub fn exif(self) -> u8 {
        match self {
            Orientation::Up => 1,
            Orientation::UpMirrored => 2,
            Orientation::Down => 3,
            Orientation::DownMirrored => 4,
            Orientation::LeftMirrored => 5,
            Orientation::Right => 6,
            Orientation::RightMirrored => 7,
            Orientation::Left => 8,
        }
    }

    /// True when upright width/height are the stored height/width.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Orientation::LeftMirrored
                | Orientation::Right
                | Orientation::RightMirrored
                | Orientation::Left
        )
    }
}

impl TryFrom<u8> for Orientation {
    type Error = anyhow::Error;

    fn try_from(tag: u8) -> Result<Self> {
        Orientation::from_exif(tag)
    }
}

impl From<Orientation> for u8 {
    fn from(orientation: Orientation) -> u8 {
        orientation.exif()
    }
}

/// A captured frame. Pixels are stored as RGB24 in capture orientation.
#[derive(Clone, Debug)]
pub struct Frame {
    seq: u64,
    orientation: Orientation,
    image: RgbImage,
}

impl Frame {
    /// Build a frame from tightly packed RGB24 bytes.
    pub fn from_rgb(
        seq: u64,
        width: u32,
        height: u32,
        orientation: Orientation,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let len = pixels.len();
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            anyhow!(
                "RGB frame length mismatch: {}x{} needs {} bytes, got {}",
                width,
                height,
                width as usize * height as usize * 3,
                len
            )
        })?;
        Ok(Self {
            seq,
            orientation,
            image,
        })
    }

    /// Build a frame from camera pixels in any supported format.
    pub fn from_format(
        seq: u64,
        width: u32,
        height: u32,
        orientation: Orientation,
        pixels: &[u8],
        format: PixelFormat,
    ) -> Result<Self> {
        let rgb = normalize_to_rgb(pixels, width, height, format)?;
        Self::from_rgb(seq, width, height, orientation, rgb)
    }

    pub fn from_image(seq: u64, orientation: Orientation, image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        Ok(Self {
            seq,
            orientation,
            image,
        })
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Raw RGB24 bytes in capture orientation.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Size of the frame once rotated upright.
    pub fn display_size(&self) -> (u32, u32) {
        if self.orientation.swaps_axes() {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }

    pub fn display_surface(&self) -> Result<Size> {
        let (w, h) = self.display_size();
        Size::from_pixels(w, h)
    }

    /// Pixels rotated/mirrored so they appear upright.
    pub fn upright(&self) -> RgbImage {
        let img = &self.image;
        match self.orientation {
            Orientation::Up => img.clone(),
            Orientation::UpMirrored => imageops::flip_horizontal(img),
            Orientation::Down => imageops::rotate180(img),
            Orientation::DownMirrored => imageops::flip_vertical(img),
            Orientation::LeftMirrored => imageops::flip_horizontal(&imageops::rotate90(img)),
            Orientation::Right => imageops::rotate90(img),
            Orientation::RightMirrored => imageops::flip_vertical(&imageops::rotate90(img)),
            Orientation::Left => imageops::rotate270(img),
        }
    }
}
