//! Frames and crops.
//!
//! - `Frame`: one decoded RGB frame plus its position in the source.
//! - `crop`: sub-region of a buffer given a box in that buffer's own space.
//!
//! Cropping never mutates its source and performs no box validation: a box that
//! reaches outside the buffer yields a truncated (possibly empty) region. Callers
//! are responsible for producing meaningful boxes.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

use crate::detect::{BoundingBox, CoordinateSpace};

/// One decoded frame.
pub struct Frame {
    /// Zero-based position in the source.
    pub index: u64,
    pub image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Wrap packed RGB24 bytes.
    pub fn from_rgb_pixels(index: u64, pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let len = pixels.len();
        let image = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            anyhow!(
                "expected {} RGB bytes for a {}x{} frame, received {}",
                width as usize * height as usize * 3,
                width,
                height,
                len
            )
        })?;
        Ok(Self { index, image })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Copy out `image[y1:y2, x1:x2]`.
///
/// Each coordinate is truncated into `[0, dim]`; an empty range on either axis
/// gives a zero-sized image.
pub fn crop<S: CoordinateSpace>(image: &RgbImage, bbox: &BoundingBox<S>) -> RgbImage {
    let (x, width) = axis_range(bbox.x1, bbox.x2, image.width());
    let (y, height) = axis_range(bbox.y1, bbox.y2, image.height());
    if width == 0 || height == 0 {
        return RgbImage::new(width, height);
    }
    imageops::crop_imm(image, x, y, width, height).to_image()
}

fn axis_range(start: i32, end: i32, dim: u32) -> (u32, u32) {
    let clamp = |v: i32| v.clamp(0, dim as i32) as u32;
    let (start, end) = (clamp(start), clamp(end));
    (start, end.saturating_sub(start))
}
