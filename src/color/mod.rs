//! Body color classification.
//!
//! Pure heuristic over HSV pixels:
//!
//! 1. Center-crop the vehicle region to drop background at the edges.
//! 2. Achromatic short-circuit: Black or Gray wins outright when it outnumbers
//!    every other palette color by `ACHROMATIC_RATIO` or more.
//! 3. Body mask: chromatic pixels, closed, largest external contour, filled.
//! 4. Vote inside the body mask. The top color needs `DOMINANCE_THRESHOLD` of
//!    the cropped region; a runner-up reaching `OVERRIDE_RATIO` of the top count
//!    replaces it (two-tone and reflective bodies).
//!
//! The runner-up override is an empirically tuned rule kept for compatibility
//! with existing results. It is a candidate for revisiting.

mod hsv;
mod mask;
mod palette;

use anyhow::{anyhow, bail, Result};
use image::{imageops, GrayImage, Luma, RgbImage};

pub use hsv::{rgb_to_hsv, Hsv};
pub use mask::body_mask;
pub use palette::{ColorLabel, HsvRange, PaletteEntry, PALETTE};

pub const DEFAULT_CROP_SCALE: f64 = 0.75;
/// Minimum share of the cropped region the top color must hold.
pub const DOMINANCE_THRESHOLD: f64 = 0.10;
/// Runner-up share of the top count that triggers the override.
pub const OVERRIDE_RATIO: f64 = 0.20;
/// Black/Gray must outnumber all other colors by this factor to short-circuit.
pub const ACHROMATIC_RATIO: u64 = 10;

/// Maps a vehicle crop to a color label.
///
/// An `Err` is an internal failure (e.g. an empty region). The analyzer treats
/// it as "no color" and never lets it abort a report.
pub trait ColorClassifier: Send + Sync {
    fn classify(&self, region: &RgbImage) -> Result<ColorLabel>;
}

/// Center-crop geometry: `(x, y, width, height)` of the retained region.
///
/// Each axis keeps `floor(dim * scale)` pixels, offset by `(dim - kept) / 2`.
pub fn center_crop_bounds(width: u32, height: u32, scale: f64) -> (u32, u32, u32, u32) {
    let new_w = (width as f64 * scale).floor() as u32;
    let new_h = (height as f64 * scale).floor() as u32;
    let x = (width - new_w.min(width)) / 2;
    let y = (height - new_h.min(height)) / 2;
    (x, y, new_w.min(width), new_h.min(height))
}

/// Per-palette pixel counts, indexed like `PALETTE`.
type ColorCounts = [u64; 9];

fn palette_index(label: ColorLabel) -> usize {
    PALETTE
        .iter()
        .position(|entry| entry.label == label)
        .unwrap_or(PALETTE.len())
}

/// HSV range-voting color classifier.
#[derive(Clone, Debug)]
pub struct ColorRecognizer {
    crop_scale: f64,
}

impl Default for ColorRecognizer {
    fn default() -> Self {
        Self {
            crop_scale: DEFAULT_CROP_SCALE,
        }
    }
}

impl ColorRecognizer {
    pub fn new(crop_scale: f64) -> Result<Self> {
        if !(crop_scale > 0.0 && crop_scale <= 1.0) {
            return Err(anyhow!(
                "color crop scale must be in (0, 1], got {}",
                crop_scale
            ));
        }
        Ok(Self { crop_scale })
    }

    pub fn crop_scale(&self) -> f64 {
        self.crop_scale
    }

    /// Keep the central `crop_scale` share of each axis.
    pub fn crop_center(&self, image: &RgbImage) -> RgbImage {
        let (x, y, w, h) = center_crop_bounds(image.width(), image.height(), self.crop_scale);
        if w == 0 || h == 0 {
            return RgbImage::new(w, h);
        }
        imageops::crop_imm(image, x, y, w, h).to_image()
    }

    /// Classify a vehicle crop.
    pub fn recognize(&self, image: &RgbImage) -> Result<ColorLabel> {
        let cropped = self.crop_center(image);
        let (width, height) = cropped.dimensions();
        if width == 0 || height == 0 {
            bail!(
                "cannot classify color of an empty region ({}x{} after center crop of {}x{})",
                width,
                height,
                image.width(),
                image.height()
            );
        }

        let hsv: Vec<Hsv> = cropped.pixels().map(rgb_to_hsv).collect();
        let total_pixels = hsv.len() as u64;

        let areas = count_matches(hsv.iter().copied());
        if let Some(label) = achromatic_short_circuit(&areas) {
            log::debug!("color: achromatic short-circuit to {} ({:?})", label, areas);
            return Ok(label);
        }

        let chromatic = GrayImage::from_fn(width, height, |x, y| {
            let pixel = hsv[(y * width + x) as usize];
            let hit = PALETTE
                .iter()
                .filter(|entry| !entry.label.is_achromatic_dark())
                .any(|entry| entry.matches(pixel));
            Luma([if hit { 255 } else { 0 }])
        });

        let Some(body) = body_mask(&chromatic) else {
            log::debug!("color: no chromatic pixels");
            return Ok(ColorLabel::Unknown);
        };

        let body_pixels = hsv
            .iter()
            .zip(body.pixels())
            .filter(|(_, m)| m[0] > 0)
            .map(|(pixel, _)| *pixel);
        let body_areas = count_matches(body_pixels);

        let label = vote(&body_areas, total_pixels);
        log::debug!(
            "color: body votes {:?} over {} pixels -> {}",
            body_areas,
            total_pixels,
            label
        );
        Ok(label)
    }
}

impl ColorClassifier for ColorRecognizer {
    fn classify(&self, region: &RgbImage) -> Result<ColorLabel> {
        self.recognize(region)
    }
}

fn count_matches(pixels: impl Iterator<Item = Hsv>) -> ColorCounts {
    let mut counts = [0u64; 9];
    for pixel in pixels {
        for (count, entry) in counts.iter_mut().zip(PALETTE.iter()) {
            if entry.matches(pixel) {
                *count += 1;
            }
        }
    }
    counts
}

fn achromatic_short_circuit(areas: &ColorCounts) -> Option<ColorLabel> {
    let black = areas[palette_index(ColorLabel::Black)];
    let gray = areas[palette_index(ColorLabel::Gray)];
    let others: u64 = PALETTE
        .iter()
        .zip(areas.iter())
        .filter(|(entry, _)| !entry.label.is_achromatic_dark())
        .map(|(_, count)| *count)
        .sum();

    if black > 0 && black >= ACHROMATIC_RATIO * others {
        return Some(ColorLabel::Black);
    }
    if gray > 0 && gray >= ACHROMATIC_RATIO * others {
        return Some(ColorLabel::Gray);
    }
    None
}

/// Rank palette counts and apply the dominance and override rules.
fn vote(areas: &ColorCounts, total_pixels: u64) -> ColorLabel {
    let mut ranked: Vec<(ColorLabel, u64)> = PALETTE
        .iter()
        .map(|entry| entry.label)
        .zip(areas.iter().copied())
        .collect();
    // Stable: equal counts keep palette order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let (top, top_count) = ranked[0];
    if top_count == 0 || (top_count as f64) < DOMINANCE_THRESHOLD * total_pixels as f64 {
        return ColorLabel::Unknown;
    }

    let (second, second_count) = ranked[1];
    if second_count > 0 && second_count as f64 >= top_count as f64 * OVERRIDE_RATIO {
        return second;
    }
    top
}
