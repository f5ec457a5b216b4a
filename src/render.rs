//! Overlay rendering for recognition reports.
//!
//! Plate and damage boxes are stored relative to the vehicle crop. This is the
//! one place they are lifted back into frame coordinates, by the vehicle box's
//! own top-left corner.
//!
//! Captions need a TrueType/OpenType font. Without one only the outlines are
//! drawn.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::RenderSettings;
use crate::detect::{BoundingBox, FrameSpace};
use crate::report::RecognitionReport;

pub const VEHICLE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const PLATE_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
pub const DAMAGE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const PLATE_FALLBACK_TEXT: &str = "Plate?";
const LINE_WIDTH: i32 = 2;
/// Gap between a caption and the top edge of its box.
pub const CAPTION_GAP: i32 = 10;

/// Loaded caption font and its pixel size.
pub struct CaptionFont {
    font: FontVec,
    size: f32,
}

impl CaptionFont {
    pub fn load(path: &Path, size: f32) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read caption font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid caption font {}: {}", path.display(), e))?;
        Ok(Self { font, size })
    }

    /// `None` when no font is configured.
    pub fn from_settings(settings: &RenderSettings) -> Result<Option<Self>> {
        settings
            .font
            .as_deref()
            .map(|path| Self::load(path, settings.caption_size))
            .transpose()
    }

    pub fn size(&self) -> f32 {
        self.size
    }
}

/// What kind of object an overlay box outlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayKind {
    Vehicle,
    Plate,
    Damage,
}

impl OverlayKind {
    pub fn color(&self) -> Rgb<u8> {
        match self {
            OverlayKind::Vehicle => VEHICLE_COLOR,
            OverlayKind::Plate => PLATE_COLOR,
            OverlayKind::Damage => DAMAGE_COLOR,
        }
    }
}

/// One box to draw, already in frame coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayItem {
    pub kind: OverlayKind,
    pub bbox: BoundingBox<FrameSpace>,
    pub text: String,
}

/// Boxes and captions for one report, vehicle first.
pub fn overlay_items(report: &RecognitionReport) -> Vec<OverlayItem> {
    let vehicle = report.car_detection();
    let vehicle_box = vehicle.bbox();
    let color = report.color().map_or("None", |c| c.as_str());

    let mut items = vec![OverlayItem {
        kind: OverlayKind::Vehicle,
        bbox: *vehicle_box,
        text: format!("{}, color: {}", vehicle.class_name(), color),
    }];

    if let Some(plate) = report.plate_detection() {
        items.push(OverlayItem {
            kind: OverlayKind::Plate,
            bbox: plate.bbox().to_frame(vehicle_box),
            text: report
                .plate_number()
                .unwrap_or(PLATE_FALLBACK_TEXT)
                .to_string(),
        });
    }

    for damage in report.damage_detections().unwrap_or_default() {
        items.push(OverlayItem {
            kind: OverlayKind::Damage,
            bbox: damage.bbox().to_frame(vehicle_box),
            text: damage.class_name().to_string(),
        });
    }
    items
}

/// Outline every box of `report` on `image`, captioned when a font is given.
///
/// Boxes and captions reaching past the edge are clipped by the drawing routines.
pub fn draw_report(
    image: &mut RgbImage,
    report: &RecognitionReport,
    font: Option<&CaptionFont>,
) {
    for item in overlay_items(report) {
        let color = item.kind.color();
        draw_box(image, &item.bbox, color);
        if let Some(font) = font {
            let (x, y) = caption_origin(&item.bbox, font.size);
            draw_text_mut(
                image,
                color,
                x,
                y,
                PxScale::from(font.size),
                &font.font,
                &item.text,
            );
        }
    }
}

/// Top-left corner of a caption line ending `CAPTION_GAP` above the box.
pub fn caption_origin(bbox: &BoundingBox<FrameSpace>, size: f32) -> (i32, i32) {
    let y = bbox.y1 - CAPTION_GAP - size.ceil() as i32;
    (bbox.x1, y.max(0))
}

fn draw_box(image: &mut RgbImage, bbox: &BoundingBox<FrameSpace>, color: Rgb<u8>) {
    for inset in 0..LINE_WIDTH {
        let width = bbox.width() - 2 * inset;
        let height = bbox.height() - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x1 + inset, bbox.y1 + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ColorLabel;
    use crate::detect::{DamageClass, DetectionResult, Label, VehicleClass};

    fn report() -> RecognitionReport {
        let car = DetectionResult::new(
            Label::Vehicle(VehicleClass::Car),
            0.9,
            BoundingBox::new(100, 200, 300, 400).unwrap(),
        );
        let plate = DetectionResult::new(
            Label::Plate,
            0.8,
            BoundingBox::new(40, 60, 120, 90).unwrap(),
        );
        let damage = DetectionResult::new(
            Label::Damage(DamageClass::FenderDent),
            0.7,
            BoundingBox::new(5, 5, 15, 15).unwrap(),
        );
        RecognitionReport::new(car)
            .with_plate(Some(plate), None)
            .with_damages(vec![damage])
            .with_color(Some(ColorLabel::Red))
    }

    #[test]
    fn crop_boxes_shift_by_vehicle_origin() {
        let items = overlay_items(&report());
        assert_eq!(items.len(), 3);

        assert_eq!(items[0].kind, OverlayKind::Vehicle);
        assert_eq!(items[0].bbox.as_tuple(), (100, 200, 300, 400));
        assert_eq!(items[0].text, "car, color: Red");

        assert_eq!(items[1].kind, OverlayKind::Plate);
        assert_eq!(items[1].bbox.as_tuple(), (140, 260, 220, 290));
        assert_eq!(items[1].text, "Plate?");

        assert_eq!(items[2].kind, OverlayKind::Damage);
        assert_eq!(items[2].bbox.as_tuple(), (105, 205, 115, 215));
        assert_eq!(items[2].text, "fender-dent");
    }

    #[test]
    fn draws_two_pixel_outlines_at_frame_positions() {
        let mut image = RgbImage::new(320, 420);
        draw_report(&mut image, &report(), None);

        assert_eq!(image.get_pixel(100, 200), &VEHICLE_COLOR);
        assert_eq!(image.get_pixel(101, 201), &VEHICLE_COLOR);
        assert_eq!(image.get_pixel(102, 250), &Rgb([0, 0, 0]));
        assert_eq!(image.get_pixel(105, 210), &DAMAGE_COLOR);
        assert_eq!(image.get_pixel(140, 270), &PLATE_COLOR);
    }

    #[test]
    fn captions_sit_above_their_box() {
        let bbox = BoundingBox::new(20, 40, 80, 90).unwrap();
        assert_eq!(caption_origin(&bbox, 16.0), (20, 14));
        let top = BoundingBox::new(5, 3, 50, 50).unwrap();
        assert_eq!(caption_origin(&top, 16.0), (5, 0));
    }

    #[test]
    fn no_font_draws_outlines_only() {
        let mut image = RgbImage::new(320, 420);
        draw_report(&mut image, &report(), None);
        let band = (100..300)
            .flat_map(|x| (170..198).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y) != &Rgb([0, 0, 0]))
            .count();
        assert_eq!(band, 0);
    }

    #[test]
    fn unreadable_or_invalid_fonts_are_errors() {
        assert!(CaptionFont::load(Path::new("/nonexistent/caption.ttf"), 16.0).is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a font").unwrap();
        assert!(CaptionFont::load(file.path(), 16.0).is_err());

        let unset = RenderSettings::default();
        assert!(CaptionFont::from_settings(&unset).unwrap().is_none());
    }

    #[test]
    fn captions_are_drawn_with_a_system_font() {
        let Some(path) = [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ]
        .into_iter()
        .map(Path::new)
        .find(|p| p.exists()) else {
            return;
        };
        let font = CaptionFont::load(path, 16.0).unwrap();
        let mut image = RgbImage::new(320, 420);
        draw_report(&mut image, &report(), Some(&font));

        // Vehicle caption occupies the band above the vehicle box at y=200.
        let inked = (100..300)
            .flat_map(|x| (174..200).map(move |y| (x, y)))
            .filter(|&(x, y)| image.get_pixel(x, y) != &Rgb([0, 0, 0]))
            .count();
        assert!(inked > 0);
    }

    #[test]
    fn boxes_past_the_edge_are_clipped() {
        let mut image = RgbImage::new(150, 250);
        draw_report(&mut image, &report(), None);
        assert_eq!(image.get_pixel(100, 200), &VEHICLE_COLOR);
    }
}
