//! Per-vehicle recognition report.
//!
//! A report pairs one vehicle detection (frame space) with what the
//! sub-analyses found inside its crop. Plate and damage boxes stay in vehicle
//! space; `render` lifts them into the frame when drawing.

use std::fmt;

use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;

use crate::color::ColorLabel;
use crate::detect::{BrandClass, DamageClass, DetectionResult, FrameSpace, VehicleSpace};

/// Everything known about one vehicle in one frame. Immutable once built.
#[derive(Clone, Debug)]
pub struct RecognitionReport {
    car_detection: DetectionResult<FrameSpace>,
    plate_detection: Option<DetectionResult<VehicleSpace>>,
    damage_detections: Option<Vec<DetectionResult<VehicleSpace>>>,
    plate_number: Option<String>,
    color: Option<ColorLabel>,
    brand: Option<BrandClass>,
    damages: Option<Vec<DamageClass>>,
}

impl RecognitionReport {
    pub fn new(car_detection: DetectionResult<FrameSpace>) -> Self {
        Self {
            car_detection,
            plate_detection: None,
            damage_detections: None,
            plate_number: None,
            color: None,
            brand: None,
            damages: None,
        }
    }

    /// Attach the plate detection and, if OCR produced one, its text.
    ///
    /// Plate text without a plate detection is meaningless and is dropped.
    pub fn with_plate(
        mut self,
        detection: Option<DetectionResult<VehicleSpace>>,
        number: Option<String>,
    ) -> Self {
        self.plate_number = detection.as_ref().and(number);
        self.plate_detection = detection;
        self
    }

    /// Attach damage detections. An empty list is stored as absent.
    ///
    /// Detections that do not carry a damage label are discarded, so the
    /// derived name list always lines up with the detections one to one.
    pub fn with_damages(mut self, detections: Vec<DetectionResult<VehicleSpace>>) -> Self {
        let (detections, damages): (Vec<_>, Vec<_>) = detections
            .into_iter()
            .filter_map(|d| d.label().as_damage().map(|class| (d, class)))
            .unzip();
        if detections.is_empty() {
            self.damage_detections = None;
            self.damages = None;
        } else {
            self.damage_detections = Some(detections);
            self.damages = Some(damages);
        }
        self
    }

    pub fn with_color(mut self, color: Option<ColorLabel>) -> Self {
        self.color = color;
        self
    }

    pub fn with_brand(mut self, brand: Option<BrandClass>) -> Self {
        self.brand = brand;
        self
    }

    pub fn car_detection(&self) -> &DetectionResult<FrameSpace> {
        &self.car_detection
    }

    pub fn plate_detection(&self) -> Option<&DetectionResult<VehicleSpace>> {
        self.plate_detection.as_ref()
    }

    pub fn damage_detections(&self) -> Option<&[DetectionResult<VehicleSpace>]> {
        self.damage_detections.as_deref()
    }

    pub fn plate_number(&self) -> Option<&str> {
        self.plate_number.as_deref()
    }

    /// `None` only when classification failed internally.
    pub fn color(&self) -> Option<ColorLabel> {
        self.color
    }

    pub fn brand(&self) -> Option<BrandClass> {
        self.brand
    }

    /// Damage class names, derived from the damage detections.
    pub fn damages(&self) -> Option<&[DamageClass]> {
        self.damages.as_deref()
    }
}

impl Serialize for RecognitionReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RecognitionReport", 7)?;
        state.serialize_field("car_detection", &self.car_detection)?;
        state.serialize_field("car_plate_detection", &self.plate_detection)?;
        state.serialize_field("car_damage_detections", &self.damage_detections)?;
        state.serialize_field("car_plate_number", &self.plate_number)?;
        state.serialize_field("car_color", &self.color)?;
        state.serialize_field("car_brand", &self.brand)?;
        state.serialize_field("car_damages", &self.damages)?;
        state.end()
    }
}

impl fmt::Display for RecognitionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<RecognitionReport plate='{}', color={}, brand='{}', damages=",
            self.plate_number.as_deref().unwrap_or("None"),
            self.color.map_or("None", |c| c.as_str()),
            self.brand.map_or("None", |b| b.as_str()),
        )?;
        match &self.damages {
            Some(damages) => {
                let names: Vec<&str> = damages.iter().map(|d| d.as_str()).collect();
                write!(f, "[{}]", names.join(", "))?;
            }
            None => f.write_str("None")?,
        }
        write!(f, ", car_box={}>", self.car_detection.bbox())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Label, VehicleClass};
    use serde_json::json;

    fn car() -> DetectionResult<FrameSpace> {
        DetectionResult::new(
            Label::Vehicle(VehicleClass::Car),
            0.9,
            BoundingBox::new(100, 200, 300, 400).unwrap(),
        )
    }

    fn damage(class: DamageClass) -> DetectionResult<VehicleSpace> {
        DetectionResult::new(
            Label::Damage(class),
            0.6,
            BoundingBox::new(5, 5, 15, 15).unwrap(),
        )
    }

    #[test]
    fn bare_report_serializes_absent_fields_as_null() {
        let value = serde_json::to_value(RecognitionReport::new(car())).unwrap();
        assert_eq!(value["car_detection"]["class_name"], "car");
        assert_eq!(value["car_detection"]["box"], json!([100, 200, 300, 400]));
        for key in [
            "car_plate_detection",
            "car_damage_detections",
            "car_plate_number",
            "car_color",
            "car_brand",
            "car_damages",
        ] {
            assert!(value[key].is_null(), "{} should be null", key);
        }
    }

    #[test]
    fn empty_damages_are_absent() {
        let report = RecognitionReport::new(car()).with_damages(Vec::new());
        assert!(report.damage_detections().is_none());
        assert!(report.damages().is_none());
    }

    #[test]
    fn damage_names_are_derived_in_detection_order() {
        let report = RecognitionReport::new(car()).with_damages(vec![
            damage(DamageClass::RoofDent),
            damage(DamageClass::HeadlightDamage),
        ]);
        assert_eq!(
            report.damages().unwrap(),
            &[DamageClass::RoofDent, DamageClass::HeadlightDamage]
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["car_damages"], json!(["roof-dent", "Headlight-damage"]));
        assert_eq!(value["car_damage_detections"][0]["box"], json!([5, 5, 15, 15]));
    }

    #[test]
    fn non_damage_detections_are_not_reported_as_damages() {
        let brand = DetectionResult::new(
            Label::Brand(BrandClass::Bmw),
            0.7,
            BoundingBox::new(1, 1, 5, 5).unwrap(),
        );
        let report = RecognitionReport::new(car()).with_damages(vec![brand.clone()]);
        assert!(report.damage_detections().is_none());
        assert!(report.damages().is_none());

        let report = RecognitionReport::new(car())
            .with_damages(vec![brand, damage(DamageClass::FenderDent)]);
        assert_eq!(report.damage_detections().unwrap().len(), 1);
        assert_eq!(report.damages().unwrap(), &[DamageClass::FenderDent]);
    }

    #[test]
    fn plate_text_requires_a_plate() {
        let report = RecognitionReport::new(car()).with_plate(None, Some("ABC123".into()));
        assert!(report.plate_number().is_none());

        let plate = DetectionResult::new(Label::Plate, 0.8, BoundingBox::new(40, 60, 120, 90).unwrap());
        let report = RecognitionReport::new(car()).with_plate(Some(plate), Some("ABC123".into()));
        assert_eq!(report.plate_number(), Some("ABC123"));
        assert_eq!(report.plate_detection().unwrap().class_name(), "plate");
    }

    #[test]
    fn display_matches_log_format() {
        let report = RecognitionReport::new(car())
            .with_color(Some(ColorLabel::Blue))
            .with_brand(Some(BrandClass::Toyota))
            .with_damages(vec![damage(DamageClass::BootDent)]);
        assert_eq!(
            report.to_string(),
            "<RecognitionReport plate='None', color=Blue, brand='Toyota', \
             damages=[boot-dent], car_box=(100, 200, 300, 400)>"
        );

        let bare = RecognitionReport::new(car()).to_string();
        assert!(bare.contains("color=None"));
        assert!(bare.contains("damages=None"));
    }
}
