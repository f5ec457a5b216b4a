//! Per-frame analysis controller.
//!
//! `VehicleAnalyzer::analyze` runs the vehicle detector over the whole frame,
//! then for every vehicle (in detector order) crops the frame and runs four
//! independent sub-analyses against that crop:
//!
//! - plate: detect a plate, then OCR the plate crop
//! - damage: detect body damages
//! - color: classify the body color (best effort)
//! - brand: detect the brand and keep the top hit
//!
//! Under `Scheduling::Concurrent` the four sub-analyses of one vehicle run on
//! scoped threads sharing the read-only crop; they are all joined before the
//! vehicle's report is assembled. Vehicles are processed one at a time.
//!
//! Failure policy: a color failure (error or panic) is logged and becomes an
//! absent color. Any other failure aborts the frame and is returned to the
//! caller, which decides whether to skip the frame or stop.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use serde::Deserialize;

use crate::color::{ColorClassifier, ColorLabel, ColorRecognizer};
use crate::config::AnalysisConfig;
use crate::detect::{BrandClass, DetectionResult, DetectorSuite, FrameSpace, VehicleSpace};
use crate::frame::{crop, Frame};
use crate::report::RecognitionReport;
use crate::timing::{Stage, StageTimings, TimingAccumulator, TimingSummary};

/// How the sub-analyses of one vehicle are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduling {
    /// One after another on the calling thread.
    Sequential,
    /// One scoped thread per sub-analysis, joined per vehicle.
    #[default]
    Concurrent,
}

impl Scheduling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheduling::Sequential => "sequential",
            Scheduling::Concurrent => "concurrent",
        }
    }
}

impl FromStr for Scheduling {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Scheduling::Sequential),
            "concurrent" => Ok(Scheduling::Concurrent),
            other => Err(anyhow!(
                "unknown scheduling '{}' (expected sequential|concurrent)",
                other
            )),
        }
    }
}

impl fmt::Display for Scheduling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrates detectors and the color engine, and owns the timing totals.
pub struct VehicleAnalyzer {
    detectors: DetectorSuite,
    color: Box<dyn ColorClassifier>,
    scheduling: Scheduling,
    timing: TimingAccumulator,
}

/// Plate detection plus OCR text, both scoped to one vehicle crop.
struct PlateFindings {
    detection: Option<DetectionResult<VehicleSpace>>,
    number: Option<String>,
}

/// Raw outcome of the four sub-analyses for one vehicle.
struct VehicleFindings {
    plate: PlateFindings,
    damages: Vec<DetectionResult<VehicleSpace>>,
    color: Option<ColorLabel>,
    brand: Option<BrandClass>,
    timings: StageTimings,
}

impl VehicleAnalyzer {
    pub fn new(detectors: DetectorSuite, color: Box<dyn ColorClassifier>) -> Self {
        Self {
            detectors,
            color,
            scheduling: Scheduling::default(),
            timing: TimingAccumulator::new(),
        }
    }

    pub fn with_scheduling(mut self, scheduling: Scheduling) -> Self {
        self.scheduling = scheduling;
        self
    }

    /// Build detectors and the color engine from configuration.
    pub fn from_config(cfg: &AnalysisConfig) -> Result<Self> {
        let detectors = DetectorSuite::from_config(&cfg.detector, &cfg.models)
            .context("building detector suite")?;
        let color = ColorRecognizer::new(cfg.color.crop_scale)?;
        log::info!(
            "analyzer: {} scheduling={} crop_scale={}",
            detectors.describe(),
            cfg.analysis.scheduling,
            color.crop_scale()
        );
        Ok(Self::new(detectors, Box::new(color)).with_scheduling(cfg.analysis.scheduling))
    }

    pub fn scheduling(&self) -> Scheduling {
        self.scheduling
    }

    pub fn detectors(&self) -> &DetectorSuite {
        &self.detectors
    }

    pub fn timing(&self) -> &TimingAccumulator {
        &self.timing
    }

    pub fn timing_summary(&self) -> TimingSummary {
        self.timing.summary()
    }

    pub fn write_timing_summary(&self, path: &Path) -> Result<()> {
        self.timing_summary().write_to(path)?;
        log::info!("timing summary written to {}", path.display());
        Ok(())
    }

    /// Analyze one decoded frame.
    pub fn analyze_frame(&mut self, frame: &Frame) -> Result<Vec<RecognitionReport>> {
        self.analyze(&frame.image)
            .with_context(|| format!("analyzing frame {}", frame.index))
    }

    /// Analyze one image: one report per detected vehicle, in detector order.
    pub fn analyze(&mut self, image: &RgbImage) -> Result<Vec<RecognitionReport>> {
        self.timing.add_frame();

        let start = Instant::now();
        let vehicles = self.detectors.vehicle.detect(image);
        self.timing.record(Stage::VehicleDetection, start.elapsed());
        let vehicles = vehicles.context("vehicle detection failed")?;
        self.timing.add_vehicles(vehicles.len());
        log::debug!("frame: {} vehicle(s)", vehicles.len());

        let mut reports = Vec::with_capacity(vehicles.len());
        for (index, vehicle) in vehicles.into_iter().enumerate() {
            let vehicle: DetectionResult<FrameSpace> = vehicle.reframe();
            let vehicle_crop = crop(image, vehicle.bbox());

            let findings = match self.scheduling {
                Scheduling::Sequential => self.inspect_sequential(&vehicle_crop),
                Scheduling::Concurrent => self.inspect_concurrent(&vehicle_crop),
            }
            .with_context(|| format!("vehicle {} at {}", index, vehicle.bbox()))?;

            self.timing.merge(&findings.timings);
            let report = RecognitionReport::new(vehicle)
                .with_plate(findings.plate.detection, findings.plate.number)
                .with_damages(findings.damages)
                .with_color(findings.color)
                .with_brand(findings.brand);
            log::debug!("vehicle {}: {}", index, report);
            reports.push(report);
        }
        Ok(reports)
    }

    fn inspect_sequential(&self, vehicle: &RgbImage) -> Result<VehicleFindings> {
        let mut timings = StageTimings::default();
        let plate = read_plate(&self.detectors, vehicle, &mut timings)?;
        let damages = detect_damages(&self.detectors, vehicle, &mut timings)?;
        let color = classify_color(self.color.as_ref(), vehicle, &mut timings);
        let brand = detect_brand(&self.detectors, vehicle, &mut timings)?;
        Ok(VehicleFindings {
            plate,
            damages,
            color,
            brand,
            timings,
        })
    }

    fn inspect_concurrent(&self, vehicle: &RgbImage) -> Result<VehicleFindings> {
        let detectors = &self.detectors;
        let classifier = self.color.as_ref();

        // Join every handle before looking at any result: an unjoined panicked
        // thread would make `thread::scope` itself panic.
        let (plate, damages, color, brand) = thread::scope(|scope| {
            let plate = scope.spawn(|| with_timings(|t| read_plate(detectors, vehicle, t)));
            let damages = scope.spawn(|| with_timings(|t| detect_damages(detectors, vehicle, t)));
            let color = scope.spawn(|| with_timings(|t| classify_color(classifier, vehicle, t)));
            let brand = scope.spawn(|| with_timings(|t| detect_brand(detectors, vehicle, t)));
            (plate.join(), damages.join(), color.join(), brand.join())
        });

        let mut timings = StageTimings::default();
        let plate = joined(plate, "plate recognition", &mut timings)??;
        let damages = joined(damages, "damage detection", &mut timings)??;
        let color = match joined(color, "color classification", &mut timings) {
            Ok(color) => color,
            Err(err) => {
                log::warn!("{:#}; color left absent", err);
                None
            }
        };
        let brand = joined(brand, "brand detection", &mut timings)??;
        Ok(VehicleFindings {
            plate,
            damages,
            color,
            brand,
            timings,
        })
    }
}

fn timed<T>(timings: &mut StageTimings, stage: Stage, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    timings.record(stage, start.elapsed());
    out
}

fn with_timings<T>(f: impl FnOnce(&mut StageTimings) -> T) -> (T, StageTimings) {
    let mut timings = StageTimings::default();
    let out = f(&mut timings);
    (out, timings)
}

/// Unwrap a joined sub-analysis, folding its timings and turning a panic into an error.
fn joined<T>(
    result: thread::Result<(T, StageTimings)>,
    what: &str,
    timings: &mut StageTimings,
) -> Result<T> {
    match result {
        Ok((value, own)) => {
            for stage in Stage::ALL {
                timings.record(stage, own.get(stage));
            }
            Ok(value)
        }
        Err(payload) => Err(anyhow!("{} panicked: {}", what, panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn read_plate(
    detectors: &DetectorSuite,
    vehicle: &RgbImage,
    timings: &mut StageTimings,
) -> Result<PlateFindings> {
    let detection = timed(timings, Stage::PlateDetection, || {
        detectors.plate.detect_plate(vehicle)
    })
    .context("plate detection failed")?;

    let Some(detection) = detection.map(|d| d.reframe::<VehicleSpace>()) else {
        return Ok(PlateFindings {
            detection: None,
            number: None,
        });
    };

    let plate_crop = crop(vehicle, detection.bbox());
    let reading = timed(timings, Stage::PlateOcr, || detectors.text.read(&plate_crop))
        .context("plate text recognition failed")?;
    let number = reading.text.filter(|text| !text.trim().is_empty());
    log::debug!(
        "plate at {}: {:?} ({:.2})",
        detection.bbox(),
        number,
        reading.confidence
    );
    Ok(PlateFindings {
        detection: Some(detection),
        number,
    })
}

fn detect_damages(
    detectors: &DetectorSuite,
    vehicle: &RgbImage,
    timings: &mut StageTimings,
) -> Result<Vec<DetectionResult<VehicleSpace>>> {
    let damages = timed(timings, Stage::DamageDetection, || {
        detectors.damage.detect(vehicle)
    })
    .context("damage detection failed")?;
    if let Some(other) = damages.iter().find(|d| d.label().as_damage().is_none()) {
        return Err(anyhow!(
            "damage detector returned non-damage label '{}'",
            other.label()
        ));
    }
    Ok(damages.into_iter().map(DetectionResult::reframe).collect())
}

/// Best effort: errors and panics both yield `None`.
fn classify_color(
    classifier: &dyn ColorClassifier,
    vehicle: &RgbImage,
    timings: &mut StageTimings,
) -> Option<ColorLabel> {
    let outcome = timed(timings, Stage::ColorClassification, || {
        panic::catch_unwind(AssertUnwindSafe(|| classifier.classify(vehicle)))
    });
    match outcome {
        Ok(Ok(label)) => Some(label),
        Ok(Err(err)) => {
            log::warn!("color classification failed: {:#}; color left absent", err);
            None
        }
        Err(payload) => {
            log::warn!(
                "color classification panicked: {}; color left absent",
                panic_message(&*payload)
            );
            None
        }
    }
}

fn detect_brand(
    detectors: &DetectorSuite,
    vehicle: &RgbImage,
    timings: &mut StageTimings,
) -> Result<Option<BrandClass>> {
    let brands = timed(timings, Stage::BrandDetection, || {
        detectors.brand.detect(vehicle)
    })
    .context("brand detection failed")?;
    let Some(top) = brands.first().map(|d| d.label()) else {
        return Ok(None);
    };
    top.as_brand()
        .map(Some)
        .ok_or_else(|| anyhow!("brand detector returned non-brand label '{}'", top))
}
