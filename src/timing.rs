//! Per-stage timing statistics.
//!
//! One `TimingAccumulator` lives in each analyzer. It is only ever mutated by
//! the analyzer after a vehicle's sub-analyses have joined, so it needs no
//! locking. Totals are never reset; `summary()` is a read-only snapshot.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

/// Pipeline stages, in pipeline order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    VehicleDetection,
    PlateDetection,
    PlateOcr,
    DamageDetection,
    ColorClassification,
    BrandDetection,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::VehicleDetection,
        Stage::PlateDetection,
        Stage::PlateOcr,
        Stage::DamageDetection,
        Stage::ColorClassification,
        Stage::BrandDetection,
    ];

    /// Report key for the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::VehicleDetection => "VehicleRecognizer",
            Stage::PlateDetection => "PlateRecognizer - detect_plate",
            Stage::PlateOcr => "PlateRecognizer - recognize_text",
            Stage::DamageDetection => "DamageRecognizer",
            Stage::ColorClassification => "ColorRecognizer",
            Stage::BrandDetection => "CarBrandRecognizer",
        }
    }

    /// The vehicle detector runs once per frame, so a per-vehicle average is meaningless.
    pub fn is_per_vehicle(&self) -> bool {
        !matches!(self, Stage::VehicleDetection)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elapsed time per stage for one unit of work (a frame or a vehicle).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageTimings {
    elapsed: [Duration; 6],
}

impl StageTimings {
    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.elapsed[stage.index()] += elapsed;
    }

    pub fn get(&self, stage: Stage) -> Duration {
        self.elapsed[stage.index()]
    }
}

/// Cumulative timing across every frame an analyzer has seen.
#[derive(Clone, Debug, Default)]
pub struct TimingAccumulator {
    totals: StageTimings,
    frames: u64,
    vehicles: u64,
}

impl TimingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_frame(&mut self) {
        self.frames += 1;
    }

    pub fn add_vehicles(&mut self, count: usize) {
        self.vehicles += count as u64;
    }

    pub fn record(&mut self, stage: Stage, elapsed: Duration) {
        self.totals.record(stage, elapsed);
    }

    /// Fold in the timings of one vehicle's sub-analyses.
    pub fn merge(&mut self, timings: &StageTimings) {
        for stage in Stage::ALL {
            self.totals.record(stage, timings.get(stage));
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn vehicles(&self) -> u64 {
        self.vehicles
    }

    pub fn total(&self, stage: Stage) -> Duration {
        self.totals.get(stage)
    }

    /// Averages per frame and per vehicle. Zero counts never divide.
    pub fn summary(&self) -> TimingSummary {
        let stages = Stage::ALL
            .iter()
            .map(|&stage| {
                let total = self.total(stage).as_secs_f64();
                let per_frame = if self.frames > 0 {
                    total / self.frames as f64
                } else {
                    0.0
                };
                let per_vehicle = if stage.is_per_vehicle() && self.vehicles > 0 {
                    Some(total / self.vehicles as f64)
                } else {
                    None
                };
                StageAverage {
                    stage,
                    total_secs: total,
                    per_frame_secs: per_frame,
                    per_vehicle_secs: per_vehicle,
                }
            })
            .collect();
        TimingSummary {
            frames: self.frames,
            vehicles: self.vehicles,
            stages,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StageAverage {
    pub stage: Stage,
    pub total_secs: f64,
    pub per_frame_secs: f64,
    /// `None` for the vehicle detector, or before any vehicle was seen.
    pub per_vehicle_secs: Option<f64>,
}

/// Human-readable timing report.
#[derive(Clone, Debug, Serialize)]
pub struct TimingSummary {
    pub frames: u64,
    pub vehicles: u64,
    pub stages: Vec<StageAverage>,
}

impl TimingSummary {
    pub fn stage(&self, stage: Stage) -> Option<&StageAverage> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn write_to(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string())
            .with_context(|| format!("writing timing summary to {}", path.display()))
    }
}

impl fmt::Display for TimingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total frames: {}", self.frames)?;
        writeln!(f, "Total vehicles recognized: {}", self.vehicles)?;
        writeln!(f)?;
        for avg in &self.stages {
            writeln!(f, "{}:", avg.stage)?;
            writeln!(f, "  ├─ Average time per frame:   {:.4} sec", avg.per_frame_secs)?;
            match avg.per_vehicle_secs {
                Some(secs) => writeln!(f, "  └─ Average time per vehicle: {:.4} sec", secs)?,
                None if !avg.stage.is_per_vehicle() => {
                    writeln!(f, "  └─ (not computed per vehicle: this is the vehicle detector)")?
                }
                None => writeln!(f, "  └─ Average time per vehicle: n/a")?,
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_reports_zero_without_dividing() {
        let summary = TimingAccumulator::new().summary();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.vehicles, 0);
        for avg in &summary.stages {
            assert_eq!(avg.per_frame_secs, 0.0);
            assert!(avg.per_vehicle_secs.is_none());
        }
        let text = summary.to_string();
        assert!(text.contains("Total frames: 0"));
        assert!(text.contains("Average time per vehicle: n/a"));
    }

    #[test]
    fn averages_divide_by_frames_and_vehicles() {
        let mut acc = TimingAccumulator::new();
        acc.add_frame();
        acc.add_frame();
        acc.add_vehicles(4);
        acc.record(Stage::VehicleDetection, Duration::from_millis(300));
        let mut per_vehicle = StageTimings::default();
        per_vehicle.record(Stage::DamageDetection, Duration::from_millis(200));
        acc.merge(&per_vehicle);
        acc.merge(&per_vehicle);

        let summary = acc.summary();
        let vehicle = summary.stage(Stage::VehicleDetection).unwrap();
        assert!((vehicle.per_frame_secs - 0.15).abs() < 1e-9);
        assert!(vehicle.per_vehicle_secs.is_none());

        let damage = summary.stage(Stage::DamageDetection).unwrap();
        assert!((damage.total_secs - 0.4).abs() < 1e-9);
        assert!((damage.per_frame_secs - 0.2).abs() < 1e-9);
        assert!((damage.per_vehicle_secs.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn summary_text_lists_every_stage_in_order() {
        let mut acc = TimingAccumulator::new();
        acc.add_frame();
        acc.add_vehicles(1);
        let text = acc.summary().to_string();

        let positions: Vec<usize> = Stage::ALL
            .iter()
            .map(|stage| text.find(&format!("{}:", stage)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(text.contains("this is the vehicle detector"));
        assert!(text.contains("Total vehicles recognized: 1"));
    }

    #[test]
    fn writes_summary_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("times.log");
        TimingAccumulator::new().summary().write_to(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Total frames: 0"));
    }
}
