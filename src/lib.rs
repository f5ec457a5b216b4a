//! Vehicle Analysis
//!
//! Per-frame vehicle analysis: find vehicles in an image, then for each vehicle
//! read its license plate, list its body damages, classify its body color and
//! recognize its brand.
//!
//! # Architecture
//!
//! - Detection models are collaborators behind small traits (`ObjectDetector`,
//!   `PlateDetector`, `TextRecognizer`) and are bundled in a `DetectorSuite`.
//!   The stub backend detects nothing; the tract backend runs ONNX models.
//! - The color engine is a deterministic HSV range-voting heuristic.
//! - `VehicleAnalyzer` crops each vehicle out of the frame, fans the four
//!   sub-analyses out over that crop, and assembles one `RecognitionReport`
//!   per vehicle while accumulating per-stage timings.
//!
//! Boxes carry their coordinate space in the type: vehicle boxes are in the
//! frame, plate and damage boxes are in the vehicle crop. `render` lifts crop
//! boxes back into the frame for drawing.
//!
//! # Module Structure
//!
//! - `detect`: boxes, detection results, label sets, detector traits and backends
//! - `frame`: decoded frames and cropping
//! - `color`: body color classification
//! - `analyzer`: the per-frame orchestrator
//! - `report`, `timing`, `render`: outputs
//! - `config`, `ingest`: configuration and frame sources

pub mod analyzer;
pub mod color;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod render;
pub mod report;
pub mod timing;

pub use analyzer::{Scheduling, VehicleAnalyzer};
pub use color::{ColorClassifier, ColorLabel, ColorRecognizer};
pub use config::AnalysisConfig;
pub use detect::{
    BoundingBox, BrandClass, DamageClass, DetectionResult, DetectorSuite, FrameSpace, Label,
    VehicleClass, VehicleSpace,
};
pub use frame::{crop, Frame};
pub use report::RecognitionReport;
pub use timing::{Stage, TimingAccumulator, TimingSummary};
