use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::{ObjectDetector, PlateDetector, TextReading, TextRecognizer};
use crate::detect::result::DetectionResult;

/// Stub backend. Detects nothing and reads nothing.
///
/// Lets the full pipeline run (timing, reports, rendering) without models.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl ObjectDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<DetectionResult>> {
        Ok(Vec::new())
    }
}

impl PlateDetector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect_plate(&self, _image: &RgbImage) -> Result<Option<DetectionResult>> {
        Ok(None)
    }
}

impl TextRecognizer for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn read(&self, _image: &RgbImage) -> Result<TextReading> {
        Ok(TextReading::empty())
    }
}
