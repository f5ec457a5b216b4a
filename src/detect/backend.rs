use anyhow::Result;
use image::RgbImage;

use super::result::DetectionResult;

/// Detector that returns every object it finds, in its own ranking order.
///
/// Used for vehicles, damages and brands. Boxes are in the coordinate space
/// of `image`.
///
/// Implementations take `&self` and must be `Send + Sync`: the analyzer runs
/// the per-vehicle detectors concurrently against the same read-only crop.
pub trait ObjectDetector: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB image.
    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionResult>>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Detector that returns at most one license plate per call.
pub trait PlateDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect_plate(&self, image: &RgbImage) -> Result<Option<DetectionResult>>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Adapts an object detector into a plate detector by keeping its top hit.
pub struct TopDetection<D>(pub D);

impl<D: ObjectDetector> PlateDetector for TopDetection<D> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn detect_plate(&self, image: &RgbImage) -> Result<Option<DetectionResult>> {
        Ok(self.0.detect(image)?.into_iter().next())
    }

    fn warm_up(&self) -> Result<()> {
        ObjectDetector::warm_up(&self.0)
    }
}

/// Text read from a plate crop.
#[derive(Clone, Debug, PartialEq)]
pub struct TextReading {
    /// `None` when nothing legible was found.
    pub text: Option<String>,
    pub confidence: f32,
}

impl TextReading {
    pub fn empty() -> Self {
        Self {
            text: None,
            confidence: 0.0,
        }
    }
}

/// Optical character recognition over a plate crop.
pub trait TextRecognizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn read(&self, image: &RgbImage) -> Result<TextReading>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}
