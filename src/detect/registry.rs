use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use super::backend::{ObjectDetector, PlateDetector, TextRecognizer};
use super::backends::StubBackend;
use crate::config::{DetectorSettings, ModelSettings};

/// Detector backend selected by configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Stub,
    Tract,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Stub => "stub",
            BackendKind::Tract => "tract",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(BackendKind::Stub),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!("unknown detector backend '{}' (expected stub|tract)", other)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The collaborators one analyzer needs: four detectors and a plate reader.
pub struct DetectorSuite {
    pub vehicle: Box<dyn ObjectDetector>,
    pub plate: Box<dyn PlateDetector>,
    pub text: Box<dyn TextRecognizer>,
    pub damage: Box<dyn ObjectDetector>,
    pub brand: Box<dyn ObjectDetector>,
}

impl DetectorSuite {
    /// Suite that detects nothing. Useful for dry runs and tests.
    pub fn stub() -> Self {
        Self {
            vehicle: Box::new(StubBackend::new()),
            plate: Box::new(StubBackend::new()),
            text: Box::new(StubBackend::new()),
            damage: Box::new(StubBackend::new()),
            brand: Box::new(StubBackend::new()),
        }
    }

    /// Build the suite for the configured backend.
    pub fn from_config(detector: &DetectorSettings, models: &ModelSettings) -> Result<Self> {
        match detector.backend {
            BackendKind::Stub => {
                log::info!("detector backend: stub (no models loaded)");
                Ok(Self::stub())
            }
            BackendKind::Tract => Self::tract(detector, models),
        }
    }

    #[cfg(feature = "backend-tract")]
    fn tract(detector: &DetectorSettings, models: &ModelSettings) -> Result<Self> {
        use super::backend::TopDetection;
        use super::backends::{TractPlateReader, TractYoloDetector};
        use super::labels::LabelFamily;
        use std::path::Path;

        let yolo = |path: Option<&Path>, family: LabelFamily| -> Result<TractYoloDetector> {
            let path = path.ok_or_else(|| {
                anyhow!("tract backend requires a {:?} model path", family)
            })?;
            log::info!("loading {:?} model from {}", family, path.display());
            Ok(
                TractYoloDetector::new(path, family, detector.input_size)?.with_thresholds(
                    detector.confidence_threshold,
                    detector.iou_threshold,
                ),
            )
        };

        let text: Box<dyn TextRecognizer> = match models.ocr.as_deref() {
            Some(path) => {
                log::info!("loading plate OCR model from {}", path.display());
                Box::new(TractPlateReader::new(
                    path,
                    &models.ocr_charset,
                    models.ocr_width,
                    models.ocr_height,
                )?)
            }
            None => {
                log::warn!("no OCR model configured; plate text will be absent");
                Box::new(StubBackend::new())
            }
        };

        Ok(Self {
            vehicle: Box::new(yolo(models.vehicle.as_deref(), LabelFamily::Vehicle)?),
            plate: Box::new(TopDetection(yolo(models.plate.as_deref(), LabelFamily::Plate)?)),
            text,
            damage: Box::new(yolo(models.damage.as_deref(), LabelFamily::Damage)?),
            brand: Box::new(yolo(models.brand.as_deref(), LabelFamily::Brand)?),
        })
    }

    #[cfg(not(feature = "backend-tract"))]
    fn tract(_detector: &DetectorSettings, _models: &ModelSettings) -> Result<Self> {
        Err(anyhow!(
            "the tract detector backend requires the backend-tract feature"
        ))
    }

    /// Run every detector's warm-up hook.
    pub fn warm_up(&self) -> Result<()> {
        self.vehicle.warm_up()?;
        self.plate.warm_up()?;
        self.text.warm_up()?;
        self.damage.warm_up()?;
        self.brand.warm_up()?;
        Ok(())
    }

    /// Backend names in pipeline order, for logging.
    pub fn describe(&self) -> String {
        format!(
            "vehicle={} plate={} ocr={} damage={} brand={}",
            self.vehicle.name(),
            self.plate.name(),
            self.text.name(),
            self.damage.name(),
            self.brand.name()
        )
    }
}
