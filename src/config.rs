use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analyzer::Scheduling;
use crate::color::DEFAULT_CROP_SCALE;
use crate::detect::BackendKind;

pub const CONFIG_ENV: &str = "VEHICLE_ANALYSIS_CONFIG";

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
const DEFAULT_IOU_THRESHOLD: f32 = 0.5;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_OCR_CHARSET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DEFAULT_OCR_WIDTH: u32 = 320;
const DEFAULT_OCR_HEIGHT: u32 = 48;
const DEFAULT_TIMING_REPORT: &str = "recognition_times_avg.log";
const DEFAULT_CAPTION_SIZE: f32 = 16.0;

#[derive(Debug, Deserialize, Default)]
struct AnalysisConfigFile {
    models: Option<ModelsConfigFile>,
    detector: Option<DetectorConfigFile>,
    color: Option<ColorConfigFile>,
    analysis: Option<AnalysisSectionFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelsConfigFile {
    vehicle: Option<PathBuf>,
    plate: Option<PathBuf>,
    damage: Option<PathBuf>,
    brand: Option<PathBuf>,
    ocr: Option<PathBuf>,
    ocr_charset: Option<String>,
    ocr_width: Option<u32>,
    ocr_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ColorConfigFile {
    crop_scale: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct AnalysisSectionFile {
    scheduling: Option<Scheduling>,
    timing_report: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font: Option<PathBuf>,
    caption_size: Option<f32>,
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisConfig {
    pub models: ModelSettings,
    pub detector: DetectorSettings,
    pub color: ColorSettings,
    pub analysis: AnalysisSettings,
    pub render: RenderSettings,
}

/// Model files for the tract backend. Ignored by the stub backend.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub vehicle: Option<PathBuf>,
    pub plate: Option<PathBuf>,
    pub damage: Option<PathBuf>,
    pub brand: Option<PathBuf>,
    pub ocr: Option<PathBuf>,
    pub ocr_charset: String,
    pub ocr_width: u32,
    pub ocr_height: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            vehicle: None,
            plate: None,
            damage: None,
            brand: None,
            ocr: None,
            ocr_charset: DEFAULT_OCR_CHARSET.to_string(),
            ocr_width: DEFAULT_OCR_WIDTH,
            ocr_height: DEFAULT_OCR_HEIGHT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColorSettings {
    pub crop_scale: f64,
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            crop_scale: DEFAULT_CROP_SCALE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub scheduling: Scheduling,
    pub timing_report: PathBuf,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            scheduling: Scheduling::default(),
            timing_report: PathBuf::from(DEFAULT_TIMING_REPORT),
        }
    }
}

/// Annotated-output settings. Captions are skipped without a font.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub font: Option<PathBuf>,
    pub caption_size: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            font: None,
            caption_size: DEFAULT_CAPTION_SIZE,
        }
    }
}

impl AnalysisConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AnalysisConfigFile) -> Result<Self> {
        let models = file.models.unwrap_or_default();
        let models = ModelSettings {
            vehicle: models.vehicle,
            plate: models.plate,
            damage: models.damage,
            brand: models.brand,
            ocr: models.ocr,
            ocr_charset: models
                .ocr_charset
                .unwrap_or_else(|| DEFAULT_OCR_CHARSET.to_string()),
            ocr_width: models.ocr_width.unwrap_or(DEFAULT_OCR_WIDTH),
            ocr_height: models.ocr_height.unwrap_or(DEFAULT_OCR_HEIGHT),
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: match detector_file.backend.as_deref() {
                Some(name) => name.parse()?,
                None => BackendKind::default(),
            },
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
        };

        let color = ColorSettings {
            crop_scale: file
                .color
                .and_then(|color| color.crop_scale)
                .unwrap_or(DEFAULT_CROP_SCALE),
        };

        let analysis_file = file.analysis.unwrap_or_default();
        let analysis = AnalysisSettings {
            scheduling: analysis_file.scheduling.unwrap_or_default(),
            timing_report: analysis_file
                .timing_report
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TIMING_REPORT)),
        };

        let render_file = file.render.unwrap_or_default();
        let render = RenderSettings {
            font: render_file.font,
            caption_size: render_file.caption_size.unwrap_or(DEFAULT_CAPTION_SIZE),
        };

        Ok(Self {
            models,
            detector,
            color,
            analysis,
            render,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(backend) = std::env::var("VEHICLE_ANALYSIS_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.parse()?;
            }
        }
        if let Ok(scheduling) = std::env::var("VEHICLE_ANALYSIS_SCHEDULING") {
            if !scheduling.trim().is_empty() {
                self.analysis.scheduling = scheduling.parse()?;
            }
        }
        if let Ok(scale) = std::env::var("VEHICLE_ANALYSIS_CROP_SCALE") {
            self.color.crop_scale = scale.trim().parse().map_err(|_| {
                anyhow!("VEHICLE_ANALYSIS_CROP_SCALE must be a number in (0, 1]")
            })?;
        }
        if let Ok(path) = std::env::var("VEHICLE_ANALYSIS_TIMING_REPORT") {
            if !path.trim().is_empty() {
                self.analysis.timing_report = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("VEHICLE_ANALYSIS_FONT") {
            if !path.trim().is_empty() {
                self.render.font = Some(PathBuf::from(path));
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let scale = self.color.crop_scale;
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(anyhow!("color.crop_scale must be in (0, 1], got {}", scale));
        }
        for (name, value) in [
            ("detector.confidence_threshold", self.detector.confidence_threshold),
            ("detector.iou_threshold", self.detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be in [0, 1], got {}", name, value));
            }
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be greater than zero"));
        }
        let size = self.render.caption_size;
        if !(size.is_finite() && size > 0.0) {
            return Err(anyhow!("render.caption_size must be positive, got {}", size));
        }
        if self.models.ocr_width == 0 || self.models.ocr_height == 0 {
            return Err(anyhow!("models.ocr_width and models.ocr_height must be non-zero"));
        }
        if self.detector.backend == BackendKind::Tract {
            let missing: Vec<&str> = [
                ("vehicle", &self.models.vehicle),
                ("plate", &self.models.plate),
                ("damage", &self.models.damage),
                ("brand", &self.models.brand),
            ]
            .into_iter()
            .filter(|(_, path)| path.is_none())
            .map(|(name, _)| name)
            .collect();
            if !missing.is_empty() {
                return Err(anyhow!(
                    "tract backend requires model paths for: {}",
                    missing.join(", ")
                ));
            }
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AnalysisConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
