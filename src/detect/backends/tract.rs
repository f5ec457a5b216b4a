#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::{ObjectDetector, TextReading, TextRecognizer};
use crate::detect::labels::LabelFamily;
use crate::detect::result::{BoundingBox, DetectionResult};

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// Columns before the class scores in a YOLOv5 output row: cx, cy, w, h, objectness.
const YOLO_BOX_COLUMNS: usize = 5;

fn load_plan(model_path: &Path, height: u32, width: u32) -> Result<OnnxPlan> {
    tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(
                f32::datum_type(),
                tvec!(1, 3, height as usize, width as usize),
            ),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")
}

/// Resize to the model input and lay out as `1x3xHxW`, mapping each channel byte
/// through `normalize`.
fn build_input(
    image: &RgbImage,
    width: u32,
    height: u32,
    normalize: impl Fn(u8) -> f32,
) -> Result<Tensor> {
    if image.width() == 0 || image.height() == 0 {
        bail!("cannot run inference on an empty {}x{} image", image.width(), image.height());
    }
    let resized = imageops::resize(image, width, height, FilterType::Triangle);
    let input = tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| normalize(resized.get_pixel(x as u32, y as u32)[channel]),
    );
    Ok(input.into_tensor())
}

/// Tract backend for YOLOv5-style ONNX detectors.
///
/// Expects a `1x3xSxS` float input in `[0, 1]` and a `1xNx(5+C)` output whose
/// rows are `cx, cy, w, h, objectness, class scores...` in input pixels.
pub struct TractYoloDetector {
    model: OnnxPlan,
    family: LabelFamily,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractYoloDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, family: LabelFamily, input_size: u32) -> Result<Self> {
        let model = load_plan(model_path.as_ref(), input_size, input_size)?;
        Ok(Self {
            model,
            family,
            input_size,
            confidence_threshold: 0.5,
            iou_threshold: 0.5,
        })
    }

    /// Override the default confidence and IoU thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn decode(&self, outputs: &TVec<TValue>, image_w: u32, image_h: u32) -> Result<Vec<Candidate>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[2] <= YOLO_BOX_COLUMNS {
            bail!("unexpected YOLO output shape {:?}", shape);
        }
        let expected = YOLO_BOX_COLUMNS + self.family.class_count();
        if shape[2] != expected {
            bail!(
                "{:?} model emits {} columns per row, expected {}",
                self.family,
                shape[2],
                expected
            );
        }
        let data: Vec<f32> = view.iter().copied().collect();

        let sx = image_w as f32 / self.input_size as f32;
        let sy = image_h as f32 / self.input_size as f32;
        let max_x = image_w as f32;
        let max_y = image_h as f32;

        let mut candidates = Vec::new();
        for row in data.chunks_exact(shape[2]) {
            let objectness = row[4];
            if objectness < self.confidence_threshold {
                continue;
            }
            let Some((class_index, class_score)) = row
                .iter()
                .skip(YOLO_BOX_COLUMNS)
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))
            else {
                continue;
            };
            let score = objectness * class_score;
            if score < self.confidence_threshold {
                continue;
            }
            let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
            let x1 = ((cx - w / 2.0) * sx).clamp(0.0, max_x);
            let y1 = ((cy - h / 2.0) * sy).clamp(0.0, max_y);
            let x2 = ((cx + w / 2.0) * sx).clamp(0.0, max_x);
            let y2 = ((cy + h / 2.0) * sy).clamp(0.0, max_y);
            candidates.push(Candidate {
                class_index,
                score,
                bbox: BoundingBox::from_corners(x1 as i32, y1 as i32, x2 as i32, y2 as i32),
            });
        }
        Ok(candidates)
    }
}

struct Candidate {
    class_index: usize,
    score: f32,
    bbox: BoundingBox,
}

/// Class-wise non-maximum suppression. Output is ordered by descending score.
fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];
    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if candidates[j].class_index == candidates[i].class_index
                && candidates[i].bbox.iou(&candidates[j].bbox) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }
    for (candidate, suppressed) in candidates.into_iter().zip(suppressed) {
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl ObjectDetector for TractYoloDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<DetectionResult>> {
        let input = build_input(image, self.input_size, self.input_size, |v| v as f32 / 255.0)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let candidates = self.decode(&outputs, image.width(), image.height())?;

        non_max_suppression(candidates, self.iou_threshold)
            .into_iter()
            .map(|c| {
                let label = self.family.label_for_index(c.class_index)?;
                Ok(DetectionResult::new(label, c.score, c.bbox))
            })
            .collect()
    }
}

/// Tract backend for CTC plate-text recognition models.
///
/// Expects a `1x3xHxW` input normalised to `[-1, 1]` and a `1xTxK` output of
/// per-step class scores where class 0 is the CTC blank and classes `1..K`
/// index into `charset`.
pub struct TractPlateReader {
    model: OnnxPlan,
    charset: Vec<char>,
    width: u32,
    height: u32,
}

impl TractPlateReader {
    pub fn new<P: AsRef<Path>>(model_path: P, charset: &str, width: u32, height: u32) -> Result<Self> {
        if charset.is_empty() {
            bail!("plate reader charset must not be empty");
        }
        let model = load_plan(model_path.as_ref(), height, width)?;
        Ok(Self {
            model,
            charset: charset.chars().collect(),
            width,
            height,
        })
    }
}

/// Greedy CTC decode: best class per step, collapse repeats, drop blanks.
fn ctc_greedy_decode(steps: &[Vec<f32>], charset: &[char]) -> TextReading {
    let mut text = String::new();
    let mut kept_scores = Vec::new();
    let mut previous = None;
    for scores in steps {
        let Some((class, score)) = scores
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            continue;
        };
        if class != 0 && previous != Some(class) {
            if let Some(ch) = charset.get(class - 1) {
                text.push(*ch);
                kept_scores.push(score);
            }
        }
        previous = Some(class);
    }

    if text.is_empty() {
        return TextReading::empty();
    }
    let confidence = kept_scores.iter().sum::<f32>() / kept_scores.len() as f32;
    TextReading {
        text: Some(text.to_uppercase()),
        confidence,
    }
}

impl TextRecognizer for TractPlateReader {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn read(&self, image: &RgbImage) -> Result<TextReading> {
        let input = build_input(image, self.width, self.height, |v| {
            (v as f32 / 255.0 - 0.5) / 0.5
        })?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[2] != self.charset.len() + 1 {
            bail!(
                "unexpected OCR output shape {:?} for a charset of {} symbols",
                shape,
                self.charset.len()
            );
        }
        let data: Vec<f32> = view.iter().copied().collect();
        let steps: Vec<Vec<f32>> = data.chunks_exact(shape[2]).map(|row| row.to_vec()).collect();
        Ok(ctc_greedy_decode(&steps, &self.charset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(class_index: usize, score: f32, x1: i32) -> Candidate {
        Candidate {
            class_index,
            score,
            bbox: BoundingBox::new(x1, 0, x1 + 10, 10).unwrap(),
        }
    }

    #[test]
    fn nms_suppresses_overlaps_within_a_class_only() {
        let kept = non_max_suppression(
            vec![
                candidate(0, 0.6, 1),
                candidate(0, 0.9, 0),
                candidate(1, 0.7, 0),
                candidate(0, 0.8, 40),
            ],
            0.5,
        );
        let scores: Vec<f32> = kept.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.9, 0.8, 0.7]);
    }

    #[test]
    fn ctc_collapses_repeats_and_blanks() {
        let charset: Vec<char> = "ab1".chars().collect();
        let step = |class: usize| {
            let mut scores = vec![0.0; 4];
            scores[class] = 0.9;
            scores
        };
        let steps = vec![step(1), step(1), step(0), step(1), step(3), step(0)];
        let reading = ctc_greedy_decode(&steps, &charset);
        assert_eq!(reading.text.as_deref(), Some("AA1"));
        assert!((reading.confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn ctc_all_blank_reads_nothing() {
        let steps = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        assert_eq!(ctc_greedy_decode(&steps, &['x']), TextReading::empty());
    }
}
