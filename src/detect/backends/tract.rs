#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::Deserialize;
use tract_onnx::prelude::*;

use super::postprocess::{self, Scale};
use crate::detect::backend::{ClassifierBackend, DetectionCapability, DetectorBackend};
use crate::detect::result::{Detection, LabelScore};
use crate::ingest::LoadedImage;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const CLASSIFIER_RESIZE: u32 = 256;
const CLASSIFIER_CROP: u32 = 224;

type Plan = TypedRunnableModel<TypedModel>;

/// How a detector model lays out its outputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// Single dense `[1, 4 + classes, boxes]` head with centre-format boxes.
    #[default]
    Yolo,
    /// Three outputs: `boxes [N,4]` xyxy, `labels [N]` int64, `scores [N]`.
    BoxesLabelsScores,
}

/// Settings for an ONNX detector.
#[derive(Clone, Debug, Deserialize)]
pub struct TractDetectorConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Confidence floor applied while decoding; the cascade filters again on top.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    #[serde(default = "default_iou")]
    pub iou_threshold: f64,
    #[serde(default)]
    pub layout: OutputLayout,
}

fn default_input_size() -> u32 {
    640
}

fn default_confidence() -> f32 {
    0.25
}

fn default_iou() -> f64 {
    0.45
}

/// Settings for an ONNX classifier.
#[derive(Clone, Debug, Deserialize)]
pub struct TractClassifierConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
}

fn load_plan(model_path: &Path, width: u32, height: u32) -> Result<Plan> {
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

fn load_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    let labels: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(anyhow!("labels file {} is empty", path.display()));
    }
    Ok(labels)
}

/// NCHW float tensor, optionally normalised per channel.
fn to_tensor(pixels: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Tensor {
    let (width, height) = pixels.dimensions();
    tract_ndarray::Array4::from_shape_fn(
        (1, 3, height as usize, width as usize),
        |(_, channel, y, x)| {
            let value = pixels.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0;
            (value - mean[channel]) / std[channel]
        },
    )
    .into_tensor()
}

/// ONNX detector backend executed with tract.
///
/// The image is stretched to the model's square input; boxes are mapped back
/// to source pixel coordinates.
pub struct TractDetector {
    name: String,
    capability: DetectionCapability,
    plan: Plan,
    labels: Vec<String>,
    config: TractDetectorConfig,
}

impl TractDetector {
    pub fn new(capability: DetectionCapability, config: TractDetectorConfig) -> Result<Self> {
        let plan = load_plan(&config.model_path, config.input_size, config.input_size)?;
        let labels = load_labels(&config.labels_path)?;
        let name = match capability {
            DetectionCapability::FastDetection => "tract-fast",
            DetectionCapability::PreciseDetection => "tract-precise",
            _ => "tract",
        };
        log::info!(
            "loaded {} detector {} ({} labels)",
            name,
            config.model_path.display(),
            labels.len()
        );
        Ok(Self {
            name: name.to_string(),
            capability,
            plan,
            labels,
            config,
        })
    }
}

impl DetectorBackend for TractDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        capability == self.capability
    }

    fn detect(&self, image: &LoadedImage) -> Result<Vec<Detection>> {
        let size = self.config.input_size;
        let resized = imageops::resize(image.rgb(), size, size, FilterType::Triangle);
        let input = to_tensor(&resized, [0.0; 3], [1.0; 3]);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX detector inference failed")?;
        let scale = Scale::new(image.width(), image.height(), size, size);

        match self.config.layout {
            OutputLayout::Yolo => {
                let output = outputs
                    .first()
                    .ok_or_else(|| anyhow!("model produced no outputs"))?;
                let view = output
                    .to_array_view::<f32>()
                    .context("detector output tensor was not f32")?;
                let flat: Vec<f32> = view.iter().copied().collect();
                let detections = postprocess::decode_yolo(
                    &flat,
                    view.shape(),
                    self.config.confidence,
                    scale,
                    &self.labels,
                )?;
                Ok(postprocess::nms(detections, self.config.iou_threshold))
            }
            OutputLayout::BoxesLabelsScores => {
                if outputs.len() < 3 {
                    return Err(anyhow!(
                        "expected boxes, labels and scores outputs, got {}",
                        outputs.len()
                    ));
                }
                let boxes: Vec<f32> = outputs[0]
                    .to_array_view::<f32>()
                    .context("boxes output was not f32")?
                    .iter()
                    .copied()
                    .collect();
                let classes: Vec<i64> = outputs[1]
                    .to_array_view::<i64>()
                    .context("labels output was not int64")?
                    .iter()
                    .copied()
                    .collect();
                let scores: Vec<f32> = outputs[2]
                    .to_array_view::<f32>()
                    .context("scores output was not f32")?
                    .iter()
                    .copied()
                    .collect();
                postprocess::decode_boxes_labels_scores(
                    &boxes,
                    &classes,
                    &scores,
                    self.config.confidence,
                    scale,
                    &self.labels,
                )
            }
        }
    }
}

/// ONNX image classifier (ImageNet-style preprocessing, softmax head).
pub struct TractClassifier {
    plan: Plan,
    labels: Vec<String>,
}

impl TractClassifier {
    pub fn new(config: TractClassifierConfig) -> Result<Self> {
        let plan = load_plan(&config.model_path, CLASSIFIER_CROP, CLASSIFIER_CROP)?;
        let labels = load_labels(&config.labels_path)?;
        log::info!(
            "loaded classifier {} ({} labels)",
            config.model_path.display(),
            labels.len()
        );
        Ok(Self { plan, labels })
    }

    fn preprocess(&self, image: &RgbImage) -> RgbImage {
        let (w, h) = image.dimensions();
        let shorter = w.min(h).max(1) as f32;
        let factor = CLASSIFIER_RESIZE as f32 / shorter;
        let rw = ((w as f32 * factor).round() as u32).max(CLASSIFIER_CROP);
        let rh = ((h as f32 * factor).round() as u32).max(CLASSIFIER_CROP);
        let resized = imageops::resize(image, rw, rh, FilterType::Triangle);
        let left = (rw - CLASSIFIER_CROP) / 2;
        let top = (rh - CLASSIFIER_CROP) / 2;
        imageops::crop_imm(&resized, left, top, CLASSIFIER_CROP, CLASSIFIER_CROP).to_image()
    }
}

impl ClassifierBackend for TractClassifier {
    fn name(&self) -> &str {
        "tract-classifier"
    }

    fn classify(&self, image: &LoadedImage) -> Result<Vec<LabelScore>> {
        let cropped = self.preprocess(image.rgb());
        let input = to_tensor(&cropped, IMAGENET_MEAN, IMAGENET_STD);
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .context("ONNX classifier inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let logits: Vec<f32> = output
            .to_array_view::<f32>()
            .context("classifier output tensor was not f32")?
            .iter()
            .copied()
            .collect();
        Ok(postprocess::softmax_scores(&logits, &self.labels))
    }
}
