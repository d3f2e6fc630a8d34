use std::sync::Arc;

use super::filter::DetectionFilter;
use super::policy::{AnimalKeywords, CascadeConfig};
use super::score::classifier_score;
use super::verdict::{AnalysisResult, Method};
use super::Stage;
use crate::detect::{ClassifierBackend, DetectorBackend};
use crate::error::AnalysisError;
use crate::ingest::LoadedImage;

/// Keyword scoring over a classifier backend's output.
#[derive(Clone)]
pub struct ClassifierScorer {
    classifier: Arc<dyn ClassifierBackend>,
    keywords: AnimalKeywords,
    top_k: usize,
}

impl ClassifierScorer {
    pub fn new(classifier: Arc<dyn ClassifierBackend>, config: &CascadeConfig) -> Self {
        Self {
            classifier,
            keywords: config.keywords.clone(),
            top_k: config.top_k,
        }
    }

    /// Run the classifier and score it. Failures are attributed to `stage`.
    pub fn score(&self, image: &LoadedImage, stage: Method) -> Result<f32, AnalysisError> {
        let predictions = self
            .classifier
            .classify(image)
            .map_err(|e| AnalysisError::inference(stage, self.classifier.name(), e))?;
        Ok(classifier_score(&predictions, &self.keywords, self.top_k))
    }
}

/// Stage 1: fast detector, animal categories, minimum box-area ratio.
pub struct FastDetectionStage {
    detector: Arc<dyn DetectorBackend>,
    filter: DetectionFilter,
}

impl FastDetectionStage {
    pub fn new(detector: Arc<dyn DetectorBackend>, config: &CascadeConfig) -> Self {
        Self {
            detector,
            filter: DetectionFilter::fast(config),
        }
    }
}

impl Stage for FastDetectionStage {
    fn method(&self) -> Method {
        Method::Yolo
    }

    fn attempt(&self, image: &LoadedImage) -> Result<Option<AnalysisResult>, AnalysisError> {
        let raw = self
            .detector
            .detect(image)
            .map_err(|e| AnalysisError::inference(Method::Yolo, self.detector.name(), e))?;
        let total = raw.len();
        let kept = self.filter.apply(raw, image.area());
        log::debug!(
            "{}: {} of {} detections kept",
            self.detector.name(),
            kept.len(),
            total
        );
        if kept.is_empty() {
            return Ok(None);
        }
        Ok(Some(AnalysisResult::from_fast(kept)))
    }
}

/// Stage 2: precise detector, animal keywords, confidence threshold.
///
/// On a hit the classifier is also run, but only to annotate the result; its
/// score never turns this verdict negative.
pub struct PreciseDetectionStage {
    detector: Arc<dyn DetectorBackend>,
    filter: DetectionFilter,
    annotator: ClassifierScorer,
}

impl PreciseDetectionStage {
    pub fn new(
        detector: Arc<dyn DetectorBackend>,
        classifier: Arc<dyn ClassifierBackend>,
        config: &CascadeConfig,
    ) -> Self {
        Self {
            detector,
            filter: DetectionFilter::precise(config),
            annotator: ClassifierScorer::new(classifier, config),
        }
    }
}

impl Stage for PreciseDetectionStage {
    fn method(&self) -> Method {
        Method::Detectron2
    }

    fn attempt(&self, image: &LoadedImage) -> Result<Option<AnalysisResult>, AnalysisError> {
        let raw = self
            .detector
            .detect(image)
            .map_err(|e| AnalysisError::inference(Method::Detectron2, self.detector.name(), e))?;
        let total = raw.len();
        let kept = self.filter.apply(raw, image.area());
        log::debug!(
            "{}: {} of {} detections kept",
            self.detector.name(),
            kept.len(),
            total
        );
        if kept.is_empty() {
            return Ok(None);
        }
        let score = self.annotator.score(image, Method::Detectron2)?;
        Ok(Some(AnalysisResult::from_precise(kept, score)))
    }
}

/// Stage 3: classifier keyword mass against a threshold.
pub struct ClassifierStage {
    scorer: ClassifierScorer,
    threshold: f32,
}

impl ClassifierStage {
    pub fn new(classifier: Arc<dyn ClassifierBackend>, config: &CascadeConfig) -> Self {
        Self {
            scorer: ClassifierScorer::new(classifier, config),
            threshold: config.classifier_threshold,
        }
    }
}

impl Stage for ClassifierStage {
    fn method(&self) -> Method {
        Method::Classifier
    }

    fn attempt(&self, image: &LoadedImage) -> Result<Option<AnalysisResult>, AnalysisError> {
        let score = self.scorer.score(image, Method::Classifier)?;
        log::debug!("classifier score {:.4} (threshold {:.2})", score, self.threshold);
        if score >= self.threshold {
            Ok(Some(AnalysisResult::from_classifier(score)))
        } else {
            Ok(None)
        }
    }
}
