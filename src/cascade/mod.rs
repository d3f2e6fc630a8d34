//! Animal presence cascade.
//!
//! Stages are consulted in order of increasing cost: the fast detector, the
//! precise detector, then the classifier. The first stage that reaches a
//! conclusive verdict ends the call; detections are never merged across
//! stages. A failing stage ends the call as well. There are no retries and no
//! skipping ahead to the next stage.
//!
//! Stage 2 runs the classifier only to annotate its verdict, while Stage 3
//! gates on the very same score. The asymmetry is kept as-is.

use std::path::Path;
use std::sync::Arc;

use crate::detect::{ClassifierBackend, DetectorBackend};
use crate::error::AnalysisError;
use crate::ingest::{FileImageLoader, ImageLoader, LoadedImage};

pub mod filter;
pub mod policy;
pub mod score;
pub mod stages;
mod verdict;

pub use filter::{ClassFilter, DetectionFilter};
pub use policy::{AnimalClassSet, AnimalKeywords, CascadeConfig, KeywordMatch};
pub use score::classifier_score;
pub use stages::{ClassifierScorer, ClassifierStage, FastDetectionStage, PreciseDetectionStage};
pub use verdict::{AnalysisResult, Method};

/// One step of the cascade.
///
/// `Ok(None)` means "nothing conclusive here, ask the next stage".
pub trait Stage: Send + Sync {
    fn method(&self) -> Method;

    fn attempt(&self, image: &LoadedImage) -> Result<Option<AnalysisResult>, AnalysisError>;
}

pub struct AnimalCascade {
    loader: Box<dyn ImageLoader>,
    stages: Vec<Box<dyn Stage>>,
}

impl AnimalCascade {
    /// Standard three-stage cascade over the given providers.
    pub fn new(
        fast: Arc<dyn DetectorBackend>,
        precise: Arc<dyn DetectorBackend>,
        classifier: Arc<dyn ClassifierBackend>,
        config: &CascadeConfig,
    ) -> Self {
        Self::from_stages(vec![
            Box::new(FastDetectionStage::new(fast, config)),
            Box::new(PreciseDetectionStage::new(
                precise,
                classifier.clone(),
                config,
            )),
            Box::new(ClassifierStage::new(classifier, config)),
        ])
    }

    /// Cascade over an arbitrary ordered stage list, loading images from disk.
    pub fn from_stages(stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            loader: Box::new(FileImageLoader::new()),
            stages,
        }
    }

    pub fn with_loader<L: ImageLoader + 'static>(mut self, loader: L) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Methods of the configured stages, in consultation order.
    pub fn methods(&self) -> Vec<Method> {
        self.stages.iter().map(|stage| stage.method()).collect()
    }

    /// Load `path` and run the cascade on it.
    pub fn analyze(&self, path: impl AsRef<Path>) -> Result<AnalysisResult, AnalysisError> {
        let image = self.loader.load(path.as_ref())?;
        self.analyze_image(&image)
    }

    pub fn analyze_image(&self, image: &LoadedImage) -> Result<AnalysisResult, AnalysisError> {
        for stage in &self.stages {
            log::debug!("running {} stage on {}", stage.method(), image.path().display());
            if let Some(result) = stage.attempt(image)? {
                log::info!(
                    "{}: animal present via {} (count={})",
                    image.path().display(),
                    stage.method(),
                    result.count()
                );
                return Ok(result);
            }
        }
        log::info!("{}: no animal detected", image.path().display());
        Ok(AnalysisResult::no_animal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, LabelScore, StubClassifier, StubDetector};
    use image::RgbImage;

    fn image() -> LoadedImage {
        LoadedImage::new("memory.png", RgbImage::new(100, 100))
    }

    fn cascade(fast: Vec<Detection>, precise: Vec<Detection>, probs: Vec<LabelScore>) -> AnimalCascade {
        AnimalCascade::new(
            Arc::new(StubDetector::fast(fast)),
            Arc::new(StubDetector::precise(precise)),
            Arc::new(StubClassifier::new(probs)),
            &CascadeConfig::default(),
        )
    }

    #[test]
    fn stages_run_in_cost_order() {
        let c = cascade(vec![], vec![], vec![]);
        assert_eq!(
            c.methods(),
            vec![Method::Yolo, Method::Detectron2, Method::Classifier]
        );
    }

    #[test]
    fn fast_hit_wins_over_later_stages() {
        let dog = Detection::new("dog", 0.8, BoundingBox::new(0.0, 0.0, 50.0, 50.0)).with_class_id(16);
        let horse = Detection::new("horse", 0.9, BoundingBox::new(0.0, 0.0, 50.0, 50.0));
        let c = cascade(vec![dog.clone()], vec![horse], vec![LabelScore::new("sorrel", 0.9)]);

        let result = c.analyze_image(&image()).unwrap();
        assert_eq!(result.method(), Some(Method::Yolo));
        assert_eq!(result.details(), [dog]);
    }

    #[test]
    fn empty_everywhere_is_negative() {
        let c = cascade(vec![], vec![], vec![LabelScore::new("lampshade", 0.99)]);
        assert_eq!(c.analyze_image(&image()).unwrap(), AnalysisResult::no_animal());
    }

    #[test]
    fn empty_stage_list_is_negative() {
        let c = AnimalCascade::from_stages(Vec::new());
        assert_eq!(c.analyze_image(&image()).unwrap(), AnalysisResult::no_animal());
    }
}
