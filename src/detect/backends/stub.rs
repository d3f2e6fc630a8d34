use anyhow::Result;

use crate::detect::backend::{ClassifierBackend, DetectionCapability, DetectorBackend};
use crate::detect::result::{Detection, LabelScore};
use crate::ingest::LoadedImage;

/// Stub detector for testing and dry runs. Returns the same canned boxes for every image.
pub struct StubDetector {
    name: String,
    capability: DetectionCapability,
    detections: Vec<Detection>,
}

impl StubDetector {
    pub fn new(capability: DetectionCapability, detections: Vec<Detection>) -> Self {
        let name = match capability {
            DetectionCapability::FastDetection => "stub-fast",
            DetectionCapability::PreciseDetection => "stub-precise",
            _ => "stub",
        };
        Self {
            name: name.to_string(),
            capability,
            detections,
        }
    }

    pub fn fast(detections: Vec<Detection>) -> Self {
        Self::new(DetectionCapability::FastDetection, detections)
    }

    pub fn precise(detections: Vec<Detection>) -> Self {
        Self::new(DetectionCapability::PreciseDetection, detections)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl DetectorBackend for StubDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        capability == self.capability
    }

    fn detect(&self, _image: &LoadedImage) -> Result<Vec<Detection>> {
        Ok(self.detections.clone())
    }
}

/// Stub classifier returning a fixed distribution.
pub struct StubClassifier {
    name: String,
    predictions: Vec<LabelScore>,
}

impl StubClassifier {
    pub fn new(predictions: Vec<LabelScore>) -> Self {
        Self {
            name: "stub-classifier".to_string(),
            predictions,
        }
    }
}

impl ClassifierBackend for StubClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, _image: &LoadedImage) -> Result<Vec<LabelScore>> {
        Ok(self.predictions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;
    use image::RgbImage;

    #[test]
    fn stub_detector_replays_canned_boxes() {
        let image = LoadedImage::new("stub.png", RgbImage::new(4, 4));
        let det = Detection::new("dog", 0.9, BoundingBox::new(0.0, 0.0, 2.0, 2.0));
        let backend = StubDetector::fast(vec![det.clone()]);

        assert_eq!(backend.name(), "stub-fast");
        assert!(backend.supports(DetectionCapability::FastDetection));
        assert!(!backend.supports(DetectionCapability::PreciseDetection));
        assert_eq!(backend.detect(&image).unwrap(), vec![det.clone()]);
        assert_eq!(backend.detect(&image).unwrap(), vec![det]);
    }

    #[test]
    fn stub_classifier_replays_distribution() {
        let image = LoadedImage::new("stub.png", RgbImage::new(1, 1));
        let classifier = StubClassifier::new(vec![LabelScore::new("tabby cat", 0.7)]);
        let out = classifier.classify(&image).unwrap();
        assert_eq!(out, vec![LabelScore::new("tabby cat", 0.7)]);
    }
}
