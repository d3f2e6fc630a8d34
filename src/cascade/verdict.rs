use std::fmt;

use serde::{Serialize, Serializer};

use crate::detect::Detection;

/// Stage that produced a verdict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Method {
    /// Fast box detector (YOLO family).
    #[serde(rename = "yolo")]
    Yolo,
    /// Precise instance-segmentation detector.
    #[serde(rename = "detectron2")]
    Detectron2,
    /// Keyword-scored image classifier.
    #[serde(rename = "classifier")]
    Classifier,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Yolo => "yolo",
            Method::Detectron2 => "detectron2",
            Method::Classifier => "classifier",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one analysis call.
///
/// Only the constructors below can build a result, so every value has the
/// shape its method implies: detector verdicts carry their boxes, the
/// classifier verdict carries its score and a count of one, and the negative
/// verdict carries nothing.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisResult {
    animal_present: bool,
    method: Option<Method>,
    count: usize,
    details: Vec<Detection>,
    classifier_score: Option<f32>,
    score: Option<f32>,
}

impl AnalysisResult {
    /// Stage 1 verdict. `details` must be non-empty.
    pub fn from_fast(details: Vec<Detection>) -> Self {
        debug_assert!(!details.is_empty());
        Self {
            animal_present: true,
            method: Some(Method::Yolo),
            count: details.len(),
            details,
            classifier_score: None,
            score: None,
        }
    }

    /// Stage 2 verdict with the classifier score attached as an annotation.
    pub fn from_precise(details: Vec<Detection>, classifier_score: f32) -> Self {
        debug_assert!(!details.is_empty());
        Self {
            animal_present: true,
            method: Some(Method::Detectron2),
            count: details.len(),
            details,
            classifier_score: Some(classifier_score),
            score: None,
        }
    }

    pub fn from_classifier(score: f32) -> Self {
        Self {
            animal_present: true,
            method: Some(Method::Classifier),
            count: 1,
            details: Vec::new(),
            classifier_score: None,
            score: Some(score),
        }
    }

    pub fn no_animal() -> Self {
        Self {
            animal_present: false,
            method: None,
            count: 0,
            details: Vec::new(),
            classifier_score: None,
            score: None,
        }
    }

    pub fn animal_present(&self) -> bool {
        self.animal_present
    }

    pub fn method(&self) -> Option<Method> {
        self.method
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn details(&self) -> &[Detection] {
        &self.details
    }

    /// Classifier annotation attached to a `detectron2` verdict.
    pub fn classifier_score(&self) -> Option<f32> {
        self.classifier_score
    }

    /// Keyword score that produced a `classifier` verdict.
    pub fn score(&self) -> Option<f32> {
        self.score
    }
}

#[derive(Serialize)]
struct WireResult<'a> {
    animal_present: bool,
    method: Option<Method>,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a [Detection]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classifier_score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let detector_verdict = matches!(self.method, Some(Method::Yolo | Method::Detectron2));
        let wire = WireResult {
            animal_present: self.animal_present,
            method: self.method,
            count: self.count,
            details: detector_verdict.then_some(self.details.as_slice()),
            classifier_score: self.classifier_score,
            score: self.score,
        };
        wire.serialize(serializer)
    }
}
