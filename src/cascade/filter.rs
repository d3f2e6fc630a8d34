//! Detection filtering shared by both detector stages.
//!
//! The same policy shape (class filter, confidence floor, optional area
//! ratio) is applied whichever detector produced the boxes; only the
//! parameters differ per stage.

use super::policy::{AnimalClassSet, AnimalKeywords, CascadeConfig, KeywordMatch};
use crate::detect::Detection;

#[derive(Clone, Debug, PartialEq)]
pub enum ClassFilter {
    Any,
    /// Detector category set (Stage 1).
    Categories(AnimalClassSet),
    /// Free-text label matched against keywords (Stage 2).
    Keywords {
        keywords: AnimalKeywords,
        mode: KeywordMatch,
    },
}

impl ClassFilter {
    pub fn accepts(&self, detection: &Detection) -> bool {
        match self {
            Self::Any => true,
            Self::Categories(set) => set.contains(detection),
            Self::Keywords { keywords, mode } => keywords.matches(&detection.label, *mode),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DetectionFilter {
    pub classes: ClassFilter,
    /// Inclusive confidence floor.
    pub min_confidence: f32,
    /// Inclusive minimum of box area over image area, when set.
    pub min_area_ratio: Option<f64>,
}

impl DetectionFilter {
    /// Stage 1 policy: animal category set plus box-area ratio.
    pub fn fast(config: &CascadeConfig) -> Self {
        Self {
            classes: ClassFilter::Categories(config.fast_classes.clone()),
            min_confidence: config.fast_min_confidence,
            min_area_ratio: Some(config.min_box_area_ratio),
        }
    }

    /// Stage 2 policy: animal keywords plus detection confidence.
    pub fn precise(config: &CascadeConfig) -> Self {
        Self {
            classes: ClassFilter::Keywords {
                keywords: config.keywords.clone(),
                mode: config.precise_keyword_match,
            },
            min_confidence: config.detection_threshold,
            min_area_ratio: None,
        }
    }

    pub fn accepts(&self, detection: &Detection, image_area: f64) -> bool {
        if !self.classes.accepts(detection) {
            return false;
        }
        if detection.confidence.is_nan() || detection.confidence < self.min_confidence {
            return false;
        }
        match self.min_area_ratio {
            Some(min_ratio) => detection.bbox.area() / image_area >= min_ratio,
            None => true,
        }
    }

    /// Subset of `detections` passing every active filter, in input order.
    ///
    /// `image_area` must be positive; see `LoadedImage::area`.
    pub fn apply(&self, detections: Vec<Detection>, image_area: f64) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|detection| self.accepts(detection, image_area))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    const AREA: f64 = 100.0 * 100.0;

    fn boxed(label: &str, class_id: u32, w: f32, h: f32) -> Detection {
        Detection::new(label, 0.9, BoundingBox::new(0.0, 0.0, w, h)).with_class_id(class_id)
    }

    #[test]
    fn area_ratio_boundary_is_inclusive() {
        let filter = DetectionFilter::fast(&CascadeConfig::default());
        // 50 px of 10_000 is exactly 0.005
        assert!(filter.accepts(&boxed("dog", 16, 5.0, 10.0), AREA));
        // 49 px is 0.0049
        assert!(!filter.accepts(&boxed("dog", 16, 7.0, 7.0), AREA));
    }

    #[test]
    fn fast_filter_rejects_non_animal_categories() {
        let filter = DetectionFilter::fast(&CascadeConfig::default());
        assert!(!filter.accepts(&boxed("person", 0, 50.0, 50.0), AREA));
        assert!(!filter.accepts(&boxed("teddy bear", 77, 50.0, 50.0), AREA));
        assert!(filter.accepts(&boxed("bird", 14, 50.0, 50.0), AREA));
    }

    #[test]
    fn precise_filter_applies_keywords_and_confidence() {
        let filter = DetectionFilter::precise(&CascadeConfig::default());
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(filter.accepts(&Detection::new("Horse", 0.5, bbox), AREA));
        assert!(!filter.accepts(&Detection::new("horse", 0.49, bbox), AREA));
        assert!(!filter.accepts(&Detection::new("car", 0.99, bbox), AREA));
        assert!(!filter.accepts(&Detection::new("dog", f32::NAN, bbox), AREA));
        // tiny boxes are fine here: no area filter in stage 2
        assert!(filter.accepts(&Detection::new("cat", 0.8, BoundingBox::new(0.0, 0.0, 0.1, 0.1)), AREA));
    }

    #[test]
    fn apply_preserves_order() {
        let filter = DetectionFilter {
            classes: ClassFilter::Any,
            min_confidence: 0.3,
            min_area_ratio: None,
        };
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let input = vec![
            Detection::new("c", 0.9, bbox),
            Detection::new("x", 0.1, bbox),
            Detection::new("a", 0.4, bbox),
            Detection::new("b", 0.3, bbox),
        ];
        let labels: Vec<String> = filter
            .apply(input, AREA)
            .into_iter()
            .map(|d| d.label)
            .collect();
        assert_eq!(labels, ["c", "a", "b"]);
    }
}
