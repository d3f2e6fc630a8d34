use std::collections::BTreeSet;

use serde::Deserialize;

use crate::detect::Detection;

pub const DEFAULT_MIN_BOX_AREA_RATIO: f64 = 0.005;
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.5;
pub const DEFAULT_CLASSIFIER_THRESHOLD: f32 = 0.20;
pub const DEFAULT_TOP_K: usize = 10;

/// COCO category ids and names of the animal classes a YOLO-family detector knows.
pub const COCO_ANIMAL_CLASSES: [(u32, &str); 10] = [
    (14, "bird"),
    (15, "cat"),
    (16, "dog"),
    (17, "horse"),
    (18, "sheep"),
    (19, "cow"),
    (20, "elephant"),
    (21, "bear"),
    (22, "zebra"),
    (23, "giraffe"),
];

pub const DEFAULT_ANIMAL_KEYWORDS: [&str; 17] = [
    "dog", "cat", "horse", "cow", "sheep", "bear", "zebra", "giraffe", "deer", "fox", "wolf",
    "boar", "elk", "moose", "lion", "tiger", "bird",
];

/// Closed set of detector categories that denote animals.
///
/// Detections carrying a category id are matched by id only; detections
/// without one fall back to their lower-cased label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimalClassSet {
    ids: BTreeSet<u32>,
    labels: BTreeSet<String>,
}

impl AnimalClassSet {
    pub fn new<I, L, S>(ids: I, labels: L) -> Self
    where
        I: IntoIterator<Item = u32>,
        L: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            ids: ids.into_iter().collect(),
            labels: labels
                .into_iter()
                .map(|label| label.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    pub fn coco() -> Self {
        Self::new(
            COCO_ANIMAL_CLASSES.iter().map(|(id, _)| *id),
            COCO_ANIMAL_CLASSES.iter().map(|(_, name)| *name),
        )
    }

    pub fn contains(&self, detection: &Detection) -> bool {
        match detection.class_id {
            Some(id) => self.ids.contains(&id),
            None => self.labels.contains(&detection.label.to_lowercase()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.labels.is_empty()
    }
}

impl Default for AnimalClassSet {
    fn default() -> Self {
        Self::coco()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// Whole label equals a keyword.
    #[default]
    Exact,
    /// Label contains a keyword anywhere.
    Substring,
}

/// Lower-case keywords deciding whether a free-text label names an animal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimalKeywords(Vec<String>);

impl AnimalKeywords {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !out.contains(&keyword) {
                out.push(keyword);
            }
        }
        Self(out)
    }

    pub fn matches(&self, label: &str, mode: KeywordMatch) -> bool {
        let label = label.to_lowercase();
        match mode {
            KeywordMatch::Exact => self.0.iter().any(|k| *k == label),
            KeywordMatch::Substring => self.0.iter().any(|k| label.contains(k.as_str())),
        }
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for AnimalKeywords {
    fn default() -> Self {
        Self::new(DEFAULT_ANIMAL_KEYWORDS)
    }
}

/// Thresholds and vocabularies injected into the cascade.
#[derive(Clone, Debug, PartialEq)]
pub struct CascadeConfig {
    /// Minimum box area / image area for fast detections (inclusive).
    pub min_box_area_ratio: f64,
    /// Confidence floor for fast detections. The fast backend applies its own
    /// floor while decoding, so this defaults to accepting everything.
    pub fast_min_confidence: f32,
    pub fast_classes: AnimalClassSet,
    /// Confidence floor for precise detections (inclusive).
    pub detection_threshold: f32,
    pub precise_keyword_match: KeywordMatch,
    /// Minimum classifier score for the fallback stage (inclusive).
    pub classifier_threshold: f32,
    pub top_k: usize,
    pub keywords: AnimalKeywords,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_box_area_ratio: DEFAULT_MIN_BOX_AREA_RATIO,
            fast_min_confidence: 0.0,
            fast_classes: AnimalClassSet::coco(),
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            precise_keyword_match: KeywordMatch::Exact,
            classifier_threshold: DEFAULT_CLASSIFIER_THRESHOLD,
            top_k: DEFAULT_TOP_K,
            keywords: AnimalKeywords::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn det(label: &str, class_id: Option<u32>) -> Detection {
        Detection {
            label: label.to_string(),
            class_id,
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        }
    }

    #[test]
    fn coco_class_set_matches_by_id_before_label() {
        let set = AnimalClassSet::coco();
        assert!(set.contains(&det("dog", Some(16))));
        assert!(set.contains(&det("whatever", Some(23))));
        assert!(!set.contains(&det("dog", Some(0))));
        assert!(!set.contains(&det("person", Some(0))));
        assert!(set.contains(&det("Giraffe", None)));
        assert!(!set.contains(&det("teddy bear", None)));
    }

    #[test]
    fn keywords_exact_versus_substring() {
        let keywords = AnimalKeywords::default();
        assert!(keywords.matches("Dog", KeywordMatch::Exact));
        assert!(!keywords.matches("hot dog", KeywordMatch::Exact));
        assert!(keywords.matches("hot dog", KeywordMatch::Substring));
        assert!(keywords.matches("Tiger cat", KeywordMatch::Substring));
        assert!(!keywords.matches("person", KeywordMatch::Substring));
    }

    #[test]
    fn keywords_are_normalised_and_deduplicated() {
        let keywords = AnimalKeywords::new([" Dog", "dog", "", "CAT"]);
        assert_eq!(keywords.as_slice(), ["dog".to_string(), "cat".to_string()]);
    }

    #[test]
    fn defaults_follow_documented_thresholds() {
        let cfg = CascadeConfig::default();
        assert_eq!(cfg.min_box_area_ratio, 0.005);
        assert_eq!(cfg.detection_threshold, 0.5);
        assert_eq!(cfg.classifier_threshold, 0.20);
        assert_eq!(cfg.top_k, 10);
        assert_eq!(cfg.keywords.as_slice().len(), 17);
    }
}
