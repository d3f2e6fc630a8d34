use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates of the analysed image.
///
/// Coordinates are reordered on construction so that `x2 >= x1` and `y2 >= y1`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    /// Box from centre coordinates and size (YOLO output layout).
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f64 {
        self.width() as f64 * self.height() as f64
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let intersection = BoundingBox::new(ix1, iy1, ix2.max(ix1), iy2.max(iy1)).area();
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            0.0
        } else {
            intersection / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(value: [f32; 4]) -> Self {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(value: BoundingBox) -> Self {
        [value.x1, value.y1, value.x2, value.y2]
    }
}

/// One box produced by a detector backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Label in the detector's own vocabulary.
    #[serde(rename = "class")]
    pub label: String,
    /// Category index in the detector's vocabulary, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            class_id: None,
            confidence,
            bbox,
        }
    }

    pub fn with_class_id(mut self, class_id: u32) -> Self {
        self.class_id = Some(class_id);
        self
    }
}

/// One entry of a classifier's output distribution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub probability: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_orders_corners() {
        let bbox = BoundingBox::new(40.0, 30.0, 10.0, 5.0);
        assert_eq!(bbox, BoundingBox::new(10.0, 5.0, 40.0, 30.0));
        assert_eq!(bbox.area(), 750.0);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn detection_serializes_with_class_key_and_bbox_array() {
        let det = Detection::new("dog", 0.5, BoundingBox::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"class": "dog", "confidence": 0.5, "bbox": [1.0, 2.0, 3.0, 4.0]})
        );

        let parsed: Detection =
            serde_json::from_str(r#"{"class":"cat","class_id":15,"confidence":0.75,"bbox":[9,9,1,1]}"#)
                .unwrap();
        assert_eq!(parsed.class_id, Some(15));
        assert_eq!(parsed.bbox, BoundingBox::new(1.0, 1.0, 9.0, 9.0));
    }
}
