//! Decoding of raw detector/classifier tensors into cascade types.
//!
//! Tensors arrive here as flat `f32`/`i64` slices already pulled out of the
//! inference runtime, which keeps this module free of runtime types.

use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use crate::detect::result::{BoundingBox, Detection, LabelScore};

/// Maps model input coordinates back onto the source image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scale {
    pub x: f32,
    pub y: f32,
}

impl Scale {
    pub fn new(image_width: u32, image_height: u32, input_width: u32, input_height: u32) -> Self {
        Self {
            x: image_width as f32 / input_width.max(1) as f32,
            y: image_height as f32 / input_height.max(1) as f32,
        }
    }

    fn apply(&self, bbox: BoundingBox) -> BoundingBox {
        BoundingBox::new(
            bbox.x1 * self.x,
            bbox.y1 * self.y,
            bbox.x2 * self.x,
            bbox.y2 * self.y,
        )
    }
}

fn label_for(labels: &[String], class_id: usize) -> String {
    labels
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{class_id}"))
}

/// Decode a dense YOLO head of shape `[1, 4 + classes, boxes]`.
///
/// Each column holds `cx, cy, w, h` followed by per-class scores. The best
/// class per column is kept when it reaches `confidence`.
pub fn decode_yolo(
    output: &[f32],
    shape: &[usize],
    confidence: f32,
    scale: Scale,
    labels: &[String],
) -> Result<Vec<Detection>> {
    let (attrs, boxes) = match shape {
        [1, attrs, boxes] | [attrs, boxes] => (*attrs, *boxes),
        _ => return Err(anyhow!("expected YOLO output [1, 4+nc, N], got {:?}", shape)),
    };
    if attrs <= 4 {
        return Err(anyhow!("YOLO output has no class scores ({} rows)", attrs));
    }
    if output.len() != attrs * boxes {
        return Err(anyhow!(
            "YOLO output length {} does not match shape {:?}",
            output.len(),
            shape
        ));
    }

    let at = |row: usize, col: usize| output[row * boxes + col];
    let mut detections = Vec::new();
    for i in 0..boxes {
        let mut best_class = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for class in 0..attrs - 4 {
            let score = at(4 + class, i);
            if score > best_score {
                best_score = score;
                best_class = class;
            }
        }
        if best_score.is_nan() || best_score < confidence {
            continue;
        }
        let bbox = BoundingBox::from_center(at(0, i), at(1, i), at(2, i), at(3, i));
        detections.push(
            Detection::new(label_for(labels, best_class), best_score, scale.apply(bbox))
                .with_class_id(best_class as u32),
        );
    }
    Ok(detections)
}

/// Decode the three-output `boxes [N,4] (xyxy), labels [N], scores [N]` layout
/// used by exported two-stage detectors.
pub fn decode_boxes_labels_scores(
    boxes: &[f32],
    classes: &[i64],
    scores: &[f32],
    confidence: f32,
    scale: Scale,
    labels: &[String],
) -> Result<Vec<Detection>> {
    if boxes.len() != classes.len() * 4 || classes.len() != scores.len() {
        return Err(anyhow!(
            "mismatched detector outputs: {} box values, {} labels, {} scores",
            boxes.len(),
            classes.len(),
            scores.len()
        ));
    }
    let mut detections = Vec::new();
    for (i, (&class, &score)) in classes.iter().zip(scores).enumerate() {
        if score.is_nan() || score < confidence {
            continue;
        }
        let class_id = usize::try_from(class)
            .map_err(|_| anyhow!("negative class index {} in detector output", class))?;
        let b = &boxes[i * 4..i * 4 + 4];
        let bbox = BoundingBox::new(b[0], b[1], b[2], b[3]);
        detections.push(
            Detection::new(label_for(labels, class_id), score, scale.apply(bbox))
                .with_class_id(class_id as u32),
        );
    }
    Ok(detections)
}

/// Per-class non-maximum suppression. Output is ordered by descending confidence.
pub fn nms(detections: Vec<Detection>, iou_threshold: f64) -> Vec<Detection> {
    let mut groups: BTreeMap<Option<u32>, Vec<Detection>> = BTreeMap::new();
    for det in detections {
        groups.entry(det.class_id).or_default().push(det);
    }

    let mut kept = Vec::new();
    for (_, mut group) in groups {
        group.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let mut suppressed = vec![false; group.len()];
        for i in 0..group.len() {
            if suppressed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !suppressed[j] && group[i].bbox.iou(&group[j].bbox) > iou_threshold {
                    suppressed[j] = true;
                }
            }
            kept.push(group[i].clone());
        }
    }
    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept
}

/// Numerically stable softmax over raw logits, paired with labels.
pub fn softmax_scores(logits: &[f32], labels: &[String]) -> Vec<LabelScore> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return Vec::new();
    }
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter()
        .enumerate()
        .map(|(i, e)| LabelScore::new(label_for(labels, i), e / sum))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["person".into(), "dog".into()]
    }

    #[test]
    fn decodes_yolo_columns_and_rescales() -> Result<()> {
        // two boxes, two classes: rows = cx, cy, w, h, person, dog
        let output = vec![
            50.0, 10.0, // cx
            50.0, 10.0, // cy
            20.0, 4.0, // w
            10.0, 4.0, // h
            0.1, 0.9, // person
            0.8, 0.05, // dog
        ];
        let scale = Scale::new(200, 100, 100, 100);
        let dets = decode_yolo(&output, &[1, 6, 2], 0.25, scale, &labels())?;

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].label, "dog");
        assert_eq!(dets[0].class_id, Some(1));
        assert_eq!(dets[0].bbox, BoundingBox::new(80.0, 45.0, 120.0, 55.0));
        assert_eq!(dets[1].label, "person");
        Ok(())
    }

    #[test]
    fn yolo_shape_mismatch_is_an_error() {
        let err = decode_yolo(&[0.0; 5], &[1, 6, 2], 0.25, Scale::new(1, 1, 1, 1), &labels());
        assert!(err.is_err());
    }

    #[test]
    fn nms_keeps_best_overlapping_box_per_class() {
        let a = Detection::new("dog", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0)).with_class_id(1);
        let b = Detection::new("dog", 0.6, BoundingBox::new(1.0, 1.0, 10.0, 10.0)).with_class_id(1);
        let c = Detection::new("cat", 0.7, BoundingBox::new(1.0, 1.0, 10.0, 10.0)).with_class_id(2);
        let kept = nms(vec![b, a.clone(), c.clone()], 0.45);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn boxes_labels_scores_filters_by_confidence() -> Result<()> {
        let boxes = [0.0, 0.0, 5.0, 5.0, 1.0, 1.0, 2.0, 2.0];
        let dets = decode_boxes_labels_scores(
            &boxes,
            &[1, 0],
            &[0.7, 0.2],
            0.5,
            Scale::new(10, 10, 10, 10),
            &labels(),
        )?;
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].label, "dog");
        Ok(())
    }

    #[test]
    fn nan_scores_never_pass_the_confidence_floor() -> Result<()> {
        let boxes = [0.0, 0.0, 5.0, 5.0];
        let dets = decode_boxes_labels_scores(
            &boxes,
            &[1],
            &[f32::NAN],
            0.5,
            Scale::new(10, 10, 10, 10),
            &labels(),
        )?;
        assert!(dets.is_empty());

        let output = vec![50.0, 50.0, 20.0, 10.0, f32::NAN, f32::NAN];
        let dets = decode_yolo(&output, &[1, 6, 1], 0.0, Scale::new(100, 100, 100, 100), &labels())?;
        assert!(dets.is_empty());
        Ok(())
    }

    #[test]
    fn softmax_sums_to_one() {
        let scores = softmax_scores(&[1.0, 2.0, 3.0], &labels());
        let total: f32 = scores.iter().map(|s| s.probability).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(scores[2].label, "class_2");
    }
}
