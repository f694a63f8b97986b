use super::pre::LetterboxTransform;
use crate::error::InferenceError;
use growth::{BoundingBox, RawDetection};

/// Columns before the per-class scores in a YOLOv5 prediction row.
const BOX_COLUMNS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    fn iou(&self, other: &Candidate) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }
}

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    pub class_names: Vec<String>,
}

impl PostProcessor {
    pub fn new(
        confidence_threshold: f32,
        iou_threshold: f32,
        max_detections: usize,
        class_names: Vec<String>,
    ) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
            class_names,
        }
    }

    /// Decode YOLOv5 predictions into detections on the original image.
    ///
    /// Rows are `cx, cy, w, h, objectness, class scores...` in input-pixel
    /// space. Confidence is `objectness * best class score`; rows below the
    /// threshold are dropped, then class-aware NMS keeps at most
    /// `max_detections`, highest confidence first.
    #[tracing::instrument(skip_all, fields(rows))]
    pub fn parse_detections(
        &self,
        predictions: &ndarray::ArrayViewD<f32>, // [1, N, 5 + num_classes]
        transform: &LetterboxTransform,
    ) -> Result<Vec<RawDetection>, InferenceError> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[2] <= BOX_COLUMNS {
            return Err(InferenceError::InvalidOutput(format!(
                "expected [1, N, >{}] predictions, got {:?}",
                BOX_COLUMNS, shape
            )));
        }

        let num_rows = shape[1];
        let num_classes = shape[2] - BOX_COLUMNS;
        tracing::Span::current().record("rows", num_rows);

        let mut candidates = Vec::new();

        for i in 0..num_rows {
            let objectness = predictions[[0, i, 4]];
            if objectness < self.confidence_threshold {
                continue;
            }

            let mut best_score = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in 0..num_classes {
                let score = predictions[[0, i, BOX_COLUMNS + c]];
                if score > best_score {
                    best_score = score;
                    class_id = c;
                }
            }

            let confidence = objectness * best_score;
            if confidence < self.confidence_threshold {
                continue;
            }

            let cx = predictions[[0, i, 0]];
            let cy = predictions[[0, i, 1]];
            let w = predictions[[0, i, 2]];
            let h = predictions[[0, i, 3]];

            let (x1, y1) = transform.to_original(cx - w / 2.0, cy - h / 2.0);
            let (x2, y2) = transform.to_original(cx + w / 2.0, cy + h / 2.0);

            candidates.push(Candidate {
                class_id,
                confidence,
                x1,
                y1,
                x2,
                y2,
            });
        }

        let kept = nms(candidates, self.iou_threshold, self.max_detections);

        tracing::debug!(kept = kept.len(), "Decoded detections");

        Ok(kept
            .into_iter()
            .map(|c| RawDetection {
                label: self.class_name(c.class_id),
                confidence: c.confidence,
                bbox: BoundingBox::new(c.x1 as i32, c.y1 as i32, c.x2 as i32, c.y2 as i32),
            })
            .collect())
    }

    fn class_name(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_id))
    }
}

/// Greedy per-class NMS: sort by confidence descending, suppress overlapping
/// boxes of the same class.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32, limit: usize) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if kept.len() >= limit {
            break;
        }
        if suppressed[i] {
            continue;
        }
        kept.push(candidates[i]);
        for j in (i + 1)..candidates.len() {
            if candidates[j].class_id == candidates[i].class_id
                && candidates[i].iou(&candidates[j]) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    kept
}
