use crate::{config::DetectorConfig, labels::ClassLabelTable};
use std::cmp::Ordering;

/// Axis-aligned box in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Intersection over union with another box
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// One candidate produced by the network, before suppression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A detection that survived suppression, with its label and the share of
/// the image it covers (percent).
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub class_id: u32,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub area_ratio: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub score_threshold: f32,
    pub nms_threshold: f32,
}

impl PostProcessor {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            score_threshold: config.score_threshold,
            nms_threshold: config.nms_threshold,
        }
    }

    /// Convert SSD outputs into candidates in source-image pixel coordinates.
    ///
    /// Boxes arrive normalized as `(ymin, xmin, ymax, xmax)`; they are scaled
    /// to the image, clamped to its bounds, and dropped when degenerate.
    #[tracing::instrument(skip(self, boxes, classes, scores))]
    pub fn parse_detections(
        &self,
        boxes: &ndarray::ArrayViewD<f32>,   // [1, N, 4]
        classes: &ndarray::ArrayViewD<f32>, // [1, N]
        scores: &ndarray::ArrayViewD<f32>,  // [1, N]
        image_width: u32,
        image_height: u32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        if boxes.ndim() != 3 || boxes.shape()[0] != 1 || boxes.shape()[2] != 4 {
            anyhow::bail!("Unexpected boxes shape {:?}, expected [1, N, 4]", boxes.shape());
        }
        let num_boxes = boxes.shape()[1];
        for (name, array) in [("classes", classes), ("scores", scores)] {
            if array.shape() != [1, num_boxes] {
                anyhow::bail!(
                    "Unexpected {} shape {:?}, expected [1, {}]",
                    name,
                    array.shape(),
                    num_boxes
                );
            }
        }

        let width = image_width as f32;
        let height = image_height as f32;
        let mut detections = Vec::new();

        for i in 0..num_boxes {
            let confidence = scores[[0, i]];

            // NaN scores fail this comparison and are dropped as well
            if !(confidence >= self.confidence_threshold) {
                continue;
            }

            let y1 = (boxes[[0, i, 0]] * height).clamp(0.0, height);
            let x1 = (boxes[[0, i, 1]] * width).clamp(0.0, width);
            let y2 = (boxes[[0, i, 2]] * height).clamp(0.0, height);
            let x2 = (boxes[[0, i, 3]] * width).clamp(0.0, width);

            let bbox = BoundingBox::new(x1, y1, x2 - x1, y2 - y1);
            if !(bbox.width > 0.0 && bbox.height > 0.0) {
                continue;
            }

            let class = classes[[0, i]];
            if !(class >= 0.0) {
                continue;
            }

            detections.push(RawDetection {
                class_id: class.round() as u32,
                confidence,
                bbox,
            });
        }

        tracing::trace!(
            raw = num_boxes,
            candidates = detections.len(),
            "Parsed detections"
        );

        Ok(detections)
    }

    /// Greedy class-agnostic non-maximum suppression.
    ///
    /// Returns indices into `candidates`, highest confidence first. Equal
    /// confidences keep their original order.
    pub fn suppress(&self, candidates: &[RawDetection]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].confidence >= self.score_threshold)
            .collect();

        // Stable sort, so ties stay in candidate index order
        order.sort_by(|&a, &b| {
            candidates[b]
                .confidence
                .partial_cmp(&candidates[a].confidence)
                .unwrap_or(Ordering::Equal)
        });

        let mut keep = Vec::new();
        let mut suppressed = vec![false; order.len()];

        for (pos, &idx) in order.iter().enumerate() {
            if suppressed[pos] {
                continue;
            }
            keep.push(idx);

            let best = &candidates[idx].bbox;
            for (later, &other) in order.iter().enumerate().skip(pos + 1) {
                if !suppressed[later] && best.iou(&candidates[other].bbox) > self.nms_threshold {
                    suppressed[later] = true;
                }
            }
        }

        keep
    }

    /// Suppress overlaps, then label the survivors and compute their area ratio.
    #[tracing::instrument(skip(self, candidates, labels), fields(candidates = candidates.len()))]
    pub fn process(
        &self,
        candidates: &[RawDetection],
        image_width: u32,
        image_height: u32,
        labels: &ClassLabelTable,
    ) -> Vec<Detection> {
        let image_area = image_width as f32 * image_height as f32;

        self.suppress(candidates)
            .into_iter()
            .map(|idx| {
                let candidate = &candidates[idx];
                Detection {
                    label: labels.get(candidate.class_id).to_string(),
                    class_id: candidate.class_id,
                    confidence: candidate.confidence,
                    bbox: candidate.bbox,
                    area_ratio: area_ratio(&candidate.bbox, image_area),
                }
            })
            .collect()
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(&DetectorConfig::default())
    }
}

/// Box area as a percentage of the image area
#[inline]
fn area_ratio(bbox: &BoundingBox, image_area: f32) -> f32 {
    if image_area > 0.0 {
        bbox.area() * 100.0 / image_area
    } else {
        0.0
    }
}
