use super::TransformParams;
use crate::config::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DEFAULT_MAX_DETECTIONS};
use crate::detection::{BoundingBox, Detection};

const BOX_FEATURES: usize = 4;

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl PostProcessor {
    pub fn new(confidence_threshold: f32, iou_threshold: f32, max_detections: usize) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            max_detections,
        }
    }

    /// Parse detections from YOLO head output.
    ///
    /// Expects `[1, 4 + num_classes, num_anchors]` with boxes in input-pixel
    /// cxcywh. The transposed `[1, num_anchors, 4 + num_classes]` layout is
    /// also accepted; the smaller axis is taken as the feature axis.
    #[tracing::instrument(skip(self, predictions, transform))]
    pub fn parse_detections(
        &self,
        predictions: &ndarray::ArrayViewD<f32>,
        transform: &TransformParams,
    ) -> anyhow::Result<Vec<Detection>> {
        let shape = predictions.shape();
        if shape.len() != 3 || shape[0] != 1 {
            anyhow::bail!("Unexpected model output shape {:?}", shape);
        }

        let transposed = shape[1] > shape[2];
        let (num_features, num_anchors) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };

        if num_features <= BOX_FEATURES {
            anyhow::bail!(
                "Model output has {} features per anchor, expected more than {}",
                num_features,
                BOX_FEATURES
            );
        }

        let value = |anchor: usize, feature: usize| {
            if transposed {
                predictions[[0, anchor, feature]]
            } else {
                predictions[[0, feature, anchor]]
            }
        };

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            // argmax over class scores (already sigmoid-activated in YOLOv8+ exports)
            let mut confidence = f32::NEG_INFINITY;
            let mut class_id = 0usize;
            for c in BOX_FEATURES..num_features {
                let score = value(i, c);
                if score > confidence {
                    confidence = score;
                    class_id = c - BOX_FEATURES;
                }
            }

            if !confidence.is_finite() || confidence < self.confidence_threshold {
                continue;
            }

            let (x1, y1, x2, y2) =
                cxcywh_to_xyxy(value(i, 0), value(i, 1), value(i, 2), value(i, 3));

            // Apply inverse letterbox transform to original image coordinates
            let (x1, y1) = transform.to_original(x1, y1);
            let (x2, y2) = transform.to_original(x2, y2);

            let bbox = BoundingBox::new(x1, y1, x2, y2);
            if bbox.area() <= 0.0 {
                continue;
            }

            candidates.push(Detection {
                class_id,
                confidence,
                bbox,
            });
        }

        let mut detections = non_maximum_suppression(candidates, self.iou_threshold);
        detections.truncate(self.max_detections);

        Ok(detections)
    }
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(
            DEFAULT_CONFIDENCE_THRESHOLD,
            DEFAULT_IOU_THRESHOLD,
            DEFAULT_MAX_DETECTIONS,
        )
    }
}

/// Class-aware NMS; the result is sorted by descending confidence.
pub fn non_maximum_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len().min(100));

    for candidate in detections {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }

    kept
}

/// Convert bounding box from center-width-height format to corner format
#[inline]
fn cxcywh_to_xyxy(cx: f32, cy: f32, w: f32, h: f32) -> (f32, f32, f32, f32) {
    let x1 = cx - w / 2.0;
    let y1 = cy - h / 2.0;
    let x2 = cx + w / 2.0;
    let y2 = cy + h / 2.0;
    (x1, y1, x2, y2)
}
