use handdet_core::{BBox, DetError, Detection, Result};

use crate::nms::non_max_suppression;

/// Memory layout of a raw YOLO head output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputLayout {
    /// `[1, 4 + nc, anchors]`, the default ultralytics ONNX export.
    ChannelsFirst,
    /// `[1, anchors, 4 + nc]`.
    AnchorsFirst,
}

impl OutputLayout {
    /// Guess the layout from a 3-D output shape. Anchor counts are always far
    /// larger than the attribute count.
    pub fn infer(shape: &[usize]) -> Result<(Self, usize, usize)> {
        match shape {
            [1, a, b] if a <= b => Ok((Self::ChannelsFirst, *a, *b)),
            [1, a, b] => Ok((Self::AnchorsFirst, *b, *a)),
            other => Err(DetError::Inference(format!(
                "unexpected detector output shape {other:?}"
            ))),
        }
    }
}

/// Turns raw YOLO head output into filtered detections.
///
/// Boxes come out in model-input pixel space; mapping back to the source
/// image is the caller's job.
#[derive(Debug, Clone)]
pub struct Postprocessor {
    conf_threshold: f32,
    iou_threshold: f32,
    max_detections: usize,
}

impl Postprocessor {
    pub fn new() -> Self {
        Self {
            conf_threshold: 0.4,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }

    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    pub fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    pub fn conf_threshold(&self) -> f32 {
        self.conf_threshold
    }

    /// Decode a flat output buffer with the given shape.
    pub fn decode(&self, data: &[f32], shape: &[usize]) -> Result<Vec<Detection>> {
        let (layout, attrs, anchors) = OutputLayout::infer(shape)?;
        if attrs < 5 {
            return Err(DetError::Inference(format!(
                "detector output has {attrs} attributes, need at least 5"
            )));
        }
        if data.len() != attrs * anchors {
            return Err(DetError::Inference(format!(
                "output buffer has {} values, shape {shape:?} needs {}",
                data.len(),
                attrs * anchors
            )));
        }

        let at = |anchor: usize, attr: usize| match layout {
            OutputLayout::ChannelsFirst => data[attr * anchors + anchor],
            OutputLayout::AnchorsFirst => data[anchor * attrs + attr],
        };

        let num_classes = attrs - 4;
        let mut candidates = Vec::new();
        for anchor in 0..anchors {
            let (class_id, score) = (0..num_classes)
                .map(|c| (c, at(anchor, 4 + c)))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            if score < self.conf_threshold {
                continue;
            }

            let bbox = BBox::from_center(at(anchor, 0), at(anchor, 1), at(anchor, 2), at(anchor, 3));
            if bbox.width <= 0.0 || bbox.height <= 0.0 {
                continue;
            }

            candidates.push(Detection {
                bbox,
                confidence: score,
                class_id: class_id as u32,
            });
        }

        let raw = candidates.len();
        let mut kept = non_max_suppression(candidates, self.iou_threshold);
        kept.truncate(self.max_detections);

        tracing::trace!(anchors, raw, kept = kept.len(), "decoded detector output");
        Ok(kept)
    }
}

impl Default for Postprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a channels-first buffer from per-anchor rows.
    fn channels_first(rows: &[[f32; 5]]) -> Vec<f32> {
        let n = rows.len();
        let mut data = vec![0.0; 5 * n];
        for (a, row) in rows.iter().enumerate() {
            for (attr, v) in row.iter().enumerate() {
                data[attr * n + a] = *v;
            }
        }
        data
    }

    #[test]
    fn test_threshold_and_nms() {
        let rows = [
            [100.0, 100.0, 40.0, 40.0, 0.90],
            [102.0, 101.0, 40.0, 40.0, 0.80],
            [300.0, 300.0, 20.0, 20.0, 0.50],
            [500.0, 500.0, 20.0, 20.0, 0.10],
            [600.0, 600.0, 20.0, 20.0, 0.39],
            [50.0, 50.0, 10.0, 10.0, 0.41],
        ];
        let data = channels_first(&rows);
        let dets = Postprocessor::new().decode(&data, &[1, 5, rows.len()]).unwrap();

        let confs: Vec<f32> = dets.iter().map(|d| d.confidence).collect();
        assert_eq!(confs, vec![0.90, 0.50, 0.41]);
        assert_eq!(dets[0].bbox.to_xyxy(), [80.0, 80.0, 120.0, 120.0]);
    }

    #[test]
    fn test_anchors_first_layout() {
        let rows = [[10.0, 10.0, 4.0, 4.0, 0.0, 0.95], [30.0, 30.0, 4.0, 4.0, 0.0, 0.2]];
        // Eight anchors of six attributes; the trailing six are empty.
        let mut data: Vec<f32> = rows.iter().flatten().copied().collect();
        data.extend(std::iter::repeat(0.0).take(6 * 6));
        let dets = Postprocessor::new().decode(&data, &[1, 8, 6]).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
    }

    #[test]
    fn test_max_detections() {
        let rows: Vec<[f32; 5]> = (0..10).map(|i| [i as f32 * 50.0, 0.0, 10.0, 10.0, 0.9]).collect();
        let dets = Postprocessor::new()
            .with_max_detections(3)
            .decode(&channels_first(&rows), &[1, 5, rows.len()])
            .unwrap();
        assert_eq!(dets.len(), 3);
    }

    #[test]
    fn test_shape_errors() {
        let pp = Postprocessor::new();
        assert!(pp.decode(&[0.0; 10], &[1, 5]).is_err());
        assert!(pp.decode(&[0.0; 10], &[1, 5, 3]).is_err());
        assert!(pp.decode(&[0.0; 12], &[1, 4, 3]).is_err());
    }
}
