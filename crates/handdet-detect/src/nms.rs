//! Greedy non-maximum suppression.

use handdet_core::Detection;

/// Remove detections that overlap a higher-confidence detection of the same
/// class by at least `iou_threshold`.
///
/// Output is sorted by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    // Ascending, so the best candidate is always at the back.
    detections.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));

    let mut kept = Vec::with_capacity(detections.len().min(64));
    while let Some(seed) = detections.pop() {
        detections.retain(|other| {
            other.class_id != seed.class_id || seed.bbox.iou(&other.bbox) < iou_threshold
        });
        kept.push(seed);
    }
    kept
}
