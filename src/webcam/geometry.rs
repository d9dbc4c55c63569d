//! Box arithmetic for the webcam detectors.

use crate::detection::BoundingBox;

/// Scored face box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceCandidate {
    pub bbox: BoundingBox,
    pub score: f32,
}

/// Intersection over union of two boxes
#[must_use]
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy non-maximum suppression; the result is sorted by descending score
#[must_use]
pub fn non_max_suppression(mut candidates: Vec<FaceCandidate>, iou_threshold: f64) -> Vec<FaceCandidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<FaceCandidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|kept| iou(&kept.bbox, &candidate.bbox) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Grow a box by `shift` of its size on each side, square it and keep it
/// inside a `max_width` x `max_height` frame
#[must_use]
pub fn refine_square(bbox: &BoundingBox, max_width: f64, max_height: f64, shift: f64) -> BoundingBox {
    let x_shift = (bbox.width * shift).clamp(0.0, max_width);
    let y_shift = (bbox.height * shift).clamp(0.0, max_height);

    let x = (bbox.x - x_shift).max(0.0);
    let y = (bbox.y - y_shift).max(0.0);
    let width = (bbox.width + 2.0 * x_shift).min(max_width - x);
    let height = (bbox.height + 2.0 * y_shift).min(max_height - y);

    let side = width.max(height).min(max_width).min(max_height);
    BoundingBox::new(
        x.min(max_width - side).max(0.0),
        y.min(max_height - side).max(0.0),
        side,
        side,
    )
}
