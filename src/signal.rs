//! Reduction of a face detection to the compact tracking signal.

use crate::detection::{LandmarkGroup, RawDetection};
use nalgebra::Point2;

/// Eye centers and face area of one detection, in capture pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractedSignal {
    pub eye_left: Point2<f64>,
    pub eye_right: Point2<f64>,
    /// Midpoint of `eye_left` and `eye_right`
    pub eye_middle: Point2<f64>,
    pub face_area: f64,
}

impl ExtractedSignal {
    /// Whether the face area can be used as a depth cue
    #[must_use]
    pub fn has_usable_area(&self) -> bool {
        self.face_area.is_finite() && self.face_area > 0.0
    }
}

/// Centroid of a point set; an empty set yields the origin
#[must_use]
pub fn centroid(points: &[Point2<f64>]) -> Point2<f64> {
    if points.is_empty() {
        return Point2::origin();
    }

    let n = points.len() as f64;
    let sum = points.iter().fold(nalgebra::Vector2::<f64>::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / n)
}

/// Extract the tracking signal from a detection
#[must_use]
pub fn extract(detection: &RawDetection) -> ExtractedSignal {
    let eye_left = centroid(detection.group(LandmarkGroup::LeftEye));
    let eye_right = centroid(detection.group(LandmarkGroup::RightEye));

    ExtractedSignal {
        eye_left,
        eye_right,
        eye_middle: nalgebra::center(&eye_left, &eye_right),
        face_area: detection.face_area(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    #[test]
    fn test_eye_centroids() {
        let left = vec![Point2::new(90.0, 195.0), Point2::new(110.0, 205.0)];
        let right = vec![Point2::new(130.0, 190.0), Point2::new(150.0, 210.0)];
        let detection = RawDetection::from_eyes(left, right, BoundingBox::new(0.0, 0.0, 50.0, 50.0));

        let signal = extract(&detection);
        assert_eq!(signal.eye_left, Point2::new(100.0, 200.0));
        assert_eq!(signal.eye_right, Point2::new(140.0, 200.0));
        assert_eq!(signal.eye_middle, Point2::new(120.0, 200.0));
        assert_eq!(signal.face_area, 2500.0);
        assert!(signal.has_usable_area());
    }

    #[test]
    fn test_empty_group_centroid_is_origin() {
        assert_eq!(centroid(&[]), Point2::origin());
    }

    #[test]
    fn test_extract_is_deterministic() {
        let detection = RawDetection::from_eyes(
            vec![Point2::new(1.5, 2.5), Point2::new(3.25, 4.75)],
            vec![Point2::new(10.0, 12.0)],
            BoundingBox::new(5.0, 5.0, 7.0, 9.0),
        );
        assert_eq!(extract(&detection), extract(&detection));
    }

    #[test]
    fn test_zero_area_is_not_usable() {
        let detection = RawDetection::from_eyes(Vec::new(), Vec::new(), BoundingBox::default());
        assert!(!extract(&detection).has_usable_area());
    }
}
