//! Debug overlay geometry for the tracker preview.
//!
//! Detections live in capture pixels; the preview is drawn at display
//! size, so every coordinate is rescaled before it becomes a marker.

use crate::{
    constants::{EYE_MARKER_SIZE, EYE_MIDDLE_MARKER_SIZE},
    detection::{BoundingBox, RawDetection},
    signal::{self, ExtractedSignal},
};
use nalgebra::Point2;

/// Capture and preview sizes used to rescale detections
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayScale {
    pub capture_size: (f64, f64),
    pub display_size: (f64, f64),
}

impl OverlayScale {
    fn factors(&self) -> (f64, f64) {
        let (cw, ch) = self.capture_size;
        let (dw, dh) = self.display_size;
        if cw > 0.0 && ch > 0.0 {
            (dw / cw, dh / ch)
        } else {
            (1.0, 1.0)
        }
    }

    fn point(&self, p: Point2<f64>) -> Point2<f64> {
        let (sx, sy) = self.factors();
        Point2::new(p.x * sx, p.y * sy)
    }

    fn bbox(&self, b: &BoundingBox) -> BoundingBox {
        let (sx, sy) = self.factors();
        BoundingBox::new(b.x * sx, b.y * sy, b.width * sx, b.height * sy)
    }
}

/// Square marker anchored at its top-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub origin: Point2<f64>,
    pub size: f64,
}

/// Everything the preview draws for one detection
#[derive(Debug, Clone, PartialEq)]
pub struct DebugOverlay {
    pub face_box: BoundingBox,
    pub eye_left: Marker,
    pub eye_right: Marker,
    pub eye_middle: Marker,
}

impl DebugOverlay {
    /// Build overlay markers for a detection at preview size
    #[must_use]
    pub fn from_detection(detection: &RawDetection, scale: &OverlayScale) -> Self {
        let extracted: ExtractedSignal = signal::extract(detection);

        Self {
            face_box: scale.bbox(&detection.bbox),
            eye_left: Marker {
                origin: scale.point(extracted.eye_left),
                size: EYE_MARKER_SIZE,
            },
            eye_right: Marker {
                origin: scale.point(extracted.eye_right),
                size: EYE_MARKER_SIZE,
            },
            eye_middle: Marker {
                origin: scale.point(extracted.eye_middle),
                size: EYE_MIDDLE_MARKER_SIZE,
            },
        }
    }
}
