//! Helper functions and utilities for tests

#![allow(dead_code)]

use head_coupled_view::{
    detection::{BoundingBox, Detector, RawDetection},
    replay::{Recording, ReplayDetector},
};
use nalgebra::Point2;

/// Face with single-point eyes at `left` and `right` and a square box of side `side`
pub fn face(left: (f64, f64), right: (f64, f64), side: f64) -> RawDetection {
    RawDetection::from_eyes(
        vec![Point2::new(left.0, left.1)],
        vec![Point2::new(right.0, right.1)],
        BoundingBox::new(0.0, 0.0, side, side),
    )
}

/// Face whose eye midpoint is at `(x, y)`
pub fn face_centered(x: f64, y: f64, side: f64) -> RawDetection {
    face((x - 20.0, y), (x + 20.0, y), side)
}

/// Replay detector over `frames` with the given latency
pub fn replay_detector(frames: Vec<Option<RawDetection>>, latency_ticks: usize) -> Box<dyn Detector> {
    Box::new(ReplayDetector::new(
        Recording {
            capture_size: None,
            latency_ticks,
            frames,
        },
        false,
    ))
}

/// Assert two floats are within `tolerance`
pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} +/- {tolerance}, got {actual}"
    );
}
