//! Face detection results and the detection cycle.
//!
//! A [`Detector`] answers one request at a time: the caller issues a
//! request with [`Detector::request`] and polls it to completion with
//! [`Detector::poll_detection`]. [`DetectionTask`] drives a detector from
//! the display-refresh tick and guarantees that cycles never overlap.

/// Persistent detection task driven by the refresh tick
pub mod task;

/// Worker-thread adapter for blocking detection backends
pub mod threaded;

use crate::Result;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::task::Poll;

pub use task::{DetectionTask, TaskState};
pub use threaded::{DetectionBackend, ThreadedDetector};

/// Named group of facial landmark points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkGroup {
    /// Jaw outline (0-16)
    Jaw,
    /// Eyebrow on the image-left side (17-21)
    LeftBrow,
    /// Eyebrow on the image-right side (22-26)
    RightBrow,
    /// Nose bridge and lower nose (27-35)
    Nose,
    /// Eye on the image-left side (36-41)
    LeftEye,
    /// Eye on the image-right side (42-47)
    RightEye,
    /// Outer and inner lip (48-67)
    Mouth,
}

impl LandmarkGroup {
    /// Index range of this group in the 68-point layout
    #[must_use]
    pub fn landmark_range(self) -> std::ops::Range<usize> {
        match self {
            Self::Jaw => 0..17,
            Self::LeftBrow => 17..22,
            Self::RightBrow => 22..27,
            Self::Nose => 27..36,
            Self::LeftEye => crate::constants::LEFT_EYE_LANDMARKS,
            Self::RightEye => crate::constants::RIGHT_EYE_LANDMARKS,
            Self::Mouth => 48..68,
        }
    }

    /// All groups in landmark order
    pub const ALL: [Self; 7] = [
        Self::Jaw,
        Self::LeftBrow,
        Self::RightBrow,
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::Mouth,
    ];
}

/// Axis-aligned face bounding box in capture pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Box area; negative extents count as empty
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

/// One detected face: landmark groups plus the face bounding box
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawDetection {
    /// Face bounding box
    pub bbox: BoundingBox,
    /// Landmark points keyed by facial feature
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkGroup, Vec<Point2<f64>>>,
}

impl RawDetection {
    /// Build a detection from explicit eye point sets
    #[must_use]
    pub fn from_eyes(left_eye: Vec<Point2<f64>>, right_eye: Vec<Point2<f64>>, bbox: BoundingBox) -> Self {
        let mut landmarks = BTreeMap::new();
        landmarks.insert(LandmarkGroup::LeftEye, left_eye);
        landmarks.insert(LandmarkGroup::RightEye, right_eye);
        Self { bbox, landmarks }
    }

    /// Split a full 68-point landmark set into named groups
    ///
    /// # Errors
    ///
    /// Returns an error if the landmark count is not 68
    pub fn from_landmarks68(points: &[Point2<f64>], bbox: BoundingBox) -> Result<Self> {
        if points.len() != crate::constants::NUM_FACIAL_LANDMARKS {
            return Err(crate::Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                crate::constants::NUM_FACIAL_LANDMARKS,
                points.len()
            )));
        }

        let landmarks = LandmarkGroup::ALL
            .iter()
            .map(|&group| (group, points[group.landmark_range()].to_vec()))
            .collect();

        Ok(Self { bbox, landmarks })
    }

    /// Points of one landmark group, empty if the detector did not provide it
    #[must_use]
    pub fn group(&self, group: LandmarkGroup) -> &[Point2<f64>] {
        self.landmarks.get(&group).map_or(&[], Vec::as_slice)
    }

    /// Face area carried by the detection
    #[must_use]
    pub fn face_area(&self) -> f64 {
        self.bbox.area()
    }
}

/// Source of face detections answering one request at a time
pub trait Detector {
    /// Poll one-time setup (model loading, device acquisition)
    ///
    /// Detection requests are only issued after this returns `Ready(Ok(()))`.
    fn poll_ready(&mut self) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    /// Issue one detection request against the current video frame
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be issued
    fn request(&mut self) -> Result<()>;

    /// Poll the outstanding request
    fn poll_detection(&mut self) -> Poll<Result<Option<RawDetection>>>;

    /// Detector name for logging
    fn name(&self) -> &str;
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn poll_ready(&mut self) -> Poll<Result<()>> {
        (**self).poll_ready()
    }

    fn request(&mut self) -> Result<()> {
        (**self).request()
    }

    fn poll_detection(&mut self) -> Poll<Result<Option<RawDetection>>> {
        (**self).poll_detection()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
