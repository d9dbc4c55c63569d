//! Live face tracking from a capture device.
//!
//! Frames are read with `OpenCV`, faces are found with an SCRFD model and
//! the best face is passed through a 68-point landmark model. Everything
//! runs on a [`ThreadedDetector`] worker so model inference never blocks
//! the refresh tick.

/// SCRFD face detector
pub mod face_detector;

/// Box arithmetic shared by the detectors
pub mod geometry;

/// 68-point landmark detector
pub mod landmarks;

use crate::{
    config::{CaptureConfig, ModelConfig},
    detection::{DetectionBackend, RawDetection, ThreadedDetector},
    Error, Result,
};
use face_detector::FaceDetector;
use landmarks::LandmarkDetector;
use log::{info, warn};
use nalgebra::Point2;
use opencv::{
    core::{self, Mat, Rect},
    prelude::*,
    videoio::{self, VideoCapture, CAP_PROP_BUFFERSIZE, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH},
};
use ort::{Environment, GraphOptimizationLevel, LoggingLevel, Session, SessionBuilder};
use std::path::Path;
use std::sync::Arc;

/// Fraction of the face box added on each side before landmark detection
const FACE_BOX_SHIFT: f64 = 0.2;

pub(crate) fn load_session(name: &str, model_path: &Path) -> Result<Session> {
    info!("Loading {name} model: {}", model_path.display());

    let environment = Arc::new(
        Environment::builder()
            .with_name(name)
            .with_log_level(LoggingLevel::Warning)
            .build()?,
    );

    Ok(SessionBuilder::new(&environment)?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_model_from_file(model_path)?)
}

/// Capture device plus detection models
pub struct WebcamBackend {
    capture: VideoCapture,
    faces: FaceDetector,
    landmarks: LandmarkDetector,
    flip_x: bool,
}

impl WebcamBackend {
    /// Open the capture device and load both models
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened or a model fails to load
    pub fn open(models: &ModelConfig, capture: &CaptureConfig) -> Result<Self> {
        info!("Opening camera {}", capture.camera_index);
        let mut device = VideoCapture::new(capture.camera_index, videoio::CAP_ANY)?;
        if !device.is_opened()? {
            return Err(Error::Capture(format!("Cannot open camera {}", capture.camera_index)));
        }
        device.set(CAP_PROP_FRAME_WIDTH, f64::from(capture.width))?;
        device.set(CAP_PROP_FRAME_HEIGHT, f64::from(capture.height))?;
        if device.set(CAP_PROP_BUFFERSIZE, 1.0)? {
            info!("Camera buffer size set to 1 for low latency");
        }

        Ok(Self {
            capture: device,
            faces: FaceDetector::new(&models.face_detector, models.confidence_threshold, models.iou_threshold)?,
            landmarks: LandmarkDetector::new(&models.face_landmarks)?,
            flip_x: capture.flip_x,
        })
    }

    fn read_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        if self.flip_x {
            let mut flipped = Mat::default();
            core::flip(&frame, &mut flipped, 1)?;
            return Ok(Some(flipped));
        }
        Ok(Some(frame))
    }
}

impl DetectionBackend for WebcamBackend {
    #[allow(clippy::cast_possible_truncation)]
    fn detect(&mut self) -> Result<Option<RawDetection>> {
        let Some(frame) = self.read_frame()? else {
            warn!("Failed to read frame");
            return Ok(None);
        };

        let Some(face) = self.faces.detect(&frame)?.into_iter().next() else {
            return Ok(None);
        };

        let crop = geometry::refine_square(
            &face.bbox,
            f64::from(frame.cols()),
            f64::from(frame.rows()),
            FACE_BOX_SHIFT,
        );
        let rect = Rect::new(crop.x as i32, crop.y as i32, crop.width as i32, crop.height as i32);
        if rect.width <= 0 || rect.height <= 0 {
            return Ok(None);
        }

        let roi = Mat::roi(&frame, rect)?;
        let marks = self.landmarks.detect(&roi.try_clone()?)?;
        let points: Vec<Point2<f64>> = marks
            .iter()
            .map(|p| Point2::new(p.x + f64::from(rect.x), p.y + f64::from(rect.y)))
            .collect();

        RawDetection::from_landmarks68(&points, face.bbox).map(Some)
    }
}

/// Spawn a detector that tracks faces from the configured camera
///
/// # Errors
///
/// Returns an error if the worker thread cannot be spawned; device and
/// model failures surface later through the detector's setup
pub fn spawn_detector(models: &ModelConfig, capture: &CaptureConfig) -> Result<ThreadedDetector> {
    let models = models.clone();
    let capture = capture.clone();
    ThreadedDetector::spawn("webcam", move || WebcamBackend::open(&models, &capture))
}

