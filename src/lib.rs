//! Head-coupled perspective rendering driven by face tracking.
//!
//! A face detector reports eye landmarks and a face box; the tracking
//! pipeline turns them into a viewer eye position and an off-axis camera
//! that keeps the virtual screen pinned to the physical display while the
//! viewer moves. The pipeline consists of:
//! 1. Detection, driven once per display refresh with at most one request in flight
//! 2. Signal extraction (eye centroids and face area)
//! 3. Temporal smoothing over the most recent detections
//! 4. Calibration mapping from capture pixels to scene units
//! 5. Off-axis camera update (position, near plane, field of view, view offset)
//!
//! # Examples
//!
//! ## Replaying a recording
//!
//! ```no_run
//! use head_coupled_view::{
//!     app::{AppConfig, HeadCoupledApp},
//!     calibration::MemoryStore,
//!     camera::PerspectiveCamera,
//!     replay::{Recording, ReplayDetector},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let recording = Recording::from_file("demos/sample_recording.yaml")?;
//! let detector = ReplayDetector::new(recording, false);
//!
//! let mut app = HeadCoupledApp::new(
//!     AppConfig::default(),
//!     Some(Box::new(detector)),
//!     Box::new(MemoryStore::default()),
//! )?;
//!
//! let mut camera = PerspectiveCamera::default();
//! for _ in 0..60 {
//!     let state = app.tick(&mut camera);
//!     println!("eye at {:?}, fov {:.2}", state.position, state.fov);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Driving the pipeline directly
//!
//! ```
//! use head_coupled_view::{
//!     calibration::CalibrationParameters,
//!     camera::OffAxisCameraController,
//!     detection::{BoundingBox, RawDetection},
//!     pipeline::{TrackingContext, TrackingPipeline},
//! };
//! use nalgebra::Point2;
//!
//! let mut pipeline = TrackingPipeline::new(5).unwrap();
//! let ctx = TrackingContext::new(CalibrationParameters::default());
//! let detection = RawDetection::from_eyes(
//!     vec![Point2::new(280.0, 240.0)],
//!     vec![Point2::new(360.0, 240.0)],
//!     BoundingBox::new(270.0, 190.0, 100.0, 100.0),
//! );
//!
//! let viewer = pipeline.process(&detection, &ctx).unwrap();
//! let mut camera = OffAxisCameraController::default();
//! let state = camera.update(viewer, 9.0 / 16.0);
//! assert_eq!(state.position.x, 0.0);
//! assert_eq!(state.near, viewer.z + 0.001);
//! ```

/// Error types and result handling
pub mod error;

/// Constants used throughout the library
pub mod constants;

/// Configuration management
pub mod config;

/// Detection results, the detector seam and the refresh-driven task
pub mod detection;

/// Eye and face-area extraction from detections
pub mod signal;

/// Moving-average smoothing of extracted signals
pub mod smoother;

/// Calibration parameters, persistence and the viewer position mapping
pub mod calibration;

/// Off-axis camera controller and perspective camera
pub mod camera;

/// Debug overlay markers
pub mod overlay;

/// Detection-to-viewer tracking pipeline
pub mod pipeline;

/// Recorded detection playback
pub mod replay;

/// Main application module
pub mod app;

/// Live webcam tracking
#[cfg(feature = "webcam")]
pub mod webcam;

pub use error::{Error, Result};
