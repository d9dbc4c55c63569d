//! Detection to viewer position: extraction, smoothing and calibration.

use crate::{
    calibration::{self, CalibrationParameters, ViewerPosition},
    detection::RawDetection,
    overlay::{DebugOverlay, OverlayScale},
    signal,
    smoother::{SmoothedSignal, TemporalSmoother},
    Result,
};
use log::debug;

/// Whether a viewer position has been committed since startup or reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// No viewer position yet; the camera holds its default pose
    Uninitialized,
    /// Viewer position follows the latest usable detection
    Tracking,
}

/// Per-call inputs that would otherwise be UI-bound globals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingContext {
    pub calibration: CalibrationParameters,
    /// Build debug overlay markers at this scale; `None` disables the overlay
    pub overlay: Option<OverlayScale>,
}

impl TrackingContext {
    #[must_use]
    pub fn new(calibration: CalibrationParameters) -> Self {
        Self {
            calibration,
            overlay: None,
        }
    }
}

/// Long-lived tracking state
#[derive(Debug, Clone)]
pub struct TrackingPipeline {
    smoother: TemporalSmoother,
    smoothed: Option<SmoothedSignal>,
    viewer: Option<ViewerPosition>,
    overlay: Option<DebugOverlay>,
}

impl TrackingPipeline {
    /// Create a pipeline averaging over `window_size` detections
    ///
    /// # Errors
    ///
    /// Returns an error if `window_size` is zero
    pub fn new(window_size: usize) -> Result<Self> {
        Ok(Self {
            smoother: TemporalSmoother::new(window_size)?,
            smoothed: None,
            viewer: None,
            overlay: None,
        })
    }

    /// Feed one detected face.
    ///
    /// Returns the new viewer position, or `None` when the detection is
    /// degenerate; the previous position is kept in that case.
    pub fn process(&mut self, detection: &RawDetection, ctx: &TrackingContext) -> Option<ViewerPosition> {
        self.overlay = ctx
            .overlay
            .as_ref()
            .map(|scale| DebugOverlay::from_detection(detection, scale));

        let extracted = signal::extract(detection);
        if !extracted.has_usable_area() {
            debug!("Ignoring detection with face area {}", extracted.face_area);
            return None;
        }

        let smoothed = self.smoother.push(extracted);
        self.smoothed = Some(smoothed);

        let position = calibration::map(&smoothed, &ctx.calibration)?;
        self.viewer = Some(position);
        Some(position)
    }

    /// Forget history and the committed position
    pub fn reset(&mut self) {
        self.smoother.clear();
        self.smoothed = None;
        self.viewer = None;
        self.overlay = None;
    }

    pub fn state(&self) -> TrackingState {
        if self.viewer.is_some() {
            TrackingState::Tracking
        } else {
            TrackingState::Uninitialized
        }
    }

    /// Last committed viewer position
    pub fn viewer_position(&self) -> Option<ViewerPosition> {
        self.viewer
    }

    /// Last smoothed signal
    pub fn smoothed(&self) -> Option<SmoothedSignal> {
        self.smoothed
    }

    /// Overlay for the most recent detection, when enabled
    pub fn overlay(&self) -> Option<&DebugOverlay> {
        self.overlay.as_ref()
    }

    /// Number of signals in the smoothing window
    pub fn history_len(&self) -> usize {
        self.smoother.len()
    }
}
