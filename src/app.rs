//! Main application module for head-coupled perspective.

use crate::{
    calibration::{BiasKey, CalibrationParameters, CalibrationStore, ViewerPosition},
    camera::{CameraFrustumState, CameraRig, OffAxisCameraController},
    config::Config,
    detection::{DetectionTask, Detector, TaskState},
    error::{Error, Result},
    overlay::{DebugOverlay, OverlayScale},
    pipeline::{TrackingContext, TrackingPipeline, TrackingState},
};
use log::{debug, info, warn};

/// Main application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Number of detections averaged by the smoother
    pub smoothing_window: usize,
    /// Distance added to the viewer depth to get the near plane
    pub near_epsilon: f64,
    /// Rendered viewport
    pub viewport: Viewport,
    /// Capture resolution, used to rescale the debug overlay
    pub capture_size: Option<(f64, f64)>,
    /// Build debug overlay markers
    pub debug_overlay: bool,
    /// Calibration used when nothing is stored and after a reset
    pub factory_calibration: CalibrationParameters,
    /// Where the viewer position comes from
    pub mode: ViewerMode,
}

impl AppConfig {
    /// Application settings described by a configuration file
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            smoothing_window: config.tracking.smoothing_window,
            near_epsilon: config.tracking.near_epsilon,
            viewport: Viewport::new(config.display.width, config.display.height),
            capture_size: Some((f64::from(config.capture.width), f64::from(config.capture.height))),
            debug_overlay: config.display.debug_overlay,
            factory_calibration: config.calibration.factory_defaults(),
            mode: if config.manual.enabled {
                ViewerMode::Manual {
                    x: config.manual.x,
                    y: config.manual.y,
                    z: config.manual.z,
                }
            } else {
                ViewerMode::Tracking
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Viewer position source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerMode {
    /// Follow the tracked face
    Tracking,
    /// Fixed viewpoint; `y` is scaled by the viewport aspect ratio
    Manual { x: f64, y: f64, z: f64 },
}

impl ViewerMode {
    /// Viewer position fed to the camera for this mode
    #[must_use]
    pub fn viewer_position(self, tracked: Option<ViewerPosition>, aspect_ratio: f64) -> ViewerPosition {
        match self {
            Self::Tracking => tracked.unwrap_or_default(),
            Self::Manual { x, y, z } => ViewerPosition::new(x, y * aspect_ratio, z),
        }
    }
}

/// Rendered viewport size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Height over width
    #[must_use]
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.height) / f64::from(self.width)
    }

    /// # Errors
    ///
    /// Returns an error if either side is zero
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "Viewport size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// Main application struct
pub struct HeadCoupledApp {
    config: AppConfig,
    detection: Option<DetectionTask<Box<dyn Detector>>>,
    pipeline: TrackingPipeline,
    store: Box<dyn CalibrationStore>,
    calibration: CalibrationParameters,
    camera: OffAxisCameraController,
    ticks: u64,
}

impl HeadCoupledApp {
    /// Create the application.
    ///
    /// Without a detector the viewer stays at the default pose unless a
    /// manual viewpoint is selected.
    ///
    /// # Errors
    ///
    /// Returns an error if the smoothing window is zero, the viewport is
    /// empty or a manual viewpoint is invalid
    pub fn new(
        config: AppConfig,
        detector: Option<Box<dyn Detector>>,
        store: Box<dyn CalibrationStore>,
    ) -> Result<Self> {
        info!("Initializing head-coupled view application");

        config.viewport.validate()?;
        if let ViewerMode::Manual { z, .. } = config.mode {
            validate_manual_distance(z)?;
        }

        let calibration = CalibrationParameters::load_with_defaults(store.as_ref(), config.factory_calibration);
        let detection = detector.map(|detector| {
            info!("Using detector: {}", detector.name());
            DetectionTask::new(detector)
        });
        if detection.is_none() {
            info!("No detector configured, face tracking disabled");
        }

        Ok(Self {
            pipeline: TrackingPipeline::new(config.smoothing_window)?,
            camera: OffAxisCameraController::new(config.near_epsilon, config.viewport.aspect_ratio()),
            config,
            detection,
            store,
            calibration,
            ticks: 0,
        })
    }

    /// Run one display refresh and push the camera into `rig`
    pub fn tick<R: CameraRig + ?Sized>(&mut self, rig: &mut R) -> CameraFrustumState {
        self.ticks += 1;

        let detection = self.detection.as_mut().and_then(DetectionTask::on_refresh);
        if let Some(detection) = detection {
            let ctx = self.tracking_context();
            if self.pipeline.process(&detection, &ctx).is_some() {
                if let Err(e) = self.calibration.save(self.store.as_mut()) {
                    warn!("Failed to persist calibration: {e}");
                }
            }
        }

        let aspect_ratio = self.config.viewport.aspect_ratio();
        let viewer = self.config.mode.viewer_position(self.pipeline.viewer_position(), aspect_ratio);

        let state = self.camera.update(viewer, aspect_ratio);
        self.camera.apply(rig);
        state
    }

    /// Adjust one calibration bias and persist it
    ///
    /// # Errors
    ///
    /// Returns an error if the value is invalid or the store cannot be written
    pub fn set_bias(&mut self, key: BiasKey, value: f64) -> Result<()> {
        self.calibration.set(key, value)?;
        debug!("Calibration {} set to {value}", key.as_str());
        self.calibration.save(self.store.as_mut())
    }

    /// Restore factory calibration and forget tracking history
    ///
    /// # Errors
    ///
    /// Returns an error if the stored calibration cannot be cleared; the
    /// application state is left unchanged in that case
    pub fn reset(&mut self) -> Result<()> {
        self.store.clear()?;
        self.calibration = self.config.factory_calibration;
        self.pipeline.reset();
        info!("Calibration reset to defaults");
        Ok(())
    }

    /// Switch between tracking and a manual viewpoint
    ///
    /// # Errors
    ///
    /// Returns an error if a manual viewpoint has a non-positive distance
    pub fn set_mode(&mut self, mode: ViewerMode) -> Result<()> {
        if let ViewerMode::Manual { z, .. } = mode {
            validate_manual_distance(z)?;
        }
        self.config.mode = mode;
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationParameters {
        &self.calibration
    }

    pub fn store(&self) -> &dyn CalibrationStore {
        self.store.as_ref()
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.pipeline.state()
    }

    pub fn viewer_position(&self) -> Option<ViewerPosition> {
        self.pipeline.viewer_position()
    }

    /// Debug overlay for the last detection, when enabled
    pub fn overlay(&self) -> Option<&DebugOverlay> {
        self.pipeline.overlay()
    }

    /// Detection task state, `None` when running without a detector
    pub fn detection_state(&self) -> Option<TaskState> {
        self.detection.as_ref().map(DetectionTask::state)
    }

    /// Number of display refreshes so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn tracking_context(&self) -> TrackingContext {
        let mut ctx = TrackingContext::new(self.calibration);
        if self.config.debug_overlay {
            ctx.overlay = Some(OverlayScale {
                capture_size: self.config.capture_size.unwrap_or((0.0, 0.0)),
                display_size: (f64::from(self.config.viewport.width), f64::from(self.config.viewport.height)),
            });
        }
        ctx
    }
}

fn validate_manual_distance(z: f64) -> Result<()> {
    if z.is_finite() && z > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("Manual viewer distance must be greater than 0, got {z}")))
    }
}
