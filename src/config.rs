//! Configuration management for the head-coupled view application

use crate::{
    calibration::{BiasKey, CalibrationParameters},
    constants, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model configuration
    pub models: ModelConfig,

    /// Capture device configuration
    pub capture: CaptureConfig,

    /// Tracking pipeline configuration
    pub tracking: TrackingConfig,

    /// Calibration defaults and persistence
    pub calibration: CalibrationConfig,

    /// Display configuration
    pub display: DisplayConfig,

    /// Manual viewpoint override
    pub manual: ManualConfig,
}

/// Model file paths configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to face detection ONNX model
    pub face_detector: PathBuf,

    /// Path to facial landmarks ONNX model
    pub face_landmarks: PathBuf,

    /// Confidence threshold for face detection (0.0-1.0)
    pub confidence_threshold: f32,

    /// IOU threshold for non-maximum suppression (0.0-1.0)
    pub iou_threshold: f32,
}

/// Capture device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera index
    pub camera_index: i32,

    /// Requested capture width
    pub width: u32,

    /// Requested capture height
    pub height: u32,

    /// Mirror frames horizontally before detection
    pub flip_x: bool,
}

/// Tracking pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Number of detections averaged by the smoother
    pub smoothing_window: usize,

    /// Distance added to the viewer depth to get the near plane
    pub near_epsilon: f64,
}

/// Calibration defaults and persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// File holding persisted calibration; in-memory only when unset
    pub store_path: Option<PathBuf>,

    /// Horizontal recentering bias, capture pixels
    pub offset_x_bias: f64,

    /// Vertical recentering bias, capture pixels
    pub offset_y_bias: f64,

    /// Horizontal pixels per scene unit
    pub width_bias: f64,

    /// Vertical pixels per scene unit
    pub height_bias: f64,

    /// Distance constant applied to the inverse square root of face area
    pub depth_bias: f64,
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display refresh rate driving the tick loop
    pub target_fps: u32,

    /// Viewport width
    pub width: u32,

    /// Viewport height
    pub height: u32,

    /// Far clipping plane
    pub far: f64,

    /// Build debug overlay markers for each detection
    pub debug_overlay: bool,
}

/// Manual viewpoint override, used instead of face tracking when enabled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualConfig {
    /// Use the fixed viewpoint below
    pub enabled: bool,

    /// Horizontal offset (-0.5 to 0.5)
    pub x: f64,

    /// Vertical offset (-0.5 to 0.5), scaled by the aspect ratio
    pub y: f64,

    /// Distance from the screen (greater than 0)
    pub z: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            face_detector: PathBuf::from("assets/face_detector.onnx"),
            face_landmarks: PathBuf::from("assets/face_landmarks.onnx"),
            confidence_threshold: 0.5,
            iou_threshold: 0.4,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: 640,
            height: 480,
            flip_x: false,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            smoothing_window: constants::DEFAULT_SMOOTHING_WINDOW,
            near_epsilon: constants::NEAR_PLANE_EPSILON,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        let defaults = CalibrationParameters::default();
        Self {
            store_path: None,
            offset_x_bias: defaults.offset_x_bias,
            offset_y_bias: defaults.offset_y_bias,
            width_bias: defaults.width_bias,
            height_bias: defaults.height_bias,
            depth_bias: defaults.depth_bias,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            target_fps: constants::DEFAULT_FPS,
            width: 1280,
            height: 720,
            far: constants::DEFAULT_FAR_PLANE,
            debug_overlay: false,
        }
    }
}

impl Default for ManualConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            x: 0.0,
            y: 0.0,
            z: 0.3,
        }
    }
}

impl CalibrationConfig {
    /// Factory calibration described by this section
    #[must_use]
    pub fn factory_defaults(&self) -> CalibrationParameters {
        CalibrationParameters {
            offset_x_bias: self.offset_x_bias,
            offset_y_bias: self.offset_y_bias,
            width_bias: self.width_bias,
            height_bias: self.height_bias,
            depth_bias: self.depth_bias,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;

        serde_yaml::from_str(&content).map_err(|e| Error::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// Save configuration to a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| Error::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    ///
    /// Model paths are not checked here; a missing model disables
    /// tracking at startup instead of refusing to run.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.models.confidence_threshold) {
            return Err(Error::ConfigError(
                "Confidence threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.models.iou_threshold) {
            return Err(Error::ConfigError("IOU threshold must be between 0.0 and 1.0".to_string()));
        }

        if self.tracking.smoothing_window == 0 {
            return Err(Error::ConfigError(
                "Smoothing window size must be greater than 0".to_string(),
            ));
        }
        if !(self.tracking.near_epsilon.is_finite() && self.tracking.near_epsilon >= 0.0) {
            return Err(Error::ConfigError("Near epsilon must be non-negative".to_string()));
        }

        let defaults = self.calibration.factory_defaults();
        for key in BiasKey::ALL {
            let value = defaults.get(key);
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::ConfigError(format!(
                    "Calibration {} must be non-negative, got {value}",
                    key.as_str()
                )));
            }
        }

        if self.display.target_fps == 0 {
            return Err(Error::ConfigError("Target FPS must be greater than 0".to_string()));
        }
        if self.display.width == 0 || self.display.height == 0 {
            return Err(Error::ConfigError("Viewport size must be non-zero".to_string()));
        }
        if self.display.far <= self.tracking.near_epsilon {
            return Err(Error::ConfigError("Far plane must lie beyond the near plane".to_string()));
        }

        if self.manual.enabled && !(self.manual.z.is_finite() && self.manual.z > 0.0) {
            return Err(Error::ConfigError("Manual viewer distance must be greater than 0".to_string()));
        }

        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Head-Coupled View Configuration

# Model paths (webcam builds only)
models:
  face_detector: "assets/face_detector.onnx"
  face_landmarks: "assets/face_landmarks.onnx"
  confidence_threshold: 0.5
  iou_threshold: 0.4

# Capture device
capture:
  camera_index: 0
  width: 640
  height: 480
  flip_x: false

# Tracking pipeline
tracking:
  smoothing_window: 5
  near_epsilon: 0.001

# Factory calibration; persisted values override these at startup
calibration:
  store_path: "calibration.yaml"
  offset_x_bias: 320.0
  offset_y_bias: 240.0
  width_bias: 640.0
  height_bias: 640.0
  depth_bias: 250.0

# Display settings
display:
  target_fps: 60
  width: 1280
  height: 720
  far: 100.0
  debug_overlay: false

# Fixed viewpoint instead of tracking
manual:
  enabled: false
  x: 0.0
  y: 0.0
  z: 0.3
"#;
