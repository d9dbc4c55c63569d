//! User calibration and the mapping from pixel signal to viewer position.
//!
//! The additive biases recenter pixel coordinates because the capture
//! device's optical axis is not aligned with the screen center. The
//! divisive biases rescale pixel displacement into scene units. Depth
//! uses the pinhole relation: projected face area falls with the square
//! of distance, so `depth_bias / sqrt(area)` is proportional to distance.

/// Persisted key-value storage for calibration values
pub mod store;

use crate::{constants, smoother::SmoothedSignal, Error, Result};
use log::{debug, warn};
use nalgebra::Vector3;

pub use store::{CalibrationStore, FileStore, MemoryStore};

/// Calibration parameter names, as used in the persisted store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BiasKey {
    OffsetX,
    OffsetY,
    Width,
    Height,
    Depth,
}

impl BiasKey {
    /// Every key, in store order
    pub const ALL: [Self; 5] = [Self::Depth, Self::Width, Self::Height, Self::OffsetX, Self::OffsetY];

    /// Store key name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OffsetX => "offsetXBias",
            Self::OffsetY => "offsetYBias",
            Self::Width => "widthBias",
            Self::Height => "heightBias",
            Self::Depth => "depthBias",
        }
    }
}

/// Calibration biases; all values are finite and non-negative
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationParameters {
    pub offset_x_bias: f64,
    pub offset_y_bias: f64,
    pub width_bias: f64,
    pub height_bias: f64,
    pub depth_bias: f64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self {
            offset_x_bias: constants::DEFAULT_OFFSET_X_BIAS,
            offset_y_bias: constants::DEFAULT_OFFSET_Y_BIAS,
            width_bias: constants::DEFAULT_WIDTH_BIAS,
            height_bias: constants::DEFAULT_HEIGHT_BIAS,
            depth_bias: constants::DEFAULT_DEPTH_BIAS,
        }
    }
}

impl CalibrationParameters {
    /// Read every bias from the store.
    ///
    /// A missing or unparsable value falls back to that key's default;
    /// the other keys are unaffected.
    pub fn load(store: &dyn CalibrationStore) -> Self {
        Self::load_with_defaults(store, Self::default())
    }

    /// Like [`Self::load`], falling back to `defaults` instead of the built-in values
    pub fn load_with_defaults(store: &dyn CalibrationStore, defaults: Self) -> Self {
        let mut params = defaults;

        for key in BiasKey::ALL {
            let Some(raw) = store.get(key.as_str()) else {
                continue;
            };

            match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() && value >= 0.0 => params.set_unchecked(key, value),
                _ => warn!(
                    "Ignoring stored {} value {raw:?}, using default {}",
                    key.as_str(),
                    defaults.get(key)
                ),
            }
        }

        debug!("Loaded calibration: {params:?}");
        params
    }

    /// Write every bias to the store and flush it
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written
    pub fn save(&self, store: &mut dyn CalibrationStore) -> Result<()> {
        for key in BiasKey::ALL {
            store.set(key.as_str(), &self.get(key).to_string());
        }
        store.flush()
    }

    #[must_use]
    pub fn get(&self, key: BiasKey) -> f64 {
        match key {
            BiasKey::OffsetX => self.offset_x_bias,
            BiasKey::OffsetY => self.offset_y_bias,
            BiasKey::Width => self.width_bias,
            BiasKey::Height => self.height_bias,
            BiasKey::Depth => self.depth_bias,
        }
    }

    /// Adjust one bias, as a calibration slider does
    ///
    /// # Errors
    ///
    /// Returns an error if the value is negative or not finite
    pub fn set(&mut self, key: BiasKey, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidInput(format!(
                "{} must be a finite non-negative number, got {value}",
                key.as_str()
            )));
        }
        self.set_unchecked(key, value);
        Ok(())
    }

    fn set_unchecked(&mut self, key: BiasKey, value: f64) {
        match key {
            BiasKey::OffsetX => self.offset_x_bias = value,
            BiasKey::OffsetY => self.offset_y_bias = value,
            BiasKey::Width => self.width_bias = value,
            BiasKey::Height => self.height_bias = value,
            BiasKey::Depth => self.depth_bias = value,
        }
    }
}

/// Viewer eye point in normalized scene units; `z > 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ViewerPosition {
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[must_use]
    pub fn to_vector(self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

impl Default for ViewerPosition {
    fn default() -> Self {
        Self::new(0.0, 0.0, constants::DEFAULT_VIEWER_DISTANCE)
    }
}

/// Map a smoothed pixel signal to a viewer position.
///
/// Returns `None` instead of producing infinities when the face area is
/// not positive or the calibration makes any coordinate non-finite.
#[must_use]
pub fn map(smoothed: &SmoothedSignal, calibration: &CalibrationParameters) -> Option<ViewerPosition> {
    if !(smoothed.face_area.is_finite() && smoothed.face_area > 0.0) {
        return None;
    }

    let x = (-smoothed.eye_middle.x + calibration.offset_x_bias) / calibration.width_bias;
    let y = (-smoothed.eye_middle.y + calibration.offset_y_bias) / calibration.height_bias;
    let z = calibration.depth_bias / smoothed.face_area.sqrt();

    if !(x.is_finite() && y.is_finite() && z.is_finite()) || z <= 0.0 {
        debug!("Discarding degenerate viewer position ({x}, {y}, {z})");
        return None;
    }

    Some(ViewerPosition { x, y, z })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn scenario_calibration() -> CalibrationParameters {
        CalibrationParameters {
            offset_x_bias: 0.0,
            offset_y_bias: 0.0,
            width_bias: 120.0,
            height_bias: 120.0,
            depth_bias: 1000.0,
        }
    }

    #[test]
    fn test_map_scenario() {
        let smoothed = SmoothedSignal {
            eye_middle: Point2::new(120.0, 200.0),
            face_area: 2500.0,
        };

        let position = map(&smoothed, &scenario_calibration()).unwrap();
        assert!((position.x - -1.0).abs() < 1e-12);
        assert!((position.y - -5.0 / 3.0).abs() < 1e-12);
        assert!((position.z - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_area_short_circuits() {
        let smoothed = SmoothedSignal {
            eye_middle: Point2::new(120.0, 200.0),
            face_area: 0.0,
        };
        assert!(map(&smoothed, &scenario_calibration()).is_none());
    }

    #[test]
    fn test_zero_width_bias_rejected() {
        let smoothed = SmoothedSignal {
            eye_middle: Point2::new(120.0, 200.0),
            face_area: 2500.0,
        };
        let mut calibration = scenario_calibration();
        calibration.width_bias = 0.0;
        assert!(map(&smoothed, &calibration).is_none());
    }

    #[test]
    fn test_zero_depth_bias_rejected() {
        let smoothed = SmoothedSignal {
            eye_middle: Point2::new(0.0, 0.0),
            face_area: 100.0,
        };
        let mut calibration = scenario_calibration();
        calibration.depth_bias = 0.0;
        assert!(map(&smoothed, &calibration).is_none());
    }

    #[test]
    fn test_centered_face_with_defaults() {
        let smoothed = SmoothedSignal {
            eye_middle: Point2::new(constants::DEFAULT_OFFSET_X_BIAS, constants::DEFAULT_OFFSET_Y_BIAS),
            face_area: 2500.0,
        };
        let position = map(&smoothed, &CalibrationParameters::default()).unwrap();
        assert_eq!(position.x, 0.0);
        assert_eq!(position.y, 0.0);
        assert_eq!(position.z, constants::DEFAULT_DEPTH_BIAS / 50.0);
    }

    #[test]
    fn test_set_validates() {
        let mut params = CalibrationParameters::default();
        assert!(params.set(BiasKey::Depth, 500.0).is_ok());
        assert_eq!(params.depth_bias, 500.0);
        assert!(params.set(BiasKey::Width, -1.0).is_err());
        assert!(params.set(BiasKey::Height, f64::NAN).is_err());
        assert_eq!(params.width_bias, constants::DEFAULT_WIDTH_BIAS);
    }

    #[test]
    fn test_load_falls_back_per_key() {
        let mut store = MemoryStore::default();
        store.set("depthBias", "800");
        store.set("widthBias", "not-a-number");
        store.set("heightBias", "-3");

        let params = CalibrationParameters::load(&store);
        assert_eq!(params.depth_bias, 800.0);
        assert_eq!(params.width_bias, constants::DEFAULT_WIDTH_BIAS);
        assert_eq!(params.height_bias, constants::DEFAULT_HEIGHT_BIAS);
        assert_eq!(params.offset_x_bias, constants::DEFAULT_OFFSET_X_BIAS);
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::default();
        let mut params = CalibrationParameters::default();
        params.set(BiasKey::OffsetY, 12.5).unwrap();
        params.save(&mut store).unwrap();

        assert_eq!(store.get("offsetYBias").as_deref(), Some("12.5"));
        assert_eq!(CalibrationParameters::load(&store), params);
    }
}
