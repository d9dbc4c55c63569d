use super::load_session;
use crate::{constants::NUM_FACIAL_LANDMARKS, Error, Result};
use nalgebra::Point2;
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Size, Vec3f, CV_32F};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Session, Value};
use std::path::Path;

/// Landmark model input size
const LANDMARK_INPUT_SIZE: i32 = 128;

/// 68-point facial landmark detector using ONNX Runtime
pub struct LandmarkDetector {
    session: Session,
}

impl LandmarkDetector {
    /// Load the landmark model
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no outputs
    pub fn new<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let session = load_session("face_landmarks", model_path.as_ref())?;
        if session.outputs.is_empty() {
            return Err(Error::ModelOutputError("Landmark model has no outputs".to_string()));
        }
        Ok(Self { session })
    }

    /// Detect the 68 landmarks of a cropped face, in crop pixels
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails or the model
    /// produces too few values
    #[allow(clippy::cast_precision_loss)]
    pub fn detect(&self, face: &Mat) -> Result<Vec<Point2<f64>>> {
        let tensor = Self::to_tensor(face)?;
        let marks = self.forward(tensor)?;

        if marks.len() < NUM_FACIAL_LANDMARKS * 2 {
            return Err(Error::ModelOutputError(format!(
                "Expected {} landmark values, got {}",
                NUM_FACIAL_LANDMARKS * 2,
                marks.len()
            )));
        }

        Ok(scale_marks(
            &marks[..NUM_FACIAL_LANDMARKS * 2],
            f64::from(face.cols()),
            f64::from(face.rows()),
        ))
    }

    /// Resize to the model input and normalize to [0, 1], NHWC
    #[allow(clippy::cast_sign_loss)]
    fn to_tensor(face: &Mat) -> Result<Array4<f32>> {
        let mut resized = Mat::default();
        imgproc::resize(
            face,
            &mut resized,
            Size::new(LANDMARK_INPUT_SIZE, LANDMARK_INPUT_SIZE),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut rgb = Mat::default();
        imgproc::cvt_color(&resized, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let mut float_image = Mat::default();
        rgb.convert_to(&mut float_image, CV_32F, 1.0 / 255.0, 0.0)?;

        let size = LANDMARK_INPUT_SIZE as usize;
        let pixels = float_image.data_typed::<Vec3f>()?;
        Ok(Array4::from_shape_fn((1, size, size, 3), |(_, y, x, c)| pixels[y * size + x][c]))
    }

    fn forward(&self, tensor: Array4<f32>) -> Result<Vec<f32>> {
        let input = CowArray::from(tensor.into_dyn());
        let outputs = self
            .session
            .run(vec![Value::from_array(self.session.allocator(), &input)?])?;

        let marks = outputs
            .first()
            .ok_or_else(|| Error::ModelOutputError("No output from landmark model".to_string()))?
            .try_extract::<f32>()?;
        let values = marks.view().iter().copied().collect();
        Ok(values)
    }
}

/// Marks are in model input pixels; rescale them to a `width` x `height` crop
fn scale_marks(marks: &[f32], width: f64, height: f64) -> Vec<Point2<f64>> {
    let input = f64::from(LANDMARK_INPUT_SIZE);
    marks
        .chunks_exact(2)
        .map(|xy| Point2::new(f64::from(xy[0]) * width / input, f64::from(xy[1]) * height / input))
        .collect()
}
