use super::{
    geometry::{non_max_suppression, FaceCandidate},
    load_session,
};
use crate::{
    constants::{IMAGE_NORMALIZATION_OFFSET, IMAGE_NORMALIZATION_SCALE},
    detection::BoundingBox,
    Error, Result,
};
use ndarray::{Array4, CowArray};
use opencv::core::{Mat, Rect, Scalar, Size, Vec3f, CV_32F, CV_8UC3};
use opencv::imgproc::{self, InterpolationFlags};
use opencv::prelude::*;
use ort::{Session, Value};
use std::path::Path;

/// Default SCRFD input size
const DEFAULT_INPUT_SIZE: i32 = 640;

/// Output layout of an SCRFD model variant
#[derive(Debug, Clone, PartialEq)]
struct HeadLayout {
    /// Index distance between the score and box outputs of one stride
    offset: usize,
    strides: Vec<usize>,
    anchors_per_cell: usize,
}

impl HeadLayout {
    fn for_output_count(count: usize) -> Self {
        match count {
            10 | 15 => Self {
                offset: 5,
                strides: vec![8, 16, 32, 64, 128],
                anchors_per_cell: 1,
            },
            6 | 9 => Self {
                offset: 3,
                strides: vec![8, 16, 32],
                anchors_per_cell: 2,
            },
            _ => {
                log::warn!("Unknown face detector layout with {count} outputs, assuming 3 strides");
                Self {
                    offset: 3,
                    strides: vec![8, 16, 32],
                    anchors_per_cell: 2,
                }
            }
        }
    }

    /// Anchor center of anchor `index` on a grid `grid_width` cells wide
    fn anchor_center(&self, index: usize, grid_width: usize, stride: usize) -> (f32, f32) {
        let cell = index / self.anchors_per_cell;
        ((cell % grid_width * stride) as f32, (cell / grid_width * stride) as f32)
    }
}

/// SCRFD face detector using ONNX Runtime
pub struct FaceDetector {
    session: Session,
    layout: HeadLayout,
    input_size: (i32, i32),
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl FaceDetector {
    /// Load the detector model
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be loaded or has no inputs
    pub fn new<P: AsRef<Path>>(model_path: P, confidence_threshold: f32, iou_threshold: f32) -> Result<Self> {
        let session = load_session("face_detector", model_path.as_ref())?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| Error::ModelError("Face detector has no inputs".to_string()))?;
        #[allow(clippy::cast_possible_wrap)]
        let input_size = match input.dimensions.as_slice() {
            [_, _, height, width, ..] => (
                width.map_or(DEFAULT_INPUT_SIZE, |w| w as i32),
                height.map_or(DEFAULT_INPUT_SIZE, |h| h as i32),
            ),
            _ => (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE),
        };

        let layout = HeadLayout::for_output_count(session.outputs.len());
        log::debug!("Face detector input {input_size:?}, layout {layout:?}");

        Ok(Self {
            session,
            layout,
            input_size,
            confidence_threshold,
            iou_threshold,
        })
    }

    /// Detect faces in a BGR frame, best first
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails
    pub fn detect(&self, image: &Mat) -> Result<Vec<FaceCandidate>> {
        let (input, det_scale) = self.letterbox(image)?;
        let tensor = Self::to_tensor(&input)?;
        let candidates = self.forward(tensor, det_scale)?;
        Ok(non_max_suppression(candidates, f64::from(self.iou_threshold)))
    }

    /// Resize into the model input keeping the aspect ratio, padding bottom-right
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn letterbox(&self, image: &Mat) -> Result<(Mat, f32)> {
        let (input_width, input_height) = self.input_size;
        let image_ratio = image.rows() as f32 / image.cols() as f32;
        let model_ratio = input_height as f32 / input_width as f32;

        let (new_width, new_height) = if image_ratio > model_ratio {
            ((input_height as f32 / image_ratio) as i32, input_height)
        } else {
            (input_width, (input_width as f32 * image_ratio) as i32)
        };
        let det_scale = new_height as f32 / image.rows() as f32;

        let mut resized = Mat::default();
        imgproc::resize(
            image,
            &mut resized,
            Size::new(new_width, new_height),
            0.0,
            0.0,
            InterpolationFlags::INTER_LINEAR as i32,
        )?;

        let mut padded = Mat::new_rows_cols_with_default(input_height, input_width, CV_8UC3, Scalar::all(0.0))?;
        let mut roi = padded.roi_mut(Rect::new(0, 0, new_width, new_height))?;
        resized.copy_to(&mut roi)?;

        Ok((padded, det_scale))
    }

    /// BGR 8-bit image to normalized RGB NCHW tensor
    #[allow(clippy::cast_sign_loss)]
    fn to_tensor(image: &Mat) -> Result<Array4<f32>> {
        let mut rgb = Mat::default();
        imgproc::cvt_color(image, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let mut float_image = Mat::default();
        rgb.convert_to(&mut float_image, CV_32F, 1.0, 0.0)?;

        let height = float_image.rows() as usize;
        let width = float_image.cols() as usize;
        let pixels = float_image.data_typed::<Vec3f>()?;

        Ok(Array4::from_shape_fn((1, 3, height, width), |(_, c, y, x)| {
            (pixels[y * width + x][c] - IMAGE_NORMALIZATION_OFFSET) / IMAGE_NORMALIZATION_SCALE
        }))
    }

    #[allow(clippy::cast_sign_loss)]
    fn forward(&self, tensor: Array4<f32>, det_scale: f32) -> Result<Vec<FaceCandidate>> {
        let input_height = self.input_size.1 as usize;
        let input_width = self.input_size.0 as usize;

        let input = CowArray::from(tensor.into_dyn());
        let outputs = self
            .session
            .run(vec![Value::from_array(self.session.allocator(), &input)?])?;

        let mut candidates = Vec::new();
        for (idx, &stride) in self.layout.strides.iter().enumerate() {
            let (Some(score_output), Some(box_output)) = (outputs.get(idx), outputs.get(idx + self.layout.offset))
            else {
                return Err(Error::ModelOutputError(format!("Missing outputs for stride {stride}")));
            };

            let scores_tensor = score_output.try_extract::<f32>()?;
            let scores = scores_tensor.view();
            let boxes_tensor = box_output.try_extract::<f32>()?;
            let distances: Vec<f32> = boxes_tensor.view().iter().copied().collect();

            let grid_width = input_width / stride;
            let grid_cells = grid_width * (input_height / stride) * self.layout.anchors_per_cell;

            for (index, &score) in scores.iter().enumerate().take(grid_cells) {
                if score < self.confidence_threshold {
                    continue;
                }
                let Some(d) = distances.get(index * 4..index * 4 + 4) else {
                    break;
                };

                let (cx, cy) = self.layout.anchor_center(index, grid_width, stride);
                let s = stride as f32;
                let x1 = (cx - d[0] * s) / det_scale;
                let y1 = (cy - d[1] * s) / det_scale;
                let x2 = (cx + d[2] * s) / det_scale;
                let y2 = (cy + d[3] * s) / det_scale;

                candidates.push(FaceCandidate {
                    bbox: BoundingBox::new(
                        f64::from(x1),
                        f64::from(y1),
                        f64::from(x2 - x1),
                        f64::from(y2 - y1),
                    ),
                    score,
                });
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_for_known_models() {
        let five = HeadLayout::for_output_count(15);
        assert_eq!(five.offset, 5);
        assert_eq!(five.strides.len(), 5);

        let three = HeadLayout::for_output_count(6);
        assert_eq!(three.anchors_per_cell, 2);
    }

    #[test]
    fn test_anchor_centers_repeat_per_cell() {
        let layout = HeadLayout::for_output_count(9);
        assert_eq!(layout.anchor_center(0, 80, 8), (0.0, 0.0));
        assert_eq!(layout.anchor_center(1, 80, 8), (0.0, 0.0));
        assert_eq!(layout.anchor_center(2, 80, 8), (8.0, 0.0));
        assert_eq!(layout.anchor_center(160, 80, 8), (0.0, 8.0));
    }
}
