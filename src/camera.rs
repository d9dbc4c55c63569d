//! Off-axis camera control for head-coupled perspective.
//!
//! The virtual screen sits at the near plane. The field of view is chosen
//! so the near-plane half height at the eye's distance equals half the
//! normalized viewport height, and the view offset shears the frustum
//! against the eye point. The near rectangle keeps its size as the eye
//! moves; it stays fixed in place only for square viewports, since the
//! offset is applied in units of the full (aspect-scaled) view.

use crate::{calibration::ViewerPosition, constants};
use log::trace;
use nalgebra::{Matrix4, Vector3};

/// Asymmetric view offset, in the argument order of the renderer's setter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewOffset {
    pub full_width: f64,
    pub full_height: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Camera parameters derived from the viewer position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrustumState {
    pub position: Vector3<f64>,
    pub near: f64,
    /// Vertical field of view in degrees
    pub fov: f64,
    pub view_offset: ViewOffset,
}

/// Renderer-side camera the controller writes into
pub trait CameraRig {
    fn set_position(&mut self, position: Vector3<f64>);

    fn set_near(&mut self, near: f64);

    /// Vertical field of view in degrees
    fn set_fov(&mut self, fov_degrees: f64);

    fn set_view_offset(&mut self, offset: &ViewOffset);
}

/// Field of view (degrees) whose frustum spans a unit-height screen at distance `z`
#[must_use]
pub fn fov_for_distance(z: f64) -> f64 {
    2.0 * (0.5 / z).atan().to_degrees()
}

/// Frustum for a viewer position and a viewport aspect ratio (height / width)
#[must_use]
pub fn frustum_for(viewer: ViewerPosition, aspect_ratio: f64, near_epsilon: f64) -> CameraFrustumState {
    CameraFrustumState {
        position: viewer.to_vector(),
        near: viewer.z + near_epsilon,
        fov: fov_for_distance(viewer.z),
        view_offset: ViewOffset {
            full_width: 1.0,
            full_height: aspect_ratio,
            offset_x: -viewer.x,
            offset_y: viewer.y,
            width: 1.0,
            height: aspect_ratio,
        },
    }
}

/// Owns the camera frustum state and recomputes it every render tick
#[derive(Debug, Clone)]
pub struct OffAxisCameraController {
    near_epsilon: f64,
    state: CameraFrustumState,
}

impl OffAxisCameraController {
    /// Create a controller at the default pose for the given aspect ratio
    #[must_use]
    pub fn new(near_epsilon: f64, aspect_ratio: f64) -> Self {
        Self {
            near_epsilon,
            state: frustum_for(ViewerPosition::default(), aspect_ratio, near_epsilon),
        }
    }

    /// Recompute the frustum for this tick
    pub fn update(&mut self, viewer: ViewerPosition, aspect_ratio: f64) -> CameraFrustumState {
        self.state = frustum_for(viewer, aspect_ratio, self.near_epsilon);
        trace!("Camera frustum: {:?}", self.state);
        self.state
    }

    /// Push the current frustum into a renderer camera
    pub fn apply<R: CameraRig + ?Sized>(&self, rig: &mut R) {
        rig.set_position(self.state.position);
        rig.set_near(self.state.near);
        rig.set_view_offset(&self.state.view_offset);
        rig.set_fov(self.state.fov);
    }
}

impl Default for OffAxisCameraController {
    fn default() -> Self {
        Self::new(constants::NEAR_PLANE_EPSILON, 1.0)
    }
}

/// Perspective camera with an optional view offset.
///
/// Setting a view offset also sets the aspect to `full_width / full_height`.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vector3<f64>,
    pub near: f64,
    pub far: f64,
    pub fov: f64,
    pub aspect: f64,
    pub view: Option<ViewOffset>,
}

impl PerspectiveCamera {
    #[must_use]
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> Self {
        Self {
            position: Vector3::zeros(),
            near,
            far,
            fov,
            aspect,
            view: None,
        }
    }

    /// Projection matrix for the current parameters
    #[must_use]
    pub fn projection_matrix(&self) -> Matrix4<f64> {
        let near = self.near;
        let mut top = near * (0.5 * self.fov).to_radians().tan();
        let mut height = 2.0 * top;
        let mut width = self.aspect * height;
        let mut left = -0.5 * width;

        if let Some(view) = &self.view {
            left += view.offset_x * width / view.full_width;
            top -= view.offset_y * height / view.full_height;
            width *= view.width / view.full_width;
            height *= view.height / view.full_height;
        }

        make_perspective(left, left + width, top, top - height, near, self.far)
    }

    /// Near-plane rectangle `(left, right, bottom, top)` in world units
    #[must_use]
    pub fn near_plane_rect(&self) -> (f64, f64, f64, f64) {
        let m = self.projection_matrix();
        // Invert x = 2n/(r-l), a = (r+l)/(r-l) and the matching y terms
        let (x, a) = (m[(0, 0)], m[(0, 2)]);
        let (y, b) = (m[(1, 1)], m[(1, 2)]);
        let half_w = self.near / x;
        let half_h = self.near / y;
        let center_x = a * half_w;
        let center_y = b * half_h;
        (
            self.position.x + center_x - half_w,
            self.position.x + center_x + half_w,
            self.position.y + center_y - half_h,
            self.position.y + center_y + half_h,
        )
    }
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(50.0, 1.0, 0.1, constants::DEFAULT_FAR_PLANE)
    }
}

impl CameraRig for PerspectiveCamera {
    fn set_position(&mut self, position: Vector3<f64>) {
        self.position = position;
    }

    fn set_near(&mut self, near: f64) {
        self.near = near;
    }

    fn set_fov(&mut self, fov_degrees: f64) {
        self.fov = fov_degrees;
    }

    fn set_view_offset(&mut self, offset: &ViewOffset) {
        self.aspect = offset.full_width / offset.full_height;
        self.view = Some(*offset);
    }
}

#[rustfmt::skip]
fn make_perspective(left: f64, right: f64, top: f64, bottom: f64, near: f64, far: f64) -> Matrix4<f64> {
    let x = 2.0 * near / (right - left);
    let y = 2.0 * near / (top - bottom);
    let a = (right + left) / (right - left);
    let b = (top + bottom) / (top - bottom);
    let c = -(far + near) / (far - near);
    let d = -2.0 * far * near / (far - near);

    Matrix4::new(
        x,   0.0, a,    0.0,
        0.0, y,   b,    0.0,
        0.0, 0.0, c,    d,
        0.0, 0.0, -1.0, 0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fov_scenarios() {
        assert!((fov_for_distance(1.0) - 53.130_102).abs() < 1e-4);
        assert!((fov_for_distance(2.0) - 28.072_487).abs() < 1e-4);
    }

    #[test]
    fn test_fov_decreases_with_distance() {
        let mut previous = f64::INFINITY;
        for i in 1..200_u32 {
            let fov = fov_for_distance(f64::from(i) * 0.05);
            assert!(fov < previous);
            previous = fov;
        }
    }

    #[test]
    fn test_frustum_fields() {
        let state = frustum_for(ViewerPosition::new(0.25, -0.1, 2.0), 0.5625, 0.001);
        assert_eq!(state.position, Vector3::new(0.25, -0.1, 2.0));
        assert!((state.near - 2.001).abs() < 1e-12);
        assert_eq!(
            state.view_offset,
            ViewOffset {
                full_width: 1.0,
                full_height: 0.5625,
                offset_x: -0.25,
                offset_y: -0.1,
                width: 1.0,
                height: 0.5625,
            }
        );
    }

    #[test]
    fn test_controller_default_pose() {
        let controller = OffAxisCameraController::new(0.001, 1.0);
        let mut camera = PerspectiveCamera::default();
        controller.apply(&mut camera);
        assert_eq!(camera.position, Vector3::new(0.0, 0.0, 1.0));
        assert!((camera.fov - 53.130_102).abs() < 1e-4);
    }

    #[test]
    fn test_apply_sets_aspect_from_view_offset() {
        let mut controller = OffAxisCameraController::default();
        let state = controller.update(ViewerPosition::new(0.0, 0.0, 1.0), 0.5);

        let mut camera = PerspectiveCamera::default();
        controller.apply(&mut camera);
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(camera.near, state.near);
    }

    #[test]
    fn test_centered_viewer_is_symmetric() {
        let mut controller = OffAxisCameraController::default();
        controller.update(ViewerPosition::new(0.0, 0.0, 1.5), 1.0);

        let mut camera = PerspectiveCamera::default();
        controller.apply(&mut camera);
        let m = camera.projection_matrix();
        assert!(m[(0, 2)].abs() < 1e-12);
        assert!(m[(1, 2)].abs() < 1e-12);
    }

    #[test]
    fn test_screen_rectangle_stays_fixed() {
        let mut controller = OffAxisCameraController::default();
        let mut camera = PerspectiveCamera::default();

        for viewer in [
            ViewerPosition::new(0.0, 0.0, 1.0),
            ViewerPosition::new(0.2, 0.0, 1.0),
            ViewerPosition::new(-0.3, 0.15, 2.0),
            ViewerPosition::new(0.1, -0.2, 0.6),
        ] {
            controller.update(viewer, 1.0);
            controller.apply(&mut camera);

            let (left, right, bottom, top) = camera.near_plane_rect();
            assert!((left + 0.5).abs() < 1e-2, "left edge moved: {left}");
            assert!((right - 0.5).abs() < 1e-2, "right edge moved: {right}");
            assert!((bottom + 0.5).abs() < 1e-2, "bottom edge moved: {bottom}");
            assert!((top - 0.5).abs() < 1e-2, "top edge moved: {top}");
        }
    }

    #[test]
    fn test_wide_viewport_rectangle_keeps_size_but_shifts() {
        let mut controller = OffAxisCameraController::default();
        let mut camera = PerspectiveCamera::default();

        controller.update(ViewerPosition::new(0.0, 0.0, 1.0), 0.5625);
        controller.apply(&mut camera);
        let (left, right, bottom, top) = camera.near_plane_rect();
        assert!((left + 0.889_78).abs() < 1e-4 && (right - 0.889_78).abs() < 1e-4);
        assert!((bottom + 0.5005).abs() < 1e-4 && (top - 0.5005).abs() < 1e-4);

        controller.update(ViewerPosition::new(0.2, 0.1, 1.0), 0.5625);
        controller.apply(&mut camera);
        let (l, r, b, t) = camera.near_plane_rect();
        assert!((l + 1.045_69).abs() < 1e-4, "left {l}");
        assert!((r - 0.733_87).abs() < 1e-4, "right {r}");
        assert!((b + 0.578_46).abs() < 1e-4, "bottom {b}");
        assert!((t - 0.422_54).abs() < 1e-4, "top {t}");
        assert!(((r - l) - (right - left)).abs() < 1e-9);
        assert!(((t - b) - (top - bottom)).abs() < 1e-9);
    }
}
