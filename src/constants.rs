//! Constants used throughout the application

/// Number of facial landmarks produced by the landmark model
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Landmark index range of the eye on the image-left side (68-point layout)
pub const LEFT_EYE_LANDMARKS: std::ops::Range<usize> = 36..42;

/// Landmark index range of the eye on the image-right side (68-point layout)
pub const RIGHT_EYE_LANDMARKS: std::ops::Range<usize> = 42..48;

/// Default number of signals kept by the temporal smoother
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Offset added to the viewer distance so the near plane clips the screen face
pub const NEAR_PLANE_EPSILON: f64 = 0.001;

/// Viewer distance used before the first detection
pub const DEFAULT_VIEWER_DISTANCE: f64 = 1.0;

/// Default far plane distance
pub const DEFAULT_FAR_PLANE: f64 = 100.0;

/// Default display refresh rate
pub const DEFAULT_FPS: u32 = 60;

/// Factory calibration defaults, tuned for a 640x480 capture
pub const DEFAULT_OFFSET_X_BIAS: f64 = 320.0;
pub const DEFAULT_OFFSET_Y_BIAS: f64 = 240.0;
pub const DEFAULT_WIDTH_BIAS: f64 = 640.0;
pub const DEFAULT_HEIGHT_BIAS: f64 = 640.0;
pub const DEFAULT_DEPTH_BIAS: f64 = 250.0;

/// Debug overlay marker sizes in display pixels
pub const EYE_MARKER_SIZE: f64 = 5.0;
pub const EYE_MIDDLE_MARKER_SIZE: f64 = 10.0;

/// Image normalization constants for face detection
pub const IMAGE_NORMALIZATION_OFFSET: f32 = 127.5;
pub const IMAGE_NORMALIZATION_SCALE: f32 = 128.0;
