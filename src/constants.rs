//! Constants used throughout the application

/// Number of facial landmarks for full face
pub const NUM_FACIAL_LANDMARKS: usize = 68;

/// Numeric precision epsilon used by the geometry guards
pub const EPSILON: f64 = 1e-10;

/// Camera matrix center factor
pub const CAMERA_CENTER_FACTOR: f64 = 2.0;

/// Default recursive filter noise parameters
pub const DEFAULT_PROCESS_NOISE: f64 = 1.0;
pub const DEFAULT_OBSERVATION_NOISE: f64 = 10.0;

/// Default temporal smoothing window length
pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

/// Default telemetry destination
pub const DEFAULT_TELEMETRY_HOST: &str = "127.0.0.1";
pub const DEFAULT_TELEMETRY_PORT: u16 = 5065;

/// Number of ':'-separated fields in a telemetry message
pub const TELEMETRY_FIELD_COUNT: usize = 15;

/// Decimal places kept for quaternion components on the wire
pub const QUATERNION_DECIMALS: i32 = 4;

/// Landmark indices (iBUG 68-point scheme). Left and right refer to the image side.
pub mod landmark {
    pub const JAW_START: usize = 0;
    pub const LEFT_HEAD_CORNER: usize = 1;
    pub const CHIN: usize = 8;
    pub const RIGHT_HEAD_CORNER: usize = 15;
    pub const JAW_END: usize = 16;
    pub const LEFT_BROW_UPPER: usize = 19;
    pub const LEFT_BROW_INNER: usize = 21;
    pub const RIGHT_BROW_INNER: usize = 22;
    pub const RIGHT_BROW_UPPER: usize = 24;
    pub const NOSE_BRIDGE: usize = 27;
    pub const NOSE_TIP: usize = 30;
    pub const LEFT_EYE_OUTER: usize = 36;
    pub const LEFT_EYE_UPPER_OUTER: usize = 37;
    pub const LEFT_EYE_UPPER_INNER: usize = 38;
    pub const LEFT_EYE_LOWER_INNER: usize = 40;
    pub const LEFT_EYE_LOWER_OUTER: usize = 41;
    pub const RIGHT_EYE_UPPER_INNER: usize = 43;
    pub const RIGHT_EYE_UPPER_OUTER: usize = 44;
    pub const RIGHT_EYE_OUTER: usize = 45;
    pub const RIGHT_EYE_LOWER_OUTER: usize = 46;
    pub const RIGHT_EYE_LOWER_INNER: usize = 47;
    pub const OUTER_LIP_TOP: usize = 51;
    pub const OUTER_LIP_BOTTOM: usize = 57;
    pub const INNER_LIP_LEFT: usize = 60;
    pub const INNER_LIP_RIGHT: usize = 64;
}

/// Landmark indices of the six `PnP` anchors, in model point order
pub const POSE_ANCHOR_INDICES: [usize; 6] = [
    landmark::NOSE_TIP,
    landmark::CHIN,
    landmark::LEFT_EYE_OUTER,
    landmark::RIGHT_EYE_OUTER,
    landmark::LEFT_HEAD_CORNER,
    landmark::RIGHT_HEAD_CORNER,
];

/// Canonical 3D face model in millimetres, matching `POSE_ANCHOR_INDICES`
pub const POSE_MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-349.0, 85.0, -300.0],
    [349.0, 85.0, -300.0],
];
