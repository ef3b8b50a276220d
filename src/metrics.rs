//! Facial expression metrics derived from smoothed landmarks.
//!
//! Every metric is a pairwise landmark distance normalized by a reference
//! distance that is largely insensitive to head rotation: the mean of the
//! brow-to-chin length and the jaw width.

use crate::{
    constants::{landmark, EPSILON},
    landmarks::LandmarkSet,
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// Eight normalized expression ratios
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacialMetrics {
    pub left_eye_width: f64,
    pub right_eye_width: f64,
    pub mouth_width: f64,
    pub mouth_length: f64,
    pub left_eyebrow_lift: f64,
    pub right_eyebrow_lift: f64,
    pub left_frown: f64,
    pub right_frown: f64,
}

impl FacialMetrics {
    /// Metrics in wire order
    #[must_use]
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.left_eye_width,
            self.right_eye_width,
            self.mouth_width,
            self.mouth_length,
            self.left_eyebrow_lift,
            self.right_eyebrow_lift,
            self.left_frown,
            self.right_frown,
        ]
    }

    /// Build from values in wire order
    #[must_use]
    pub fn from_array(values: [f64; 8]) -> Self {
        let [left_eye_width, right_eye_width, mouth_width, mouth_length, left_eyebrow_lift, right_eyebrow_lift, left_frown, right_frown] =
            values;
        Self {
            left_eye_width,
            right_eye_width,
            mouth_width,
            mouth_length,
            left_eyebrow_lift,
            right_eyebrow_lift,
            left_frown,
            right_frown,
        }
    }
}

/// Rotation-insensitive normalizer: mean of brow-to-chin length and face width
#[must_use]
pub fn reference_distance(landmarks: &LandmarkSet) -> f64 {
    let face_length = landmarks.distance(landmark::NOSE_BRIDGE, landmark::CHIN);
    let face_width = landmarks.distance(landmark::JAW_START, landmark::JAW_END);
    (face_length + face_width) / 2.0
}

/// Compute the expression metrics of a smoothed landmark set
///
/// # Errors
///
/// Returns `DegenerateGeometry` if the reference distance is not above
/// epsilon or any metric comes out non-finite
pub fn extract_metrics(landmarks: &LandmarkSet) -> Result<FacialMetrics> {
    let d_ref = reference_distance(landmarks);
    if !d_ref.is_finite() || d_ref <= EPSILON {
        return Err(Error::DegenerateGeometry(format!(
            "Reference distance {d_ref} is too small"
        )));
    }

    let d = |a: usize, b: usize| landmarks.distance(a, b);

    let left_eye = d(landmark::LEFT_EYE_UPPER_OUTER, landmark::LEFT_EYE_LOWER_OUTER)
        + d(landmark::LEFT_EYE_UPPER_INNER, landmark::LEFT_EYE_LOWER_INNER);
    let right_eye = d(landmark::RIGHT_EYE_UPPER_INNER, landmark::RIGHT_EYE_LOWER_INNER)
        + d(landmark::RIGHT_EYE_UPPER_OUTER, landmark::RIGHT_EYE_LOWER_OUTER);

    let metrics = FacialMetrics {
        left_eye_width: (left_eye / (2.0 * d_ref) - 0.02) * 6.0,
        right_eye_width: (right_eye / (2.0 * d_ref) - 0.02) * 6.0,
        mouth_width: (d(landmark::OUTER_LIP_TOP, landmark::OUTER_LIP_BOTTOM) / d_ref - 0.13) * 1.27 + 0.02,
        mouth_length: d(landmark::INNER_LIP_LEFT, landmark::INNER_LIP_RIGHT) / d_ref,
        left_eyebrow_lift: d(landmark::RIGHT_BROW_UPPER, landmark::RIGHT_EYE_UPPER_OUTER).sqrt() / d_ref,
        right_eyebrow_lift: d(landmark::LEFT_BROW_UPPER, landmark::LEFT_EYE_UPPER_OUTER).sqrt() / d_ref,
        left_frown: d(landmark::LEFT_BROW_INNER, landmark::NOSE_BRIDGE).sqrt() / d_ref,
        right_frown: d(landmark::RIGHT_BROW_INNER, landmark::NOSE_BRIDGE).sqrt() / d_ref,
    };

    if metrics.to_array().iter().all(|v| v.is_finite()) {
        Ok(metrics)
    } else {
        Err(Error::DegenerateGeometry("Non-finite facial metric".to_string()))
    }
}
