//! Axis-angle to quaternion conversion.

use crate::constants::{EPSILON, QUATERNION_DECIMALS};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Unit quaternion in (w, x, y, z) order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    /// The identity rotation
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Convert a rotation vector (axis scaled by angle in radians)
    ///
    /// Rotation angles below epsilon map to the identity instead of dividing
    /// by a vanishing norm.
    #[must_use]
    pub fn from_rotation_vector(rotation: &Vector3<f64>) -> Self {
        let theta = rotation.norm();
        if !theta.is_finite() || theta < EPSILON {
            return Self::IDENTITY;
        }

        let half = theta / 2.0;
        let scale = half.sin() / theta;
        Self {
            w: half.cos(),
            x: scale * rotation.x,
            y: scale * rotation.y,
            z: scale * rotation.z,
        }
    }

    /// Euclidean norm of the four components
    #[must_use]
    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Components rounded to the telemetry wire precision
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            w: round_to(self.w, QUATERNION_DECIMALS),
            x: round_to(self.x, QUATERNION_DECIMALS),
            y: round_to(self.y, QUATERNION_DECIMALS),
            z: round_to(self.z, QUATERNION_DECIMALS),
        }
    }

    /// Components in (w, x, y, z) order
    #[must_use]
    pub fn to_array(&self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Round `value` to `decimals` decimal places
#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
