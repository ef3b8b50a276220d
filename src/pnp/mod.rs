//! Perspective-n-Point solvers.
//!
//! A solver recovers the rotation and translation that map 3D model points
//! into the camera frame so that their pinhole projections land on the
//! observed 2D image points.

/// Pure `nalgebra` solver: normalized DLT followed by Levenberg-Marquardt refinement
pub mod iterative;

/// `OpenCV` `solvePnP` wrapper
#[cfg(feature = "opencv")]
pub mod opencv;

use crate::{constants::CAMERA_CENTER_FACTOR, Result};
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};

pub use iterative::IterativePnpSolver;

/// Pinhole camera intrinsics with zero lens distortion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub focal_x: f64,
    pub focal_y: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl CameraIntrinsics {
    /// Approximate intrinsics for a frame: focal length equals the frame
    /// width and the principal point sits at the frame center
    #[must_use]
    pub fn from_frame_size(width: u32, height: u32) -> Self {
        let focal_length = f64::from(width);
        Self {
            focal_x: focal_length,
            focal_y: focal_length,
            center_x: f64::from(width) / CAMERA_CENTER_FACTOR,
            center_y: f64::from(height) / CAMERA_CENTER_FACTOR,
        }
    }

    /// Camera matrix K
    #[must_use]
    #[rustfmt::skip]
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.focal_x, 0.0, self.center_x,
            0.0, self.focal_y, self.center_y,
            0.0, 0.0, 1.0,
        )
    }

    /// Project a point already expressed in camera coordinates
    #[must_use]
    pub fn project(&self, point: &Point3<f64>) -> Point2<f64> {
        Point2::new(
            self.focal_x * point.x / point.z + self.center_x,
            self.focal_y * point.y / point.z + self.center_y,
        )
    }

    /// Map a pixel to normalized image coordinates
    #[must_use]
    pub fn normalize(&self, pixel: &Point2<f64>) -> Point2<f64> {
        Point2::new(
            (pixel.x - self.center_x) / self.focal_x,
            (pixel.y - self.center_y) / self.focal_y,
        )
    }
}

/// Rotation vector and translation recovered by a solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PnpSolution {
    /// Axis-angle rotation, model to camera
    pub rotation: Vector3<f64>,
    /// Model origin in camera coordinates
    pub translation: Vector3<f64>,
    /// Root-mean-square reprojection error in pixels
    pub reprojection_error: f64,
}

/// A Perspective-n-Point capability
pub trait PnpSolver: Send {
    /// Solve for the pose mapping `object_points` onto `image_points`
    ///
    /// # Errors
    ///
    /// Returns `PoseSolveFailure` if the correspondences are too few,
    /// degenerate, or the solution is unusable
    fn solve(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PnpSolution>;

    /// Get solver name
    fn name(&self) -> &str;
}

/// Root-mean-square pixel error of projecting `object_points` with the given pose
#[must_use]
pub fn reprojection_error(
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
    rotation: &Vector3<f64>,
    translation: &Vector3<f64>,
) -> f64 {
    if object_points.is_empty() {
        return 0.0;
    }
    let rotation = Rotation3::from_scaled_axis(*rotation);
    let squared: f64 = object_points
        .iter()
        .zip(image_points)
        .map(|(object, observed)| {
            let camera = rotation * object + *translation;
            nalgebra::distance_squared(&intrinsics.project(&camera), observed)
        })
        .sum();
    (squared / object_points.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_from_frame() {
        let k = CameraIntrinsics::from_frame_size(640, 480);
        assert_eq!(k.focal_x, 640.0);
        assert_eq!(k.focal_y, 640.0);
        assert_eq!(k.center_x, 320.0);
        assert_eq!(k.center_y, 240.0);
        assert_eq!(k.matrix()[(0, 2)], 320.0);
        assert_eq!(k.matrix()[(2, 2)], 1.0);
    }

    #[test]
    fn test_project_and_normalize() {
        let k = CameraIntrinsics::from_frame_size(640, 480);
        let pixel = k.project(&Point3::new(100.0, -50.0, 1000.0));
        assert!((pixel.x - 384.0).abs() < 1e-12);
        assert!((pixel.y - 208.0).abs() < 1e-12);
        let normalized = k.normalize(&pixel);
        assert!((normalized.x - 0.1).abs() < 1e-12);
        assert!((normalized.y + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_reprojection_error_zero_for_exact_pose() {
        let k = CameraIntrinsics::from_frame_size(640, 480);
        let objects = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 20.0, 30.0)];
        let translation = Vector3::new(0.0, 0.0, 500.0);
        let images: Vec<_> = objects
            .iter()
            .map(|p| k.project(&Point3::from(p.coords + translation)))
            .collect();
        let error = reprojection_error(&objects, &images, &k, &Vector3::zeros(), &translation);
        assert!(error < 1e-12);
    }
}
