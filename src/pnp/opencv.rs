use super::{reprojection_error, CameraIntrinsics, PnpSolution, PnpSolver};
use crate::{Error, Result};
use nalgebra::{Point2, Point3, Vector3};
use opencv::{calib3d, core::Mat, prelude::*};

/// `OpenCV` `solvePnP` (DLS method) without lens distortion
#[derive(Debug, Clone, Default)]
pub struct OpencvPnpSolver;

impl OpencvPnpSolver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn index(i: usize) -> Result<i32> {
        i32::try_from(i).map_err(|_| Error::InvalidInput("Index overflow".to_string()))
    }

    fn camera_matrix(intrinsics: &CameraIntrinsics) -> Result<Mat> {
        let k = intrinsics.matrix();
        let mut camera_matrix = Mat::zeros(3, 3, opencv::core::CV_64F)?.to_mat()?;
        for row in 0..3 {
            for col in 0..3 {
                *camera_matrix.at_2d_mut::<f64>(Self::index(row)?, Self::index(col)?)? = k[(row, col)];
            }
        }
        Ok(camera_matrix)
    }

    fn read_vector(mat: &Mat) -> Result<Vector3<f64>> {
        Ok(Vector3::new(
            *mat.at_2d::<f64>(0, 0)?,
            *mat.at_2d::<f64>(1, 0)?,
            *mat.at_2d::<f64>(2, 0)?,
        ))
    }
}

impl PnpSolver for OpencvPnpSolver {
    fn solve(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<PnpSolution> {
        if object_points.len() != image_points.len() {
            return Err(Error::InvalidInput(format!(
                "Got {} model points but {} image points",
                object_points.len(),
                image_points.len()
            )));
        }
        if object_points.len() < 4 {
            return Err(Error::PoseSolveFailure(format!(
                "At least 4 correspondences required, got {}",
                object_points.len()
            )));
        }

        let rows = Self::index(object_points.len())?;
        let mut object_points_mat = Mat::zeros(rows, 3, opencv::core::CV_64F)?.to_mat()?;
        let mut image_points_mat = Mat::zeros(rows, 2, opencv::core::CV_64F)?.to_mat()?;
        for (i, (object, image)) in object_points.iter().zip(image_points).enumerate() {
            let idx = Self::index(i)?;
            *object_points_mat.at_2d_mut::<f64>(idx, 0)? = object.x;
            *object_points_mat.at_2d_mut::<f64>(idx, 1)? = object.y;
            *object_points_mat.at_2d_mut::<f64>(idx, 2)? = object.z;
            *image_points_mat.at_2d_mut::<f64>(idx, 0)? = image.x;
            *image_points_mat.at_2d_mut::<f64>(idx, 1)? = image.y;
        }

        let camera_matrix = Self::camera_matrix(intrinsics)?;
        let dist_coeffs = Mat::zeros(4, 1, opencv::core::CV_64F)?.to_mat()?;
        let mut rvec = Mat::default();
        let mut tvec = Mat::default();

        let solved = calib3d::solve_pnp(
            &object_points_mat,
            &image_points_mat,
            &camera_matrix,
            &dist_coeffs,
            &mut rvec,
            &mut tvec,
            false,
            calib3d::SOLVEPNP_DLS,
        )?;
        if !solved {
            return Err(Error::PoseSolveFailure("solvePnP did not converge".to_string()));
        }

        let rotation = Self::read_vector(&rvec)?;
        let translation = Self::read_vector(&tvec)?;
        if !rotation.iter().chain(translation.iter()).all(|v| v.is_finite()) {
            return Err(Error::PoseSolveFailure("solvePnP returned a non-finite pose".to_string()));
        }

        Ok(PnpSolution {
            rotation,
            translation,
            reprojection_error: reprojection_error(object_points, image_points, intrinsics, &rotation, &translation),
        })
    }

    fn name(&self) -> &str {
        "OpencvPnpSolver"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::POSE_MODEL_POINTS;
    use nalgebra::Rotation3;

    #[test]
    fn test_solves_projected_model() {
        let intrinsics = CameraIntrinsics::from_frame_size(640, 480);
        let model: Vec<Point3<f64>> = POSE_MODEL_POINTS.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect();
        let orientation = Rotation3::from_scaled_axis(Vector3::new(2.95, 0.2, -0.05));
        let translation = Vector3::new(20.0, -30.0, 1800.0);
        let images: Vec<Point2<f64>> = model
            .iter()
            .map(|p| intrinsics.project(&(orientation * p + translation)))
            .collect();

        let solution = OpencvPnpSolver::new().solve(&model, &images, &intrinsics).unwrap();
        assert!(solution.reprojection_error < 1.0);
        assert!(solution.translation.z > 0.0);
    }
}
