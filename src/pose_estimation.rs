use crate::{
    config::{PoseConfig, SolverKind},
    constants::{POSE_ANCHOR_INDICES, POSE_MODEL_POINTS},
    landmarks::LandmarkSet,
    pnp::{CameraIntrinsics, IterativePnpSolver, PnpSolver},
    Result,
};
use nalgebra::{Point2, Point3, Vector3};

/// Outcome of one pose solve
///
/// `rotation` and `translation` are only meaningful when `success` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseEstimate {
    /// Axis-angle rotation of the head model in camera coordinates
    pub rotation: Vector3<f64>,
    /// Head model origin (nose tip) in camera coordinates, millimetres
    pub translation: Vector3<f64>,
    pub success: bool,
    /// RMS pixel error of the six anchors
    pub reprojection_error: f64,
}

impl PoseEstimate {
    /// A failed estimate carrying no usable pose
    #[must_use]
    pub fn failed() -> Self {
        Self {
            rotation: Vector3::zeros(),
            translation: Vector3::zeros(),
            success: false,
            reprojection_error: f64::INFINITY,
        }
    }
}

/// Head pose estimator using `PnP` on six anatomical anchors
pub struct PoseEstimator {
    model_points: Vec<Point3<f64>>,
    intrinsics: CameraIntrinsics,
    solver: Box<dyn PnpSolver>,
    max_reprojection_error: f64,
}

impl PoseEstimator {
    /// Create a pose estimator for frames of the given size
    #[must_use]
    pub fn new(solver: Box<dyn PnpSolver>, image_width: u32, image_height: u32, max_reprojection_error: f64) -> Self {
        log::info!(
            "Initializing PoseEstimator with {} for {}x{} frames",
            solver.name(),
            image_width,
            image_height
        );
        Self {
            model_points: POSE_MODEL_POINTS.iter().map(|p| Point3::new(p[0], p[1], p[2])).collect(),
            intrinsics: CameraIntrinsics::from_frame_size(image_width, image_height),
            solver,
            max_reprojection_error,
        }
    }

    /// Create a pose estimator with the configured solver
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configured solver is not compiled in
    pub fn from_config(config: &PoseConfig, image_width: u32, image_height: u32) -> Result<Self> {
        let solver = create_solver(config)?;
        Ok(Self::new(solver, image_width, image_height, config.max_reprojection_error))
    }

    /// Camera intrinsics in use
    #[must_use]
    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Canonical 3D head model, in anchor order
    #[must_use]
    pub fn model_points(&self) -> &[Point3<f64>] {
        &self.model_points
    }

    /// The six 2D anchors of a landmark set, in model point order
    #[must_use]
    pub fn anchor_points(landmarks: &LandmarkSet) -> Vec<Point2<f64>> {
        POSE_ANCHOR_INDICES.iter().map(|&i| landmarks[i]).collect()
    }

    /// Estimate head pose from a smoothed landmark set
    ///
    /// Solver errors and solutions exceeding the reprojection bound both
    /// produce an estimate with `success == false`.
    #[must_use]
    pub fn estimate(&self, landmarks: &LandmarkSet) -> PoseEstimate {
        let image_points = Self::anchor_points(landmarks);
        match self.solver.solve(&self.model_points, &image_points, &self.intrinsics) {
            Ok(solution) if solution.reprojection_error <= self.max_reprojection_error => PoseEstimate {
                rotation: solution.rotation,
                translation: solution.translation,
                success: true,
                reprojection_error: solution.reprojection_error,
            },
            Ok(solution) => {
                log::debug!(
                    "Rejecting pose with reprojection error {:.2}px (limit {:.2}px)",
                    solution.reprojection_error,
                    self.max_reprojection_error
                );
                PoseEstimate {
                    success: false,
                    reprojection_error: solution.reprojection_error,
                    ..PoseEstimate::failed()
                }
            }
            Err(e) => {
                log::debug!("Pose solve failed: {e}");
                PoseEstimate::failed()
            }
        }
    }
}

/// Build the configured `PnP` solver
///
/// # Errors
///
/// Returns `ConfigError` if the `opencv` solver is requested without the feature
pub fn create_solver(config: &PoseConfig) -> Result<Box<dyn PnpSolver>> {
    match config.solver {
        SolverKind::Iterative => Ok(Box::new(IterativePnpSolver::new(config.max_iterations))),
        #[cfg(feature = "opencv")]
        SolverKind::Opencv => Ok(Box::new(crate::pnp::opencv::OpencvPnpSolver::new())),
        #[cfg(not(feature = "opencv"))]
        SolverKind::Opencv => Err(crate::Error::ConfigError(
            "The opencv solver requires building with the `opencv` feature".to_string(),
        )),
    }
}
