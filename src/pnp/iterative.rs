use super::{reprojection_error, CameraIntrinsics, PnpSolution, PnpSolver};
use crate::{constants::EPSILON, Error, Result};
use nalgebra::{
    DMatrix, DVector, Matrix3, Matrix3x4, Matrix4, Point2, Point3, Rotation3, SymmetricEigen, UnitQuaternion, Vector2,
    Vector3, Vector4,
};
use std::f64::consts::PI;

/// DLT needs 11 independent equations, two per correspondence
const MIN_CORRESPONDENCES: usize = 6;

/// Smallest-to-largest spread ratio below which model points count as coplanar
const COPLANARITY_THRESHOLD: f64 = 1e-6;

/// Relative singular value gap required for a unique DLT solution
const NULL_SPACE_THRESHOLD: f64 = 1e-9;

/// Default Levenberg-Marquardt iteration cap
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// Iterative `PnP`: Levenberg-Marquardt on pixel reprojection error
///
/// Refinement starts from two seeds, the normalized DLT pose and a prior with
/// the model's +z toward the camera and +y up in the image, and the solution
/// with the lower reprojection error wins.
#[derive(Debug, Clone)]
pub struct IterativePnpSolver {
    max_iterations: usize,
}

impl IterativePnpSolver {
    /// Create a solver with the given refinement iteration cap
    ///
    /// # Panics
    ///
    /// Panics if `max_iterations` is zero
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        assert!(max_iterations > 0, "Iteration count must be greater than 0");
        Self { max_iterations }
    }

    /// Closed-form pose from the normalized direct linear transform
    fn initial_pose(
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Result<(Vector3<f64>, Vector3<f64>)> {
        let count = object_points.len();
        let centroid = object_points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count as f64;
        let mean_distance =
            object_points.iter().map(|p| (p.coords - centroid).norm()).sum::<f64>() / count as f64;
        if mean_distance < EPSILON {
            return Err(Error::PoseSolveFailure("Model points collapse to a single point".to_string()));
        }
        let scale = 3f64.sqrt() / mean_distance;

        // Two equations per correspondence in normalized image coordinates
        let mut system = DMatrix::<f64>::zeros(2 * count, 12);
        for (i, (object, image)) in object_points.iter().zip(image_points).enumerate() {
            let p = (object.coords - centroid) * scale;
            let homogeneous = [p.x, p.y, p.z, 1.0];
            let observed = intrinsics.normalize(image);
            for (j, &value) in homogeneous.iter().enumerate() {
                system[(2 * i, j)] = value;
                system[(2 * i, 8 + j)] = -observed.x * value;
                system[(2 * i + 1, 4 + j)] = value;
                system[(2 * i + 1, 8 + j)] = -observed.y * value;
            }
        }

        let svd = system.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| Error::PoseSolveFailure("DLT decomposition failed".to_string()))?;
        let singular = &svd.singular_values;
        let mut order: Vec<usize> = (0..singular.len()).collect();
        order.sort_by(|&a, &b| singular[a].total_cmp(&singular[b]));
        let (smallest, second, largest) = (order[0], order[1], order[order.len() - 1]);
        if singular[second] <= NULL_SPACE_THRESHOLD * singular[largest] {
            return Err(Error::PoseSolveFailure(
                "Correspondences do not determine a unique projection".to_string(),
            ));
        }

        let coefficients: Vec<f64> = v_t.row(smallest).iter().copied().collect();
        let normalized_projection = Matrix3x4::from_row_slice(&coefficients);

        // Undo the model point normalization
        let mut denormalize = Matrix4::identity() * scale;
        denormalize[(3, 3)] = 1.0;
        for row in 0..3 {
            denormalize[(row, 3)] = -scale * centroid[row];
        }
        let mut projection = normalized_projection * denormalize;

        // Null vector sign is arbitrary; the model must sit in front of the camera
        let depth = (projection * Vector4::new(centroid.x, centroid.y, centroid.z, 1.0)).z;
        if depth < 0.0 {
            projection = -projection;
        }

        let linear = projection.fixed_view::<3, 3>(0, 0).into_owned();
        let decomposition = linear.svd(true, true);
        let (Some(u), Some(v_t)) = (decomposition.u, decomposition.v_t) else {
            return Err(Error::PoseSolveFailure("Rotation decomposition failed".to_string()));
        };
        let mut rotation = u * v_t;
        if rotation.determinant() < 0.0 {
            // Nearest proper rotation flips the weakest singular direction
            let mut flip = Matrix3::identity();
            let weakest = decomposition.singular_values.imin();
            flip[(weakest, weakest)] = -1.0;
            rotation = u * flip * v_t;
        }

        let magnitude = decomposition.singular_values.sum() / 3.0;
        if magnitude < EPSILON {
            return Err(Error::PoseSolveFailure("Projection scale vanished".to_string()));
        }
        let translation = projection.column(3).into_owned() / magnitude;

        let orientation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rotation));
        Ok((orientation.scaled_axis(), translation))
    }

    /// Facing pose whose depth and offset match the spread and centroid of
    /// the image points; `None` if either point set has no spread
    fn facing_prior(
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
    ) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let rotation = Vector3::new(PI, 0.0, 0.0);
        let orientation = Rotation3::from_scaled_axis(rotation);
        let count = object_points.len() as f64;

        let rotated: Vec<Vector3<f64>> = object_points.iter().map(|p| orientation * p.coords).collect();
        let model_centroid = rotated.iter().fold(Vector3::zeros(), |acc, p| acc + p) / count;
        let image_centroid = image_points.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords) / count;
        let model_spread = rotated.iter().map(|p| (p - model_centroid).xy().norm()).sum::<f64>() / count;
        let image_spread = image_points.iter().map(|p| (p.coords - image_centroid).norm()).sum::<f64>() / count;
        if model_spread < EPSILON || image_spread < EPSILON {
            return None;
        }

        let depth = 0.5 * (intrinsics.focal_x + intrinsics.focal_y) * model_spread / image_spread;
        let translation = Vector3::new(
            (image_centroid.x - intrinsics.center_x) * depth / intrinsics.focal_x - model_centroid.x,
            (image_centroid.y - intrinsics.center_y) * depth / intrinsics.focal_y - model_centroid.y,
            depth - model_centroid.z,
        );
        Some((rotation, translation))
    }

    /// Levenberg-Marquardt refinement of (rotation vector, translation)
    fn refine(
        &self,
        object_points: &[Point3<f64>],
        image_points: &[Point2<f64>],
        intrinsics: &CameraIntrinsics,
        rotation: Vector3<f64>,
        translation: Vector3<f64>,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let evaluate = |params: &DVector<f64>| residuals(params, object_points, image_points, intrinsics);

        let mut params = DVector::from_vec(vec![
            rotation.x,
            rotation.y,
            rotation.z,
            translation.x,
            translation.y,
            translation.z,
        ]);
        let mut residual = evaluate(&params);
        let mut cost = residual.norm_squared();
        let mut damping = 1e-3;

        for _ in 0..self.max_iterations {
            let jacobian = numeric_jacobian(&params, &residual, &evaluate);
            let jacobian_t = jacobian.transpose();
            let hessian = &jacobian_t * &jacobian;
            let gradient = &jacobian_t * &residual;
            if gradient.amax() < 1e-12 {
                break;
            }

            let mut improved = false;
            let mut converged = false;
            while damping < 1e12 {
                let mut augmented = hessian.clone();
                for i in 0..6 {
                    augmented[(i, i)] += damping * hessian[(i, i)].max(1e-12);
                }
                let Some(cholesky) = augmented.cholesky() else {
                    damping *= 10.0;
                    continue;
                };
                let step = cholesky.solve(&(-&gradient));
                let candidate = &params + &step;
                let candidate_residual = evaluate(&candidate);
                let candidate_cost = candidate_residual.norm_squared();

                if candidate_cost.is_finite() && candidate_cost < cost {
                    converged = step.norm() < 1e-12 * (params.norm() + 1e-12);
                    params = candidate;
                    residual = candidate_residual;
                    cost = candidate_cost;
                    damping = (damping / 10.0).max(1e-15);
                    improved = true;
                    break;
                }
                damping *= 10.0;
            }

            if !improved || converged {
                break;
            }
        }

        (
            Vector3::new(params[0], params[1], params[2]),
            Vector3::new(params[3], params[4], params[5]),
        )
    }
}

impl Default for IterativePnpSolver {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

impl PnpSolver for IterativePnpSolver {
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
        if object_points.len() < MIN_CORRESPONDENCES {
            return Err(Error::PoseSolveFailure(format!(
                "Need at least {MIN_CORRESPONDENCES} correspondences, got {}",
                object_points.len()
            )));
        }
        if image_points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(Error::PoseSolveFailure("Non-finite image point".to_string()));
        }
        if is_coplanar(object_points) {
            return Err(Error::PoseSolveFailure("Model points are coplanar".to_string()));
        }

        let mut seeds = Vec::with_capacity(2);
        let linear_failure = match Self::initial_pose(object_points, image_points, intrinsics) {
            Ok(seed) => {
                seeds.push(seed);
                None
            }
            Err(e) => Some(e),
        };
        seeds.extend(Self::facing_prior(object_points, image_points, intrinsics));

        let mut best: Option<PnpSolution> = None;
        for (rotation, translation) in seeds {
            let (rotation, translation) = self.refine(object_points, image_points, intrinsics, rotation, translation);
            if !rotation.iter().chain(translation.iter()).all(|v| v.is_finite()) {
                continue;
            }
            let orientation = Rotation3::from_scaled_axis(rotation);
            if object_points.iter().any(|p| (orientation * p + translation).z <= EPSILON) {
                continue;
            }
            let error = reprojection_error(object_points, image_points, intrinsics, &rotation, &translation);
            if best.map_or(true, |b| error < b.reprojection_error) {
                best = Some(PnpSolution {
                    rotation,
                    translation,
                    reprojection_error: error,
                });
            }
        }

        best.ok_or_else(|| {
            linear_failure.unwrap_or_else(|| {
                Error::PoseSolveFailure("No solution with the model in front of the camera".to_string())
            })
        })
    }

    fn name(&self) -> &str {
        "IterativePnpSolver"
    }
}

/// Pixel residuals (projected minus observed), interleaved x then y
fn residuals(
    params: &DVector<f64>,
    object_points: &[Point3<f64>],
    image_points: &[Point2<f64>],
    intrinsics: &CameraIntrinsics,
) -> DVector<f64> {
    let rotation = Rotation3::from_scaled_axis(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);

    let mut residual = DVector::zeros(2 * object_points.len());
    for (i, (object, observed)) in object_points.iter().zip(image_points).enumerate() {
        let projected = intrinsics.project(&(rotation * object + translation));
        residual[2 * i] = projected.x - observed.x;
        residual[2 * i + 1] = projected.y - observed.y;
    }
    residual
}

/// Central difference Jacobian of `f` at `params`
fn numeric_jacobian<F>(params: &DVector<f64>, value: &DVector<f64>, f: &F) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut jacobian = DMatrix::zeros(value.len(), params.len());
    for j in 0..params.len() {
        let step = 1e-6 * (1.0 + params[j].abs());
        let mut forward = params.clone();
        let mut backward = params.clone();
        forward[j] += step;
        backward[j] -= step;
        let derivative = (f(&forward) - f(&backward)) / (2.0 * step);
        jacobian.set_column(j, &derivative);
    }
    jacobian
}

fn is_coplanar(points: &[Point3<f64>]) -> bool {
    let count = points.len() as f64;
    let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / count;
    let scatter = points.iter().fold(nalgebra::Matrix3::zeros(), |acc, p| {
        let d = p.coords - centroid;
        acc + d * d.transpose()
    });
    let eigen = SymmetricEigen::new(scatter);
    let max = eigen.eigenvalues.max();
    let min = eigen.eigenvalues.min();
    max <= EPSILON || min <= COPLANARITY_THRESHOLD * max
}
