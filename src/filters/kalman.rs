use super::LandmarkFilter;
use crate::{constants::NUM_FACIAL_LANDMARKS, landmarks::LandmarkSet, Error, Result};
use nalgebra::{DMatrix, DVector};

/// Recursive estimator for one coordinate axis of all landmarks
///
/// Random-walk model: transition, observation and control matrices are all
/// identity, process and observation noise are scaled identities.
#[derive(Debug, Clone)]
pub struct AxisFilter {
    // State estimate, one entry per landmark
    state: DVector<f64>,
    // State covariance
    covariance: DMatrix<f64>,
    // State transition matrix
    transition: DMatrix<f64>,
    // Observation matrix
    observation: DMatrix<f64>,
    // Control matrix
    control: DMatrix<f64>,
    // Process noise
    process_noise: DMatrix<f64>,
    // Observation noise
    observation_noise: DMatrix<f64>,
    // Most recent gain
    gain: DMatrix<f64>,
}

impl AxisFilter {
    /// Create a filter over `dimension` coordinates
    ///
    /// # Panics
    ///
    /// Panics if `dimension` is zero or either noise scale is not positive
    #[must_use]
    pub fn new(dimension: usize, process_noise: f64, observation_noise: f64) -> Self {
        assert!(dimension > 0, "Dimension must be greater than 0");
        assert!(process_noise > 0.0, "Process noise must be positive");
        assert!(observation_noise > 0.0, "Observation noise must be positive");

        let identity = DMatrix::identity(dimension, dimension);
        Self {
            state: DVector::zeros(dimension),
            covariance: identity.clone(),
            transition: identity.clone(),
            observation: identity.clone(),
            control: identity.clone(),
            process_noise: &identity * process_noise,
            observation_noise: &identity * observation_noise,
            gain: DMatrix::zeros(dimension, dimension),
        }
    }

    /// Number of coordinates tracked
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.state.len()
    }

    /// Current state estimate
    #[must_use]
    pub fn state(&self) -> &DVector<f64> {
        &self.state
    }

    /// Current state covariance
    #[must_use]
    pub fn covariance(&self) -> &DMatrix<f64> {
        &self.covariance
    }

    /// Gain computed by the last update
    #[must_use]
    pub fn gain(&self) -> &DMatrix<f64> {
        &self.gain
    }

    /// Propagate state and covariance one step with control input `u`
    ///
    /// # Errors
    ///
    /// Returns an error if `u` does not match the filter dimension
    pub fn predict(&mut self, control_input: &DVector<f64>) -> Result<()> {
        self.check_len("control input", control_input)?;

        self.state = &self.transition * &self.state + &self.control * control_input;
        self.covariance = &self.transition * &self.covariance * self.transition.transpose() + &self.process_noise;
        Ok(())
    }

    /// Predict, then correct with measurement `z`
    ///
    /// # Errors
    ///
    /// Returns an error if an input does not match the filter dimension or
    /// the innovation covariance cannot be inverted
    pub fn update(&mut self, control_input: &DVector<f64>, measurement: &DVector<f64>) -> Result<()> {
        self.check_len("measurement", measurement)?;
        self.predict(control_input)?;

        // Innovation covariance
        let innovation_cov =
            &self.observation * &self.covariance * self.observation.transpose() + &self.observation_noise;
        let inverse = innovation_cov
            .try_inverse()
            .ok_or_else(|| Error::FilterError("Innovation covariance is singular".to_string()))?;

        self.gain = &self.covariance * self.observation.transpose() * inverse;

        let innovation = measurement - &self.observation * &self.state;
        self.state += &self.gain * innovation;
        self.covariance = &self.covariance - &self.gain * &self.observation * &self.covariance;
        Ok(())
    }

    /// Restore the initial state and covariance
    pub fn reset(&mut self) {
        let dimension = self.dimension();
        self.state = DVector::zeros(dimension);
        self.covariance = DMatrix::identity(dimension, dimension);
        self.gain = DMatrix::zeros(dimension, dimension);
    }

    fn check_len(&self, what: &str, vector: &DVector<f64>) -> Result<()> {
        if vector.len() == self.dimension() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Expected {what} of length {}, got {}",
                self.dimension(),
                vector.len()
            )))
        }
    }
}

/// Kalman smoothing of a landmark set, one `AxisFilter` per image axis
#[derive(Debug, Clone)]
pub struct KalmanLandmarkFilter {
    x_axis: AxisFilter,
    y_axis: AxisFilter,
    control_input: DVector<f64>,
}

impl KalmanLandmarkFilter {
    /// Create with process noise `q` and observation noise `r`
    #[must_use]
    pub fn new(process_noise: f64, observation_noise: f64) -> Self {
        Self {
            x_axis: AxisFilter::new(NUM_FACIAL_LANDMARKS, process_noise, observation_noise),
            y_axis: AxisFilter::new(NUM_FACIAL_LANDMARKS, process_noise, observation_noise),
            control_input: DVector::zeros(NUM_FACIAL_LANDMARKS),
        }
    }

    /// Filter for the x coordinates
    #[must_use]
    pub fn x_axis(&self) -> &AxisFilter {
        &self.x_axis
    }

    /// Filter for the y coordinates
    #[must_use]
    pub fn y_axis(&self) -> &AxisFilter {
        &self.y_axis
    }
}

impl LandmarkFilter for KalmanLandmarkFilter {
    fn apply(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet> {
        self.x_axis.update(&self.control_input, &landmarks.xs())?;
        self.y_axis.update(&self.control_input, &landmarks.ys())?;
        LandmarkSet::from_axes(self.x_axis.state(), self.y_axis.state())
    }

    fn reset(&mut self) {
        self.x_axis.reset();
        self.y_axis.reset();
    }

    fn name(&self) -> &str {
        "KalmanFilter"
    }
}
