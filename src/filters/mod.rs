//! Landmark stabilization filters.
//!
//! Raw landmark detections jitter from frame to frame. Each face track runs
//! its landmarks through a recursive per-axis Kalman filter followed by a
//! short moving-average window before any geometry is measured.

/// Per-axis Kalman filter over all 68 landmark coordinates
pub mod kalman;

/// Sliding window average of recent landmark sets
pub mod moving_average;

use crate::{config::FilterConfig, landmarks::LandmarkSet, Result};

pub use kalman::{AxisFilter, KalmanLandmarkFilter};
pub use moving_average::{TemporalSmoother, WarmupPolicy};

/// Trait for all landmark filters
pub trait LandmarkFilter: Send {
    /// Apply filter to a landmark set, returning the filtered set
    ///
    /// # Errors
    ///
    /// Returns an error if the filter state cannot be updated
    fn apply(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet>;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes landmarks through unchanged
pub struct NoFilter;

impl LandmarkFilter for NoFilter {
    fn apply(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet> {
        Ok(landmarks.clone())
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Ordered chain of landmark filters owned by one face track
pub struct LandmarkStabilizer {
    stages: Vec<Box<dyn LandmarkFilter>>,
}

impl LandmarkStabilizer {
    /// Kalman filter followed by the temporal smoother, as configured
    ///
    /// A disabled configuration passes raw landmarks straight through.
    #[must_use]
    pub fn from_config(config: &FilterConfig) -> Self {
        if !config.enabled {
            return Self::with_stages(vec![Box::new(NoFilter)]);
        }
        Self::with_stages(vec![
            Box::new(KalmanLandmarkFilter::new(config.process_noise, config.observation_noise)),
            Box::new(TemporalSmoother::new(config.window_size, config.warmup)),
        ])
    }

    /// Build a chain from explicit stages, applied in order
    #[must_use]
    pub fn with_stages(stages: Vec<Box<dyn LandmarkFilter>>) -> Self {
        Self { stages }
    }

    /// Run `landmarks` through every stage
    ///
    /// # Errors
    ///
    /// Returns the first stage error
    pub fn apply(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet> {
        let mut current = landmarks.clone();
        for stage in &mut self.stages {
            current = stage.apply(&current)?;
        }
        Ok(current)
    }

    /// Reset every stage
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            stage.reset();
        }
    }

    /// Stage names in application order
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn constant(value: f64) -> LandmarkSet {
        LandmarkSet::new(vec![Point2::new(value, value); 68]).unwrap()
    }

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        let input = constant(3.5);
        assert_eq!(filter.apply(&input).unwrap(), input);
    }

    #[test]
    fn test_default_chain_order() {
        let stabilizer = LandmarkStabilizer::from_config(&FilterConfig::default());
        assert_eq!(stabilizer.stage_names(), vec!["KalmanFilter", "MovingAverageFilter"]);
    }

    #[test]
    fn test_disabled_chain_passes_through() {
        let config = FilterConfig {
            enabled: false,
            ..FilterConfig::default()
        };
        let mut stabilizer = LandmarkStabilizer::from_config(&config);
        let input = constant(42.0);
        assert_eq!(stabilizer.apply(&input).unwrap(), input);
        assert_eq!(stabilizer.stage_names(), vec!["NoFilter"]);
    }

    #[test]
    fn test_chain_reset() {
        let mut stabilizer = LandmarkStabilizer::from_config(&FilterConfig::default());
        let input = constant(100.0);
        let first = stabilizer.apply(&input).unwrap();
        stabilizer.apply(&input).unwrap();
        stabilizer.reset();
        assert_eq!(stabilizer.apply(&input).unwrap(), first);
    }
}
