use super::LandmarkFilter;
use crate::{landmarks::LandmarkSet, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How the window is averaged before it has been filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmupPolicy {
    /// Empty slots hold zero landmark sets and count toward the mean, so early
    /// outputs are pulled toward the origin until the window is full
    #[default]
    ZeroFilled,
    /// Only landmark sets pushed so far are averaged
    OccupiedOnly,
}

/// Sliding window average over the most recent landmark sets
#[derive(Debug, Clone)]
pub struct TemporalSmoother {
    window_size: usize,
    policy: WarmupPolicy,
    window: VecDeque<LandmarkSet>,
}

impl TemporalSmoother {
    /// Create a smoother holding `window_size` landmark sets
    ///
    /// # Panics
    ///
    /// Panics if `window_size` is zero
    #[must_use]
    pub fn new(window_size: usize, policy: WarmupPolicy) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        let mut smoother = Self {
            window_size,
            policy,
            window: VecDeque::with_capacity(window_size),
        };
        smoother.fill();
        smoother
    }

    /// Window capacity
    #[must_use]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Number of slots currently contributing to the mean
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// True if no slot contributes to the mean
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Evict the oldest set, append `landmarks`, and return the elementwise mean
    pub fn push(&mut self, landmarks: LandmarkSet) -> LandmarkSet {
        if self.window.len() >= self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(landmarks);
        self.mean()
    }

    fn mean(&self) -> LandmarkSet {
        // The window always holds the set just pushed
        LandmarkSet::mean(&self.window).unwrap_or_else(LandmarkSet::zeros)
    }

    fn fill(&mut self) {
        if self.policy == WarmupPolicy::ZeroFilled {
            while self.window.len() < self.window_size {
                self.window.push_back(LandmarkSet::zeros());
            }
        }
    }
}

impl LandmarkFilter for TemporalSmoother {
    fn apply(&mut self, landmarks: &LandmarkSet) -> Result<LandmarkSet> {
        Ok(self.push(landmarks.clone()))
    }

    fn reset(&mut self) {
        self.window.clear();
        self.fill();
    }

    fn name(&self) -> &str {
        "MovingAverageFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NUM_FACIAL_LANDMARKS;
    use nalgebra::Point2;

    fn constant(x: f64, y: f64) -> LandmarkSet {
        LandmarkSet::new(vec![Point2::new(x, y); NUM_FACIAL_LANDMARKS]).unwrap()
    }

    #[test]
    fn test_zero_filled_warmup() {
        let mut smoother = TemporalSmoother::new(5, WarmupPolicy::ZeroFilled);
        let v = constant(10.0, 20.0);

        let first = smoother.push(v.clone());
        assert_eq!(first[0], Point2::new(2.0, 4.0));

        smoother.push(v.clone());
        smoother.push(v.clone());
        let fourth = smoother.push(v.clone());
        assert_eq!(fourth[33], Point2::new(8.0, 16.0));

        let fifth = smoother.push(v.clone());
        assert_eq!(fifth, v);
    }

    #[test]
    fn test_occupied_only_warmup() {
        let mut smoother = TemporalSmoother::new(3, WarmupPolicy::OccupiedOnly);
        assert!(smoother.is_empty());

        assert_eq!(smoother.push(constant(10.0, 20.0)), constant(10.0, 20.0));
        assert_eq!(smoother.push(constant(20.0, 30.0)), constant(15.0, 25.0));
        assert_eq!(smoother.push(constant(30.0, 40.0)), constant(20.0, 30.0));

        // Window is full, oldest value should be dropped
        assert_eq!(smoother.push(constant(40.0, 50.0)), constant(30.0, 40.0));
        assert_eq!(smoother.len(), 3);
    }

    #[test]
    fn test_distinct_sets_mean() {
        for policy in [WarmupPolicy::ZeroFilled, WarmupPolicy::OccupiedOnly] {
            let mut smoother = TemporalSmoother::new(4, policy);
            let mut last = LandmarkSet::zeros();
            for value in [1.0, 2.0, 3.0, 6.0] {
                last = smoother.push(constant(value, -value));
            }
            assert_eq!(last, constant(3.0, -3.0));
        }
    }

    #[test]
    fn test_reset_restores_warmup() {
        let mut smoother = TemporalSmoother::new(2, WarmupPolicy::ZeroFilled);
        smoother.push(constant(4.0, 4.0));
        smoother.push(constant(4.0, 4.0));
        smoother.reset();
        assert_eq!(smoother.len(), 2);
        assert_eq!(smoother.push(constant(4.0, 4.0)), constant(2.0, 2.0));
    }
}
