//! Fixed-size 68-point facial landmark sets.

use crate::{constants::NUM_FACIAL_LANDMARKS, Error, Result};
use nalgebra::{DVector, Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::ops::Index;

/// Ordered set of exactly 68 facial landmarks in image pixel coordinates
///
/// Index meaning follows the iBUG scheme: 0-16 jaw, 17-26 eyebrows,
/// 27-35 nose, 36-47 eyes, 48-67 mouth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f64; 2]>", into = "Vec<[f64; 2]>")]
pub struct LandmarkSet {
    points: Vec<Point2<f64>>,
}

impl LandmarkSet {
    /// Create a landmark set from exactly 68 points
    ///
    /// # Errors
    ///
    /// Returns an error if the number of points is not 68
    pub fn new(points: Vec<Point2<f64>>) -> Result<Self> {
        if points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} landmarks, got {}",
                NUM_FACIAL_LANDMARKS,
                points.len()
            )));
        }
        Ok(Self { points })
    }

    /// Landmark set with every point at the origin
    #[must_use]
    pub fn zeros() -> Self {
        Self {
            points: vec![Point2::origin(); NUM_FACIAL_LANDMARKS],
        }
    }

    /// Rebuild a landmark set from separate x and y coordinate vectors
    ///
    /// # Errors
    ///
    /// Returns an error if either vector does not hold 68 values
    pub fn from_axes(xs: &DVector<f64>, ys: &DVector<f64>) -> Result<Self> {
        if xs.len() != NUM_FACIAL_LANDMARKS || ys.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {} coordinates per axis, got {} and {}",
                NUM_FACIAL_LANDMARKS,
                xs.len(),
                ys.len()
            )));
        }
        Ok(Self {
            points: xs.iter().zip(ys.iter()).map(|(&x, &y)| Point2::new(x, y)).collect(),
        })
    }

    /// All x coordinates as a column vector
    #[must_use]
    pub fn xs(&self) -> DVector<f64> {
        DVector::from_iterator(self.points.len(), self.points.iter().map(|p| p.x))
    }

    /// All y coordinates as a column vector
    #[must_use]
    pub fn ys(&self) -> DVector<f64> {
        DVector::from_iterator(self.points.len(), self.points.iter().map(|p| p.y))
    }

    /// Euclidean distance between two landmarks
    #[must_use]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        nalgebra::distance(&self.points[a], &self.points[b])
    }

    /// Mean of all landmark positions
    #[must_use]
    pub fn centroid(&self) -> Point2<f64> {
        let sum = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.coords);
        Point2::from(sum / self.points.len() as f64)
    }

    /// Elementwise mean of several landmark sets, `None` if there are none
    #[must_use]
    pub fn mean<'a, I>(sets: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a LandmarkSet>,
    {
        let mut sums = vec![Vector2::<f64>::zeros(); NUM_FACIAL_LANDMARKS];
        let mut count = 0_usize;
        for set in sets {
            for (sum, point) in sums.iter_mut().zip(&set.points) {
                *sum += point.coords;
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let divisor = count as f64;
        Some(Self {
            points: sums.into_iter().map(|sum| Point2::from(sum / divisor)).collect(),
        })
    }

    /// Horizontal extent of the landmark cloud
    #[must_use]
    pub fn width(&self) -> f64 {
        let min = self.points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max = self.points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        max - min
    }

    /// True if every coordinate is finite
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.points.iter().all(|p| p.x.is_finite() && p.y.is_finite())
    }

    /// Points in landmark order
    #[must_use]
    pub fn points(&self) -> &[Point2<f64>] {
        &self.points
    }
}

impl Index<usize> for LandmarkSet {
    type Output = Point2<f64>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.points[index]
    }
}

impl TryFrom<Vec<[f64; 2]>> for LandmarkSet {
    type Error = Error;

    fn try_from(value: Vec<[f64; 2]>) -> Result<Self> {
        Self::new(value.into_iter().map(|[x, y]| Point2::new(x, y)).collect())
    }
}

impl From<LandmarkSet> for Vec<[f64; 2]> {
    fn from(value: LandmarkSet) -> Self {
        value.points.into_iter().map(|p| [p.x, p.y]).collect()
    }
}
