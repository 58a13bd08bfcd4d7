//! Piecewise-linear time functions
//!
//! Load and boundary histories are usually given as a few `(t, g)` corner
//! points and sampled onto the integrator's time grid.

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// A piecewise-linear function of time through strictly increasing points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeFunction {
    points: Vec<(f64, f64)>,
}

impl TimeFunction {
    pub fn new(points: Vec<(f64, f64)>) -> FEAResult<Self> {
        if points.len() < 2 {
            return Err(FEAError::Configuration(
                "a time function needs at least two points".to_string(),
            ));
        }
        for (i, &(t, g)) in points.iter().enumerate() {
            if !t.is_finite() || !g.is_finite() {
                return Err(FEAError::Configuration(format!(
                    "time function point {i} is not finite"
                )));
            }
        }
        if let Some(i) = points.windows(2).position(|w| w[1].0 <= w[0].0) {
            return Err(FEAError::Configuration(format!(
                "time function times must increase strictly (point {})",
                i + 1
            )));
        }
        Ok(Self { points })
    }

    /// A function that is `value` everywhere on `[t0, t1]`
    pub fn constant(value: f64, t0: f64, t1: f64) -> FEAResult<Self> {
        Self::new(vec![(t0, value), (t1, value)])
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn start(&self) -> f64 {
        self.points[0].0
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1].0
    }

    /// Interpolated value, held at the end values outside the defined range
    pub fn value_at(&self, t: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if t <= first.0 {
            return first.1;
        }
        if t >= last.0 {
            return last.1;
        }

        // first index whose time exceeds t; t is strictly inside, so 1..len
        let upper = self.points.partition_point(|&(ti, _)| ti <= t);
        let (t0, g0) = self.points[upper - 1];
        let (t1, g1) = self.points[upper];
        g0 + (g1 - g0) * (t - t0) / (t1 - t0)
    }

    /// Sample on `start, start + dt, ...` up to the last point
    ///
    /// Returns the sample times and values. The grid ends at the last sample
    /// not beyond `end()` (with a small tolerance for round-off in `dt`).
    pub fn sample(&self, dt: f64) -> FEAResult<(Vec<f64>, Vec<f64>)> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(FEAError::Configuration(format!(
                "sampling step must be positive, got {dt}"
            )));
        }
        let n = ((self.end() - self.start()) / dt + 1e-9).floor() as usize + 1;
        let times: Vec<f64> = (0..n).map(|i| self.start() + i as f64 * dt).collect();
        let values = times.iter().map(|&t| self.value_at(t)).collect();
        Ok((times, values))
    }
}
