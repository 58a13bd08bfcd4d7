//! Result types for FEA analysis

use serde::{Deserialize, Serialize};

use crate::math::{Mat, Vec as FEVec};

/// Displacements and reactions of a static solve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSolution {
    /// Full-length solution vector `a`
    pub displacements: FEVec,
    /// `r = K a - f`, nonzero only at constrained DOFs up to round-off
    pub reactions: FEVec,
}

impl StaticSolution {
    /// DOF and value of the largest displacement magnitude
    pub fn max_displacement(&self) -> Option<(usize, f64)> {
        self.displacements
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
    }

    /// Sum of all reactions
    pub fn total_reaction(&self) -> f64 {
        self.reactions.sum()
    }
}

/// Eigenpairs of a modal analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalResults {
    /// Eigenvalues `λ = ω²` in ascending order
    pub eigenvalues: Vec<f64>,
    /// Mass-normalized modes, one full-length column per eigenvalue
    pub eigenvectors: Mat,
}

impl ModalResults {
    pub fn num_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Mode shape `i` (zero-based)
    pub fn mode(&self, i: usize) -> FEVec {
        self.eigenvectors.column(i).into_owned()
    }

    /// Angular frequency `ω = √λ` of mode `i`
    pub fn angular_frequency(&self, i: usize) -> f64 {
        self.eigenvalues[i].max(0.0).sqrt()
    }

    /// Natural frequencies in Hz
    pub fn frequencies_hz(&self) -> Vec<f64> {
        (0..self.num_modes())
            .map(|i| self.angular_frequency(i) / (2.0 * std::f64::consts::PI))
            .collect()
    }

    /// Natural periods in seconds (infinite for rigid-body modes)
    pub fn periods(&self) -> Vec<f64> {
        self.frequencies_hz().iter().map(|f| 1.0 / f).collect()
    }
}

/// One response quantity recorded at selected DOFs and samples
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHistory {
    /// Recorded DOFs, one row of `values` each
    pub dofs: Vec<usize>,
    /// `dofs.len() × samples`
    pub values: Mat,
}

impl ResponseHistory {
    pub fn num_samples(&self) -> usize {
        self.values.ncols()
    }

    /// Value of `dof` at recorded sample `sample`
    pub fn at(&self, dof: usize, sample: usize) -> Option<f64> {
        let row = self.dofs.iter().position(|&d| d == dof)?;
        (sample < self.values.ncols()).then(|| self.values[(row, sample)])
    }

    /// Time series of one DOF
    pub fn series(&self, dof: usize) -> Option<Vec<f64>> {
        let row = self.dofs.iter().position(|&d| d == dof)?;
        Some(self.values.row(row).iter().copied().collect())
    }

    /// Recorded values at one sample
    pub fn sample(&self, sample: usize) -> FEVec {
        self.values.column(sample).into_owned()
    }
}

/// Output of a transient analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransientResults {
    /// Time of each recorded sample
    pub times: Vec<f64>,
    /// Step index of each recorded sample (0 is the initial state)
    pub steps: Vec<usize>,
    pub displacement: ResponseHistory,
    pub velocity: ResponseHistory,
    pub acceleration: ResponseHistory,
    /// Full state at the end time
    pub final_displacement: FEVec,
    pub final_velocity: FEVec,
    pub final_acceleration: FEVec,
}

impl TransientResults {
    pub fn num_samples(&self) -> usize {
        self.times.len()
    }

    /// Largest displacement magnitude over all recorded samples
    pub fn peak_displacement(&self) -> f64 {
        self.displacement.values.amax()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frequencies() {
        let results = ModalResults {
            eigenvalues: vec![0.0, 4.0 * std::f64::consts::PI.powi(2)],
            eigenvectors: Mat::identity(2, 2),
        };
        let f = results.frequencies_hz();
        assert_relative_eq!(f[0], 0.0);
        assert_relative_eq!(f[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(results.angular_frequency(1), 2.0 * std::f64::consts::PI);
        assert!(results.periods()[0].is_infinite());
    }

    #[test]
    fn test_response_lookup() {
        let history = ResponseHistory {
            dofs: vec![4, 1],
            values: Mat::from_row_slice(2, 3, &[0.0, 1.0, 2.0, 5.0, 6.0, 7.0]),
        };
        assert_eq!(history.at(1, 2), Some(7.0));
        assert_eq!(history.at(4, 3), None);
        assert_eq!(history.at(0, 0), None);
        assert_eq!(history.series(4), Some(vec![0.0, 1.0, 2.0]));
    }

    #[test]
    fn test_static_summary() {
        let sol = StaticSolution {
            displacements: FEVec::from_vec(vec![0.0, -0.3, 0.2]),
            reactions: FEVec::from_vec(vec![-40.0, 0.0, -60.0]),
        };
        assert_eq!(sol.max_displacement(), Some((1, -0.3)));
        assert_relative_eq!(sol.total_reaction(), -100.0);
    }
}
