//! Analysis types and options

use serde::{Deserialize, Serialize};

use crate::error::FEAResult;
use crate::solver::{LinearSolverKind, SolverOptions};

/// Type of analysis to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisType {
    /// Constrained linear static solve with reactions
    #[default]
    Static,
    /// Generalized eigenvalue analysis for natural frequencies
    Modal,
    /// Newmark time integration
    Transient,
}

/// Options for an analysis session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Linear solver configuration
    pub solver: SolverOptions,
    /// Number of modes to keep in modal analysis (None = all)
    pub num_modes: Option<usize>,
    /// Evaluate element kernels on the rayon pool
    pub parallel_assembly: bool,
    /// Log transient progress every this many steps (0 = never)
    pub progress_interval: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            solver: SolverOptions::default(),
            num_modes: None,
            parallel_assembly: false,
            progress_interval: 0,
        }
    }
}

impl AnalysisOptions {
    /// Load options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> FEAResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Create options for modal analysis
    pub fn modal(num_modes: usize) -> Self {
        Self {
            num_modes: Some(num_modes),
            ..Self::default()
        }
    }

    /// Choose the factorization
    pub fn with_solver(mut self, kind: LinearSolverKind) -> Self {
        self.solver.kind = kind;
        self
    }

    /// Set the relative singularity tolerance
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.solver.singularity_tolerance = tol;
        self
    }

    /// Assemble in parallel
    pub fn with_parallel_assembly(mut self) -> Self {
        self.parallel_assembly = true;
        self
    }

    /// Enable transient progress logging
    pub fn with_progress_interval(mut self, steps: usize) -> Self {
        self.progress_interval = steps;
        self
    }
}
