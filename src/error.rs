//! Error types for FEA core operations

use thiserror::Error;

/// Main error type for FEA operations
#[derive(Error, Debug)]
pub enum FEAError {
    #[error("Dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        found: usize,
    },

    #[error("DOF index {index} is out of range for a system of size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Invalid constraints: {0}")]
    Constraint(String),

    #[error("Singular system matrix: {0}")]
    SingularMatrix(String),

    #[error("Time step {step} (t = {time}) failed: {reason}")]
    StepFailed {
        step: usize,
        time: f64,
        reason: String,
    },

    #[error("Mass matrix is not symmetric positive definite: {0}")]
    IndefiniteMass(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl FEAError {
    pub(crate) fn dimension(context: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch {
            context: context.into(),
            expected,
            found,
        }
    }
}

/// Result type for FEA operations
pub type FEAResult<T> = Result<T, FEAError>;
