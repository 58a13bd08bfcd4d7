//! FEA Core - finite element assembly and solution in native Rust
//!
//! This library provides the solution stages of a finite element analysis,
//! independent of any particular element formulation:
//! - Scatter-add assembly of element matrices (dense, sparse, parallel)
//! - Constrained linear static solution with reactions
//! - Constrained generalized eigenvalue analysis (mass-normalized modes)
//! - Modal reduction
//! - Newmark time integration with time-varying loads and prescribed motion
//!
//! Element kernels are supplied by the caller as local matrices.
//!
//! ## Example
//! ```rust
//! use fea_core::prelude::*;
//!
//! fn spring(k: f64) -> Mat {
//!     Mat::from_row_slice(2, 2, &[k, -k, -k, k])
//! }
//!
//! // three springs between DOFs 1-2, 2-3 and 2-3 (one-based)
//! let topology = DofTopology::from_one_based(&[[1usize, 2], [2, 3], [2, 3]]).unwrap();
//! let mut model = FEModel::new(topology, 3).unwrap();
//! for (e, k) in [3000.0, 1500.0, 3000.0].into_iter().enumerate() {
//!     model.assemble_stiffness(e, &spring(k)).unwrap();
//! }
//! model.add_point_load(1, 100.0).unwrap();
//!
//! // both ends fixed
//! let bc = Constraints::fixed(vec![0, 2]).unwrap();
//! let solution = model.analyze_static(&bc).unwrap();
//!
//! assert!((solution.displacements[1] - 100.0 / 7500.0).abs() < 1e-12);
//! assert!((solution.reactions[0] + 40.0).abs() < 1e-9);
//! ```

pub mod analysis;
pub mod assembly;
pub mod constraints;
pub mod dynamics;
pub mod eigen;
pub mod error;
pub mod extraction;
pub mod math;
pub mod modal;
pub mod model;
pub mod results;
pub mod solver;
pub mod timefn;
pub mod topology;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{AnalysisOptions, AnalysisType};
    pub use crate::assembly::{
        assemble, assemble_parallel, assemble_vector, assemble_with_load, Accumulator,
        ElementMatrices, GlobalSystem,
    };
    pub use crate::constraints::{Constraints, DofPartition, PrescribedHistory};
    pub use crate::dynamics::{
        integrate, rayleigh_damping, LoadHistory, NewmarkIntegrator, NewmarkParams,
        OutputRequest, TransientProblem,
    };
    pub use crate::eigen::{eigen, eigen_with_modes};
    pub use crate::error::{FEAError, FEAResult};
    pub use crate::extraction::{extract, extract_element};
    pub use crate::math::{Mat, SparseMatrixBuilder, Vec as FEVec};
    pub use crate::modal::ModalBasis;
    pub use crate::model::FEModel;
    pub use crate::results::{ModalResults, ResponseHistory, StaticSolution, TransientResults};
    pub use crate::solver::{
        solve, solve_sparse, solve_with_options, LinearSolverKind, ReducedSystem, SolverOptions,
    };
    pub use crate::timefn::TimeFunction;
    pub use crate::topology::{dof_from_one_based, DofTopology};
}
