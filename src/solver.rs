//! Constraint reduction and linear solution
//!
//! The global system is split into free (`F`) and constrained (`C`) DOFs and
//! only the free block is factorized:
//!
//! ```text
//! K_FF a_F = f_F - K_FC a_C
//! ```
//!
//! The constrained entries of the solution are copied from the prescribed
//! values and the reactions are `r = K a - f` over every DOF.

use log::debug;
use nalgebra::linalg::{Cholesky, FullPivLU};
use nalgebra::Dyn;
use nalgebra_sparse::convert::serial::{convert_csr_dense, convert_dense_csr};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraints, DofPartition, Slot};
use crate::error::{FEAError, FEAResult};
use crate::math::sparse::permute_symmetric;
use crate::math::{
    max_abs_diagonal, reverse_cuthill_mckee, solve_pcg, sparse_matvec, submatrix, subvector,
    Mat, SkylineCholesky, Vec as FEVec,
};
use crate::results::StaticSolution;

/// Factorization used for the free block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinearSolverKind {
    /// Dense Cholesky, falling back to LU when the block is not positive
    /// definite. Sparse input uses the skyline solver.
    #[default]
    Auto,
    /// Dense Cholesky
    Cholesky,
    /// Dense LU with full pivoting
    Lu,
    /// Profile Cholesky after reverse Cuthill-McKee reordering
    Skyline,
    /// Jacobi-preconditioned conjugate gradient
    Pcg,
}

/// Options for the linear solvers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub kind: LinearSolverKind,
    /// Relative pivot size below which the system is reported singular
    pub singularity_tolerance: f64,
    /// Relative residual at which PCG stops
    pub pcg_tolerance: f64,
    /// Iteration cap for PCG
    pub pcg_max_iterations: usize,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            kind: LinearSolverKind::Auto,
            singularity_tolerance: 1e-12,
            pcg_tolerance: 1e-10,
            pcg_max_iterations: 10_000,
        }
    }
}

impl SolverOptions {
    pub fn with_kind(mut self, kind: LinearSolverKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_singularity_tolerance(mut self, tol: f64) -> Self {
        self.singularity_tolerance = tol;
        self
    }

    pub fn with_pcg(mut self, tol: f64, max_iterations: usize) -> Self {
        self.pcg_tolerance = tol;
        self.pcg_max_iterations = max_iterations;
        self
    }
}

enum Factorization {
    /// No free DOFs
    Empty,
    Cholesky(Cholesky<f64, Dyn>),
    Lu(FullPivLU<f64, Dyn, Dyn>),
    Skyline {
        factor: SkylineCholesky,
        perm: Vec<usize>,
    },
    Pcg {
        matrix: CsrMatrix<f64>,
        tol: f64,
        max_iter: usize,
    },
}

impl std::fmt::Debug for Factorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Factorization::Empty => "Empty",
            Factorization::Cholesky(_) => "Cholesky",
            Factorization::Lu(_) => "Lu",
            Factorization::Skyline { .. } => "Skyline",
            Factorization::Pcg { .. } => "Pcg",
        };
        f.write_str(name)
    }
}

fn cholesky(k_ff: Mat, tol: f64) -> FEAResult<Option<Cholesky<f64, Dyn>>> {
    let max_diag = max_abs_diagonal(&k_ff);
    let Some(chol) = Cholesky::new(k_ff) else {
        return Ok(None);
    };

    let threshold = tol * max_diag.max(f64::MIN_POSITIVE);
    for (i, l_ii) in chol.l_dirty().diagonal().iter().enumerate() {
        let pivot = l_ii * l_ii;
        if !pivot.is_finite() || pivot <= threshold {
            return Err(FEAError::SingularMatrix(format!(
                "Cholesky pivot {pivot:.3e} at free equation {i} (threshold {threshold:.3e})"
            )));
        }
    }
    Ok(Some(chol))
}

fn lu(k_ff: Mat, tol: f64) -> FEAResult<FullPivLU<f64, Dyn, Dyn>> {
    let lu = k_ff.full_piv_lu();
    let diag = lu.u().diagonal();
    let max = diag.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let min = diag.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));

    if !lu.is_invertible() || max == 0.0 || !(min / max > tol) {
        return Err(FEAError::SingularMatrix(format!(
            "LU pivot ratio {:.3e} below tolerance {tol:.3e}",
            if max > 0.0 { min / max } else { 0.0 }
        )));
    }
    Ok(lu)
}

fn skyline(k_ff: &CsrMatrix<f64>, tol: f64) -> FEAResult<Factorization> {
    let perm = reverse_cuthill_mckee(k_ff);
    let permuted = permute_symmetric(k_ff, &perm);
    let factor = SkylineCholesky::factorize(&permuted, tol)?;
    debug!(
        "skyline factorization: {} equations, profile {}",
        k_ff.nrows(),
        factor.profile()
    );
    Ok(Factorization::Skyline { factor, perm })
}

impl Factorization {
    fn dense(k_ff: Mat, options: &SolverOptions) -> FEAResult<Self> {
        if k_ff.nrows() == 0 {
            return Ok(Factorization::Empty);
        }
        let tol = options.singularity_tolerance;
        match options.kind {
            LinearSolverKind::Auto => match cholesky(k_ff.clone(), tol)? {
                Some(chol) => Ok(Factorization::Cholesky(chol)),
                None => {
                    debug!("free block is not positive definite, falling back to LU");
                    Ok(Factorization::Lu(lu(k_ff, tol)?))
                }
            },
            LinearSolverKind::Cholesky => match cholesky(k_ff, tol)? {
                Some(chol) => Ok(Factorization::Cholesky(chol)),
                None => Err(FEAError::SingularMatrix(
                    "free block is not positive definite".to_string(),
                )),
            },
            LinearSolverKind::Lu => Ok(Factorization::Lu(lu(k_ff, tol)?)),
            LinearSolverKind::Skyline => skyline(&convert_dense_csr(&k_ff), tol),
            LinearSolverKind::Pcg => Ok(Factorization::Pcg {
                matrix: convert_dense_csr(&k_ff),
                tol: options.pcg_tolerance,
                max_iter: options.pcg_max_iterations,
            }),
        }
    }

    fn sparse(k_ff: CsrMatrix<f64>, options: &SolverOptions) -> FEAResult<Self> {
        if k_ff.nrows() == 0 {
            return Ok(Factorization::Empty);
        }
        match options.kind {
            LinearSolverKind::Auto | LinearSolverKind::Skyline => {
                skyline(&k_ff, options.singularity_tolerance)
            }
            LinearSolverKind::Pcg => Ok(Factorization::Pcg {
                matrix: k_ff,
                tol: options.pcg_tolerance,
                max_iter: options.pcg_max_iterations,
            }),
            LinearSolverKind::Cholesky | LinearSolverKind::Lu => {
                Self::dense(convert_csr_dense(&k_ff), options)
            }
        }
    }

    fn solve(&self, b: &FEVec) -> FEAResult<FEVec> {
        match self {
            Factorization::Empty => Ok(FEVec::zeros(0)),
            Factorization::Cholesky(chol) => Ok(chol.solve(b)),
            Factorization::Lu(lu) => lu.solve(b).ok_or_else(|| {
                FEAError::SingularMatrix("LU back substitution failed".to_string())
            }),
            Factorization::Skyline { factor, perm } => {
                let permuted = FEVec::from_iterator(perm.len(), perm.iter().map(|&old| b[old]));
                let y = factor.solve(&permuted);
                let mut x = FEVec::zeros(perm.len());
                for (new, &old) in perm.iter().enumerate() {
                    x[old] = y[new];
                }
                Ok(x)
            }
            Factorization::Pcg {
                matrix,
                tol,
                max_iter,
            } => {
                let outcome = solve_pcg(matrix, b, *tol, *max_iter);
                if !outcome.converged {
                    return Err(FEAError::SingularMatrix(format!(
                        "PCG did not converge after {} iterations (residual {:.3e})",
                        outcome.iterations, outcome.residual_norm
                    )));
                }
                debug!("PCG converged in {} iterations", outcome.iterations);
                Ok(outcome.solution)
            }
        }
    }
}

/// A factorized free block together with its coupling to the constrained DOFs
///
/// Built once per matrix and reused for every right-hand side, which is how
/// the time integrator solves each step.
#[derive(Debug)]
pub struct ReducedSystem {
    partition: DofPartition,
    /// `K_FC` entries as `(free slot, constrained slot, value)`
    coupling: Vec<(usize, usize, f64)>,
    factorization: Factorization,
}

impl ReducedSystem {
    /// Reduce and factorize a dense matrix
    pub fn new(k: &Mat, constrained_dofs: &[usize], options: &SolverOptions) -> FEAResult<Self> {
        if k.nrows() != k.ncols() {
            return Err(FEAError::dimension("system matrix columns", k.nrows(), k.ncols()));
        }
        let partition = DofPartition::new(k.nrows(), constrained_dofs)?;
        debug!(
            "reduced system: {} free, {} constrained DOFs",
            partition.num_free(),
            partition.num_constrained()
        );

        let mut coupling = Vec::new();
        for (i, &fi) in partition.free().iter().enumerate() {
            for (c, &dc) in partition.constrained().iter().enumerate() {
                let value = k[(fi, dc)];
                if value != 0.0 {
                    coupling.push((i, c, value));
                }
            }
        }

        let k_ff = submatrix(k, partition.free(), partition.free());
        let factorization = Factorization::dense(k_ff, options)?;
        debug!("free block factorized with {factorization:?}");

        Ok(Self {
            partition,
            coupling,
            factorization,
        })
    }

    /// Reduce and factorize a CSR matrix by filtering its triplets
    pub fn from_csr(
        k: &CsrMatrix<f64>,
        constrained_dofs: &[usize],
        options: &SolverOptions,
    ) -> FEAResult<Self> {
        if k.nrows() != k.ncols() {
            return Err(FEAError::dimension("system matrix columns", k.nrows(), k.ncols()));
        }
        let partition = DofPartition::new(k.nrows(), constrained_dofs)?;
        let n_free = partition.num_free();

        let mut coo = CooMatrix::new(n_free, n_free);
        let mut coupling = Vec::new();
        for (row, col, &value) in k.triplet_iter() {
            if let Slot::Free(i) = partition.slot(row) {
                match partition.slot(col) {
                    Slot::Free(j) => coo.push(i, j, value),
                    Slot::Constrained(c) => coupling.push((i, c, value)),
                }
            }
        }

        let factorization = Factorization::sparse(CsrMatrix::from(&coo), options)?;
        debug!(
            "sparse free block ({n_free} equations) factorized with {factorization:?}"
        );

        Ok(Self {
            partition,
            coupling,
            factorization,
        })
    }

    pub fn partition(&self) -> &DofPartition {
        &self.partition
    }

    /// Solve for the full vector of unknowns
    ///
    /// `prescribed` is ordered like `partition().constrained()`; those values
    /// are copied into the result unchanged.
    pub fn solve(&self, f: &FEVec, prescribed: &[f64]) -> FEAResult<FEVec> {
        let n = self.partition.num_dofs();
        if f.len() != n {
            return Err(FEAError::dimension("right-hand side", n, f.len()));
        }
        if prescribed.len() != self.partition.num_constrained() {
            return Err(FEAError::Constraint(format!(
                "{} prescribed values for {} constrained DOFs",
                prescribed.len(),
                self.partition.num_constrained()
            )));
        }

        let mut b = subvector(f, self.partition.free());
        for &(i, c, value) in &self.coupling {
            b[i] -= value * prescribed[c];
        }

        let a_free = self.factorization.solve(&b)?;

        let mut a = FEVec::zeros(n);
        for (i, &dof) in self.partition.free().iter().enumerate() {
            a[dof] = a_free[i];
        }
        for (c, &dof) in self.partition.constrained().iter().enumerate() {
            a[dof] = prescribed[c];
        }
        Ok(a)
    }
}

fn check_system(n: usize, cols: usize, f: &FEVec) -> FEAResult<()> {
    if cols != n {
        return Err(FEAError::dimension("stiffness matrix columns", n, cols));
    }
    if f.len() != n {
        return Err(FEAError::dimension("load vector", n, f.len()));
    }
    Ok(())
}

/// Solve `K a = f + r` with prescribed values at the constrained DOFs
pub fn solve(k: &Mat, f: &FEVec, constraints: &Constraints) -> FEAResult<StaticSolution> {
    solve_with_options(k, f, constraints, &SolverOptions::default())
}

/// [`solve`] with explicit solver options
pub fn solve_with_options(
    k: &Mat,
    f: &FEVec,
    constraints: &Constraints,
    options: &SolverOptions,
) -> FEAResult<StaticSolution> {
    check_system(k.nrows(), k.ncols(), f)?;
    let reduced = ReducedSystem::new(k, constraints.dofs(), options)?;
    let prescribed = constraints.ordered_values(reduced.partition());
    let displacements = reduced.solve(f, &prescribed)?;
    let reactions = k * &displacements - f;
    Ok(StaticSolution {
        displacements,
        reactions,
    })
}

/// [`solve`] on a CSR stiffness matrix
pub fn solve_sparse(
    k: &CsrMatrix<f64>,
    f: &FEVec,
    constraints: &Constraints,
    options: &SolverOptions,
) -> FEAResult<StaticSolution> {
    check_system(k.nrows(), k.ncols(), f)?;
    let reduced = ReducedSystem::from_csr(k, constraints.dofs(), options)?;
    let prescribed = constraints.ordered_values(reduced.partition());
    let displacements = reduced.solve(f, &prescribed)?;
    let reactions = sparse_matvec(k, &displacements) - f;
    Ok(StaticSolution {
        displacements,
        reactions,
    })
}
