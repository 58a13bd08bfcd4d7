//! Mathematical utilities shared by the solvers

pub mod sparse;

use nalgebra::{DMatrix, DVector};

// Re-export sparse utilities
pub use sparse::{
    reverse_cuthill_mckee, solve_pcg, sparse_matvec, SkylineCholesky, SparseMatrixBuilder,
};

pub type Mat = DMatrix<f64>;
pub type Vec = DVector<f64>;

/// Extract the dense block `m[rows, cols]`
pub fn submatrix(m: &Mat, rows: &[usize], cols: &[usize]) -> Mat {
    let mut block = Mat::zeros(rows.len(), cols.len());
    for (i, &ri) in rows.iter().enumerate() {
        for (j, &cj) in cols.iter().enumerate() {
            block[(i, j)] = m[(ri, cj)];
        }
    }
    block
}

/// Gather `v[indices]` into a new vector
pub fn subvector(v: &Vec, indices: &[usize]) -> Vec {
    Vec::from_iterator(indices.len(), indices.iter().map(|&i| v[i]))
}

/// Largest absolute diagonal entry, used to scale pivot tolerances
pub fn max_abs_diagonal(m: &Mat) -> f64 {
    m.diagonal().iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Check symmetry relative to the largest entry of the matrix
pub fn is_symmetric(m: &Mat, rel_tol: f64) -> bool {
    if m.nrows() != m.ncols() {
        return false;
    }
    let scale = m.amax().max(f64::MIN_POSITIVE);
    for i in 0..m.nrows() {
        for j in (i + 1)..m.ncols() {
            if (m[(i, j)] - m[(j, i)]).abs() > rel_tol * scale {
                return false;
            }
        }
    }
    true
}
