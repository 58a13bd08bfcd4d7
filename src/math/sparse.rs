//! Sparse matrix utilities for large global systems
//!
//! Assembled stiffness and mass matrices are mostly zeros. Element contributions
//! are collected in COO form and compressed to CSR once, and the reduced system
//! can then be factorized in skyline (profile) storage after a bandwidth
//! reducing reordering, or solved iteratively.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::error::{FEAError, FEAResult};

/// Sparse matrix builder using COO format
///
/// Duplicate entries are kept and summed when converting, which is exactly the
/// scatter-add semantics of assembly.
#[derive(Debug, Clone)]
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new builder for a `size × size` matrix
    pub fn new(size: usize) -> Self {
        Self {
            size,
            entries: Vec::new(),
        }
    }

    /// Create a builder with room for `nnz` triplets
    pub fn with_capacity(size: usize, nnz: usize) -> Self {
        Self {
            size,
            entries: Vec::with_capacity(nnz),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        // structural zeros are never stored
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Convert to CSR format, summing duplicates
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }

    /// Convert to a dense matrix
    pub fn to_dense(&self) -> nalgebra::DMatrix<f64> {
        let mut mat = nalgebra::DMatrix::zeros(self.size, self.size);
        for &(row, col, val) in &self.entries {
            mat[(row, col)] += val;
        }
        mat
    }

    /// Number of stored triplets (before duplicates are summed)
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }
}

/// Cholesky factorization in skyline (variable band) storage
///
/// Row `i` stores `L[i, first[i]..=i]`, where `first[i]` is the leftmost
/// nonzero column of the lower triangle. Fill-in is confined to the profile.
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    size: usize,
    first: Vec<usize>,
    rows: Vec<Vec<f64>>,
}

impl SkylineCholesky {
    /// Factorize a symmetric positive definite CSR matrix
    ///
    /// Only the lower triangle is read. A pivot smaller than
    /// `pivot_tol * max|diag|` is reported as a singular system.
    pub fn factorize(csr: &CsrMatrix<f64>, pivot_tol: f64) -> FEAResult<Self> {
        let size = csr.nrows();
        if csr.ncols() != size {
            return Err(FEAError::dimension("skyline factorization", size, csr.ncols()));
        }

        let mut first: Vec<usize> = (0..size).collect();
        for (row, col, _) in csr.triplet_iter() {
            if col < first[row] {
                first[row] = col;
            }
        }

        let mut rows: Vec<Vec<f64>> = (0..size).map(|i| vec![0.0; i - first[i] + 1]).collect();
        let mut max_diag = 0.0_f64;
        for (row, col, &val) in csr.triplet_iter() {
            if col <= row {
                rows[row][col - first[row]] += val;
            }
            if row == col {
                max_diag = max_diag.max(val.abs());
            }
        }
        let threshold = pivot_tol * max_diag.max(f64::MIN_POSITIVE);

        let mut factor = Self { size, first, rows };
        for i in 0..size {
            let fi = factor.first[i];
            for j in fi..i {
                let start = fi.max(factor.first[j]);
                let mut sum = 0.0;
                for k in start..j {
                    sum += factor.entry(i, k) * factor.entry(j, k);
                }
                let l_jj = factor.entry(j, j);
                factor.rows[i][j - fi] = (factor.rows[i][j - fi] - sum) / l_jj;
            }

            let sum: f64 = factor.rows[i][..i - fi].iter().map(|v| v * v).sum();
            let pivot = factor.rows[i][i - fi] - sum;
            if pivot <= threshold {
                return Err(FEAError::SingularMatrix(format!(
                    "skyline pivot {pivot:.3e} at equation {i} (threshold {threshold:.3e})"
                )));
            }
            factor.rows[i][i - fi] = pivot.sqrt();
        }

        Ok(factor)
    }

    #[inline]
    fn entry(&self, row: usize, col: usize) -> f64 {
        let f = self.first[row];
        if col < f {
            0.0
        } else {
            self.rows[row][col - f]
        }
    }

    /// Profile size (number of stored entries)
    pub fn profile(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }

    /// Solve L * L^T * x = b
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();

        // Forward substitution: L * y = b
        for i in 0..self.size {
            let f = self.first[i];
            let mut sum = 0.0;
            for k in f..i {
                sum += self.rows[i][k - f] * x[k];
            }
            x[i] = (x[i] - sum) / self.rows[i][i - f];
        }

        // Backward substitution: L^T * x = y
        for i in (0..self.size).rev() {
            let f = self.first[i];
            x[i] /= self.rows[i][i - f];
            for k in f..i {
                x[k] -= self.rows[i][k - f] * x[i];
            }
        }

        x
    }
}

/// Outcome of an iterative solve
#[derive(Debug, Clone)]
pub struct PcgOutcome {
    pub solution: DVector<f64>,
    pub iterations: usize,
    pub residual_norm: f64,
    pub converged: bool,
}

/// Solve a symmetric positive definite system with Jacobi-preconditioned CG
///
/// Convergence is declared when `|r| <= tol * |b|`.
pub fn solve_pcg(csr: &CsrMatrix<f64>, b: &DVector<f64>, tol: f64, max_iter: usize) -> PcgOutcome {
    let n = csr.nrows();

    let mut diag = DVector::from_element(n, 1.0);
    for (row, col, &val) in csr.triplet_iter() {
        if row == col && val.abs() > 0.0 {
            diag[row] = val;
        }
    }

    let mut x = DVector::zeros(n);
    let b_norm = b.norm();
    if b_norm == 0.0 {
        return PcgOutcome {
            solution: x,
            iterations: 0,
            residual_norm: 0.0,
            converged: true,
        };
    }
    let target = tol * b_norm;

    let mut r = b.clone();
    let mut z = r.component_div(&diag);
    let mut p = z.clone();
    let mut r_dot_z = r.dot(&z);
    let mut r_norm = b_norm;

    for iter in 0..max_iter {
        let ap = sparse_matvec(csr, &p);
        let p_dot_ap = p.dot(&ap);
        if p_dot_ap <= 0.0 {
            // breakdown: matrix is not positive definite along p
            return PcgOutcome {
                solution: x,
                iterations: iter,
                residual_norm: r_norm,
                converged: false,
            };
        }

        let alpha = r_dot_z / p_dot_ap;
        x.axpy(alpha, &p, 1.0);
        r.axpy(-alpha, &ap, 1.0);

        r_norm = r.norm();
        if r_norm <= target {
            return PcgOutcome {
                solution: x,
                iterations: iter + 1,
                residual_norm: r_norm,
                converged: true,
            };
        }

        z = r.component_div(&diag);
        let r_dot_z_new = r.dot(&z);
        let beta = r_dot_z_new / r_dot_z;
        r_dot_z = r_dot_z_new;
        p = &z + beta * &p;
    }

    PcgOutcome {
        solution: x,
        iterations: max_iter,
        residual_norm: r_norm,
        converged: false,
    }
}

/// Sparse matrix-vector multiplication
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = csr.nrows();
    let mut y = DVector::zeros(n);

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..n {
        let mut sum = 0.0;
        for idx in row_offsets[row]..row_offsets[row + 1] {
            sum += values[idx] * x[col_indices[idx]];
        }
        y[row] = sum;
    }

    y
}

/// Bandwidth reduction using Reverse Cuthill-McKee
///
/// Returns `perm` with `perm[new] = old`.
pub fn reverse_cuthill_mckee(csr: &CsrMatrix<f64>) -> Vec<usize> {
    let n = csr.nrows();
    if n == 0 {
        return vec![];
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (row, col, &val) in csr.triplet_iter() {
        if val != 0.0 && row != col {
            adj[row].push(col);
        }
    }

    let degrees: Vec<usize> = adj.iter().map(|v| v.len()).collect();
    for neighbors in &mut adj {
        neighbors.sort_by_key(|&i| degrees[i]);
    }

    let mut visited = vec![false; n];
    let mut order = Vec::with_capacity(n);
    let mut queue = std::collections::VecDeque::new();

    while order.len() < n {
        // each connected component starts from its lowest degree node
        let start = match (0..n).filter(|&i| !visited[i]).min_by_key(|&i| degrees[i]) {
            Some(s) => s,
            None => break,
        };
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            order.push(node);
            for &neighbor in &adj[node] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    order.reverse();
    order
}

/// Create inverse permutation
pub fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (new_idx, &old_idx) in perm.iter().enumerate() {
        inv[old_idx] = new_idx;
    }
    inv
}

/// Symmetric reordering `B[inv[i], inv[j]] = A[i, j]`
pub fn permute_symmetric(csr: &CsrMatrix<f64>, perm: &[usize]) -> CsrMatrix<f64> {
    let inv = inverse_permutation(perm);
    let mut coo = CooMatrix::new(csr.nrows(), csr.ncols());
    for (row, col, &val) in csr.triplet_iter() {
        coo.push(inv[row], inv[col], val);
    }
    CsrMatrix::from(&coo)
}
