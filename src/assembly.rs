//! Global assembly
//!
//! Element matrices are scattered into the global system by pure accumulation,
//! `K[row[i], row[j]] += k_local[i, j]`, so the order in which elements are
//! assembled does not matter beyond floating-point rounding.

use rayon::prelude::*;

use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, SparseMatrixBuilder, Vec as FEVec};
use crate::topology::DofTopology;

/// A square global matrix that supports scatter-add
pub trait Accumulator {
    /// Number of rows (and columns)
    fn dim(&self) -> FEAResult<usize>;

    /// `self[row, col] += value`
    fn add_entry(&mut self, row: usize, col: usize, value: f64);
}

impl Accumulator for Mat {
    fn dim(&self) -> FEAResult<usize> {
        if self.nrows() != self.ncols() {
            return Err(FEAError::dimension("global matrix columns", self.nrows(), self.ncols()));
        }
        Ok(self.nrows())
    }

    #[inline]
    fn add_entry(&mut self, row: usize, col: usize, value: f64) {
        self[(row, col)] += value;
    }
}

impl Accumulator for SparseMatrixBuilder {
    fn dim(&self) -> FEAResult<usize> {
        Ok(self.size())
    }

    #[inline]
    fn add_entry(&mut self, row: usize, col: usize, value: f64) {
        self.add(row, col, value);
    }
}

fn check_row(row: &[usize], size: usize) -> FEAResult<()> {
    match row.iter().find(|&&dof| dof >= size) {
        Some(&index) => Err(FEAError::IndexOutOfRange { index, size }),
        None => Ok(()),
    }
}

fn check_local(context: &str, row: &[usize], size: usize, local: &Mat) -> FEAResult<()> {
    let n = row.len();
    if local.nrows() != n {
        return Err(FEAError::dimension(format!("{context} rows"), n, local.nrows()));
    }
    if local.ncols() != n {
        return Err(FEAError::dimension(format!("{context} columns"), n, local.ncols()));
    }
    check_row(row, size)
}

/// Scatter-add a local element matrix into a global matrix
///
/// `row` holds the zero-based global DOF of each local DOF.
pub fn assemble<A: Accumulator>(row: &[usize], global: &mut A, k_local: &Mat) -> FEAResult<()> {
    let size = global.dim()?;
    let n = row.len();
    if k_local.nrows() != n {
        return Err(FEAError::dimension("element matrix rows", n, k_local.nrows()));
    }
    if k_local.ncols() != n {
        return Err(FEAError::dimension("element matrix columns", n, k_local.ncols()));
    }
    check_row(row, size)?;

    for (i, &gi) in row.iter().enumerate() {
        for (j, &gj) in row.iter().enumerate() {
            global.add_entry(gi, gj, k_local[(i, j)]);
        }
    }
    Ok(())
}

/// Scatter-add a local element vector into a global vector
pub fn assemble_vector(row: &[usize], global: &mut FEVec, f_local: &FEVec) -> FEAResult<()> {
    if f_local.len() != row.len() {
        return Err(FEAError::dimension("element load vector", row.len(), f_local.len()));
    }
    check_row(row, global.len())?;

    for (i, &gi) in row.iter().enumerate() {
        global[gi] += f_local[i];
    }
    Ok(())
}

/// Scatter-add an element matrix and its load vector
pub fn assemble_with_load<A: Accumulator>(
    row: &[usize],
    global: &mut A,
    k_local: &Mat,
    f: &mut FEVec,
    f_local: &FEVec,
) -> FEAResult<()> {
    // check the vector first so a failure leaves both targets untouched
    if f_local.len() != row.len() {
        return Err(FEAError::dimension("element load vector", row.len(), f_local.len()));
    }
    check_row(row, f.len())?;
    assemble(row, global, k_local)?;
    assemble_vector(row, f, f_local)
}

/// Local matrices produced by an element kernel
#[derive(Debug, Clone)]
pub struct ElementMatrices {
    pub stiffness: Mat,
    pub mass: Option<Mat>,
    pub load: Option<FEVec>,
}

impl ElementMatrices {
    pub fn stiffness(k: Mat) -> Self {
        Self {
            stiffness: k,
            mass: None,
            load: None,
        }
    }

    pub fn with_mass(mut self, m: Mat) -> Self {
        self.mass = Some(m);
        self
    }

    pub fn with_load(mut self, f: FEVec) -> Self {
        self.load = Some(f);
        self
    }
}

/// Global stiffness, mass, damping and load of one analysis
///
/// Contents can only grow through scatter-add; the solvers borrow the
/// matrices read-only.
#[derive(Debug, Clone)]
pub struct GlobalSystem {
    stiffness: Mat,
    mass: Option<Mat>,
    damping: Option<Mat>,
    load: FEVec,
}

impl GlobalSystem {
    /// Create an all-zero system with `n_dofs` unknowns
    pub fn new(n_dofs: usize) -> Self {
        Self {
            stiffness: Mat::zeros(n_dofs, n_dofs),
            mass: None,
            damping: None,
            load: FEVec::zeros(n_dofs),
        }
    }

    pub fn num_dofs(&self) -> usize {
        self.load.len()
    }

    pub fn stiffness(&self) -> &Mat {
        &self.stiffness
    }

    pub fn mass(&self) -> Option<&Mat> {
        self.mass.as_ref()
    }

    pub fn damping(&self) -> Option<&Mat> {
        self.damping.as_ref()
    }

    pub fn load(&self) -> &FEVec {
        &self.load
    }

    pub fn assemble_stiffness(&mut self, row: &[usize], k_local: &Mat) -> FEAResult<()> {
        assemble(row, &mut self.stiffness, k_local)
    }

    pub fn assemble_mass(&mut self, row: &[usize], m_local: &Mat) -> FEAResult<()> {
        let n = self.num_dofs();
        check_local("element mass matrix", row, n, m_local)?;
        assemble(row, self.mass.get_or_insert_with(|| Mat::zeros(n, n)), m_local)
    }

    pub fn assemble_damping(&mut self, row: &[usize], c_local: &Mat) -> FEAResult<()> {
        let n = self.num_dofs();
        check_local("element damping matrix", row, n, c_local)?;
        assemble(row, self.damping.get_or_insert_with(|| Mat::zeros(n, n)), c_local)
    }

    pub fn assemble_load(&mut self, row: &[usize], f_local: &FEVec) -> FEAResult<()> {
        assemble_vector(row, &mut self.load, f_local)
    }

    /// Add a concentrated load at a single DOF
    pub fn add_point_load(&mut self, dof: usize, value: f64) -> FEAResult<()> {
        let size = self.num_dofs();
        if dof >= size {
            return Err(FEAError::IndexOutOfRange { index: dof, size });
        }
        self.load[dof] += value;
        Ok(())
    }

    /// Scatter every part of a kernel result
    ///
    /// All parts are checked first; a rejected element leaves the system
    /// unchanged.
    pub fn assemble_element(&mut self, row: &[usize], element: &ElementMatrices) -> FEAResult<()> {
        let n = self.num_dofs();
        check_local("element stiffness matrix", row, n, &element.stiffness)?;
        if let Some(m) = &element.mass {
            check_local("element mass matrix", row, n, m)?;
        }
        if let Some(f) = &element.load {
            if f.len() != row.len() {
                return Err(FEAError::dimension("element load vector", row.len(), f.len()));
            }
        }

        self.assemble_stiffness(row, &element.stiffness)?;
        if let Some(m) = &element.mass {
            self.assemble_mass(row, m)?;
        }
        if let Some(f) = &element.load {
            self.assemble_load(row, f)?;
        }
        Ok(())
    }

    /// Sum two partial systems of the same size
    pub(crate) fn merge(mut self, other: GlobalSystem) -> GlobalSystem {
        self.stiffness += other.stiffness;
        self.load += other.load;
        self.mass = sum_optional(self.mass, other.mass);
        self.damping = sum_optional(self.damping, other.damping);
        self
    }
}

fn sum_optional(a: Option<Mat>, b: Option<Mat>) -> Option<Mat> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Assemble every element of `topology` on the rayon pool
///
/// Each worker accumulates into its own partial system and the partials are
/// summed at the end, so no global matrix is shared between threads.
pub fn assemble_parallel<F>(topology: &DofTopology, n_dofs: usize, kernel: F) -> FEAResult<GlobalSystem>
where
    F: Fn(usize) -> FEAResult<ElementMatrices> + Sync,
{
    topology.validate(n_dofs)?;

    topology
        .rows()
        .par_iter()
        .enumerate()
        .try_fold(
            || GlobalSystem::new(n_dofs),
            |mut partial, (e, row)| {
                let element = kernel(e)?;
                partial.assemble_element(row, &element)?;
                Ok::<GlobalSystem, FEAError>(partial)
            },
        )
        .try_reduce(|| GlobalSystem::new(n_dofs), |a, b| Ok(a.merge(b)))
}
