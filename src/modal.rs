//! Modal reduction
//!
//! Projects full-size operators and loads onto the leading mass-normalized
//! modes and expands modal coordinates back to DOF space.

use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};
use crate::results::ModalResults;

/// The first `nev` modes of a modal solution, as an `n_dofs × nev` basis `Φ`
#[derive(Debug, Clone)]
pub struct ModalBasis {
    phi: Mat,
    eigenvalues: Vec<f64>,
}

impl ModalBasis {
    pub fn new(modes: &ModalResults, nev: usize) -> FEAResult<Self> {
        if nev == 0 || nev > modes.num_modes() {
            return Err(FEAError::Configuration(format!(
                "cannot build a basis of {nev} modes from {} available",
                modes.num_modes()
            )));
        }
        Ok(Self {
            phi: modes.eigenvectors.columns(0, nev).into_owned(),
            eigenvalues: modes.eigenvalues[..nev].to_vec(),
        })
    }

    pub fn num_modes(&self) -> usize {
        self.phi.ncols()
    }

    pub fn num_dofs(&self) -> usize {
        self.phi.nrows()
    }

    pub fn basis(&self) -> &Mat {
        &self.phi
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    fn check_square(&self, context: &str, m: &Mat) -> FEAResult<()> {
        let n = self.num_dofs();
        if m.nrows() != n {
            return Err(FEAError::dimension(context, n, m.nrows()));
        }
        if m.ncols() != n {
            return Err(FEAError::dimension(context, n, m.ncols()));
        }
        Ok(())
    }

    /// `Φᵀ K Φ`, diagonal with the eigenvalues for the matrix the modes came from
    pub fn reduced_stiffness(&self, k: &Mat) -> FEAResult<Mat> {
        self.check_square("stiffness matrix", k)?;
        Ok(self.phi.transpose() * k * &self.phi)
    }

    /// `Φᵀ M Φ`, the identity for the matrix the modes came from
    pub fn reduced_mass(&self, m: &Mat) -> FEAResult<Mat> {
        self.check_square("mass matrix", m)?;
        Ok(self.phi.transpose() * m * &self.phi)
    }

    /// Modal load `Φᵀ f`
    pub fn project(&self, f: &FEVec) -> FEAResult<FEVec> {
        if f.len() != self.num_dofs() {
            return Err(FEAError::dimension("load vector", self.num_dofs(), f.len()));
        }
        Ok(self.phi.tr_mul(f))
    }

    /// `Φᵀ F` for a load history with one column per sample
    pub fn project_history(&self, f: &Mat) -> FEAResult<Mat> {
        if f.nrows() != self.num_dofs() {
            return Err(FEAError::dimension("load history rows", self.num_dofs(), f.nrows()));
        }
        Ok(self.phi.tr_mul(f))
    }

    /// `Φ q`
    pub fn expand(&self, q: &FEVec) -> FEAResult<FEVec> {
        if q.len() != self.num_modes() {
            return Err(FEAError::dimension("modal coordinates", self.num_modes(), q.len()));
        }
        Ok(&self.phi * q)
    }

    /// `Φ Q` for modal histories with one column per sample
    pub fn expand_history(&self, q: &Mat) -> FEAResult<Mat> {
        if q.nrows() != self.num_modes() {
            return Err(FEAError::dimension(
                "modal history rows",
                self.num_modes(),
                q.nrows(),
            ));
        }
        Ok(&self.phi * q)
    }
}
