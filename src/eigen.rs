//! Constrained generalized eigenproblem
//!
//! Solves `K φ = λ M φ` over the free DOFs. The mass block is factorized as
//! `M_FF = L Lᵀ` and the problem is transformed to the standard symmetric form
//! `L⁻¹ K_FF L⁻ᵀ ψ = λ ψ`, with `φ = L⁻ᵀ ψ`.
//!
//! Modes are mass-normalized (`φᵀ M φ = 1`) and signed so that their
//! largest-magnitude component is positive. Constrained DOFs are held at zero
//! and appear as zero rows of the returned eigenvectors.

use log::{debug, info, warn};
use nalgebra::linalg::{Cholesky, SymmetricEigen};

use crate::constraints::DofPartition;
use crate::error::{FEAError, FEAResult};
use crate::math::{is_symmetric, max_abs_diagonal, submatrix, Mat};
use crate::results::ModalResults;

/// Relative magnitude under which a negative eigenvalue is treated as round-off
const ROUNDOFF_EIGENVALUE: f64 = 1e-10;

/// Relative symmetry tolerance for the mass matrix
const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// All modes of `K φ = λ M φ` with `constrained_dofs` fixed at zero
pub fn eigen(k: &Mat, m: &Mat, constrained_dofs: &[usize]) -> FEAResult<ModalResults> {
    eigen_with_modes(k, m, constrained_dofs, None)
}

/// The lowest `num_modes` modes, or all of them for `None`
pub fn eigen_with_modes(
    k: &Mat,
    m: &Mat,
    constrained_dofs: &[usize],
    num_modes: Option<usize>,
) -> FEAResult<ModalResults> {
    let n = k.nrows();
    if k.ncols() != n {
        return Err(FEAError::dimension("stiffness matrix columns", n, k.ncols()));
    }
    if m.nrows() != n || m.ncols() != n {
        return Err(FEAError::dimension(
            "mass matrix size",
            n,
            if m.nrows() != n { m.nrows() } else { m.ncols() },
        ));
    }
    if num_modes == Some(0) {
        return Err(FEAError::Configuration(
            "number of modes must be positive".to_string(),
        ));
    }

    let partition = DofPartition::new(n, constrained_dofs)?;
    let n_free = partition.num_free();
    if n_free == 0 {
        return Err(FEAError::Constraint(
            "every DOF is constrained, no modes exist".to_string(),
        ));
    }
    if !is_symmetric(m, SYMMETRY_TOLERANCE) {
        return Err(FEAError::IndefiniteMass("mass matrix is not symmetric".to_string()));
    }

    info!("Modal analysis: {n_free} free DOFs");

    let k_ff = submatrix(k, partition.free(), partition.free());
    let m_ff = submatrix(m, partition.free(), partition.free());

    let max_mass = max_abs_diagonal(&m_ff);
    let chol = Cholesky::new(m_ff).ok_or_else(|| {
        FEAError::IndefiniteMass("Cholesky factorization of the free mass block failed".to_string())
    })?;
    let l = chol.l();
    let threshold = f64::EPSILON * max_mass;
    if let Some(i) = l.diagonal().iter().position(|l_ii| l_ii * l_ii <= threshold) {
        return Err(FEAError::IndefiniteMass(format!(
            "free mass block has a zero pivot at free equation {i}"
        )));
    }

    // A = L⁻¹ K L⁻ᵀ, formed as L⁻¹ (L⁻¹ K)ᵀ since K is symmetric
    let x = l.solve_lower_triangular(&k_ff).ok_or_else(|| {
        FEAError::IndefiniteMass("triangular solve with the mass factor failed".to_string())
    })?;
    let a = l.solve_lower_triangular(&x.transpose()).ok_or_else(|| {
        FEAError::IndefiniteMass("triangular solve with the mass factor failed".to_string())
    })?;
    let a = (&a + a.transpose()) * 0.5;

    let decomposition = SymmetricEigen::new(a);

    let mut order: Vec<usize> = (0..n_free).collect();
    order.sort_by(|&i, &j| {
        decomposition.eigenvalues[i].total_cmp(&decomposition.eigenvalues[j])
    });
    let count = num_modes.map_or(n_free, |m| m.min(n_free));
    order.truncate(count);

    let scale = decomposition
        .eigenvalues
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));

    let mut eigenvalues = Vec::with_capacity(count);
    let mut psi = Mat::zeros(n_free, count);
    for (col, &i) in order.iter().enumerate() {
        let mut lambda = decomposition.eigenvalues[i];
        if lambda < 0.0 {
            if -lambda <= ROUNDOFF_EIGENVALUE * scale {
                lambda = 0.0;
            } else {
                warn!("mode {}: negative eigenvalue {lambda:.6e}, stiffness is indefinite", col + 1);
            }
        }
        eigenvalues.push(lambda);
        psi.set_column(col, &decomposition.eigenvectors.column(i));
    }

    // φ = L⁻ᵀ ψ keeps ψᵀψ = 1 as φᵀ M φ = 1
    let phi = l.tr_solve_lower_triangular(&psi).ok_or_else(|| {
        FEAError::IndefiniteMass("triangular solve with the mass factor failed".to_string())
    })?;

    let mut eigenvectors = Mat::zeros(n, count);
    for col in 0..count {
        let column = phi.column(col);
        let sign = column
            .iter()
            .fold((0.0_f64, 1.0_f64), |(best, sign), &v| {
                if v.abs() > best {
                    (v.abs(), v.signum())
                } else {
                    (best, sign)
                }
            })
            .1;
        for (i, &dof) in partition.free().iter().enumerate() {
            eigenvectors[(dof, col)] = sign * column[i];
        }
    }

    debug!(
        "lowest eigenvalue {:.6e}, highest kept {:.6e}",
        eigenvalues.first().copied().unwrap_or(0.0),
        eigenvalues.last().copied().unwrap_or(0.0)
    );

    Ok(ModalResults {
        eigenvalues,
        eigenvectors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two masses on a chain of two springs, fixed at the left wall (DOF 0)
    fn chain() -> (Mat, Mat) {
        let k = Mat::from_row_slice(3, 3, &[1.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 1.0]);
        let m = Mat::from_diagonal(&crate::math::Vec::from_vec(vec![1.0, 1.0, 1.0]));
        (k, m)
    }

    #[test]
    fn test_two_dof_chain() {
        let (k, m) = chain();
        let modes = eigen(&k, &m, &[0]).unwrap();
        assert_eq!(modes.num_modes(), 2);

        let sqrt5 = 5.0_f64.sqrt();
        assert_relative_eq!(modes.eigenvalues[0], (3.0 - sqrt5) / 2.0, epsilon = 1e-12);
        assert_relative_eq!(modes.eigenvalues[1], (3.0 + sqrt5) / 2.0, epsilon = 1e-12);

        for i in 0..2 {
            let phi = modes.mode(i);
            assert_eq!(phi[0], 0.0);
            let residual = &k * &phi - modes.eigenvalues[i] * (&m * &phi);
            assert!(residual.amax() < 1e-10);
            assert_relative_eq!((phi.transpose() * &m * &phi)[(0, 0)], 1.0, epsilon = 1e-12);
            assert!(phi.amax() == phi.max());
        }
    }

    #[test]
    fn test_mass_normalization_with_scaled_mass() {
        let (k, m) = chain();
        let m = m * 4.0;
        let modes = eigen_with_modes(&k, &m, &[0], Some(1)).unwrap();
        assert_eq!(modes.num_modes(), 1);
        let phi = modes.mode(0);
        assert_relative_eq!((phi.transpose() * &m * &phi)[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(modes.eigenvalues[0], (3.0 - 5.0_f64.sqrt()) / 8.0, epsilon = 1e-12);
    }

    #[test]
    fn test_free_free_has_rigid_mode() {
        let (k, m) = chain();
        let modes = eigen(&k, &m, &[]).unwrap();
        assert_relative_eq!(modes.eigenvalues[0], 0.0, epsilon = 1e-12);
        assert!(modes.eigenvalues[0] >= 0.0);
        assert!(modes.eigenvalues.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_indefinite_mass() {
        let (k, _) = chain();
        let m = Mat::from_diagonal(&crate::math::Vec::from_vec(vec![1.0, 0.0, 1.0]));
        assert!(matches!(eigen(&k, &m, &[0]), Err(FEAError::IndefiniteMass(_))));

        let m = Mat::from_diagonal(&crate::math::Vec::from_vec(vec![1.0, -1.0, 1.0]));
        assert!(matches!(eigen(&k, &m, &[0]), Err(FEAError::IndefiniteMass(_))));

        // a zero mass at a constrained DOF is irrelevant
        let m = Mat::from_diagonal(&crate::math::Vec::from_vec(vec![0.0, 1.0, 1.0]));
        assert!(eigen(&k, &m, &[0]).is_ok());
    }

    #[test]
    fn test_errors() {
        let (k, m) = chain();
        assert!(matches!(
            eigen(&k, &m, &[0, 1, 2]),
            Err(FEAError::Constraint(_))
        ));
        assert!(matches!(
            eigen(&k, &Mat::identity(2, 2), &[0]),
            Err(FEAError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            eigen_with_modes(&k, &m, &[0], Some(0)),
            Err(FEAError::Configuration(_))
        ));
    }
}
