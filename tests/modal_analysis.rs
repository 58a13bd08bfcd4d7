//! Eigenvalue analysis of a plane frame

mod common;

use approx::assert_relative_eq;
use common::{frame, frame_constrained_dofs};
use fea_core::prelude::*;

#[test]
fn test_frame_modes() {
    let mut model = frame();
    let constrained = frame_constrained_dofs();
    let modes = model.analyze_modal(&constrained).unwrap();

    let k = model.system().stiffness();
    let m = model.system().mass().unwrap();

    assert_eq!(modes.num_modes(), 11);
    assert_eq!(modes.eigenvectors.shape(), (15, 11));
    assert!(modes.eigenvalues[0] > 0.0);
    assert!(modes.eigenvalues.windows(2).all(|w| w[0] <= w[1]));

    for i in 0..modes.num_modes() {
        let phi = modes.mode(i);
        for &dof in &constrained {
            assert_eq!(phi[dof], 0.0);
        }

        let lambda = modes.eigenvalues[i];
        let k_phi = k * &phi;
        let residual = &k_phi - (m * &phi) * lambda;
        assert!(
            residual.amax() <= 1e-6 * k_phi.amax(),
            "mode {i}: residual {}",
            residual.amax()
        );

        assert_relative_eq!((phi.transpose() * m * &phi)[(0, 0)], 1.0, epsilon = 1e-9);
        assert_relative_eq!(
            (phi.transpose() * k * &phi)[(0, 0)],
            lambda,
            max_relative = 1e-6
        );

        // largest-magnitude component is positive
        assert_eq!(phi.amax(), phi.max());
    }

    // distinct modes are M-orthogonal
    let phi = &modes.eigenvectors;
    let m_r = phi.transpose() * m * phi;
    assert_relative_eq!(m_r, Mat::identity(11, 11), epsilon = 1e-8);

    let f = modes.frequencies_hz();
    assert_relative_eq!(
        f[0],
        modes.eigenvalues[0].sqrt() / (2.0 * std::f64::consts::PI),
        max_relative = 1e-12
    );
    assert_eq!(model.solution_type(), Some(AnalysisType::Modal));
}

#[test]
fn test_frame_lowest_modes_only() {
    let mut model = frame().with_options(AnalysisOptions::modal(3));
    let constrained = frame_constrained_dofs();
    let lowest = model.analyze_modal(&constrained).unwrap();

    let all = eigen(
        model.system().stiffness(),
        model.system().mass().unwrap(),
        &constrained,
    )
    .unwrap();

    assert_eq!(lowest.num_modes(), 3);
    for i in 0..3 {
        assert_relative_eq!(lowest.eigenvalues[i], all.eigenvalues[i], max_relative = 1e-10);
    }
}

#[test]
fn test_indefinite_mass_is_rejected() {
    let model = frame();
    let k = model.system().stiffness();
    let mut m = model.system().mass().unwrap().clone();
    m[(4, 4)] = -1.0;
    assert!(matches!(
        eigen(k, &m, &frame_constrained_dofs()),
        Err(FEAError::IndefiniteMass(_))
    ));

    let mut asymmetric = model.system().mass().unwrap().clone();
    asymmetric[(4, 5)] += 1.0;
    assert!(matches!(
        eigen(k, &asymmetric, &frame_constrained_dofs()),
        Err(FEAError::IndefiniteMass(_))
    ));
}
