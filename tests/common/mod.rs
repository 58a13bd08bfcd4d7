//! Element kernels and models shared by the integration tests

#![allow(dead_code)]

use fea_core::prelude::*;

/// Two-node spring (or one-dimensional conductance)
pub fn spring(k: f64) -> Mat {
    Mat::from_row_slice(2, 2, &[k, -k, -k, k])
}

/// Section and material data of a plane beam
#[derive(Debug, Clone, Copy)]
pub struct BeamProperties {
    pub e: f64,
    pub area: f64,
    pub inertia: f64,
    /// Mass per unit length
    pub mass: f64,
}

/// Rotation from global (x, y, θ) pairs to the local beam axes
fn beam_transformation(nx: f64, ny: f64) -> Mat {
    let mut g = Mat::zeros(6, 6);
    for node in 0..2 {
        let o = 3 * node;
        g[(o, o)] = nx;
        g[(o, o + 1)] = ny;
        g[(o + 1, o)] = -ny;
        g[(o + 1, o + 1)] = nx;
        g[(o + 2, o + 2)] = 1.0;
    }
    g
}

/// Global stiffness and consistent mass of a plane Euler-Bernoulli beam
pub fn beam2d(from: (f64, f64), to: (f64, f64), p: &BeamProperties) -> (Mat, Mat) {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let l = (dx * dx + dy * dy).sqrt();

    let ea = p.e * p.area / l;
    let ei = p.e * p.inertia;
    let k1 = 12.0 * ei / l.powi(3);
    let k2 = 6.0 * ei / l.powi(2);
    let k3 = 4.0 * ei / l;
    let k4 = 2.0 * ei / l;
    #[rustfmt::skip]
    let k_local = Mat::from_row_slice(6, 6, &[
         ea,  0.0, 0.0, -ea,  0.0, 0.0,
        0.0,  k1,  k2,  0.0, -k1,  k2,
        0.0,  k2,  k3,  0.0, -k2,  k4,
        -ea,  0.0, 0.0,  ea,  0.0, 0.0,
        0.0, -k1, -k2,  0.0,  k1, -k2,
        0.0,  k2,  k4,  0.0, -k2,  k3,
    ]);

    let c = p.mass * l / 420.0;
    #[rustfmt::skip]
    let m_local = Mat::from_row_slice(6, 6, &[
        140.0, 0.0,       0.0,              70.0, 0.0,       0.0,
        0.0,   156.0,     22.0 * l,         0.0,  54.0,      -13.0 * l,
        0.0,   22.0 * l,  4.0 * l * l,      0.0,  13.0 * l,  -3.0 * l * l,
        70.0,  0.0,       0.0,              140.0, 0.0,      0.0,
        0.0,   54.0,      13.0 * l,         0.0,  156.0,     -22.0 * l,
        0.0,   -13.0 * l, -3.0 * l * l,     0.0,  -22.0 * l, 4.0 * l * l,
    ]) * c;

    let g = beam_transformation(dx / l, dy / l);
    (g.transpose() * k_local * &g, g.transpose() * m_local * &g)
}

/// Plane frame of a 3 m column and a 2 m beam, five nodes, 15 DOFs
///
/// Returns the model with stiffness and mass assembled.
pub fn frame() -> FEModel {
    let e = 3e10;
    let rho = 2500.0;
    let column = BeamProperties {
        e,
        area: 0.1030e-2,
        inertia: 0.0171e-4,
        mass: rho * 0.1030e-2,
    };
    let beam = BeamProperties {
        e,
        area: 0.0764e-2,
        inertia: 0.00801e-4,
        mass: rho * 0.0764e-2,
    };
    let coords = [(0.0, 0.0), (0.0, 1.5), (0.0, 3.0), (1.0, 3.0), (2.0, 3.0)];

    let topology = DofTopology::from_one_based(&[
        [1usize, 2, 3, 4, 5, 6],
        [4, 5, 6, 7, 8, 9],
        [7, 8, 9, 10, 11, 12],
        [10, 11, 12, 13, 14, 15],
    ])
    .unwrap();
    let mut model = FEModel::new(topology, 15).unwrap();
    model
        .assemble_with(|e| {
            let props = if e < 2 { &column } else { &beam };
            let (k, m) = beam2d(coords[e], coords[e + 1], props);
            Ok(ElementMatrices::stiffness(k).with_mass(m))
        })
        .unwrap();
    model
}

/// Fixed base (DOFs 1, 2, 3) and vertical support at the beam end (DOF 14), one-based
pub const FRAME_SUPPORTS: [usize; 4] = [1, 2, 3, 14];

pub fn frame_constrained_dofs() -> Vec<usize> {
    FRAME_SUPPORTS
        .iter()
        .map(|&d| dof_from_one_based(d).unwrap())
        .collect()
}

/// Triangular pulse peaking at 0.15 s, zero after 0.25 s
pub fn pulse(total_time: f64) -> TimeFunction {
    TimeFunction::new(vec![(0.0, 0.0), (0.15, 1.0), (0.25, 0.0), (total_time, 0.0)]).unwrap()
}
