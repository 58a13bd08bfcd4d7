//! FEA Core Example - spring system, heat flow through a wall, transient pulse

use anyhow::Result;
use fea_core::prelude::*;

fn spring(k: f64) -> Mat {
    Mat::from_row_slice(2, 2, &[k, -k, -k, k])
}

fn main() -> Result<()> {
    env_logger::init();

    println!("=== FEA Core Example: Spring System ===\n");

    //   |--[3000]--o--[1500]--|
    //   1          2--[3000]--3
    let topology = DofTopology::from_one_based(&[[1usize, 2], [2, 3], [2, 3]])?;
    let mut springs = FEModel::new(topology, 3)?;
    for (e, k) in [3000.0, 1500.0, 3000.0].into_iter().enumerate() {
        springs.assemble_stiffness(e, &spring(k))?;
    }
    springs.add_point_load(1, 100.0)?;

    let solution = springs.analyze_static(&Constraints::from_table(&[(1, 0.0), (3, 0.0)])?)?;
    println!("Displacements:");
    for (i, a) in solution.displacements.iter().enumerate() {
        println!("  DOF {}: {:.6}", i + 1, a);
    }
    println!("\nReactions:");
    for (i, r) in solution.reactions.iter().enumerate() {
        println!("  DOF {}: {:.3}", i + 1, r);
    }
    println!("\nSpring forces:");
    for (e, k) in [3000.0, 1500.0, 3000.0].into_iter().enumerate() {
        let forces = springs.element_forces(e, &spring(k), &solution.displacements)?;
        println!("  Spring {}: N={:.3}", e + 1, -forces[0]);
    }

    println!("\n=== Heat Flow Through a Wall ===\n");

    // five layers, heat source at DOF 4, fixed surface temperatures
    let conductances = [25.0, 24.3, 0.4, 17.0, 7.7];
    let topology = DofTopology::from_one_based(&[[1usize, 2], [2, 3], [3, 4], [4, 5], [5, 6]])?;
    let mut wall = FEModel::new(topology, 6)?
        .with_options(AnalysisOptions::default().with_solver(LinearSolverKind::Skyline));
    for (e, &k) in conductances.iter().enumerate() {
        wall.assemble_stiffness(e, &spring(k))?;
    }
    wall.add_point_load(3, 10.0)?;

    let temperatures = wall.analyze_static(&Constraints::from_table(&[(1, -17.0), (6, 20.0)])?)?;
    println!("Temperatures:");
    for (i, t) in temperatures.displacements.iter().enumerate() {
        println!("  DOF {}: {:.3} C", i + 1, t);
    }
    println!("\nBoundary heat flows: {:.3} W, {:.3} W", temperatures.reactions[0], temperatures.reactions[5]);
    println!("\nLayer heat flows:");
    for (e, local) in wall.element_values(&temperatures.displacements)?.iter().enumerate() {
        println!("  Layer {}: {:.3} W", e + 1, conductances[e] * (local[0] - local[1]));
    }

    println!("\n=== Transient Pulse on a Mass-Spring Chain ===\n");

    let n = 4;
    let topology = DofTopology::new((0..n - 1).map(|i| vec![i, i + 1]).collect())?;
    let mut chain = FEModel::new(topology, n)?
        .with_options(AnalysisOptions::default().with_parallel_assembly());
    chain.assemble_with(|_| {
        Ok(ElementMatrices::stiffness(spring(1.0e4))
            .with_mass(Mat::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]) * (1.0 / 6.0)))
    })?;

    let modes = chain.analyze_modal(&[0])?;
    println!("Natural frequencies:");
    for (i, f) in modes.frequencies_hz().iter().enumerate() {
        println!("  Mode {}: {:.3} Hz", i + 1, f);
    }

    let params = NewmarkParams::average_acceleration(0.001, 0.5)?;
    let pulse = TimeFunction::new(vec![(0.0, 0.0), (0.05, 1.0), (0.1, 0.0), (0.5, 0.0)])?;
    let (_, g) = pulse.sample(params.dt)?;
    let mut pattern = FEVec::zeros(n);
    pattern[n - 1] = 100.0;

    let fixed = Constraints::fixed(vec![0])?;
    let results = chain.analyze_transient(
        params,
        LoadHistory::scaled(&pattern, &g),
        Some(PrescribedHistory::constant(&fixed, params.num_samples())),
        &OutputRequest::monitor((1..=5).map(|i| 0.1 * i as f64).collect(), vec![n - 1]),
    )?;

    println!("\nTip displacement:");
    for (s, t) in results.times.iter().enumerate() {
        println!("  t={:.2}s: {:.6}", t, results.displacement.values[(0, s)]);
    }

    println!("\n=== Analysis Complete ===");
    Ok(())
}
