//! FE Model - analysis session over a DOF topology

use log::info;

use crate::analysis::{AnalysisOptions, AnalysisType};
use crate::assembly::{assemble_parallel, ElementMatrices, GlobalSystem};
use crate::constraints::{Constraints, PrescribedHistory};
use crate::dynamics::{integrate, LoadHistory, NewmarkParams, OutputRequest, TransientProblem};
use crate::eigen::eigen_with_modes;
use crate::error::{FEAError, FEAResult};
use crate::extraction::{extract, extract_element};
use crate::math::{Mat, Vec as FEVec};
use crate::results::{ModalResults, StaticSolution, TransientResults};
use crate::solver::solve_with_options;
use crate::topology::DofTopology;

/// A finite element model: topology, its global system and analysis options
///
/// Element matrices are added by element index; the topology row of that
/// element decides where they land.
#[derive(Debug, Clone)]
pub struct FEModel {
    topology: DofTopology,
    system: GlobalSystem,
    options: AnalysisOptions,
    solution: Option<AnalysisType>,
}

impl FEModel {
    /// Create an empty model with `n_dofs` unknowns
    pub fn new(topology: DofTopology, n_dofs: usize) -> FEAResult<Self> {
        topology.validate(n_dofs)?;
        Ok(Self {
            topology,
            system: GlobalSystem::new(n_dofs),
            options: AnalysisOptions::default(),
            solution: None,
        })
    }

    pub fn with_options(mut self, options: AnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn topology(&self) -> &DofTopology {
        &self.topology
    }

    pub fn system(&self) -> &GlobalSystem {
        &self.system
    }

    pub fn num_dofs(&self) -> usize {
        self.system.num_dofs()
    }

    pub fn num_elements(&self) -> usize {
        self.topology.len()
    }

    // ========================
    // Assembly
    // ========================

    pub fn assemble_stiffness(&mut self, element: usize, k_local: &Mat) -> FEAResult<()> {
        let row = self.topology.row(element)?;
        self.system.assemble_stiffness(row, k_local)
    }

    pub fn assemble_mass(&mut self, element: usize, m_local: &Mat) -> FEAResult<()> {
        let row = self.topology.row(element)?;
        self.system.assemble_mass(row, m_local)
    }

    pub fn assemble_damping(&mut self, element: usize, c_local: &Mat) -> FEAResult<()> {
        let row = self.topology.row(element)?;
        self.system.assemble_damping(row, c_local)
    }

    pub fn assemble_load(&mut self, element: usize, f_local: &FEVec) -> FEAResult<()> {
        let row = self.topology.row(element)?;
        self.system.assemble_load(row, f_local)
    }

    /// Add a concentrated load at a zero-based DOF
    pub fn add_point_load(&mut self, dof: usize, value: f64) -> FEAResult<()> {
        self.system.add_point_load(dof, value)
    }

    /// Evaluate `kernel` for every element and assemble the results
    ///
    /// Runs on the rayon pool when `parallel_assembly` is set. Either way the
    /// system is only updated once every element has succeeded.
    pub fn assemble_with<F>(&mut self, kernel: F) -> FEAResult<()>
    where
        F: Fn(usize) -> FEAResult<ElementMatrices> + Sync,
    {
        if self.options.parallel_assembly {
            let partial = assemble_parallel(&self.topology, self.num_dofs(), kernel)?;
            let current = std::mem::replace(&mut self.system, GlobalSystem::new(0));
            self.system = current.merge(partial);
        } else {
            let mut partial = GlobalSystem::new(self.num_dofs());
            for (e, row) in self.topology.iter().enumerate() {
                let element = kernel(e)?;
                partial.assemble_element(row, &element)?;
            }
            let current = std::mem::replace(&mut self.system, GlobalSystem::new(0));
            self.system = current.merge(partial);
        }
        Ok(())
    }

    // ========================
    // Analysis
    // ========================

    /// Static solve of `K a = f + r` with the assembled load
    pub fn analyze_static(&mut self, constraints: &Constraints) -> FEAResult<StaticSolution> {
        info!("Static analysis: {} DOFs, {} constrained", self.num_dofs(), constraints.len());
        let solution = solve_with_options(
            self.system.stiffness(),
            self.system.load(),
            constraints,
            &self.options.solver,
        )?;
        self.solution = Some(AnalysisType::Static);
        Ok(solution)
    }

    /// Natural modes with `constrained_dofs` held at zero
    pub fn analyze_modal(&mut self, constrained_dofs: &[usize]) -> FEAResult<ModalResults> {
        let mass = self.system.mass().ok_or_else(|| {
            FEAError::Configuration("modal analysis needs an assembled mass matrix".to_string())
        })?;
        let modes = eigen_with_modes(
            self.system.stiffness(),
            mass,
            constrained_dofs,
            self.options.num_modes,
        )?;
        self.solution = Some(AnalysisType::Modal);
        Ok(modes)
    }

    /// Newmark integration from rest with the assembled matrices
    ///
    /// The assembled static load is not applied; pass it in `loads` when it
    /// should act.
    pub fn analyze_transient(
        &mut self,
        params: NewmarkParams,
        loads: LoadHistory,
        prescribed: Option<PrescribedHistory>,
        output: &OutputRequest,
    ) -> FEAResult<TransientResults> {
        let mass = self.system.mass().ok_or_else(|| {
            FEAError::Configuration("transient analysis needs an assembled mass matrix".to_string())
        })?;

        let mut problem = TransientProblem::new(self.system.stiffness(), mass, params)
            .with_loads(loads)
            .with_solver(self.options.solver.clone())
            .with_progress_interval(self.options.progress_interval);
        if let Some(c) = self.system.damping() {
            problem = problem.with_damping(c);
        }
        if let Some(history) = prescribed {
            problem = problem.with_prescribed(history);
        }

        let results = integrate(problem, output)?;
        self.solution = Some(AnalysisType::Transient);
        Ok(results)
    }

    // ========================
    // Post-processing
    // ========================

    /// Local vectors of every element
    pub fn element_values(&self, a: &FEVec) -> FEAResult<Vec<FEVec>> {
        extract(&self.topology, a)
    }

    /// Element end forces `k_local · a_local` of one element
    pub fn element_forces(&self, element: usize, k_local: &Mat, a: &FEVec) -> FEAResult<FEVec> {
        let local = extract_element(self.topology.row(element)?, a)?;
        if k_local.ncols() != local.len() {
            return Err(FEAError::dimension("element matrix columns", local.len(), k_local.ncols()));
        }
        Ok(k_local * local)
    }

    /// Check if an analysis has been run
    pub fn is_analyzed(&self) -> bool {
        self.solution.is_some()
    }

    /// Get the last analysis type performed
    pub fn solution_type(&self) -> Option<AnalysisType> {
        self.solution
    }
}
