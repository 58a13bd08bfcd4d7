//! Implicit Newmark time integration
//!
//! Integrates `M ä + C ȧ + K a = f(t)` on a fixed grid `t_n = n Δt` with
//! time-varying loads and prescribed DOF values. The scheme uses the
//! displacement form:
//!
//! ```text
//! ã     = a_n + Δt ȧ_n + (½ - β) Δt² ä_n
//! ṽ     = ȧ_n + (1 - γ) Δt ä_n
//! K_eff = K + γ/(βΔt) C + 1/(βΔt²) M
//! K_eff a_{n+1} = f_{n+1} + M ã/(βΔt²) + C (γ/(βΔt) ã - ṽ)
//! ä_{n+1} = (a_{n+1} - ã) / (βΔt²)
//! ȧ_{n+1} = ṽ + γ Δt ä_{n+1}
//! ```
//!
//! `K_eff` does not change between steps, so its free block is factorized
//! once and reused.
//!
//! Standard parameter choices:
//! - **Average acceleration** (unconditionally stable): γ = 1/2, β = 1/4
//! - **Linear acceleration** (conditionally stable): γ = 1/2, β = 1/6

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::constraints::{Constraints, PrescribedHistory};
use crate::error::{FEAError, FEAResult};
use crate::math::{Mat, Vec as FEVec};
use crate::results::{ResponseHistory, TransientResults};
use crate::solver::{ReducedSystem, SolverOptions};
use crate::topology::dof_from_one_based;

/// Largest number of steps a single run may take
pub const MAX_STEPS: usize = 100_000_000;

/// Time grid and Newmark parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewmarkParams {
    /// Time step Δt
    pub dt: f64,
    /// End time T
    pub total_time: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl NewmarkParams {
    /// Validated parameters
    pub fn new(dt: f64, total_time: f64, beta: f64, gamma: f64) -> FEAResult<Self> {
        let params = Self {
            dt,
            total_time,
            beta,
            gamma,
        };
        params.validate()?;
        Ok(params)
    }

    /// Average acceleration (trapezoidal rule), β = 1/4, γ = 1/2
    pub fn average_acceleration(dt: f64, total_time: f64) -> FEAResult<Self> {
        Self::new(dt, total_time, 0.25, 0.5)
    }

    /// Linear acceleration, β = 1/6, γ = 1/2
    pub fn linear_acceleration(dt: f64, total_time: f64) -> FEAResult<Self> {
        Self::new(dt, total_time, 1.0 / 6.0, 0.5)
    }

    /// From an ordered `[dt, T, β, γ]` slice
    pub fn from_slice(ip: &[f64]) -> FEAResult<Self> {
        match ip {
            &[dt, total_time, beta, gamma] => Self::new(dt, total_time, beta, gamma),
            _ => Err(FEAError::Configuration(format!(
                "integration parameters need [dt, T, beta, gamma], got {} values",
                ip.len()
            ))),
        }
    }

    pub fn validate(&self) -> FEAResult<()> {
        let all = [self.dt, self.total_time, self.beta, self.gamma];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(FEAError::Configuration(
                "integration parameters must be finite".to_string(),
            ));
        }
        if self.dt <= 0.0 {
            return Err(FEAError::Configuration(format!(
                "time step must be positive, got {}",
                self.dt
            )));
        }
        if self.total_time <= 0.0 {
            return Err(FEAError::Configuration(format!(
                "total time must be positive, got {}",
                self.total_time
            )));
        }
        if !(self.beta > 0.0 && self.beta <= 0.5) {
            return Err(FEAError::Configuration(format!(
                "beta must lie in (0, 1/2], got {}",
                self.beta
            )));
        }
        if !(0.5..=1.0).contains(&self.gamma) {
            return Err(FEAError::Configuration(format!(
                "gamma must lie in [1/2, 1], got {}",
                self.gamma
            )));
        }
        if self.total_time / self.dt > MAX_STEPS as f64 {
            return Err(FEAError::Configuration(format!(
                "T / dt = {:e} exceeds the limit of {MAX_STEPS} steps",
                self.total_time / self.dt
            )));
        }
        Ok(())
    }

    /// `β ≥ ¼ (γ + ½)²`
    pub fn is_unconditionally_stable(&self) -> bool {
        self.beta >= 0.25 * (self.gamma + 0.5).powi(2) - 1e-12
    }

    /// Steps needed to reach `total_time`, `ceil(T / Δt)`
    ///
    /// A quotient within 1e-9 of an integer counts as that integer so that
    /// `T = 1, Δt = 0.005` gives exactly 200 steps.
    pub fn num_steps(&self) -> usize {
        let ratio = self.total_time / self.dt;
        let rounded = ratio.round();
        if (ratio - rounded).abs() <= 1e-9 * ratio.max(1.0) {
            rounded as usize
        } else {
            ratio.ceil() as usize
        }
    }

    /// Samples including the initial state
    pub fn num_samples(&self) -> usize {
        self.num_steps() + 1
    }

    pub fn time(&self, step: usize) -> f64 {
        step as f64 * self.dt
    }

    /// Sample times `0, Δt, ..., num_steps Δt`
    pub fn time_grid(&self) -> Vec<f64> {
        (0..self.num_samples()).map(|s| self.time(s)).collect()
    }

    /// Nearest step to time `t`, which must lie in `[0, T]`
    pub fn nearest_step(&self, t: f64) -> FEAResult<usize> {
        let tol = 1e-9 * self.dt;
        if !t.is_finite() || t < -tol || t > self.total_time + tol {
            return Err(FEAError::Configuration(format!(
                "output time {t} is outside [0, {}]",
                self.total_time
            )));
        }
        Ok(((t / self.dt).round().max(0.0) as usize).min(self.num_steps()))
    }
}

impl TryFrom<(f64, f64, f64, f64)> for NewmarkParams {
    type Error = FEAError;

    fn try_from((dt, total_time, beta, gamma): (f64, f64, f64, f64)) -> FEAResult<Self> {
        Self::new(dt, total_time, beta, gamma)
    }
}

/// Rayleigh damping `C = α M + β K`
pub fn rayleigh_damping(m: &Mat, k: &Mat, alpha: f64, beta: f64) -> FEAResult<Mat> {
    if m.shape() != k.shape() {
        return Err(FEAError::dimension("Rayleigh damping matrices", k.nrows(), m.nrows()));
    }
    Ok(m * alpha + k * beta)
}

/// External load at each sample
#[derive(Debug, Clone, PartialEq)]
pub enum LoadHistory {
    Zero,
    /// The same load at every sample
    Constant(FEVec),
    /// `n_dofs × n_samples`, one column per sample
    Series(Mat),
}

impl LoadHistory {
    /// Spatial pattern scaled by a sampled time function, `F[:, s] = f g[s]`
    pub fn scaled(pattern: &FEVec, g: &[f64]) -> Self {
        LoadHistory::Series(Mat::from_fn(pattern.len(), g.len(), |i, s| pattern[i] * g[s]))
    }

    fn check(&self, n_dofs: usize, n_samples: usize) -> FEAResult<()> {
        match self {
            LoadHistory::Zero => Ok(()),
            LoadHistory::Constant(f) if f.len() != n_dofs => {
                Err(FEAError::dimension("constant load vector", n_dofs, f.len()))
            }
            LoadHistory::Constant(_) => Ok(()),
            LoadHistory::Series(f) if f.nrows() != n_dofs => {
                Err(FEAError::dimension("load history rows", n_dofs, f.nrows()))
            }
            LoadHistory::Series(f) if f.ncols() != n_samples => {
                Err(FEAError::dimension("load history samples", n_samples, f.ncols()))
            }
            LoadHistory::Series(_) => Ok(()),
        }
    }

    fn at(&self, step: usize, n_dofs: usize) -> FEVec {
        match self {
            LoadHistory::Zero => FEVec::zeros(n_dofs),
            LoadHistory::Constant(f) => f.clone(),
            LoadHistory::Series(f) => f.column(step).into_owned(),
        }
    }
}

/// Everything a transient analysis needs, borrowed matrices included
///
/// Prescribed DOFs start at their sample-0 values, with the velocity given
/// by `initial_velocity` (zero by default) and zero acceleration. The
/// velocity is not derived from the history: a support motion that starts
/// with slope `s` should pass `s` at that DOF through
/// [`with_initial_state`](Self::with_initial_state), or its acceleration
/// oscillates from step to step and loads the free DOFs through `M`.
#[derive(Debug, Clone)]
pub struct TransientProblem<'a> {
    pub stiffness: &'a Mat,
    pub mass: &'a Mat,
    pub damping: Option<&'a Mat>,
    pub loads: LoadHistory,
    pub prescribed: Option<PrescribedHistory>,
    pub initial_displacement: Option<FEVec>,
    pub initial_velocity: Option<FEVec>,
    pub params: NewmarkParams,
    pub solver: SolverOptions,
    /// Log progress every this many steps
    pub progress_interval: Option<usize>,
}

impl<'a> TransientProblem<'a> {
    /// Undamped, unloaded, unconstrained problem starting at rest
    pub fn new(stiffness: &'a Mat, mass: &'a Mat, params: NewmarkParams) -> Self {
        Self {
            stiffness,
            mass,
            damping: None,
            loads: LoadHistory::Zero,
            prescribed: None,
            initial_displacement: None,
            initial_velocity: None,
            params,
            solver: SolverOptions::default(),
            progress_interval: None,
        }
    }

    pub fn with_damping(mut self, damping: &'a Mat) -> Self {
        self.damping = Some(damping);
        self
    }

    pub fn with_loads(mut self, loads: LoadHistory) -> Self {
        self.loads = loads;
        self
    }

    pub fn with_prescribed(mut self, prescribed: PrescribedHistory) -> Self {
        self.prescribed = Some(prescribed);
        self
    }

    /// Hold static constraints constant over the whole run
    pub fn with_constraints(mut self, constraints: &Constraints) -> Self {
        self.prescribed = Some(PrescribedHistory::constant(
            constraints,
            self.params.num_samples(),
        ));
        self
    }

    pub fn with_initial_state(mut self, displacement: FEVec, velocity: FEVec) -> Self {
        self.initial_displacement = Some(displacement);
        self.initial_velocity = Some(velocity);
        self
    }

    pub fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_progress_interval(mut self, steps: usize) -> Self {
        self.progress_interval = (steps > 0).then_some(steps);
        self
    }

    pub fn num_dofs(&self) -> usize {
        self.stiffness.nrows()
    }

    fn check(&self) -> FEAResult<()> {
        self.params.validate()?;
        let n = self.num_dofs();
        check_square("stiffness matrix", self.stiffness, n)?;
        check_square("mass matrix", self.mass, n)?;
        if let Some(c) = self.damping {
            check_square("damping matrix", c, n)?;
        }
        self.loads.check(n, self.params.num_samples())?;
        if let Some(history) = &self.prescribed {
            if let Some(&dof) = history.dofs().iter().find(|&&d| d >= n) {
                return Err(FEAError::Constraint(format!(
                    "prescribed DOF {dof} is out of range for {n} DOFs"
                )));
            }
            if history.num_samples() != self.params.num_samples() {
                return Err(FEAError::dimension(
                    "prescribed history samples",
                    self.params.num_samples(),
                    history.num_samples(),
                ));
            }
        }
        for (context, v) in [
            ("initial displacement", &self.initial_displacement),
            ("initial velocity", &self.initial_velocity),
        ] {
            if let Some(v) = v {
                if v.len() != n {
                    return Err(FEAError::dimension(context, n, v.len()));
                }
            }
        }
        Ok(())
    }
}

fn check_square(context: &str, m: &Mat, n: usize) -> FEAResult<()> {
    if m.nrows() != n {
        return Err(FEAError::dimension(context, n, m.nrows()));
    }
    if m.ncols() != n {
        return Err(FEAError::dimension(context, n, m.ncols()));
    }
    Ok(())
}

/// Which samples and DOFs a run keeps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutputRequest {
    /// Every DOF at every sample
    Full,
    /// Selected zero-based DOFs at the steps nearest to `times`
    Monitor { times: Vec<f64>, dofs: Vec<usize> },
}

impl OutputRequest {
    pub fn monitor(times: Vec<f64>, dofs: Vec<usize>) -> Self {
        OutputRequest::Monitor { times, dofs }
    }

    /// Monitor one-based DOF numbers
    pub fn monitor_one_based(times: Vec<f64>, dofs: &[usize]) -> FEAResult<Self> {
        let dofs = dofs
            .iter()
            .map(|&d| dof_from_one_based(d))
            .collect::<FEAResult<Vec<usize>>>()?;
        Ok(OutputRequest::Monitor { times, dofs })
    }
}

/// Output plan: recorded DOFs, and for each step the result columns it fills
struct OutputPlan {
    dofs: Vec<usize>,
    steps: Vec<usize>,
    columns_at: Vec<Vec<usize>>,
}

impl OutputPlan {
    fn new(request: &OutputRequest, params: &NewmarkParams, n_dofs: usize) -> FEAResult<Self> {
        let n_samples = params.num_samples();
        let (dofs, steps): (Vec<usize>, Vec<usize>) = match request {
            OutputRequest::Full => ((0..n_dofs).collect(), (0..n_samples).collect()),
            OutputRequest::Monitor { times, dofs } => {
                if let Some(&bad) = dofs.iter().find(|&&d| d >= n_dofs) {
                    return Err(FEAError::IndexOutOfRange {
                        index: bad,
                        size: n_dofs,
                    });
                }
                let steps = times
                    .iter()
                    .map(|&t| params.nearest_step(t))
                    .collect::<FEAResult<Vec<usize>>>()?;
                (dofs.clone(), steps)
            }
        };

        let mut columns_at = vec![Vec::new(); n_samples];
        for (column, &step) in steps.iter().enumerate() {
            columns_at[step].push(column);
        }
        Ok(Self {
            dofs,
            steps,
            columns_at,
        })
    }
}

/// Stepwise Newmark integrator
///
/// Construction validates the problem, computes the initial acceleration and
/// factorizes `K_eff`. Each [`advance`](Self::advance) moves one step; the
/// current state stays readable after a failed step.
#[derive(Debug)]
pub struct NewmarkIntegrator<'a> {
    problem: TransientProblem<'a>,
    prescribed: PrescribedHistory,
    effective: ReducedSystem,
    step: usize,
    a: FEVec,
    da: FEVec,
    d2a: FEVec,
}

impl<'a> NewmarkIntegrator<'a> {
    pub fn new(problem: TransientProblem<'a>) -> FEAResult<Self> {
        problem.check()?;
        let params = problem.params;
        let n = problem.num_dofs();

        if !params.is_unconditionally_stable() {
            warn!(
                "Newmark beta = {}, gamma = {} is only conditionally stable",
                params.beta, params.gamma
            );
        }

        let prescribed = match &problem.prescribed {
            Some(history) => history.clone(),
            None => PrescribedHistory::new(Vec::new(), Mat::zeros(0, params.num_samples()))?,
        };

        info!(
            "Transient analysis: {n} DOFs, {} constrained, {} steps of {}",
            prescribed.dofs().len(),
            params.num_steps(),
            params.dt
        );

        // initial state, with constrained displacements pinned to sample 0
        let mut a = problem
            .initial_displacement
            .clone()
            .unwrap_or_else(|| FEVec::zeros(n));
        let da = problem
            .initial_velocity
            .clone()
            .unwrap_or_else(|| FEVec::zeros(n));
        for (&dof, value) in prescribed.dofs().iter().zip(prescribed.values_at(0)?) {
            a[dof] = value;
        }

        let mass_system = ReducedSystem::new(problem.mass, prescribed.dofs(), &problem.solver)
            .map_err(|e| step_failure(0, 0.0, e))?;
        let mut rhs = problem.loads.at(0, n) - problem.stiffness * &a;
        if let Some(c) = problem.damping {
            rhs -= c * &da;
        }
        let zeros = vec![0.0; prescribed.dofs().len()];
        let d2a = mass_system
            .solve(&rhs, &zeros)
            .map_err(|e| step_failure(0, 0.0, e))?;

        let c_mass = 1.0 / (params.beta * params.dt * params.dt);
        let c_damp = params.gamma / (params.beta * params.dt);
        let mut k_eff = problem.stiffness + problem.mass * c_mass;
        if let Some(c) = problem.damping {
            k_eff += c * c_damp;
        }
        let effective = ReducedSystem::new(&k_eff, prescribed.dofs(), &problem.solver)
            .map_err(|e| step_failure(1, params.dt, e))?;
        debug!("effective stiffness factorized");

        Ok(Self {
            problem,
            prescribed,
            effective,
            step: 0,
            a,
            da,
            d2a,
        })
    }

    pub fn params(&self) -> &NewmarkParams {
        &self.problem.params
    }

    /// Index of the current sample
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn time(&self) -> f64 {
        self.problem.params.time(self.step)
    }

    pub fn is_finished(&self) -> bool {
        self.step >= self.problem.params.num_steps()
    }

    pub fn displacement(&self) -> &FEVec {
        &self.a
    }

    pub fn velocity(&self) -> &FEVec {
        &self.da
    }

    pub fn acceleration(&self) -> &FEVec {
        &self.d2a
    }

    /// Move from the current sample to the next one
    pub fn advance(&mut self) -> FEAResult<()> {
        if self.is_finished() {
            return Err(FEAError::Configuration(format!(
                "integration already reached step {}",
                self.step
            )));
        }
        let params = self.problem.params;
        let dt = params.dt;
        let next = self.step + 1;
        let c_mass = 1.0 / (params.beta * dt * dt);
        let c_damp = params.gamma / (params.beta * dt);

        let a_pred = &self.a + &self.da * dt + &self.d2a * ((0.5 - params.beta) * dt * dt);
        let v_pred = &self.da + &self.d2a * ((1.0 - params.gamma) * dt);

        let n = self.problem.num_dofs();
        let mut f_eff = self.problem.loads.at(next, n) + self.problem.mass * (&a_pred * c_mass);
        if let Some(c) = self.problem.damping {
            f_eff += c * (&a_pred * c_damp - &v_pred);
        }

        let prescribed = self
            .prescribed
            .ordered_values_at(next, self.effective.partition())?;
        let a_next = self
            .effective
            .solve(&f_eff, &prescribed)
            .map_err(|e| step_failure(next, params.time(next), e))?;

        self.d2a = (&a_next - &a_pred) * c_mass;
        self.da = v_pred + &self.d2a * (params.gamma * dt);
        self.a = a_next;
        self.step = next;

        if let Some(every) = self.problem.progress_interval {
            if next % every == 0 {
                info!(
                    "step {next}/{} (t = {:.4}), max |a| = {:.4e}",
                    params.num_steps(),
                    params.time(next),
                    self.a.amax()
                );
            }
        }
        Ok(())
    }

    /// Advance to the end, recording what `output` asks for
    ///
    /// A failed step returns the error and discards the columns recorded so
    /// far. Drive [`advance`](Self::advance) directly to keep the state
    /// reached before a failure.
    pub fn run(mut self, output: &OutputRequest) -> FEAResult<TransientResults> {
        let params = self.problem.params;
        let plan = OutputPlan::new(output, &params, self.problem.num_dofs())?;
        let columns = plan.steps.len();
        let rows = plan.dofs.len();
        let mut displacement = Mat::zeros(rows, columns);
        let mut velocity = Mat::zeros(rows, columns);
        let mut acceleration = Mat::zeros(rows, columns);

        loop {
            for &column in &plan.columns_at[self.step] {
                for (row, &dof) in plan.dofs.iter().enumerate() {
                    displacement[(row, column)] = self.a[dof];
                    velocity[(row, column)] = self.da[dof];
                    acceleration[(row, column)] = self.d2a[dof];
                }
            }
            if self.is_finished() {
                break;
            }
            if let Err(e) = self.advance() {
                error!("transient analysis stopped at t = {:.6}: {e}", self.time());
                return Err(e);
            }
        }

        info!("Transient analysis finished at t = {:.6}", self.time());

        Ok(TransientResults {
            times: plan.steps.iter().map(|&s| params.time(s)).collect(),
            steps: plan.steps,
            displacement: ResponseHistory {
                dofs: plan.dofs.clone(),
                values: displacement,
            },
            velocity: ResponseHistory {
                dofs: plan.dofs.clone(),
                values: velocity,
            },
            acceleration: ResponseHistory {
                dofs: plan.dofs,
                values: acceleration,
            },
            final_displacement: self.a,
            final_velocity: self.da,
            final_acceleration: self.d2a,
        })
    }
}

fn step_failure(step: usize, time: f64, e: FEAError) -> FEAError {
    match e {
        FEAError::SingularMatrix(reason) => FEAError::StepFailed { step, time, reason },
        other => other,
    }
}

/// Integrate a problem from `t = 0` to `T` in one call
pub fn integrate(problem: TransientProblem<'_>, output: &OutputRequest) -> FEAResult<TransientResults> {
    NewmarkIntegrator::new(problem)?.run(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sdof(k: f64, m: f64) -> (Mat, Mat) {
        (Mat::from_element(1, 1, k), Mat::from_element(1, 1, m))
    }

    #[test]
    fn test_params_validation() {
        assert!(NewmarkParams::new(0.0, 1.0, 0.25, 0.5).is_err());
        assert!(NewmarkParams::new(-0.1, 1.0, 0.25, 0.5).is_err());
        assert!(NewmarkParams::new(0.1, 0.0, 0.25, 0.5).is_err());
        assert!(NewmarkParams::new(0.1, 1.0, 0.0, 0.5).is_err());
        assert!(NewmarkParams::new(0.1, 1.0, 0.6, 0.5).is_err());
        assert!(NewmarkParams::new(0.1, 1.0, 0.25, 0.4).is_err());
        assert!(NewmarkParams::new(f64::NAN, 1.0, 0.25, 0.5).is_err());
        assert!(NewmarkParams::from_slice(&[0.1, 1.0, 0.25]).is_err());

        let params = NewmarkParams::try_from((0.005, 1.0, 0.25, 0.5)).unwrap();
        assert_eq!(params.num_steps(), 200);
        assert!(params.is_unconditionally_stable());
        assert!(!NewmarkParams::linear_acceleration(0.1, 1.0)
            .unwrap()
            .is_unconditionally_stable());
    }

    #[test]
    fn test_num_steps_rounds_up() {
        let params = NewmarkParams::average_acceleration(0.3, 1.0).unwrap();
        assert_eq!(params.num_steps(), 4);
        assert_eq!(params.time_grid().len(), 5);
    }

    #[test]
    fn test_nearest_step() {
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        assert_eq!(params.nearest_step(0.0).unwrap(), 0);
        assert_eq!(params.nearest_step(0.34).unwrap(), 3);
        assert_eq!(params.nearest_step(0.36).unwrap(), 4);
        assert_eq!(params.nearest_step(1.0).unwrap(), 10);
        assert!(params.nearest_step(1.2).is_err());
        assert!(params.nearest_step(-0.1).is_err());
    }

    #[test]
    fn test_rest_stays_at_rest() {
        let (k, m) = sdof(100.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.01, 0.5).unwrap();
        let results = integrate(TransientProblem::new(&k, &m, params), &OutputRequest::Full).unwrap();
        assert_eq!(results.num_samples(), 51);
        assert_eq!(results.peak_displacement(), 0.0);
        assert_eq!(results.velocity.values.amax(), 0.0);
    }

    #[test]
    fn test_step_load_response() {
        let (k, m) = sdof(400.0, 1.0);
        let omega: f64 = 20.0;
        let params = NewmarkParams::average_acceleration(1e-4, 0.3).unwrap();
        let problem = TransientProblem::new(&k, &m, params)
            .with_loads(LoadHistory::Constant(FEVec::from_element(1, 2.0)));
        let results = integrate(problem, &OutputRequest::Full).unwrap();

        for s in (0..results.num_samples()).step_by(250) {
            let t = results.times[s];
            let exact = 2.0 / 400.0 * (1.0 - (omega * t).cos());
            assert_relative_eq!(results.displacement.values[(0, s)], exact, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_free_vibration_conserves_energy() {
        let k = Mat::from_row_slice(2, 2, &[200.0, -100.0, -100.0, 100.0]);
        let m = Mat::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 1.0]);
        let params = NewmarkParams::average_acceleration(0.05, 5.0).unwrap();
        let a0 = FEVec::from_vec(vec![0.01, 0.03]);
        let problem = TransientProblem::new(&k, &m, params)
            .with_initial_state(a0.clone(), FEVec::zeros(2));

        let energy = |a: &FEVec, v: &FEVec| {
            0.5 * (a.transpose() * &k * a)[(0, 0)] + 0.5 * (v.transpose() * &m * v)[(0, 0)]
        };
        let e0 = energy(&a0, &FEVec::zeros(2));

        let mut integrator = NewmarkIntegrator::new(problem).unwrap();
        while !integrator.is_finished() {
            integrator.advance().unwrap();
            let e = energy(integrator.displacement(), integrator.velocity());
            assert_relative_eq!(e, e0, max_relative = 1e-10);
        }
        assert!(integrator.advance().is_err());
    }

    #[test]
    fn test_prescribed_motion_is_followed() {
        // mass attached by a spring to a moving support at DOF 0
        let k = Mat::from_row_slice(2, 2, &[50.0, -50.0, -50.0, 50.0]);
        let m = Mat::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let params = NewmarkParams::average_acceleration(0.01, 0.2).unwrap();
        let n = params.num_samples();
        let support = Mat::from_fn(1, n, |_, s| 0.1 * params.time(s));
        let history = PrescribedHistory::new(vec![0], support.clone()).unwrap();

        let problem = TransientProblem::new(&k, &m, params).with_prescribed(history);
        let results = integrate(problem, &OutputRequest::Full).unwrap();
        for s in 0..n {
            assert_eq!(results.displacement.values[(0, s)], support[(0, s)]);
        }
        assert!(results.displacement.values[(1, n - 1)] > 0.0);
    }

    #[test]
    fn test_ramp_support_with_matching_initial_velocity() {
        let k = Mat::from_row_slice(2, 2, &[50.0, -50.0, -50.0, 50.0]);
        let m = Mat::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let params = NewmarkParams::average_acceleration(0.01, 0.2).unwrap();
        let slope = 0.1;
        let support = Mat::from_fn(1, params.num_samples(), |_, s| slope * params.time(s));
        let history = PrescribedHistory::new(vec![0], support).unwrap();

        // support velocity left at zero: the support acceleration alternates
        let at_rest = TransientProblem::new(&k, &m, params).with_prescribed(history.clone());
        let results = integrate(at_rest, &OutputRequest::Full).unwrap();
        assert_relative_eq!(
            results.acceleration.values[(0, 1)],
            4.0 * slope / params.dt,
            max_relative = 1e-6
        );
        assert!(results.acceleration.values[(0, 2)] < 0.0);

        let moving = TransientProblem::new(&k, &m, params)
            .with_prescribed(history)
            .with_initial_state(FEVec::zeros(2), FEVec::from_vec(vec![slope, 0.0]));
        let results = integrate(moving, &OutputRequest::Full).unwrap();
        for s in 0..results.num_samples() {
            assert!(results.acceleration.values[(0, s)].abs() < 1e-6);
            assert_relative_eq!(results.velocity.values[(0, s)], slope, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_prescribed_dof() {
        let (k, m) = sdof(100.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        let history = PrescribedHistory::new(vec![1], Mat::zeros(1, params.num_samples())).unwrap();
        let problem = TransientProblem::new(&k, &m, params).with_prescribed(history);
        assert!(matches!(NewmarkIntegrator::new(problem), Err(FEAError::Constraint(_))));

        let fixed = Constraints::fixed(vec![3]).unwrap();
        let problem = TransientProblem::new(&k, &m, params).with_constraints(&fixed);
        assert!(matches!(
            integrate(problem, &OutputRequest::Full),
            Err(FEAError::Constraint(_))
        ));
    }

    #[test]
    fn test_step_count_is_capped() {
        assert!(matches!(
            NewmarkParams::new(1e-300, 1.0, 0.25, 0.5),
            Err(FEAError::Configuration(_))
        ));
        assert!(NewmarkParams::new(1e-9, 1.0, 0.25, 0.5).is_err());
        assert!(NewmarkParams::new(1e-6, 1.0, 0.25, 0.5).is_ok());
    }

    #[test]
    fn test_state_survives_a_rejected_step() {
        let (k, m) = sdof(100.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.1, 0.3).unwrap();
        let problem = TransientProblem::new(&k, &m, params)
            .with_loads(LoadHistory::Constant(FEVec::from_element(1, 1.0)));
        let mut integrator = NewmarkIntegrator::new(problem).unwrap();
        while !integrator.is_finished() {
            integrator.advance().unwrap();
        }
        let reached = integrator.displacement().clone();

        assert!(matches!(integrator.advance(), Err(FEAError::Configuration(_))));
        assert_eq!(integrator.step(), 3);
        assert_eq!(integrator.displacement(), &reached);
        assert!(reached[0] > 0.0);
    }

    #[test]
    fn test_monitor_output() {
        let (k, m) = sdof(100.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        let problem = TransientProblem::new(&k, &m, params)
            .with_loads(LoadHistory::Constant(FEVec::from_element(1, 1.0)));
        let output = OutputRequest::monitor(vec![0.52, 0.0, 0.98], vec![0]);
        let results = integrate(problem, &output).unwrap();
        assert_eq!(results.steps, vec![5, 0, 10]);
        assert_relative_eq!(results.times[2], 1.0, epsilon = 1e-12);
        assert_eq!(results.displacement.values.shape(), (1, 3));
        assert_eq!(
            results.displacement.at(0, 2),
            Some(results.final_displacement[0])
        );
    }

    #[test]
    fn test_bad_output_requests() {
        let (k, m) = sdof(100.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        let late = OutputRequest::monitor(vec![1.5], vec![0]);
        assert!(matches!(
            integrate(TransientProblem::new(&k, &m, params), &late),
            Err(FEAError::Configuration(_))
        ));
        let bad_dof = OutputRequest::monitor(vec![0.5], vec![1]);
        assert!(matches!(
            integrate(TransientProblem::new(&k, &m, params), &bad_dof),
            Err(FEAError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_singular_mass_fails_at_step_zero() {
        let k = Mat::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 1.0]);
        let m = Mat::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.0]);
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        let result = NewmarkIntegrator::new(TransientProblem::new(&k, &m, params));
        assert!(matches!(result, Err(FEAError::StepFailed { step: 0, .. })));
    }

    #[test]
    fn test_load_history_shape() {
        let (k, m) = sdof(1.0, 1.0);
        let params = NewmarkParams::average_acceleration(0.1, 1.0).unwrap();
        let loads = LoadHistory::scaled(&FEVec::from_element(1, 3.0), &[0.0, 1.0]);
        let problem = TransientProblem::new(&k, &m, params).with_loads(loads);
        assert!(matches!(
            NewmarkIntegrator::new(problem),
            Err(FEAError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_rayleigh_damping_decays() {
        let (k, m) = sdof(100.0, 1.0);
        let c = rayleigh_damping(&m, &k, 0.5, 0.001).unwrap();
        let params = NewmarkParams::average_acceleration(0.01, 5.0).unwrap();
        let problem = TransientProblem::new(&k, &m, params)
            .with_damping(&c)
            .with_initial_state(FEVec::from_element(1, 1.0), FEVec::zeros(1));
        let results = integrate(problem, &OutputRequest::Full).unwrap();
        assert!(results.final_displacement[0].abs() < 0.5);
    }
}
