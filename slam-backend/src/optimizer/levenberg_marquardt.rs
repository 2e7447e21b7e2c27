//! Levenberg-Marquardt algorithm implementation.
//!
//! The Levenberg-Marquardt (LM) method minimizes the total cost
//!
//! ```text
//! χ²(x) = Σₖ ρ(rₖ(x)ᵀ·Wₖ·rₖ(x))
//! ```
//!
//! by repeatedly solving the damped normal equations assembled by the Problem:
//!
//! ```text
//! (H + λI)·Δx = b,     H = JᵀWJ,  b = -JᵀWr
//! ```
//!
//! ## Damping Parameter Strategy
//!
//! - **λ → 0** (small damping): Gauss-Newton steps, fast convergence near the solution
//! - **λ → ∞** (large damping): short gradient-descent steps, robust far from it
//!
//! ## Step Acceptance and Damping Update
//!
//! Each trial step is scored with the gain ratio
//!
//! ```text
//! ρ = (χ²_old - χ²_new) / (Δxᵀ·(λ·Δx + b) + ε)
//! ```
//!
//! - `ρ > 0` and finite `χ²_new`: accept, `λ ← λ·max(1/3, min(2/3, 1 - (2ρ - 1)³))`, `ν ← 2`
//! - otherwise: reject and restore the Variables, `λ ← λ·ν`, `ν ← 2ν`
//!
//! The initial damping is `τ·max(diag(H))`.
//!
//! ## Stopping
//!
//! - `sqrt(χ²) ≤ relative_cost_threshold · χ²₀` after an accepted step
//! - `‖Δx‖² ≤ min_step_norm_squared`, before that step is applied
//! - more than `max_failed_trials` consecutive rejections
//! - `max_iterations` outer iterations, or the timeout
//!
//! # Examples
//!
//! ```
//! use slam_backend::core::problem::Problem;
//! use slam_backend::factors::PriorFactor;
//! use slam_backend::manifold::ManifoldType;
//! use slam_backend::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut problem = Problem::new();
//! let x = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![10.0]))?;
//! problem.create_constraint(&[x], Box::new(PriorFactor::new(DVector::from_vec(vec![3.0]))))?;
//!
//! let config = LevenbergMarquardtConfig::new()
//!     .with_max_iterations(20)
//!     .with_record_history(true);
//! let mut solver = LevenbergMarquardt::with_config(config);
//! let summary = solver.optimize(&mut problem)?;
//! assert!(summary.convergence_status.is_converged());
//! # Ok(())
//! # }
//! ```

use crate::core::problem::Problem;
use crate::error::BackendResult;
use crate::linalg::{LinearSolverType, create_linear_solver};
use crate::optimizer::{
    OptObserver, OptObserverVec, OptimizationStatus, OptimizerError, OptimizerResult, Solver,
};
use nalgebra::DVector;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use tracing::{Level, debug, info, warn};
use web_time::{Duration, Instant};

/// Summary statistics for the Levenberg-Marquardt optimization process.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtSummary {
    /// Initial cost value
    pub initial_cost: f64,
    /// Final cost value
    pub final_cost: f64,
    /// Number of outer iterations performed (accepted steps)
    pub iterations: usize,
    /// Number of accepted trials
    pub accepted_trials: usize,
    /// Number of rejected trials
    pub rejected_trials: usize,
    /// Final damping parameter value
    pub final_damping: f64,
    /// Final damping growth factor
    pub final_nu: f64,
    /// Total time elapsed
    pub total_time: Duration,
    /// Per-trial statistics, filled when history recording is enabled
    pub iteration_history: Vec<IterationStats>,
    /// Convergence status
    pub convergence_status: OptimizationStatus,
}

impl Display for LevenbergMarquardtSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Levenberg-Marquardt Final Result")?;

        if self.convergence_status.is_converged() {
            writeln!(f, "CONVERGED ({})", self.convergence_status)?;
        } else {
            writeln!(f, "STOPPED ({})", self.convergence_status)?;
        }

        writeln!(f)?;
        writeln!(f, "Cost:")?;
        writeln!(f, "  Initial:   {:.6e}", self.initial_cost)?;
        writeln!(f, "  Final:     {:.6e}", self.final_cost)?;
        writeln!(
            f,
            "  Reduction: {:.6e} ({:.2}%)",
            self.initial_cost - self.final_cost,
            100.0 * (self.initial_cost - self.final_cost) / self.initial_cost.max(1e-12)
        )?;
        writeln!(f)?;
        writeln!(f, "Iterations:")?;
        writeln!(f, "  Total:           {}", self.iterations)?;
        writeln!(f, "  Accepted trials: {}", self.accepted_trials)?;
        writeln!(f, "  Rejected trials: {}", self.rejected_trials)?;
        writeln!(f)?;
        writeln!(f, "Damping:")?;
        writeln!(f, "  Final lambda: {:.2e}", self.final_damping)?;
        writeln!(f, "  Final nu:     {:.1}", self.final_nu)?;
        writeln!(f)?;
        writeln!(f, "Performance:")?;
        writeln!(
            f,
            "  Total time: {:.2}ms",
            self.total_time.as_secs_f64() * 1000.0
        )?;

        Ok(())
    }
}

/// Statistics of one inner trial (Ceres-style output).
#[derive(Debug, Clone)]
pub struct IterationStats {
    /// Outer iteration the trial belongs to (1-based)
    pub iteration: usize,
    /// Trial number within the outer iteration (1-based)
    pub trial: usize,
    /// Cost before the trial
    pub cost: f64,
    /// Cost at the trial point (NaN if the linear solve failed)
    pub trial_cost: f64,
    /// L2 norm of the proposed step
    pub step_norm: f64,
    /// Gain ratio of the trial
    pub rho: f64,
    /// Damping before and after the trial
    pub lambda_before: f64,
    pub lambda_after: f64,
    /// Damping growth factor before and after the trial
    pub nu_before: f64,
    pub nu_after: f64,
    /// Whether the step was accepted (true) or rejected (false)
    pub accepted: bool,
    /// Total elapsed time since optimization started in milliseconds
    pub total_time_ms: f64,
}

impl IterationStats {
    /// Print table header in Ceres-style format
    pub fn print_header() {
        debug!(
            "{:>4}  {:>5}  {:>13}  {:>13}  {:>11}  {:>11}  {:>11}  {:>9}  {:>11}  {:>6}",
            "iter",
            "trial",
            "cost",
            "trial_cost",
            "|step|",
            "rho",
            "lambda",
            "nu",
            "total_time",
            "status"
        );
    }

    /// Print single trial line in Ceres-style format with scientific notation
    pub fn print_line(&self) {
        let status = if self.accepted { "✓" } else { "✗" };
        debug!(
            "{:>4}  {:>5}  {:>13.6e}  {:>13.6e}  {:>11.2e}  {:>11.2e}  {:>11.2e}  {:>9.1}  {:>9.2}ms  {:>6}",
            self.iteration,
            self.trial,
            self.cost,
            self.trial_cost,
            self.step_norm,
            self.rho,
            self.lambda_after,
            self.nu_after,
            self.total_time_ms,
            status
        );
    }
}

/// Configuration parameters for the Levenberg-Marquardt optimizer.
///
/// ```
/// use slam_backend::optimizer::levenberg_marquardt::LevenbergMarquardtConfig;
/// use slam_backend::linalg::LinearSolverType;
///
/// let config = LevenbergMarquardtConfig::new()
///     .with_max_iterations(50)
///     .with_linear_solver_type(LinearSolverType::SparseCholesky)
///     .with_record_history(true);
/// # let _ = config;
/// ```
#[derive(Debug, Clone)]
pub struct LevenbergMarquardtConfig {
    /// Type of linear solver for the damped normal equations
    pub linear_solver_type: LinearSolverType,
    /// Maximum number of outer iterations
    pub max_iterations: usize,
    /// τ in `λ₀ = τ·max(diag(H))`
    pub initial_damping_scale: f64,
    /// Stop once `sqrt(χ²)` falls below this factor times the initial cost
    pub relative_cost_threshold: f64,
    /// Stop once the squared step norm falls below this value
    pub min_step_norm_squared: f64,
    /// Stop once more than this many consecutive trials were rejected
    pub max_failed_trials: usize,
    /// ε added to the predicted reduction in the gain ratio
    pub gain_ratio_epsilon: f64,
    /// Damping growth factor after an accepted step
    pub initial_nu: f64,
    /// Optional wall-clock limit, checked between outer iterations
    pub timeout: Option<Duration>,
    /// Keep per-trial statistics in the summary
    pub record_history: bool,
}

impl Default for LevenbergMarquardtConfig {
    fn default() -> Self {
        Self {
            linear_solver_type: LinearSolverType::default(),
            max_iterations: 10,
            initial_damping_scale: 1e-5,
            relative_cost_threshold: 1e-6,
            min_step_norm_squared: 1e-6,
            max_failed_trials: 10,
            gain_ratio_epsilon: 1e-3,
            initial_nu: 2.0,
            timeout: None,
            record_history: false,
        }
    }
}

impl LevenbergMarquardtConfig {
    /// Create a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_linear_solver_type(mut self, linear_solver_type: LinearSolverType) -> Self {
        self.linear_solver_type = linear_solver_type;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_initial_damping_scale(mut self, scale: f64) -> Self {
        self.initial_damping_scale = scale;
        self
    }

    pub fn with_relative_cost_threshold(mut self, threshold: f64) -> Self {
        self.relative_cost_threshold = threshold;
        self
    }

    pub fn with_min_step_norm_squared(mut self, min_step_norm_squared: f64) -> Self {
        self.min_step_norm_squared = min_step_norm_squared;
        self
    }

    pub fn with_max_failed_trials(mut self, max_failed_trials: usize) -> Self {
        self.max_failed_trials = max_failed_trials;
        self
    }

    pub fn with_gain_ratio_epsilon(mut self, epsilon: f64) -> Self {
        self.gain_ratio_epsilon = epsilon;
        self
    }

    pub fn with_initial_nu(mut self, nu: f64) -> Self {
        self.initial_nu = nu;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_record_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }

    /// Reject parameter combinations the damping update cannot work with.
    pub fn validate(&self) -> OptimizerResult<()> {
        if !self.initial_damping_scale.is_finite() || self.initial_damping_scale <= 0.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "initial_damping_scale must be positive, got {}",
                self.initial_damping_scale
            ))
            .log());
        }
        if !self.initial_nu.is_finite() || self.initial_nu <= 1.0 {
            return Err(OptimizerError::InvalidParameters(format!(
                "initial_nu must be greater than one, got {}",
                self.initial_nu
            ))
            .log());
        }
        let non_negative = [
            ("relative_cost_threshold", self.relative_cost_threshold),
            ("min_step_norm_squared", self.min_step_norm_squared),
            ("gain_ratio_epsilon", self.gain_ratio_epsilon),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(OptimizerError::InvalidParameters(format!(
                    "{name} must be non-negative, got {value}"
                ))
                .log());
            }
        }
        Ok(())
    }

    /// Print configuration parameters (verbose mode only)
    pub fn print_configuration(&self) {
        debug!(
            "Configuration:\n  Solver:        Levenberg-Marquardt\n  Linear solver: {}\n  Max iterations:          {}\n  Initial damping scale:   {:.2e}\n  Relative cost threshold: {:.2e}\n  Min step norm squared:   {:.2e}\n  Max failed trials:       {}\n  Gain ratio epsilon:      {:.2e}\n  Initial nu:              {:.1}\n  Timeout:                 {:?}\n  Record history:          {}",
            self.linear_solver_type,
            self.max_iterations,
            self.initial_damping_scale,
            self.relative_cost_threshold,
            self.min_step_norm_squared,
            self.max_failed_trials,
            self.gain_ratio_epsilon,
            self.initial_nu,
            self.timeout,
            self.record_history
        );
    }
}

/// Damping parameter λ and its growth factor ν.
#[derive(Debug, Clone, Copy)]
struct Damping {
    lambda: f64,
    nu: f64,
}

impl Damping {
    /// Shrink λ after an accepted step (Nielsen's update, capped at 2/3).
    fn accept(&mut self, rho: f64, initial_nu: f64) {
        let coff = 2.0 * rho - 1.0;
        let alpha = (1.0 - coff * coff * coff).min(2.0 / 3.0);
        self.lambda *= alpha.max(1.0 / 3.0);
        self.nu = initial_nu;
    }

    /// Grow λ after a rejected step.
    fn reject(&mut self) {
        self.lambda *= self.nu;
        self.nu *= 2.0;
    }
}

/// Outcome of one inner trial.
enum Trial {
    Accepted { cost: f64 },
    Rejected,
    StepTooSmall,
}

/// Levenberg-Marquardt solver working on a [`Problem`]'s assembled normal equations.
pub struct LevenbergMarquardt {
    config: LevenbergMarquardtConfig,
    observers: OptObserverVec,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new()
    }
}

impl LevenbergMarquardt {
    /// Create a new Levenberg-Marquardt solver with default configuration.
    pub fn new() -> Self {
        Self::with_config(LevenbergMarquardtConfig::default())
    }

    /// Create a new Levenberg-Marquardt solver with the given configuration.
    pub fn with_config(config: LevenbergMarquardtConfig) -> Self {
        Self {
            config,
            observers: OptObserverVec::new(),
        }
    }

    pub fn config(&self) -> &LevenbergMarquardtConfig {
        &self.config
    }

    /// Add an observer, notified after every outer iteration.
    pub fn add_observer(&mut self, observer: impl OptObserver + 'static) {
        self.observers.add(observer);
    }

    /// Run the solver until a stop condition fires.
    ///
    /// Fails without touching the Problem if it has no Variables or no Constraints.
    /// On success the Variables hold the last accepted estimate and the summary is
    /// also stored in the Problem.
    pub fn optimize(&mut self, problem: &mut Problem) -> BackendResult<LevenbergMarquardtSummary> {
        if problem.num_variables() == 0 {
            return Err(OptimizerError::EmptyProblem.log().into());
        }
        if problem.num_constraints() == 0 {
            return Err(OptimizerError::NoConstraints.log().into());
        }
        self.config.validate()?;

        let start = Instant::now();
        let verbose = tracing::enabled!(Level::DEBUG);
        let collect_stats = verbose || self.config.record_history;
        if verbose {
            self.config.print_configuration();
        }

        let mut linear_solver = create_linear_solver(self.config.linear_solver_type);
        let dimension = problem.assign_ordering();
        problem.assemble_system()?;

        let initial_cost = problem.current_cost();
        if !initial_cost.is_finite() {
            warn!("Initial cost is {initial_cost}, non-finite trials will be rejected");
        }
        let stop_threshold = self.config.relative_cost_threshold * initial_cost;
        let mut damping = Damping {
            lambda: self.config.initial_damping_scale * problem.max_hessian_diagonal(),
            nu: self.config.initial_nu,
        };
        if damping.lambda <= 0.0 || !damping.lambda.is_finite() {
            damping.lambda = self.config.initial_damping_scale;
        }

        info!(
            "Levenberg-Marquardt: {} variables, {} constraints, dimension {}, initial cost {:.6e}",
            problem.num_variables(),
            problem.num_constraints(),
            dimension,
            initial_cost
        );
        if verbose {
            IterationStats::print_header();
        }

        let mut current_cost = initial_cost;
        let mut iterations = 0;
        let mut accepted_trials = 0;
        let mut rejected_trials = 0;
        let mut history = Vec::new();
        let mut status = OptimizationStatus::MaxIterationsReached;

        'outer: while iterations < self.config.max_iterations {
            if let Some(timeout) = self.config.timeout {
                if start.elapsed() >= timeout {
                    status = OptimizationStatus::Timeout;
                    break;
                }
            }

            let mut failed_trials = 0;
            let mut trial_index = 0;
            loop {
                if failed_trials > self.config.max_failed_trials {
                    status = OptimizationStatus::FailedTrialLimit;
                    break 'outer;
                }
                trial_index += 1;
                let before = damping;
                let cost_before = current_cost;

                let delta_x = match problem.solve_damped_system(damping.lambda, linear_solver.as_mut())
                {
                    Ok(delta_x) if delta_x.iter().all(|v| v.is_finite()) => Some(delta_x),
                    Ok(_) => {
                        warn!("Linear solve produced a non-finite step, rejecting trial");
                        None
                    }
                    Err(e) => {
                        warn!("Linear solve failed, rejecting trial: {e}");
                        None
                    }
                };

                let (outcome, trial_cost, step_norm, rho) = match delta_x {
                    None => (Trial::Rejected, f64::NAN, f64::NAN, f64::NAN),
                    Some(delta_x) => {
                        if delta_x.norm_squared() <= self.config.min_step_norm_squared {
                            (Trial::StepTooSmall, current_cost, delta_x.norm(), 0.0)
                        } else {
                            let (outcome, trial_cost, rho) =
                                self.try_step(problem, &delta_x, damping.lambda, current_cost);
                            (outcome, trial_cost, delta_x.norm(), rho)
                        }
                    }
                };

                match outcome {
                    Trial::StepTooSmall => {
                        status = OptimizationStatus::StepNormReached;
                        break 'outer;
                    }
                    Trial::Accepted { cost } => {
                        damping.accept(rho, self.config.initial_nu);
                        current_cost = cost;
                        accepted_trials += 1;
                    }
                    Trial::Rejected => {
                        damping.reject();
                        failed_trials += 1;
                        rejected_trials += 1;
                    }
                }

                let accepted = matches!(outcome, Trial::Accepted { .. });
                if collect_stats {
                    let stats = IterationStats {
                        iteration: iterations + 1,
                        trial: trial_index,
                        cost: cost_before,
                        trial_cost,
                        step_norm,
                        rho,
                        lambda_before: before.lambda,
                        lambda_after: damping.lambda,
                        nu_before: before.nu,
                        nu_after: damping.nu,
                        accepted,
                        total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
                    };
                    if verbose {
                        stats.print_line();
                    }
                    if self.config.record_history {
                        history.push(stats);
                    }
                }

                if accepted {
                    iterations += 1;
                    if !self.observers.is_empty() {
                        self.observers.set_iteration_metrics(
                            current_cost,
                            damping.lambda,
                            step_norm,
                            rho,
                        );
                        self.observers.notify(problem.variables(), iterations);
                    }
                    if current_cost.sqrt() <= stop_threshold {
                        status = OptimizationStatus::CostThresholdReached;
                        break 'outer;
                    }
                    break;
                }
            }
        }

        // Residual caches may still hold the last rejected trial point.
        let final_cost = problem.compute_total_cost()?;

        let summary = LevenbergMarquardtSummary {
            initial_cost,
            final_cost,
            iterations,
            accepted_trials,
            rejected_trials,
            final_damping: damping.lambda,
            final_nu: damping.nu,
            total_time: start.elapsed(),
            iteration_history: history,
            convergence_status: status,
        };
        info!(
            "Levenberg-Marquardt stopped: {} after {} iterations, cost {:.6e} -> {:.6e}",
            summary.convergence_status, summary.iterations, initial_cost, final_cost
        );
        if verbose {
            debug!("{}", summary);
        }
        problem.set_last_summary(summary.clone());
        Ok(summary)
    }

    /// Apply a step tentatively and decide whether to keep it.
    ///
    /// Returns the outcome, the cost at the trial point and the gain ratio. A rejected
    /// step leaves the Variables exactly as they were.
    fn try_step(
        &self,
        problem: &mut Problem,
        delta_x: &DVector<f64>,
        lambda: f64,
        current_cost: f64,
    ) -> (Trial, f64, f64) {
        problem.apply_trial_step(delta_x);
        let trial_cost = match problem.compute_total_cost() {
            Ok(cost) => cost,
            Err(e) => {
                warn!("Residual evaluation failed at trial point: {e}");
                f64::NAN
            }
        };

        let predicted = delta_x.dot(&(lambda * delta_x + problem.b())) + self.config.gain_ratio_epsilon;
        let rho = (current_cost - trial_cost) / predicted;

        if rho > 0.0 && trial_cost.is_finite() {
            match problem.assemble_system() {
                Ok(()) => {
                    problem.commit_trial_step();
                    return (Trial::Accepted { cost: trial_cost }, trial_cost, rho);
                }
                Err(e) => {
                    warn!("Linearization failed at trial point, rejecting trial: {e}");
                }
            }
            problem.rollback_trial_step();
            if let Err(e) = problem.assemble_system() {
                warn!("Re-linearization after rollback failed: {e}");
            }
            return (Trial::Rejected, trial_cost, rho);
        }

        problem.rollback_trial_step();
        (Trial::Rejected, trial_cost, rho)
    }
}

impl Solver for LevenbergMarquardt {
    type Config = LevenbergMarquardtConfig;
    type Summary = LevenbergMarquardtSummary;

    fn with_config(config: Self::Config) -> Self {
        LevenbergMarquardt::with_config(config)
    }

    fn optimize(&mut self, problem: &mut Problem) -> BackendResult<Self::Summary> {
        LevenbergMarquardt::optimize(self, problem)
    }
}
