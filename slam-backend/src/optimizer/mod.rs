//! Optimization solvers for nonlinear least squares problems.
//!
//! The backend ships one algorithm, Levenberg-Marquardt with Nielsen's damping
//! update, run directly on the normal equations assembled by the
//! [`Problem`](crate::core::problem::Problem).

use crate::core::problem::Problem;
use crate::error::BackendResult;
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

pub mod levenberg_marquardt;

pub use levenberg_marquardt::{
    IterationStats, LevenbergMarquardt, LevenbergMarquardtConfig, LevenbergMarquardtSummary,
};

// Re-export observer types from the observers module
pub use crate::observers::{OptObserver, OptObserverVec};

/// Optimizer-specific error types
#[derive(Debug, Clone, Error)]
pub enum OptimizerError {
    /// Problem has no variables to optimize
    #[error("Problem has no variables to optimize")]
    EmptyProblem,

    /// Problem has no constraints
    #[error("Problem has no constraints")]
    NoConstraints,

    /// Invalid optimization parameters provided
    #[error("Invalid optimization parameters: {0}")]
    InvalidParameters(String),
}

impl OptimizerError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| OptimizerError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for optimizer operations
pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Why an optimization run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimizationStatus {
    /// `sqrt(χ²)` fell below the relative cost threshold after an accepted step
    CostThresholdReached,
    /// The proposed step became negligibly small
    StepNormReached,
    /// Too many consecutive rejected trials
    FailedTrialLimit,
    /// Maximum number of iterations reached
    MaxIterationsReached,
    /// Timeout reached
    Timeout,
}

impl OptimizationStatus {
    /// Whether the run stopped because the estimate stopped improving.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            OptimizationStatus::CostThresholdReached | OptimizationStatus::StepNormReached
        )
    }
}

impl Display for OptimizationStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            OptimizationStatus::CostThresholdReached => write!(f, "Cost threshold reached"),
            OptimizationStatus::StepNormReached => write!(f, "Step norm threshold reached"),
            OptimizationStatus::FailedTrialLimit => write!(f, "Failed trial limit exceeded"),
            OptimizationStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            OptimizationStatus::Timeout => write!(f, "Timeout"),
        }
    }
}

/// Core trait for optimization solvers.
pub trait Solver {
    /// Configuration type for this solver
    type Config;
    /// Summary returned after a run
    type Summary;

    /// Create a new solver with the given configuration
    fn with_config(config: Self::Config) -> Self;

    /// Optimize the problem in place
    fn optimize(&mut self, problem: &mut Problem) -> BackendResult<Self::Summary>;
}
