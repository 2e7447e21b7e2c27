//! # SLAM Backend
//!
//! A graph-based nonlinear least squares backend for SLAM-style estimation problems.
//! Unknowns are Variables living on manifolds (vectors, rotations, poses), measurements
//! are Constraints tying Variables together through a residual model, and a
//! Levenberg-Marquardt solver drives the total weighted cost down.
//!
//! ## Features
//!
//! - **Manifold Variables**: `ℝⁿ`, `SO(3)` unit quaternions and `SE(3)` poses with
//!   tangent-space updates
//! - **Robust Losses**: Huber and Cauchy kernels applied to `rᵀ·W·r`
//! - **Levenberg-Marquardt**: Nielsen's damping update with exact rollback of rejected steps
//! - **Linear Solvers**: dense Cholesky (LU fallback), dense LU and sparse Cholesky via faer
//! - **Observers**: per-iteration callbacks for monitoring
//!
//! ## Example
//!
//! ```
//! use slam_backend::core::problem::Problem;
//! use slam_backend::factors::BetweenFactor;
//! use slam_backend::factors::PriorFactor;
//! use slam_backend::manifold::ManifoldType;
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut problem = Problem::new();
//! let x0 = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![0.5]))?;
//! let x1 = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![3.0]))?;
//! problem.create_constraint(&[x0], Box::new(PriorFactor::new(DVector::from_vec(vec![0.0]))))?;
//! problem.create_constraint(
//!     &[x0, x1],
//!     Box::new(BetweenFactor::new(DVector::from_vec(vec![1.0]))),
//! )?;
//!
//! assert!(problem.solve(20));
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod error;
pub mod factors;
pub mod linalg;
#[cfg(feature = "logging")]
pub mod logger;
pub mod manifold;
pub mod observers;
pub mod optimizer;

// Re-export core types
pub use core::{
    constraint::Constraint,
    id::{ConstraintId, IdGenerator, VariableId},
    loss_functions::{CauchyLoss, HuberLoss, LossFunction},
    problem::Problem,
    variable::Variable,
};
pub use error::{BackendError, BackendResult};

// Re-export factor types
pub use factors::{BetweenFactor, CurveFittingFactor, Factor, PriorFactor, RotationPriorFactor};

pub use linalg::{LinearSolver, LinearSolverType};
#[cfg(feature = "logging")]
pub use logger::{init_logger, init_logger_with_level};
pub use manifold::{Manifold, ManifoldType};
pub use observers::CostRecorder;
pub use optimizer::{
    LevenbergMarquardt, LevenbergMarquardtConfig, LevenbergMarquardtSummary, OptObserver,
    OptObserverVec, OptimizationStatus, Solver,
};
