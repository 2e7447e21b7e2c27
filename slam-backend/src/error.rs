//! Error types for the slam-backend library
//!
//! Each module defines its own error enum (`CoreError`, `OptimizerError`,
//! `LinAlgError`, ...). Public entry points that cross module boundaries return
//! [`BackendError`], which wraps them transparently so the source chain stays intact.
//!
//! ```text
//! BackendError::Core(
//!     CoreError::FactorEvaluation("constraint c3: Numerical instability: ...")
//! )
//! ```

use crate::{
    core::CoreError, factors::FactorError, linalg::LinAlgError, manifold::ManifoldError,
    optimizer::OptimizerError,
};
use std::error::Error as StdError;
use thiserror::Error;

/// Main result type used throughout the slam-backend library
pub type BackendResult<T> = Result<T, BackendError>;

/// Top-level error type returned by the solver entry points.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Problem construction and evaluation errors
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Optimization algorithm errors
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),

    /// Linear algebra errors
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Manifold operation errors
    #[error(transparent)]
    Manifold(#[from] ManifoldError),

    /// Residual model errors
    #[error(transparent)]
    Factor(#[from] FactorError),
}

impl BackendError {
    /// Full error chain, one error per line.
    ///
    /// ```rust,ignore
    /// if let Err(e) = problem.try_solve(config) {
    ///     warn!("Solve failed:\n{}", e.chain());
    /// }
    /// ```
    pub fn chain(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(format!("  → {}", err));
            source = err.source();
        }

        chain.join("\n")
    }

    /// Single-line error chain joined with arrows.
    pub fn chain_compact(&self) -> String {
        let mut chain = vec![self.to_string()];
        let mut source = self.source();

        while let Some(err) = source {
            chain.push(err.to_string());
            source = err.source();
        }

        chain.join(" → ")
    }
}
