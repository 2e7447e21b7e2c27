//! Core optimization components
//!
//! This module contains the building blocks of the least squares problem:
//! - Identifiers and their generators
//! - Variables and manifold handling
//! - Constraints wrapping residual models
//! - Loss functions for robust estimation
//! - The Problem that owns all of the above and assembles the normal equations

pub mod constraint;
pub mod id;
pub mod loss_functions;
pub mod problem;
pub mod variable;

use thiserror::Error;
use tracing::error;

/// Core module error types for problem construction and evaluation
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Variable construction or update failed
    #[error("Variable error: {0}")]
    Variable(String),

    /// An id is already registered
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// A Variable id is not registered
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    /// A Constraint id is not registered
    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),

    /// Residual model evaluation failed
    #[error("Factor evaluation failed: {0}")]
    FactorEvaluation(String),

    /// Dimension mismatch between residual/Jacobian/information/variables
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Loss function error
    #[error("Loss function error: {0}")]
    LossFunction(String),

    /// Invalid input parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl CoreError {
    /// Log the error with tracing::error and return self for chaining
    ///
    /// # Example
    /// ```ignore
    /// operation()
    ///     .map_err(|e| CoreError::from(e).log())?;
    /// ```
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the lower-level error that caused it
    ///
    /// # Example
    /// ```ignore
    /// factor.compute_residual(&params).map_err(|e| {
    ///     CoreError::FactorEvaluation(e.to_string()).log_with_source(e)
    /// })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for core module operations
pub type CoreResult<T> = Result<T, CoreError>;
