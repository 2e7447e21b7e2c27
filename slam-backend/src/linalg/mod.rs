//! Linear solvers for the damped normal equations `(H + λI)·Δx = b`.
//!
//! The Problem assembles `H` and `b` as dense nalgebra matrices. Solvers either
//! factorize them directly ([`DenseCholeskySolver`], [`DenseLuSolver`]) or convert
//! `H` to a faer sparse matrix first ([`SparseCholeskySolver`]), which pays off when
//! most Variables are not connected to each other.

pub mod cholesky;
pub mod dense;

pub use cholesky::SparseCholeskySolver;
pub use dense::{DenseCholeskySolver, DenseLuSolver};

use nalgebra::{DMatrix, DVector};
use std::{
    fmt,
    fmt::{Display, Formatter},
};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinearSolverType {
    #[default]
    DenseCholesky,
    DenseLu,
    SparseCholesky,
}

impl Display for LinearSolverType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LinearSolverType::DenseCholesky => write!(f, "Dense Cholesky"),
            LinearSolverType::DenseLu => write!(f, "Dense LU"),
            LinearSolverType::SparseCholesky => write!(f, "Sparse Cholesky"),
        }
    }
}

/// Linear algebra specific error types
#[derive(Debug, Clone, Error)]
pub enum LinAlgError {
    /// Matrix factorization failed (Cholesky, LU, etc.)
    #[error("Matrix factorization failed: {0}")]
    FactorizationFailed(String),

    /// Singular or near-singular matrix detected
    #[error("Singular matrix detected (matrix is not invertible)")]
    SingularMatrix,

    /// Failed to create sparse matrix from triplets
    #[error("Failed to create sparse matrix: {0}")]
    SparseMatrixCreation(String),

    /// Matrix and right-hand side do not fit together
    #[error("Dimension mismatch: matrix is {rows}x{cols}, right-hand side has {rhs} entries")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
}

impl LinAlgError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }

    /// Log the error together with the error reported by a third-party library
    ///
    /// # Example
    /// ```ignore
    /// SymbolicLlt::try_new(matrix.symbolic(), Side::Lower)
    ///     .map_err(|e| {
    ///         LinAlgError::FactorizationFailed(
    ///             "Symbolic Cholesky decomposition failed".to_string()
    ///         )
    ///         .log_with_source(e)
    ///     })?;
    /// ```
    #[must_use]
    pub fn log_with_source<E: std::fmt::Debug>(self, source_error: E) -> Self {
        error!("{} | Source: {:?}", self, source_error);
        self
    }
}

/// Result type for linear algebra operations
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Solver for a symmetric linear system `A·x = b`.
pub trait LinearSolver: Send {
    /// Solve `matrix · x = rhs`.
    ///
    /// # Errors
    /// Returns `LinAlgError` if:
    /// - The shapes do not match
    /// - Matrix factorization fails
    /// - The matrix is singular
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>>;

    /// Solver kind, used for logging.
    fn solver_type(&self) -> LinearSolverType;
}

/// Build the solver for `solver_type`.
pub fn create_linear_solver(solver_type: LinearSolverType) -> Box<dyn LinearSolver> {
    match solver_type {
        LinearSolverType::DenseCholesky => Box::new(DenseCholeskySolver::new()),
        LinearSolverType::DenseLu => Box::new(DenseLuSolver::new()),
        LinearSolverType::SparseCholesky => Box::new(SparseCholeskySolver::new()),
    }
}

pub(crate) fn check_system(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<()> {
    if matrix.nrows() != matrix.ncols() || matrix.nrows() != rhs.len() {
        return Err(LinAlgError::DimensionMismatch {
            rows: matrix.nrows(),
            cols: matrix.ncols(),
            rhs: rhs.len(),
        }
        .log());
    }
    Ok(())
}
