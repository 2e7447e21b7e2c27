//! Dense factorizations backed by nalgebra.

use crate::linalg::{LinAlgError, LinAlgResult, LinearSolver, LinearSolverType, check_system};
use nalgebra::{DMatrix, DVector};
use tracing::warn;

/// Cholesky factorization `A = L·Lᵀ`, falling back to LU when `A` is not
/// numerically positive definite.
#[derive(Debug, Clone, Default)]
pub struct DenseCholeskySolver {
    /// Number of solves that had to fall back to LU
    lu_fallbacks: usize,
}

impl DenseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lu_fallbacks(&self) -> usize {
        self.lu_fallbacks
    }
}

impl LinearSolver for DenseCholeskySolver {
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        check_system(matrix, rhs)?;
        if rhs.is_empty() {
            return Ok(DVector::zeros(0));
        }
        if let Some(cholesky) = matrix.clone().cholesky() {
            return Ok(cholesky.solve(rhs));
        }
        self.lu_fallbacks += 1;
        warn!("Cholesky factorization failed, falling back to LU");
        solve_lu(matrix, rhs)
    }

    fn solver_type(&self) -> LinearSolverType {
        LinearSolverType::DenseCholesky
    }
}

/// LU factorization with partial pivoting.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLuSolver;

impl DenseLuSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LinearSolver for DenseLuSolver {
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        check_system(matrix, rhs)?;
        solve_lu(matrix, rhs)
    }

    fn solver_type(&self) -> LinearSolverType {
        LinearSolverType::DenseLu
    }
}

fn solve_lu(matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
    if rhs.is_empty() {
        return Ok(DVector::zeros(0));
    }
    let solution = matrix
        .clone()
        .lu()
        .solve(rhs)
        .ok_or_else(|| LinAlgError::SingularMatrix.log())?;
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(LinAlgError::FactorizationFailed(
            "LU solution contains non-finite entries".to_string(),
        )
        .log());
    }
    Ok(solution)
}
