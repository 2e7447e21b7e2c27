use faer::{
    Mat, Side,
    linalg::solvers::Solve,
    sparse::linalg::solvers::{Llt, SymbolicLlt},
    sparse::{SparseColMat, Triplet},
};
use nalgebra::{DMatrix, DVector};

use crate::linalg::{LinAlgError, LinAlgResult, LinearSolver, LinearSolverType, check_system};

/// Sparse Cholesky factorization through faer.
///
/// The dense system matrix is converted to compressed column storage, dropping exact
/// zeros, so Variables that share no Constraint do not cost any fill.
#[derive(Debug, Clone, Default)]
pub struct SparseCholeskySolver {
    /// Non-zero count of the last factorized matrix
    last_nnz: usize,
}

impl SparseCholeskySolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_nnz(&self) -> usize {
        self.last_nnz
    }

    fn to_sparse(matrix: &DMatrix<f64>) -> LinAlgResult<(SparseColMat<usize, f64>, usize)> {
        let n = matrix.nrows();
        let mut triplets = Vec::new();
        for col in 0..n {
            for row in 0..n {
                let value = matrix[(row, col)];
                if value != 0.0 {
                    triplets.push(Triplet::new(row, col, value));
                }
            }
        }
        let sparse = SparseColMat::try_new_from_triplets(n, n, &triplets).map_err(|e| {
            LinAlgError::SparseMatrixCreation("Failed to create system matrix".to_string())
                .log_with_source(e)
        })?;
        Ok((sparse, triplets.len()))
    }
}

impl LinearSolver for SparseCholeskySolver {
    fn solve(&mut self, matrix: &DMatrix<f64>, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        check_system(matrix, rhs)?;
        let n = matrix.nrows();
        if n == 0 {
            return Ok(DVector::zeros(0));
        }

        let (sparse, nnz) = Self::to_sparse(matrix)?;
        self.last_nnz = nnz;

        let symbolic = SymbolicLlt::try_new(sparse.symbolic(), Side::Lower).map_err(|e| {
            LinAlgError::FactorizationFailed("Symbolic Cholesky decomposition failed".to_string())
                .log_with_source(e)
        })?;
        let cholesky = Llt::try_new_with_symbolic(symbolic, sparse.as_ref(), Side::Lower)
            .map_err(|e| LinAlgError::SingularMatrix.log_with_source(e))?;

        let b = Mat::from_fn(n, 1, |i, _| rhs[i]);
        let x = cholesky.solve(&b);
        let solution = DVector::from_fn(n, |i, _| x[(i, 0)]);
        if solution.iter().any(|v| !v.is_finite()) {
            return Err(LinAlgError::FactorizationFailed(
                "Sparse Cholesky solution contains non-finite entries".to_string(),
            )
            .log());
        }
        Ok(solution)
    }

    fn solver_type(&self) -> LinearSolverType {
        LinearSolverType::SparseCholesky
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_block_diagonal_system() -> TestResult {
        let mut matrix = DMatrix::zeros(4, 4);
        matrix[(0, 0)] = 2.0;
        matrix[(1, 1)] = 4.0;
        matrix[(2, 2)] = 5.0;
        matrix[(2, 3)] = 1.0;
        matrix[(3, 2)] = 1.0;
        matrix[(3, 3)] = 3.0;
        let rhs = DVector::from_vec(vec![2.0, 2.0, 6.0, 4.0]);

        let mut solver = SparseCholeskySolver::new();
        let x = solver.solve(&matrix, &rhs)?;
        assert!((&matrix * &x - &rhs).norm() < 1e-12);
        assert_eq!(solver.last_nnz(), 6);
        Ok(())
    }

    #[test]
    fn test_indefinite_matrix_fails() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, -1.0]);
        let rhs = DVector::from_vec(vec![1.0, 1.0]);
        assert!(SparseCholeskySolver::new().solve(&matrix, &rhs).is_err());
    }
}
