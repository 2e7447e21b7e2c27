//! Relative measurement between two vector variables.

use super::{Factor, FactorResult, check_params};
use nalgebra::{DMatrix, DVector};

/// Binary factor constraining the difference of two vector Variables.
///
/// Typical use is odometry or landmark displacement in a Euclidean state space.
///
/// # Mathematical Formulation
///
/// ```text
/// r = (x_j - x_i) - z
/// ∂r/∂x_i = -I,   ∂r/∂x_j = I
/// ```
#[derive(Debug, Clone)]
pub struct BetweenFactor {
    /// Measured difference `z = x_j - x_i`
    pub relative: DVector<f64>,
}

impl BetweenFactor {
    pub fn new(relative: DVector<f64>) -> Self {
        Self { relative }
    }
}

impl Factor for BetweenFactor {
    fn residual_dimension(&self) -> usize {
        self.relative.len()
    }

    fn num_variables(&self) -> usize {
        2
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        let dim = self.relative.len();
        check_params(params, &[dim, dim])?;
        Ok(params[1] - params[0] - &self.relative)
    }

    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        let dim = self.relative.len();
        check_params(params, &[dim, dim])?;
        Ok(vec![
            -DMatrix::<f64>::identity(dim, dim),
            DMatrix::identity(dim, dim),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_factor_residual() -> Result<(), Box<dyn std::error::Error>> {
        let factor = BetweenFactor::new(DVector::from_vec(vec![1.0, 0.0]));
        let xi = DVector::from_vec(vec![0.0, 0.0]);
        let xj = DVector::from_vec(vec![1.5, -0.5]);

        let residual = factor.compute_residual(&[&xi, &xj])?;
        assert_eq!(residual, DVector::from_vec(vec![0.5, -0.5]));

        let jacobians = factor.compute_jacobians(&[&xi, &xj])?;
        assert_eq!(jacobians[0], -DMatrix::<f64>::identity(2, 2));
        assert_eq!(jacobians[1], DMatrix::<f64>::identity(2, 2));
        Ok(())
    }

    #[test]
    fn test_between_factor_needs_two_variables() {
        let factor = BetweenFactor::new(DVector::zeros(1));
        let x = DVector::zeros(1);
        assert!(factor.compute_residual(&[&x]).is_err());
    }
}
