//! Prior factor for unary constraints on vector variables.

use super::{Factor, FactorResult, check_params};
use nalgebra::{DMatrix, DVector};

/// Prior factor (unary constraint) on a single vector Variable.
///
/// Anchors a Variable to a known value, for example the first pose of a trajectory
/// or an absolute position measurement.
///
/// # Mathematical Formulation
///
/// ```text
/// r = x - x_prior,   J = I
/// ```
///
/// # Example
///
/// ```
/// use slam_backend::factors::{Factor, PriorFactor};
/// use nalgebra::DVector;
///
/// let prior = PriorFactor::new(DVector::from_vec(vec![1.0, 2.0]));
/// let current = DVector::from_vec(vec![1.5, 2.25]);
///
/// let residual = prior.compute_residual(&[&current]).unwrap();
/// assert_eq!(residual, DVector::from_vec(vec![0.5, 0.25]));
/// ```
#[derive(Debug, Clone)]
pub struct PriorFactor {
    /// The prior value (measurement or known value)
    pub data: DVector<f64>,
}

impl PriorFactor {
    pub fn new(data: DVector<f64>) -> Self {
        Self { data }
    }
}

impl Factor for PriorFactor {
    fn residual_dimension(&self) -> usize {
        self.data.len()
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        check_params(params, &[self.data.len()])?;
        Ok(params[0] - &self.data)
    }

    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        check_params(params, &[self.data.len()])?;
        let dim = self.data.len();
        Ok(vec![DMatrix::identity(dim, dim)])
    }
}
