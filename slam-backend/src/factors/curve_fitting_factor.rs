//! Exponential curve fitting observation.

use super::{Factor, FactorError, FactorResult, check_params};
use nalgebra::{DMatrix, DVector};

/// One sample `(x, y)` of the curve `y = exp(a·x² + b·x + c)`.
///
/// Connects a single 3-dimensional Variable holding `[a, b, c]`.
///
/// ```text
/// r = exp(a·x² + b·x + c) - y
/// J = [x²·e, x·e, e],   e = exp(a·x² + b·x + c)
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurveFittingFactor {
    pub x: f64,
    pub y: f64,
}

impl CurveFittingFactor {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Model value at this sample's `x` for coefficients `abc`.
    pub fn model(&self, abc: &DVector<f64>) -> f64 {
        (abc[0] * self.x * self.x + abc[1] * self.x + abc[2]).exp()
    }
}

impl Factor for CurveFittingFactor {
    fn residual_dimension(&self) -> usize {
        1
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        check_params(params, &[3])?;
        Ok(DVector::from_element(1, self.model(params[0]) - self.y))
    }

    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        check_params(params, &[3])?;
        let e = self.model(params[0]);
        if !e.is_finite() {
            return Err(FactorError::NumericalInstability(format!(
                "curve model overflowed at x = {}",
                self.x
            )));
        }
        Ok(vec![DMatrix::from_row_slice(
            1,
            3,
            &[self.x * self.x * e, self.x * e, e],
        )])
    }
}
