//! Residual models for Constraints.
//!
//! A [`Factor`] is the measurement model a Constraint wraps. It maps the current
//! values of the Constraint's Variables to a residual vector of fixed dimension and
//! provides one Jacobian block per Variable:
//!
//! ```text
//! r = f(x₁, …, xₖ) ∈ ℝᵈ,     Jᵢ = ∂r/∂δᵢ ∈ ℝ^(d × local_dim(xᵢ))
//! ```
//!
//! Jacobians are taken with respect to the tangent-space increment of each Variable,
//! so a factor on a rotation returns a `d × 3` block even though the rotation is
//! stored with four numbers.
//!
//! # Available factors
//!
//! - [`PriorFactor`]: unary `x - x_prior` on a vector Variable
//! - [`BetweenFactor`]: binary `(x_j - x_i) - z` on two vector Variables
//! - [`CurveFittingFactor`]: scalar `exp(a·x² + b·x + c) - y` on `[a, b, c]`
//! - [`RotationPriorFactor`]: unary `Log(q_prior⁻¹ ⊗ q)` on a rotation

use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::error;

pub mod between_factor;
pub mod curve_fitting_factor;
pub mod prior_factor;
pub mod rotation_prior_factor;

pub use between_factor::BetweenFactor;
pub use curve_fitting_factor::CurveFittingFactor;
pub use prior_factor::PriorFactor;
pub use rotation_prior_factor::RotationPriorFactor;

/// Factor-specific error types
#[derive(Debug, Clone, Error)]
pub enum FactorError {
    /// Wrong number of Variables passed to the factor
    #[error("Invalid variable count: expected {expected}, got {actual}")]
    InvalidVariableCount { expected: usize, actual: usize },

    /// A Variable value has the wrong length
    #[error("Invalid dimension for variable {index}: expected {expected}, got {actual}")]
    InvalidDimension {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Numerical instability detected
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

impl FactorError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for factor operations
pub type FactorResult<T> = Result<T, FactorError>;

/// Residual model of a Constraint.
///
/// Implementations must be deterministic: the same parameter values always give the
/// same residual and Jacobians. Both methods read the parameters in the order the
/// Constraint lists its Variables.
pub trait Factor: Send + Sync {
    /// Dimension of the residual vector.
    fn residual_dimension(&self) -> usize;

    /// Number of Variables the factor connects.
    fn num_variables(&self) -> usize;

    /// Residual at the given parameter values.
    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>>;

    /// One Jacobian block per Variable, `residual_dimension × local_dimension`.
    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>>;
}

/// Check the parameter count and the length of every parameter vector.
pub(crate) fn check_params(params: &[&DVector<f64>], dimensions: &[usize]) -> FactorResult<()> {
    if params.len() != dimensions.len() {
        return Err(FactorError::InvalidVariableCount {
            expected: dimensions.len(),
            actual: params.len(),
        });
    }
    for (index, (param, &expected)) in params.iter().zip(dimensions).enumerate() {
        if param.len() != expected {
            return Err(FactorError::InvalidDimension {
                index,
                expected,
                actual: param.len(),
            });
        }
    }
    Ok(())
}
