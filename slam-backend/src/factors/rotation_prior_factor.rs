//! Prior on a 3D rotation.

use super::{Factor, FactorResult, check_params};
use crate::manifold::Rotation3;
use crate::manifold::so3::right_jacobian_inverse;
use nalgebra::{DMatrix, DVector, UnitQuaternion};

/// Unary factor pulling a rotation Variable towards a measured orientation.
///
/// # Mathematical Formulation
///
/// ```text
/// r = Log(q_prior⁻¹ ⊗ q)
/// J = Jr⁻¹(r)          (3×3, with respect to the right increment of q)
/// ```
#[derive(Debug, Clone)]
pub struct RotationPriorFactor {
    pub prior: UnitQuaternion<f64>,
}

impl RotationPriorFactor {
    pub fn new(prior: UnitQuaternion<f64>) -> Self {
        Self { prior }
    }

    fn log_error(&self, value: &DVector<f64>) -> nalgebra::Vector3<f64> {
        let q = Rotation3::quaternion_at(value, 0);
        (self.prior.inverse() * q).scaled_axis()
    }
}

impl Factor for RotationPriorFactor {
    fn residual_dimension(&self) -> usize {
        Rotation3::TANGENT_DIM
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        check_params(params, &[Rotation3::AMBIENT_DIM])?;
        let error = self.log_error(params[0]);
        Ok(DVector::from_column_slice(error.as_slice()))
    }

    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        check_params(params, &[Rotation3::AMBIENT_DIM])?;
        let jr_inv = right_jacobian_inverse(&self.log_error(params[0]));
        Ok(vec![DMatrix::from_column_slice(3, 3, jr_inv.as_slice())])
    }
}
