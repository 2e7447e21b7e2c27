//! 3D rotations stored as unit quaternions.
//!
//! Values are laid out as `[qw, qx, qy, qz]` and updated on the right:
//!
//! ```text
//! q ⊕ δ = q ⊗ Exp(δ),   δ ∈ ℝ³
//! ```

use super::{Manifold, ManifoldError, ManifoldResult, ManifoldType, check_dimension};
use nalgebra::{DVector, Matrix3, Quaternion, UnitQuaternion, Vector3};

/// Unit quaternion rotation with a 3-dimensional tangent space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rotation3;

impl Rotation3 {
    pub const AMBIENT_DIM: usize = 4;
    pub const TANGENT_DIM: usize = 3;

    /// Read a quaternion from the first four entries of `value`, starting at `offset`.
    pub fn quaternion_at(value: &DVector<f64>, offset: usize) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::new(
            value[offset],
            value[offset + 1],
            value[offset + 2],
            value[offset + 3],
        ))
    }

    /// Write `q` as `[qw, qx, qy, qz]` into `value` starting at `offset`.
    pub fn write_quaternion(value: &mut DVector<f64>, offset: usize, q: &UnitQuaternion<f64>) {
        value[offset] = q.w;
        value[offset + 1] = q.i;
        value[offset + 2] = q.j;
        value[offset + 3] = q.k;
    }

    /// Reject quaternion entries that cannot be normalized.
    pub(crate) fn check_quaternion(value: &DVector<f64>, offset: usize) -> ManifoldResult<()> {
        let norm = value.rows(offset, Self::AMBIENT_DIM).norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(ManifoldError::DegenerateQuaternion(norm));
        }
        Ok(())
    }

    /// Stored value for a quaternion.
    pub fn to_vector(q: &UnitQuaternion<f64>) -> DVector<f64> {
        let mut value = DVector::zeros(Self::AMBIENT_DIM);
        Self::write_quaternion(&mut value, 0, q);
        value
    }
}

impl Manifold for Rotation3 {
    fn ambient_dim(&self) -> usize {
        Self::AMBIENT_DIM
    }

    fn tangent_dim(&self) -> usize {
        Self::TANGENT_DIM
    }

    fn plus(&self, value: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64> {
        let q = Self::quaternion_at(value, 0);
        let dq = UnitQuaternion::from_scaled_axis(Vector3::new(delta[0], delta[1], delta[2]));
        Self::to_vector(&(q * dq))
    }

    fn validate(&self, value: &DVector<f64>) -> ManifoldResult<()> {
        check_dimension(Self::AMBIENT_DIM, value.len())?;
        Self::check_quaternion(value, 0)
    }

    fn kind(&self) -> ManifoldType {
        ManifoldType::SO3
    }
}

/// Skew-symmetric matrix `[v]×` such that `[v]× w = v × w`.
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Inverse of the right Jacobian of SO(3) at `theta`.
///
/// Maps a right increment on the rotation to the change of `Log(q)`.
pub fn right_jacobian_inverse(theta: &Vector3<f64>) -> Matrix3<f64> {
    let angle = theta.norm();
    let skew = hat(theta);
    if angle < 1e-8 {
        return Matrix3::identity() + 0.5 * skew;
    }
    // 1/θ² - (1 + cos θ)/(2θ sin θ), written with the half angle so it stays finite at θ = π.
    let half = 0.5 * angle;
    let coeff = (1.0 - half / half.tan()) / (angle * angle);
    Matrix3::identity() + 0.5 * skew + coeff * skew * skew
}
