//! 3D rigid body poses.
//!
//! Values are laid out as `[tx, ty, tz, qw, qx, qy, qz]` and the 6-dimensional
//! increment as `[δt, δθ]`. The translation is updated additively and the rotation
//! is right-composed with `Exp(δθ)`, the same convention the VIO front-ends use
//! for camera poses.

use super::{Manifold, ManifoldError, ManifoldResult, ManifoldType, Rotation3, check_dimension};
use nalgebra::{DVector, UnitQuaternion, Vector3};

/// Pose with translation and unit quaternion rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pose3;

impl Pose3 {
    pub const AMBIENT_DIM: usize = 7;
    pub const TANGENT_DIM: usize = 6;

    /// Stored value for a translation and rotation.
    pub fn to_vector(translation: &Vector3<f64>, rotation: &UnitQuaternion<f64>) -> DVector<f64> {
        let mut value = DVector::zeros(Self::AMBIENT_DIM);
        value[0] = translation.x;
        value[1] = translation.y;
        value[2] = translation.z;
        Rotation3::write_quaternion(&mut value, 3, rotation);
        value
    }

    pub fn translation(value: &DVector<f64>) -> Vector3<f64> {
        Vector3::new(value[0], value[1], value[2])
    }

    pub fn rotation(value: &DVector<f64>) -> UnitQuaternion<f64> {
        Rotation3::quaternion_at(value, 3)
    }
}

impl Manifold for Pose3 {
    fn ambient_dim(&self) -> usize {
        Self::AMBIENT_DIM
    }

    fn tangent_dim(&self) -> usize {
        Self::TANGENT_DIM
    }

    fn plus(&self, value: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64> {
        let translation = Self::translation(value) + Vector3::new(delta[0], delta[1], delta[2]);
        let dq = UnitQuaternion::from_scaled_axis(Vector3::new(delta[3], delta[4], delta[5]));
        Self::to_vector(&translation, &(Self::rotation(value) * dq))
    }

    fn validate(&self, value: &DVector<f64>) -> ManifoldResult<()> {
        check_dimension(Self::AMBIENT_DIM, value.len())?;
        if value.rows(0, 3).iter().any(|v| !v.is_finite()) {
            return Err(ManifoldError::InvalidValue(
                "non-finite translation in SE3 value".to_string(),
            ));
        }
        Rotation3::check_quaternion(value, 3)
    }

    fn kind(&self) -> ManifoldType {
        ManifoldType::SE3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plus_updates_translation_and_rotation() {
        let se3 = Pose3;
        let x = Pose3::to_vector(&Vector3::new(1.0, 2.0, 3.0), &UnitQuaternion::identity());
        let delta = DVector::from_vec(vec![0.5, 0.0, -1.0, 0.0, 0.0, std::f64::consts::FRAC_PI_2]);
        let y = se3.plus(&x, &delta);

        assert!((Pose3::translation(&y) - Vector3::new(1.5, 2.0, 2.0)).norm() < 1e-12);
        let yaw = Pose3::rotation(&y).euler_angles().2;
        assert!((yaw - std::f64::consts::FRAC_PI_2).abs() < 1e-12);

        let back = se3.plus(&y, &(-delta));
        assert!((back - x).norm() < 1e-12);
    }
}
