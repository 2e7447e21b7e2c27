//! Manifold representations for optimization variables.
//!
//! A [`Manifold`] describes how a Variable's stored value is updated by a tangent-space
//! increment. The stored (ambient) dimension may differ from the dimension of the
//! increment (local dimension), which is the case for rotations stored as quaternions.
//!
//! - [`Euclidean`]: plain ℝⁿ vectors, `x ⊕ δ = x + δ`
//! - [`Rotation3`]: unit quaternions `[qw, qx, qy, qz]`, `q ⊕ δ = q ⊗ Exp(δ)`
//! - [`Pose3`]: `[tx, ty, tz, qw, qx, qy, qz]`, translation added and rotation right-composed
//!
//! Every update with increment `δ` can be undone by a following update with `-δ`
//! (up to floating point rounding).

use nalgebra::DVector;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

pub mod rn;
pub mod se3;
pub mod so3;

pub use rn::Euclidean;
pub use se3::Pose3;
pub use so3::Rotation3;

/// Errors raised while building or checking manifold values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ManifoldError {
    /// Stored value has the wrong number of entries
    #[error("Dimension validation failed: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Stored value contains NaN or infinite entries
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Quaternion component is not normalizable
    #[error("Degenerate quaternion: norm {0:.3e}")]
    DegenerateQuaternion(f64),
}

impl ManifoldError {
    /// Log the error with tracing::error and return self for chaining
    #[must_use]
    pub fn log(self) -> Self {
        error!("{}", self);
        self
    }
}

/// Result type for manifold operations
pub type ManifoldResult<T> = Result<T, ManifoldError>;

/// Kind of manifold a Variable lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifoldType {
    /// Euclidean vector space of arbitrary dimension
    RN,
    /// 3D rotation stored as a unit quaternion
    SO3,
    /// 3D rigid transform stored as translation followed by a unit quaternion
    SE3,
}

impl ManifoldType {
    /// Build the update rule for a value with `ambient_dim` entries.
    pub fn build(self, ambient_dim: usize) -> ManifoldResult<Arc<dyn Manifold>> {
        match self {
            ManifoldType::RN => Ok(Arc::new(Euclidean::new(ambient_dim))),
            ManifoldType::SO3 => {
                check_dimension(Rotation3::AMBIENT_DIM, ambient_dim)?;
                Ok(Arc::new(Rotation3))
            }
            ManifoldType::SE3 => {
                check_dimension(Pose3::AMBIENT_DIM, ambient_dim)?;
                Ok(Arc::new(Pose3))
            }
        }
    }
}

impl fmt::Display for ManifoldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifoldType::RN => write!(f, "RN"),
            ManifoldType::SO3 => write!(f, "SO3"),
            ManifoldType::SE3 => write!(f, "SE3"),
        }
    }
}

/// Update rule for a Variable's stored value.
pub trait Manifold: Send + Sync + fmt::Debug {
    /// Number of entries in the stored value.
    fn ambient_dim(&self) -> usize;

    /// Number of entries in an update increment.
    fn tangent_dim(&self) -> usize {
        self.ambient_dim()
    }

    /// Apply a tangent-space increment to `value` and return the new value.
    ///
    /// `delta` always has [`tangent_dim`](Manifold::tangent_dim) entries.
    fn plus(&self, value: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64>;

    /// Check that `value` can be stored on this manifold.
    fn validate(&self, value: &DVector<f64>) -> ManifoldResult<()> {
        check_dimension(self.ambient_dim(), value.len())?;
        if value.iter().any(|v| !v.is_finite()) {
            return Err(ManifoldError::InvalidValue(format!(
                "non-finite entry in {} value",
                self.kind()
            )));
        }
        Ok(())
    }

    /// Manifold kind, used for logging.
    fn kind(&self) -> ManifoldType;
}

fn check_dimension(expected: usize, actual: usize) -> ManifoldResult<()> {
    if expected != actual {
        return Err(ManifoldError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
