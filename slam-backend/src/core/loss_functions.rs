//! Robust loss functions.
//!
//! A loss function `ρ(s)` is applied to the squared Mahalanobis norm `s = rᵀ·W·r`
//! of a Constraint's residual. It bounds the influence of outliers: the cost of a
//! Constraint becomes `ρ(s)` and its contribution to the normal equations is
//! weighted by `ρ'(s)`.
//!
//! | Loss   | ρ(s)                              |
//! |--------|-----------------------------------|
//! | Huber  | `s` if `s ≤ δ²`, else `2δ√s - δ²` |
//! | Cauchy | `δ² ln(1 + s/δ²)`                 |

use crate::core::{CoreError, CoreResult};

/// Robust kernel applied to the squared residual norm.
pub trait LossFunction: Send + Sync {
    /// Evaluate the loss and its first two derivatives at `s`.
    ///
    /// # Arguments
    ///
    /// * `s` - The squared norm of the residual (always non-negative)
    ///
    /// # Returns
    ///
    /// `[ρ(s), ρ'(s), ρ''(s)]`
    fn evaluate(&self, s: f64) -> [f64; 3];
}

/// Huber loss: quadratic for small residuals, linear beyond `δ`.
///
/// # Mathematical Definition
///
/// ```text
/// ρ(s) = s             if s ≤ δ²
///      = 2δ√s - δ²     if s > δ²
/// ```
#[derive(Debug, Clone, Copy)]
pub struct HuberLoss {
    scale: f64,
    scale2: f64,
}

impl HuberLoss {
    /// Create a Huber loss with threshold `scale` (δ > 0).
    ///
    /// ```
    /// use slam_backend::core::loss_functions::HuberLoss;
    ///
    /// let huber = HuberLoss::new(1.345).unwrap();
    /// # let _ = huber;
    /// ```
    pub fn new(scale: f64) -> CoreResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CoreError::LossFunction(format!(
                "Huber scale must be a positive finite number, got {scale}"
            ))
            .log());
        }
        Ok(Self {
            scale,
            scale2: scale * scale,
        })
    }
}

impl LossFunction for HuberLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        if s > self.scale2 {
            let r = s.sqrt();
            [
                2.0 * self.scale * r - self.scale2,
                self.scale / r,
                -self.scale / (2.0 * s * r),
            ]
        } else {
            [s, 1.0, 0.0]
        }
    }
}

/// Cauchy (Lorentzian) loss: logarithmic growth for large residuals.
///
/// # Mathematical Definition
///
/// ```text
/// ρ(s)   = δ² · ln(1 + s/δ²)
/// ρ'(s)  = 1 / (1 + s/δ²)
/// ρ''(s) = -(1/δ²) / (1 + s/δ²)²
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CauchyLoss {
    scale2: f64,
    inv_scale2: f64,
}

impl CauchyLoss {
    /// Create a Cauchy loss with scale `scale` (δ > 0).
    pub fn new(scale: f64) -> CoreResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(CoreError::LossFunction(format!(
                "Cauchy scale must be a positive finite number, got {scale}"
            ))
            .log());
        }
        let scale2 = scale * scale;
        Ok(Self {
            scale2,
            inv_scale2: 1.0 / scale2,
        })
    }
}

impl LossFunction for CauchyLoss {
    fn evaluate(&self, s: f64) -> [f64; 3] {
        let sum = 1.0 + s * self.inv_scale2;
        let inv = 1.0 / sum;
        [self.scale2 * sum.ln(), inv, -self.inv_scale2 * inv * inv]
    }
}
