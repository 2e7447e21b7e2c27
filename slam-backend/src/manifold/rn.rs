//! Euclidean vector space ℝⁿ.

use super::{Manifold, ManifoldType};
use nalgebra::DVector;

/// Plain vector space: the increment is added entry by entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Euclidean {
    dim: usize,
}

impl Euclidean {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Manifold for Euclidean {
    fn ambient_dim(&self) -> usize {
        self.dim
    }

    fn plus(&self, value: &DVector<f64>, delta: &DVector<f64>) -> DVector<f64> {
        value + delta
    }

    fn kind(&self) -> ManifoldType {
        ManifoldType::RN
    }
}
