//! Optimization variables.
//!
//! A [`Variable`] is one unknown of the problem: a stored value vector, the manifold
//! that says how an increment updates it, a fixed flag and the offset of its block in
//! the assembled linear system.

use crate::core::{CoreError, CoreResult, id::VariableId};
use crate::manifold::{Euclidean, Manifold, ManifoldType};
use nalgebra::DVector;
use std::sync::Arc;

/// A single optimization unknown.
///
/// The value can be changed freely before it is registered with a
/// [`Problem`](crate::core::problem::Problem). During a solve only the optimizer
/// updates it, through [`update`](Variable::update).
#[derive(Debug, Clone)]
pub struct Variable {
    id: VariableId,
    value: DVector<f64>,
    manifold: Arc<dyn Manifold>,
    /// Offset of this variable's block in the linear system, valid after ordering
    ordering_id: Option<usize>,
    fixed: bool,
    /// Value saved before a tentative update
    backup: Option<DVector<f64>>,
}

impl Variable {
    /// Create a variable on an arbitrary manifold.
    pub fn new(
        id: VariableId,
        value: DVector<f64>,
        manifold: Arc<dyn Manifold>,
    ) -> CoreResult<Self> {
        manifold.validate(&value).map_err(|e| {
            CoreError::Variable(format!("variable {id}: {e}")).log_with_source(e)
        })?;
        Ok(Self {
            id,
            value,
            manifold,
            ordering_id: None,
            fixed: false,
            backup: None,
        })
    }

    /// Create a variable of one of the built-in manifold kinds.
    pub fn with_type(
        id: VariableId,
        manifold_type: ManifoldType,
        value: DVector<f64>,
    ) -> CoreResult<Self> {
        let manifold = manifold_type.build(value.len()).map_err(|e| {
            CoreError::Variable(format!("variable {id}: {e}")).log_with_source(e)
        })?;
        Self::new(id, value, manifold)
    }

    /// Create a plain vector variable.
    pub fn euclidean(id: VariableId, value: DVector<f64>) -> Self {
        let manifold = Arc::new(Euclidean::new(value.len()));
        Self {
            id,
            value,
            manifold,
            ordering_id: None,
            fixed: false,
            backup: None,
        }
    }

    pub fn id(&self) -> VariableId {
        self.id
    }

    pub fn value(&self) -> &DVector<f64> {
        &self.value
    }

    /// Replace the stored value.
    pub fn set_value(&mut self, value: DVector<f64>) -> CoreResult<()> {
        self.manifold.validate(&value).map_err(|e| {
            CoreError::Variable(format!("variable {}: {e}", self.id)).log_with_source(e)
        })?;
        self.value = value;
        Ok(())
    }

    /// Number of entries in the stored value.
    pub fn dimension(&self) -> usize {
        self.manifold.ambient_dim()
    }

    /// Number of entries in an update increment.
    pub fn local_dimension(&self) -> usize {
        self.manifold.tangent_dim()
    }

    pub fn manifold(&self) -> &Arc<dyn Manifold> {
        &self.manifold
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Exclude (or re-include) the variable from the optimization.
    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    pub fn ordering_id(&self) -> Option<usize> {
        self.ordering_id
    }

    pub(crate) fn set_ordering_id(&mut self, ordering_id: Option<usize>) {
        self.ordering_id = ordering_id;
    }

    /// Apply a tangent-space increment of length [`local_dimension`](Self::local_dimension).
    pub fn update(&mut self, delta: &DVector<f64>) {
        debug_assert_eq!(delta.len(), self.local_dimension());
        self.value = self.manifold.plus(&self.value, delta);
    }

    /// Save the current value so a later [`restore_backup`](Self::restore_backup) can return to it.
    pub fn save_backup(&mut self) {
        match &mut self.backup {
            Some(backup) => backup.copy_from(&self.value),
            None => self.backup = Some(self.value.clone()),
        }
    }

    /// Return to the saved value. Returns false if nothing was saved.
    pub fn restore_backup(&mut self) -> bool {
        match self.backup.take() {
            Some(backup) => {
                self.value = backup;
                true
            }
            None => false,
        }
    }

    /// Forget the saved value.
    pub fn discard_backup(&mut self) {
        self.backup = None;
    }
}
