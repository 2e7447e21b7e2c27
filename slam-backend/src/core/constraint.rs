//! Constraints (edges) of the optimization problem.
//!
//! A [`Constraint`] ties an ordered list of Variables to a [`Factor`] residual model,
//! an information matrix `W` and an optional robust loss. It caches the residual and
//! Jacobian blocks of its last evaluation so the assembly step can read them.
//!
//! ```text
//! χ² = rᵀ·W·r
//! cost = ρ(χ²)            (ρ(s) = s without a loss function)
//! ```

use crate::core::{
    CoreError, CoreResult,
    id::{ConstraintId, VariableId},
    loss_functions::LossFunction,
    variable::Variable,
};
use crate::factors::Factor;
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeMap;
use std::fmt;

/// A residual term connecting one or more Variables.
pub struct Constraint {
    id: ConstraintId,
    variable_ids: Vec<VariableId>,
    factor: Box<dyn Factor>,
    information: DMatrix<f64>,
    loss: Option<Box<dyn LossFunction>>,
    residual: DVector<f64>,
    jacobians: Vec<DMatrix<f64>>,
    ordering_id: Option<usize>,
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("variable_ids", &self.variable_ids)
            .field("residual_dimension", &self.residual_dimension())
            .field("robust", &self.loss.is_some())
            .finish()
    }
}

impl Constraint {
    /// Create a constraint with identity information.
    pub fn new(id: ConstraintId, variable_ids: Vec<VariableId>, factor: Box<dyn Factor>) -> Self {
        let dim = factor.residual_dimension();
        Self {
            id,
            variable_ids,
            factor,
            information: DMatrix::identity(dim, dim),
            loss: None,
            residual: DVector::zeros(dim),
            jacobians: Vec::new(),
            ordering_id: None,
        }
    }

    /// Replace the information matrix. It must be square with the residual dimension.
    pub fn with_information(mut self, information: DMatrix<f64>) -> CoreResult<Self> {
        self.set_information(information)?;
        Ok(self)
    }

    /// Attach a robust loss function.
    pub fn with_loss(mut self, loss: Box<dyn LossFunction>) -> Self {
        self.loss = Some(loss);
        self
    }

    pub fn set_information(&mut self, information: DMatrix<f64>) -> CoreResult<()> {
        let dim = self.residual_dimension();
        if information.nrows() != dim || information.ncols() != dim {
            return Err(CoreError::DimensionMismatch(format!(
                "constraint {}: information is {}x{}, residual dimension is {}",
                self.id,
                information.nrows(),
                information.ncols(),
                dim
            ))
            .log());
        }
        if information.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::InvalidInput(format!(
                "constraint {}: information matrix has non-finite entries",
                self.id
            ))
            .log());
        }
        self.information = information;
        Ok(())
    }

    pub fn id(&self) -> ConstraintId {
        self.id
    }

    pub fn variable_ids(&self) -> &[VariableId] {
        &self.variable_ids
    }

    pub fn residual_dimension(&self) -> usize {
        self.factor.residual_dimension()
    }

    /// Number of Variables the residual model takes.
    pub fn expected_variable_count(&self) -> usize {
        self.factor.num_variables()
    }

    pub fn information(&self) -> &DMatrix<f64> {
        &self.information
    }

    /// Residual of the last evaluation.
    pub fn residual(&self) -> &DVector<f64> {
        &self.residual
    }

    /// Jacobian blocks of the last evaluation, one per Variable.
    pub fn jacobians(&self) -> &[DMatrix<f64>] {
        &self.jacobians
    }

    pub fn ordering_id(&self) -> Option<usize> {
        self.ordering_id
    }

    pub(crate) fn set_ordering_id(&mut self, ordering_id: Option<usize>) {
        self.ordering_id = ordering_id;
    }

    pub fn is_robust(&self) -> bool {
        self.loss.is_some()
    }

    /// Squared Mahalanobis norm `rᵀ·W·r` of the cached residual.
    pub fn chi2(&self) -> f64 {
        self.residual.dot(&(&self.information * &self.residual))
    }

    /// Cost contribution of the cached residual, `ρ(χ²)`.
    pub fn cost(&self) -> f64 {
        let chi2 = self.chi2();
        match &self.loss {
            Some(loss) => loss.evaluate(chi2)[0],
            None => chi2,
        }
    }

    /// Information matrix scaled by the loss weight `ρ'(χ²)`.
    pub fn robust_information(&self) -> DMatrix<f64> {
        match &self.loss {
            Some(loss) => loss.evaluate(self.chi2())[1] * &self.information,
            None => self.information.clone(),
        }
    }

    /// Recompute the residual from the current Variable values.
    pub fn compute_residual(&mut self, variables: &BTreeMap<VariableId, Variable>) -> CoreResult<()> {
        let params = self.gather(variables)?;
        let residual = self.factor.compute_residual(&params).map_err(|e| {
            CoreError::FactorEvaluation(format!("constraint {}: {e}", self.id)).log_with_source(e)
        })?;
        if residual.len() != self.residual_dimension() {
            return Err(CoreError::DimensionMismatch(format!(
                "constraint {}: residual has {} entries, expected {}",
                self.id,
                residual.len(),
                self.residual_dimension()
            ))
            .log());
        }
        self.residual = residual;
        Ok(())
    }

    /// Recompute the Jacobian blocks from the current Variable values.
    pub fn compute_jacobians(
        &mut self,
        variables: &BTreeMap<VariableId, Variable>,
    ) -> CoreResult<()> {
        let params = self.gather(variables)?;
        let jacobians = self.factor.compute_jacobians(&params).map_err(|e| {
            CoreError::FactorEvaluation(format!("constraint {}: {e}", self.id)).log_with_source(e)
        })?;
        if jacobians.len() != self.variable_ids.len() {
            return Err(CoreError::DimensionMismatch(format!(
                "constraint {}: {} Jacobian blocks for {} variables",
                self.id,
                jacobians.len(),
                self.variable_ids.len()
            ))
            .log());
        }
        let dim = self.residual_dimension();
        for (jacobian, id) in jacobians.iter().zip(&self.variable_ids) {
            let local_dim = variables
                .get(id)
                .map(Variable::local_dimension)
                .unwrap_or_default();
            if jacobian.nrows() != dim || jacobian.ncols() != local_dim {
                return Err(CoreError::DimensionMismatch(format!(
                    "constraint {}: Jacobian for variable {} is {}x{}, expected {}x{}",
                    self.id,
                    id,
                    jacobian.nrows(),
                    jacobian.ncols(),
                    dim,
                    local_dim
                ))
                .log());
            }
        }
        self.jacobians = jacobians;
        Ok(())
    }

    /// Residual and Jacobians in one pass.
    pub fn linearize(&mut self, variables: &BTreeMap<VariableId, Variable>) -> CoreResult<()> {
        self.compute_residual(variables)?;
        self.compute_jacobians(variables)
    }

    fn gather<'a>(
        &self,
        variables: &'a BTreeMap<VariableId, Variable>,
    ) -> CoreResult<Vec<&'a DVector<f64>>> {
        self.variable_ids
            .iter()
            .map(|id| {
                variables.get(id).map(Variable::value).ok_or_else(|| {
                    CoreError::UnknownVariable(format!("constraint {} references {id}", self.id))
                        .log()
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loss_functions::HuberLoss;
    use crate::factors::{BetweenFactor, PriorFactor};

    fn variables(values: &[(u64, Vec<f64>)]) -> BTreeMap<VariableId, Variable> {
        values
            .iter()
            .map(|(id, v)| {
                let id = VariableId(*id);
                (id, Variable::euclidean(id, DVector::from_vec(v.clone())))
            })
            .collect()
    }

    #[test]
    fn test_cost_with_information() -> Result<(), Box<dyn std::error::Error>> {
        let vars = variables(&[(0, vec![1.0, 2.0])]);
        let mut constraint = Constraint::new(
            ConstraintId(0),
            vec![VariableId(0)],
            Box::new(PriorFactor::new(DVector::zeros(2))),
        )
        .with_information(DMatrix::from_diagonal(&DVector::from_vec(vec![4.0, 1.0])))?;

        constraint.linearize(&vars)?;
        assert_eq!(constraint.chi2(), 8.0);
        assert_eq!(constraint.cost(), 8.0);
        assert_eq!(constraint.jacobians().len(), 1);
        Ok(())
    }

    #[test]
    fn test_robust_cost_and_weight() -> Result<(), Box<dyn std::error::Error>> {
        let vars = variables(&[(0, vec![0.0]), (1, vec![5.0])]);
        let mut constraint = Constraint::new(
            ConstraintId(1),
            vec![VariableId(0), VariableId(1)],
            Box::new(BetweenFactor::new(DVector::from_vec(vec![1.0]))),
        )
        .with_loss(Box::new(HuberLoss::new(1.0)?));

        constraint.compute_residual(&vars)?;
        assert_eq!(constraint.chi2(), 16.0);
        assert!((constraint.cost() - 7.0).abs() < 1e-12);
        assert!((constraint.robust_information()[(0, 0)] - 0.25).abs() < 1e-12);
        Ok(())
    }

    #[test]
    fn test_information_shape_is_checked() {
        let result = Constraint::new(
            ConstraintId(0),
            vec![VariableId(0)],
            Box::new(PriorFactor::new(DVector::zeros(2))),
        )
        .with_information(DMatrix::identity(3, 3));
        assert!(matches!(result, Err(CoreError::DimensionMismatch(_))));
    }

    #[test]
    fn test_missing_variable_is_reported() {
        let vars = variables(&[(0, vec![0.0])]);
        let mut constraint = Constraint::new(
            ConstraintId(0),
            vec![VariableId(0), VariableId(9)],
            Box::new(BetweenFactor::new(DVector::zeros(1))),
        );
        assert!(matches!(
            constraint.compute_residual(&vars),
            Err(CoreError::UnknownVariable(_))
        ));
    }
}
