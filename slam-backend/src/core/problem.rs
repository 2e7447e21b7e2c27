//! Optimization problem definition and normal-equation assembly.
//!
//! A [`Problem`] owns every Variable and Constraint of one least squares problem,
//! together with the id generators that name them. It turns the current state into
//! the Gauss-Newton normal equations
//!
//! ```text
//! H = Σ Jᵢᵀ·W·Jⱼ        (block (i, j), summed over Constraints)
//! b = -Σ Jᵢᵀ·W·r
//! ```
//!
//! and hands them to the Levenberg-Marquardt loop in [`crate::optimizer`].
//!
//! # Example
//!
//! ```
//! use slam_backend::core::problem::Problem;
//! use slam_backend::factors::PriorFactor;
//! use slam_backend::manifold::ManifoldType;
//! use nalgebra::DVector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut problem = Problem::new();
//! let x = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![10.0]))?;
//! problem.create_constraint(&[x], Box::new(PriorFactor::new(DVector::from_vec(vec![3.0]))))?;
//!
//! assert!(problem.solve(20));
//! let solved = problem.variable(x).map(|v| v.value()[0]).unwrap_or_default();
//! assert!((solved - 3.0).abs() < 1e-4);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    CoreError, CoreResult,
    constraint::Constraint,
    id::{ConstraintId, IdGenerator, VariableId},
    variable::Variable,
};
use crate::error::BackendResult;
use crate::factors::Factor;
use crate::linalg::{LinAlgResult, LinearSolver};
use crate::manifold::ManifoldType;
use crate::optimizer::{
    LevenbergMarquardt,
    levenberg_marquardt::{LevenbergMarquardtConfig, LevenbergMarquardtSummary},
};
use nalgebra::{DMatrix, DVector};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The least squares problem: Variables, Constraints and the assembled system.
pub struct Problem {
    variables: BTreeMap<VariableId, Variable>,
    constraints: BTreeMap<ConstraintId, Constraint>,
    /// Constraints attached to each Variable, in registration order
    variable_constraints: HashMap<VariableId, Vec<ConstraintId>>,
    variable_ids: IdGenerator,
    constraint_ids: IdGenerator,
    /// Total local dimension of the free Variables, valid when `ordering_valid`
    ordering_dimension: usize,
    ordering_valid: bool,
    hessian: DMatrix<f64>,
    b: DVector<f64>,
    delta_x: DVector<f64>,
    /// Undamped diagonal of `hessian`, saved while λ is added
    undamped_diagonal: Option<DVector<f64>>,
    last_summary: Option<LevenbergMarquardtSummary>,
}

impl Default for Problem {
    fn default() -> Self {
        Self::new()
    }
}

impl Problem {
    pub fn new() -> Self {
        Self::with_id_generators(IdGenerator::new(), IdGenerator::new())
    }

    /// Create a problem that draws its ids from the given generators.
    pub fn with_id_generators(variable_ids: IdGenerator, constraint_ids: IdGenerator) -> Self {
        Self {
            variables: BTreeMap::new(),
            constraints: BTreeMap::new(),
            variable_constraints: HashMap::new(),
            variable_ids,
            constraint_ids,
            ordering_dimension: 0,
            ordering_valid: false,
            hessian: DMatrix::zeros(0, 0),
            b: DVector::zeros(0),
            delta_x: DVector::zeros(0),
            undamped_diagonal: None,
            last_summary: None,
        }
    }

    /// Allocate a fresh Variable id.
    pub fn next_variable_id(&mut self) -> VariableId {
        VariableId(self.variable_ids.next_id())
    }

    /// Allocate a fresh Constraint id.
    pub fn next_constraint_id(&mut self) -> ConstraintId {
        ConstraintId(self.constraint_ids.next_id())
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Build and register a Variable with a fresh id.
    pub fn create_variable(
        &mut self,
        manifold_type: ManifoldType,
        value: DVector<f64>,
    ) -> CoreResult<VariableId> {
        let id = self.next_variable_id();
        let variable = Variable::with_type(id, manifold_type, value)?;
        self.try_add_variable(variable)?;
        Ok(id)
    }

    /// Build and register a Constraint with a fresh id and identity information.
    pub fn create_constraint(
        &mut self,
        variable_ids: &[VariableId],
        factor: Box<dyn Factor>,
    ) -> CoreResult<ConstraintId> {
        let id = self.next_constraint_id();
        self.try_add_constraint(Constraint::new(id, variable_ids.to_vec(), factor))?;
        Ok(id)
    }

    /// Register a Variable. Returns false if its id is already taken.
    pub fn add_variable(&mut self, variable: Variable) -> bool {
        self.try_add_variable(variable).is_ok()
    }

    /// Register a Variable, reporting why registration failed.
    pub fn try_add_variable(&mut self, variable: Variable) -> CoreResult<()> {
        let id = variable.id();
        if self.variables.contains_key(&id) {
            return Err(CoreError::DuplicateId(format!("variable {id} already registered")).log());
        }
        self.variable_ids.reserve(id.0);
        self.variables.insert(id, variable);
        self.variable_constraints.entry(id).or_default();
        self.ordering_valid = false;
        Ok(())
    }

    /// Register a Constraint. Returns false if registration fails.
    pub fn add_constraint(&mut self, constraint: Constraint) -> bool {
        self.try_add_constraint(constraint).is_ok()
    }

    /// Register a Constraint.
    ///
    /// The Constraint is evaluated once at the current Variable values, so a residual
    /// model whose residual or Jacobian shapes do not fit its Variables is rejected
    /// here instead of during assembly.
    pub fn try_add_constraint(&mut self, mut constraint: Constraint) -> CoreResult<()> {
        let id = constraint.id();
        if self.constraints.contains_key(&id) {
            return Err(CoreError::DuplicateId(format!("constraint {id} already registered")).log());
        }
        let expected = constraint.expected_variable_count();
        if constraint.variable_ids().len() != expected {
            return Err(CoreError::InvalidInput(format!(
                "constraint {id} lists {} variables, its residual model takes {expected}",
                constraint.variable_ids().len()
            ))
            .log());
        }
        if let Some(missing) = constraint
            .variable_ids()
            .iter()
            .find(|vid| !self.variables.contains_key(*vid))
        {
            return Err(CoreError::UnknownVariable(format!(
                "constraint {id} references unregistered variable {missing}"
            ))
            .log());
        }
        constraint.linearize(&self.variables)?;

        self.constraint_ids.reserve(id.0);
        for vid in constraint.variable_ids() {
            let attached = self.variable_constraints.entry(*vid).or_default();
            if !attached.contains(&id) {
                attached.push(id);
            }
        }
        self.constraints.insert(id, constraint);
        self.ordering_valid = false;
        Ok(())
    }

    /// Remove a Constraint. Returns false if the id is unknown.
    pub fn remove_constraint(&mut self, id: ConstraintId) -> bool {
        let Some(constraint) = self.constraints.remove(&id) else {
            warn!("remove_constraint: unknown constraint {id}");
            return false;
        };
        for vid in constraint.variable_ids() {
            if let Some(attached) = self.variable_constraints.get_mut(vid) {
                attached.retain(|cid| *cid != id);
            }
        }
        self.ordering_valid = false;
        true
    }

    /// Remove a Variable together with every Constraint attached to it.
    ///
    /// Returns false if the id is unknown.
    pub fn remove_variable(&mut self, id: VariableId) -> bool {
        if self.variables.remove(&id).is_none() {
            warn!("remove_variable: unknown variable {id}");
            return false;
        }
        let attached = self.variable_constraints.remove(&id).unwrap_or_default();
        for cid in attached {
            self.remove_constraint(cid);
        }
        self.ordering_valid = false;
        true
    }

    /// Fix or free a registered Variable. Returns false if the id is unknown.
    pub fn set_variable_fixed(&mut self, id: VariableId, fixed: bool) -> bool {
        match self.variables.get_mut(&id) {
            Some(variable) => {
                if variable.is_fixed() != fixed {
                    variable.set_fixed(fixed);
                    self.ordering_valid = false;
                }
                true
            }
            None => {
                warn!("set_variable_fixed: unknown variable {id}");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn variable(&self, id: VariableId) -> Option<&Variable> {
        self.variables.get(&id)
    }

    /// Mutable access for editing values between solves.
    ///
    /// The ordering is invalidated, since the caller may fix or free the Variable.
    pub fn variable_mut(&mut self, id: VariableId) -> Option<&mut Variable> {
        let variable = self.variables.get_mut(&id)?;
        self.ordering_valid = false;
        Some(variable)
    }

    pub fn variables(&self) -> &BTreeMap<VariableId, Variable> {
        &self.variables
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&Constraint> {
        self.constraints.get(&id)
    }

    pub fn constraints(&self) -> &BTreeMap<ConstraintId, Constraint> {
        &self.constraints
    }

    /// Constraints attached to a Variable, in registration order.
    pub fn constraints_of(&self, id: VariableId) -> &[ConstraintId] {
        self.variable_constraints
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Size of the linear system, valid after [`assign_ordering`](Self::assign_ordering).
    pub fn ordering_dimension(&self) -> usize {
        self.ordering_dimension
    }

    /// Assembled system matrix `H` (undamped outside a solve).
    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    /// Assembled right-hand side `b = -Jᵀ·W·r`.
    pub fn b(&self) -> &DVector<f64> {
        &self.b
    }

    /// Last computed update step.
    pub fn delta_x(&self) -> &DVector<f64> {
        &self.delta_x
    }

    /// Summary of the most recent solve.
    pub fn last_summary(&self) -> Option<&LevenbergMarquardtSummary> {
        self.last_summary.as_ref()
    }

    // ------------------------------------------------------------------
    // Solving
    // ------------------------------------------------------------------

    /// Run Levenberg-Marquardt for at most `max_iterations` outer iterations.
    ///
    /// Returns false only if the problem has no Variables or no Constraints, in
    /// which case nothing is touched. Otherwise the Variables are left at the last
    /// accepted estimate and the run summary is available from
    /// [`last_summary`](Self::last_summary).
    pub fn solve(&mut self, max_iterations: usize) -> bool {
        let config = LevenbergMarquardtConfig::new().with_max_iterations(max_iterations);
        self.try_solve(config).is_ok()
    }

    /// Run Levenberg-Marquardt with a full configuration.
    pub fn try_solve(
        &mut self,
        config: LevenbergMarquardtConfig,
    ) -> BackendResult<LevenbergMarquardtSummary> {
        let mut solver = LevenbergMarquardt::with_config(config);
        solver.optimize(self)
    }

    pub(crate) fn set_last_summary(&mut self, summary: LevenbergMarquardtSummary) {
        self.last_summary = Some(summary);
    }

    // ------------------------------------------------------------------
    // Linear system
    // ------------------------------------------------------------------

    /// Assign consecutive system offsets to the free Variables in id order.
    ///
    /// Fixed Variables get no offset. Returns the total dimension.
    pub fn assign_ordering(&mut self) -> usize {
        let mut offset = 0;
        for variable in self.variables.values_mut() {
            if variable.is_fixed() {
                variable.set_ordering_id(None);
            } else {
                variable.set_ordering_id(Some(offset));
                offset += variable.local_dimension();
            }
        }
        let mut row = 0;
        for constraint in self.constraints.values_mut() {
            constraint.set_ordering_id(Some(row));
            row += constraint.residual_dimension();
        }
        self.ordering_dimension = offset;
        self.ordering_valid = true;
        debug!(
            "Ordering: {} free variables, dimension {}",
            self.variables.values().filter(|v| !v.is_fixed()).count(),
            offset
        );
        offset
    }

    /// Re-evaluate every Constraint and build `H` and `b` from scratch.
    pub fn assemble_system(&mut self) -> CoreResult<()> {
        if !self.ordering_valid {
            self.assign_ordering();
        }
        self.linearize_constraints()?;

        let n = self.ordering_dimension;
        let mut hessian = DMatrix::zeros(n, n);
        let mut b = DVector::zeros(n);

        for constraint in self.constraints.values() {
            let information = constraint.robust_information();
            let jacobians = constraint.jacobians();
            let ids = constraint.variable_ids();

            for (i, id_i) in ids.iter().enumerate() {
                let Some((index_i, dim_i)) = self.block_of(*id_i)? else {
                    continue;
                };
                let jt_w = jacobians[i].transpose() * &information;

                for (j, id_j) in ids.iter().enumerate().skip(i) {
                    let Some((index_j, dim_j)) = self.block_of(*id_j)? else {
                        continue;
                    };
                    let mut block = &jt_w * &jacobians[j];
                    if j == i {
                        block.fill_lower_triangle_with_upper_triangle();
                    }
                    let mut upper = hessian.view_mut((index_i, index_j), (dim_i, dim_j));
                    upper += &block;
                    if j != i {
                        let mut lower = hessian.view_mut((index_j, index_i), (dim_j, dim_i));
                        lower += block.transpose();
                    }
                }

                let mut segment = b.rows_mut(index_i, dim_i);
                segment -= &jt_w * constraint.residual();
            }
        }

        self.hessian = hessian;
        self.b = b;
        self.undamped_diagonal = None;
        Ok(())
    }

    /// Offset and local dimension of a Variable's block, or None if it is fixed.
    fn block_of(&self, id: VariableId) -> CoreResult<Option<(usize, usize)>> {
        let variable = self.variables.get(&id).ok_or_else(|| {
            CoreError::UnknownVariable(format!("variable {id} vanished during assembly")).log()
        })?;
        if variable.is_fixed() {
            return Ok(None);
        }
        match variable.ordering_id() {
            Some(offset) => Ok(Some((offset, variable.local_dimension()))),
            None => Err(CoreError::InvalidInput(format!(
                "variable {id} has no ordering offset, ordering is stale"
            ))
            .log()),
        }
    }

    fn linearize_constraints(&mut self) -> CoreResult<()> {
        let variables = &self.variables;
        #[cfg(feature = "parallel")]
        {
            self.constraints
                .par_iter_mut()
                .try_for_each(|(_, constraint)| constraint.linearize(variables))
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.constraints
                .values_mut()
                .try_for_each(|constraint| constraint.linearize(variables))
        }
    }

    fn evaluate_residuals(&mut self) -> CoreResult<()> {
        let variables = &self.variables;
        #[cfg(feature = "parallel")]
        {
            self.constraints
                .par_iter_mut()
                .try_for_each(|(_, constraint)| constraint.compute_residual(variables))
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.constraints
                .values_mut()
                .try_for_each(|constraint| constraint.compute_residual(variables))
        }
    }

    /// Sum of Constraint costs at the cached residuals, accumulated in id order.
    pub fn current_cost(&self) -> f64 {
        self.constraints.values().map(Constraint::cost).sum()
    }

    /// Re-evaluate all residuals and return the total cost.
    pub fn compute_total_cost(&mut self) -> CoreResult<f64> {
        self.evaluate_residuals()?;
        Ok(self.current_cost())
    }

    /// Largest diagonal entry of the assembled `H`.
    pub fn max_hessian_diagonal(&self) -> f64 {
        self.hessian
            .diagonal()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Add `lambda` to the diagonal of `H`, keeping the undamped diagonal.
    pub fn add_lambda_to_hessian(&mut self, lambda: f64) {
        if self.undamped_diagonal.is_none() {
            self.undamped_diagonal = Some(self.hessian.diagonal());
        }
        for i in 0..self.hessian.nrows() {
            self.hessian[(i, i)] += lambda;
        }
    }

    /// Restore the undamped diagonal of `H`.
    pub fn remove_lambda_from_hessian(&mut self) {
        if let Some(diagonal) = self.undamped_diagonal.take() {
            self.hessian.set_diagonal(&diagonal);
        }
    }

    /// Solve `(H + λI)·Δx = b` and keep the result as the current step.
    ///
    /// `H` is back in undamped form when this returns, whether or not the solve
    /// succeeded.
    pub fn solve_damped_system(
        &mut self,
        lambda: f64,
        solver: &mut dyn LinearSolver,
    ) -> LinAlgResult<DVector<f64>> {
        if self.ordering_dimension == 0 {
            self.delta_x = DVector::zeros(0);
            return Ok(self.delta_x.clone());
        }
        self.add_lambda_to_hessian(lambda);
        let result = solver.solve(&self.hessian, &self.b);
        self.remove_lambda_from_hessian();
        let delta_x = result?;
        self.delta_x = delta_x.clone();
        Ok(delta_x)
    }

    // ------------------------------------------------------------------
    // Tentative updates
    // ------------------------------------------------------------------

    /// Snapshot every free Variable and apply `delta_x` to them.
    pub fn apply_trial_step(&mut self, delta_x: &DVector<f64>) {
        for variable in self.variables.values_mut() {
            if variable.is_fixed() {
                continue;
            }
            let Some(offset) = variable.ordering_id() else {
                continue;
            };
            variable.save_backup();
            let delta = delta_x.rows(offset, variable.local_dimension()).into_owned();
            variable.update(&delta);
        }
    }

    /// Return every Variable to its snapshot.
    pub fn rollback_trial_step(&mut self) {
        for variable in self.variables.values_mut() {
            variable.restore_backup();
        }
    }

    /// Keep the tentative values and drop the snapshots.
    pub fn commit_trial_step(&mut self) {
        for variable in self.variables.values_mut() {
            variable.discard_backup();
        }
    }
}
