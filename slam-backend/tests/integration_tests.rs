//! End-to-end tests for the slam-backend solver.
//!
//! Each test builds a small Problem through the public API, runs the
//! Levenberg-Marquardt solver and checks the resulting Variables and summary.
//!
//! # Test Coverage
//!
//! - Scalar and vector priors, chains of between-constraints
//! - Exponential curve fitting with and without noise
//! - Rotation and pose Variables next to vector Variables
//! - Robust losses, fixed Variables, timeouts, observers
//! - Damping adaptation and exact rollback of rejected steps
//! - Non-finite costs at the start and at trial points
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration_tests
//! cargo test --test integration_tests --no-default-features
//! ```

use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use slam_backend::core::constraint::Constraint;
use slam_backend::core::loss_functions::HuberLoss;
use slam_backend::core::problem::Problem;
use slam_backend::error::BackendError;
use slam_backend::factors::{
    BetweenFactor, CurveFittingFactor, Factor, FactorResult, PriorFactor, RotationPriorFactor,
};
use slam_backend::linalg::LinearSolverType;
use slam_backend::manifold::so3::right_jacobian_inverse;
use slam_backend::manifold::{ManifoldType, Pose3, Rotation3};
use slam_backend::observers::CostRecorder;
use slam_backend::optimizer::{
    LevenbergMarquardt, LevenbergMarquardtConfig, OptimizationStatus, OptimizerError,
};
use web_time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn scalar(value: f64) -> DVector<f64> {
    DVector::from_vec(vec![value])
}

fn value_of(problem: &Problem, id: slam_backend::VariableId) -> DVector<f64> {
    problem
        .variable(id)
        .map(|v| v.value().clone())
        .unwrap_or_else(|| DVector::zeros(0))
}

/// Residual `x - 3` with a Jacobian of the wrong sign, so every step goes uphill.
struct UphillFactor;

impl Factor for UphillFactor {
    fn residual_dimension(&self) -> usize {
        1
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        Ok(scalar(params[0][0] - 3.0))
    }

    fn compute_jacobians(&self, _params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        Ok(vec![DMatrix::from_element(1, 1, -1.0)])
    }
}

/// Residual `x - 3`, infinite from `x = 10` upwards.
struct InfiniteAtStartFactor;

impl Factor for InfiniteAtStartFactor {
    fn residual_dimension(&self) -> usize {
        1
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        let x = params[0][0];
        Ok(scalar(if x >= 10.0 { f64::INFINITY } else { x - 3.0 }))
    }

    fn compute_jacobians(&self, _params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        Ok(vec![DMatrix::from_element(1, 1, 1.0)])
    }
}

/// Residual `x - 3` for `x >= 10`, NaN anywhere the solver can step to.
struct NanBelowStartFactor;

impl Factor for NanBelowStartFactor {
    fn residual_dimension(&self) -> usize {
        1
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        let x = params[0][0];
        Ok(scalar(if x >= 10.0 { x - 3.0 } else { f64::NAN }))
    }

    fn compute_jacobians(&self, _params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        Ok(vec![DMatrix::from_element(1, 1, 1.0)])
    }
}

/// Prior on a pose stored as `[t, q]`: `r = [t - t₀; Log(q₀⁻¹ ⊗ q)]`.
struct PosePriorFactor {
    translation: Vector3<f64>,
    rotation: UnitQuaternion<f64>,
}

impl Factor for PosePriorFactor {
    fn residual_dimension(&self) -> usize {
        6
    }

    fn num_variables(&self) -> usize {
        1
    }

    fn compute_residual(&self, params: &[&DVector<f64>]) -> FactorResult<DVector<f64>> {
        let t = Pose3::translation(params[0]) - self.translation;
        let phi = (self.rotation.inverse() * Pose3::rotation(params[0])).scaled_axis();
        Ok(DVector::from_iterator(6, t.iter().chain(phi.iter()).copied()))
    }

    fn compute_jacobians(&self, params: &[&DVector<f64>]) -> FactorResult<Vec<DMatrix<f64>>> {
        let phi = (self.rotation.inverse() * Pose3::rotation(params[0])).scaled_axis();
        let mut jacobian = DMatrix::zeros(6, 6);
        jacobian
            .view_mut((0, 0), (3, 3))
            .copy_from(&DMatrix::identity(3, 3));
        jacobian
            .view_mut((3, 3), (3, 3))
            .copy_from(&right_jacobian_inverse(&phi));
        Ok(vec![jacobian])
    }
}

#[test]
fn test_scalar_prior_converges() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(PriorFactor::new(scalar(3.0))))?;

    assert!(problem.solve(20));

    // The default step threshold stops one step short of the damped remainder.
    let solved = value_of(&problem, x)[0];
    assert!((solved - 3.0).abs() < 1e-4, "x = {solved}");
    let summary = problem.last_summary().ok_or("summary missing")?;
    assert!(summary.iterations <= 20);
    assert!(summary.convergence_status.is_converged());

    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(PriorFactor::new(scalar(3.0))))?;
    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(20)
        .with_min_step_norm_squared(1e-12);
    let summary = problem.try_solve(config)?;

    let solved = value_of(&problem, x)[0];
    assert!((solved - 3.0).abs() < 1e-5, "x = {solved}");
    assert!(summary.iterations < 20);
    assert_eq!(summary.convergence_status, OptimizationStatus::CostThresholdReached);
    Ok(())
}

#[test]
fn test_small_first_step_leaves_variable_untouched() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(3.0005))?;
    problem.create_constraint(&[x], Box::new(PriorFactor::new(scalar(3.0))))?;

    assert!(problem.solve(20));

    assert_eq!(value_of(&problem, x)[0].to_bits(), 3.0005_f64.to_bits());
    let summary = problem.last_summary().ok_or("summary missing")?;
    assert_eq!(summary.convergence_status, OptimizationStatus::StepNormReached);
    assert_eq!(summary.iterations, 0);
    assert_eq!(summary.accepted_trials, 0);
    assert_eq!(summary.final_cost, summary.initial_cost);
    Ok(())
}

#[test]
fn test_infinite_initial_cost_still_solves() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(InfiniteAtStartFactor))?;

    assert!(problem.solve(10));

    let summary = problem.last_summary().ok_or("summary missing")?;
    assert!(summary.initial_cost.is_infinite());
    assert_eq!(summary.accepted_trials, 0);
    assert_eq!(summary.convergence_status, OptimizationStatus::FailedTrialLimit);
    assert_eq!(value_of(&problem, x)[0].to_bits(), 10.0_f64.to_bits());
    Ok(())
}

#[test]
fn test_non_finite_trial_cost_is_rejected() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(NanBelowStartFactor))?;

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(5)
        .with_record_history(true);
    let summary = problem.try_solve(config)?;

    assert_eq!(summary.accepted_trials, 0);
    assert!(summary.rejected_trials > 0);
    assert_eq!(summary.iteration_history.len(), summary.rejected_trials);
    for stats in &summary.iteration_history {
        assert!(!stats.accepted);
        assert!(stats.trial_cost.is_nan());
        assert!(stats.lambda_after > stats.lambda_before);
        assert_eq!(stats.nu_after, 2.0 * stats.nu_before);
    }
    assert_eq!(value_of(&problem, x)[0].to_bits(), 10.0_f64.to_bits());
    assert_eq!(summary.final_cost, 49.0);
    Ok(())
}

#[test]
fn test_empty_problem_is_rejected() -> TestResult {
    let mut problem = Problem::new();
    assert!(!problem.solve(10));
    assert!(matches!(
        problem.try_solve(LevenbergMarquardtConfig::new()),
        Err(BackendError::Optimizer(OptimizerError::EmptyProblem))
    ));

    let x = problem.create_variable(ManifoldType::RN, scalar(1.5))?;
    assert!(!problem.solve(10));
    assert!(matches!(
        problem.try_solve(LevenbergMarquardtConfig::new()),
        Err(BackendError::Optimizer(OptimizerError::NoConstraints))
    ));
    assert_eq!(value_of(&problem, x)[0], 1.5);
    assert!(problem.last_summary().is_none());
    Ok(())
}

#[test]
fn test_curve_fitting_noise_free() -> TestResult {
    let truth = DVector::from_vec(vec![1.0, 2.0, 1.0]);
    let mut problem = Problem::new();
    let abc = problem.create_variable(ManifoldType::RN, DVector::zeros(3))?;
    for i in 0..100 {
        let x = i as f64 / 100.0;
        let y = CurveFittingFactor::new(x, 0.0).model(&truth);
        problem.create_constraint(&[abc], Box::new(CurveFittingFactor::new(x, y)))?;
    }

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(50)
        .with_relative_cost_threshold(1e-12)
        .with_min_step_norm_squared(1e-14);
    let summary = problem.try_solve(config)?;

    let estimate = value_of(&problem, abc);
    assert!(summary.final_cost < summary.initial_cost);
    for k in 0..3 {
        assert!(
            (estimate[k] - truth[k]).abs() < 1e-3,
            "coefficient {k}: {} vs {}",
            estimate[k],
            truth[k]
        );
    }
    Ok(())
}

#[test]
fn test_curve_fitting_with_noise_reduces_cost() -> TestResult {
    let truth = DVector::from_vec(vec![1.0, 2.0, 1.0]);
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 1.0)?;

    let mut problem = Problem::new();
    let abc = problem.create_variable(ManifoldType::RN, DVector::zeros(3))?;
    for i in 0..100 {
        let x = i as f64 / 100.0;
        let y = CurveFittingFactor::new(x, 0.0).model(&truth) + noise.sample(&mut rng);
        problem.create_constraint(&[abc], Box::new(CurveFittingFactor::new(x, y)))?;
    }

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(50)
        .with_record_history(true);
    let summary = problem.try_solve(config)?;

    assert!(summary.final_cost < summary.initial_cost);
    assert!(summary.final_cost.is_finite());
    for stats in summary.iteration_history.iter().filter(|s| s.accepted) {
        assert!(stats.trial_cost <= stats.cost);
    }
    Ok(())
}

#[test]
fn test_chain_with_sparse_solver_matches_dense() -> TestResult {
    type Chain = (Problem, Vec<slam_backend::VariableId>);
    let build = || -> Result<Chain, Box<dyn std::error::Error>> {
        let mut problem = Problem::new();
        let ids = (0..6)
            .map(|i| {
                let start = DVector::from_vec(vec![i as f64 * 0.7, -0.3]);
                problem.create_variable(ManifoldType::RN, start)
            })
            .collect::<Result<Vec<_>, _>>()?;
        problem.create_constraint(&[ids[0]], Box::new(PriorFactor::new(DVector::zeros(2))))?;
        for pair in ids.windows(2) {
            problem.create_constraint(
                pair,
                Box::new(BetweenFactor::new(DVector::from_vec(vec![1.0, 0.5]))),
            )?;
        }
        Ok((problem, ids))
    };

    let (mut dense, dense_ids) = build()?;
    let (mut sparse, sparse_ids) = build()?;
    dense.try_solve(LevenbergMarquardtConfig::new().with_max_iterations(20))?;
    sparse.try_solve(
        LevenbergMarquardtConfig::new()
            .with_max_iterations(20)
            .with_linear_solver_type(LinearSolverType::SparseCholesky),
    )?;

    for (k, (d, s)) in dense_ids.iter().zip(&sparse_ids).enumerate() {
        let expected = DVector::from_vec(vec![k as f64, 0.5 * k as f64]);
        let dense_value = value_of(&dense, *d);
        let sparse_value = value_of(&sparse, *s);
        assert!((&dense_value - &sparse_value).norm() < 1e-9);
        assert!((&dense_value - &expected).norm() < 1e-4);
    }
    Ok(())
}

#[test]
fn test_fixed_variable_is_untouched() -> TestResult {
    let mut problem = Problem::new();
    let anchor = problem.create_variable(ManifoldType::RN, scalar(0.123456789))?;
    let x = problem.create_variable(ManifoldType::RN, scalar(5.0))?;
    problem.create_constraint(&[anchor], Box::new(PriorFactor::new(scalar(1.0))))?;
    problem.create_constraint(&[anchor, x], Box::new(BetweenFactor::new(scalar(2.0))))?;
    assert!(problem.set_variable_fixed(anchor, true));

    assert!(problem.solve(20));

    assert_eq!(value_of(&problem, anchor)[0].to_bits(), 0.123456789_f64.to_bits());
    assert!((value_of(&problem, x)[0] - 2.123456789).abs() < 1e-4);
    assert_eq!(problem.ordering_dimension(), 1);
    Ok(())
}

#[test]
fn test_all_fixed_problem_stops_immediately() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(4.0))?;
    problem.create_constraint(&[x], Box::new(PriorFactor::new(scalar(0.0))))?;
    problem.set_variable_fixed(x, true);

    let summary = problem.try_solve(LevenbergMarquardtConfig::new())?;
    assert_eq!(summary.convergence_status, OptimizationStatus::StepNormReached);
    assert_eq!(summary.iterations, 0);
    assert_eq!(value_of(&problem, x)[0], 4.0);
    assert_eq!(summary.final_cost, 16.0);
    Ok(())
}

#[test]
fn test_rejected_trials_raise_damping_and_restore_values() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(UphillFactor))?;

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(5)
        .with_min_step_norm_squared(0.0)
        .with_record_history(true);
    let summary = problem.try_solve(config)?;

    assert_eq!(summary.convergence_status, OptimizationStatus::FailedTrialLimit);
    assert_eq!(summary.accepted_trials, 0);
    assert_eq!(summary.rejected_trials, 11);
    assert_eq!(summary.iteration_history.len(), 11);
    for stats in &summary.iteration_history {
        assert!(!stats.accepted);
        assert!(stats.lambda_after > stats.lambda_before);
        assert_eq!(stats.nu_after, 2.0 * stats.nu_before);
    }
    assert_eq!(value_of(&problem, x)[0].to_bits(), 10.0_f64.to_bits());
    assert_eq!(summary.final_cost, summary.initial_cost);
    Ok(())
}

#[test]
fn test_huber_loss_downweights_outlier() -> TestResult {
    let solve = |robust: bool| -> Result<f64, Box<dyn std::error::Error>> {
        let mut problem = Problem::new();
        let x = problem.create_variable(ManifoldType::RN, scalar(2.0))?;
        for measurement in [0.0, 0.0, 0.0, 0.0, 10.0] {
            let id = problem.next_constraint_id();
            let mut constraint =
                Constraint::new(id, vec![x], Box::new(PriorFactor::new(scalar(measurement))));
            if robust {
                constraint = constraint.with_loss(Box::new(HuberLoss::new(1.0)?));
            }
            problem.try_add_constraint(constraint)?;
        }
        let config = LevenbergMarquardtConfig::new()
            .with_max_iterations(50)
            .with_min_step_norm_squared(1e-12);
        problem.try_solve(config)?;
        Ok(value_of(&problem, x)[0])
    };

    let least_squares = solve(false)?;
    let robust = solve(true)?;
    assert!((least_squares - 2.0).abs() < 1e-4, "l2 estimate {least_squares}");
    assert!((robust - 0.25).abs() < 1e-3, "huber estimate {robust}");
    Ok(())
}

#[test]
fn test_information_weights_measurements() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(0.0))?;
    for (measurement, weight) in [(1.0, 3.0), (5.0, 1.0)] {
        let id = problem.next_constraint_id();
        let constraint = Constraint::new(id, vec![x], Box::new(PriorFactor::new(scalar(measurement))))
            .with_information(DMatrix::from_element(1, 1, weight))?;
        problem.try_add_constraint(constraint)?;
    }

    assert!(problem.solve(20));
    assert!((value_of(&problem, x)[0] - 2.0).abs() < 1e-4);
    Ok(())
}

#[test]
fn test_rotation_and_vector_variables_together() -> TestResult {
    let target = UnitQuaternion::from_euler_angles(0.3, -0.2, 0.5);
    let start = UnitQuaternion::from_euler_angles(-0.2, 0.4, 0.1);

    let mut problem = Problem::new();
    let p = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![4.0, -1.0]))?;
    let q = problem.create_variable(ManifoldType::SO3, Rotation3::to_vector(&start))?;
    problem.create_constraint(&[p], Box::new(PriorFactor::new(DVector::from_vec(vec![1.0, 2.0]))))?;
    problem.create_constraint(&[q], Box::new(RotationPriorFactor::new(target)))?;

    assert_eq!(problem.assign_ordering(), 2 + 3);
    assert!(problem.solve(30));

    let stored = value_of(&problem, q);
    let rotation = Rotation3::quaternion_at(&stored, 0);
    assert!(rotation.angle_to(&target) < 1e-4);
    assert!((stored.norm() - 1.0).abs() < 1e-12);
    assert!((value_of(&problem, p) - DVector::from_vec(vec![1.0, 2.0])).norm() < 1e-4);
    Ok(())
}

#[test]
fn test_pose_variable_with_custom_factor() -> TestResult {
    let translation = Vector3::new(1.0, -2.0, 0.5);
    let rotation = UnitQuaternion::from_euler_angles(0.1, 0.2, -0.3);

    let mut problem = Problem::new();
    let pose = problem.create_variable(
        ManifoldType::SE3,
        Pose3::to_vector(&Vector3::zeros(), &UnitQuaternion::identity()),
    )?;
    problem.create_constraint(
        &[pose],
        Box::new(PosePriorFactor {
            translation,
            rotation,
        }),
    )?;

    assert!(problem.solve(30));

    let value = value_of(&problem, pose);
    assert!((Pose3::translation(&value) - translation).norm() < 1e-4);
    assert!(Pose3::rotation(&value).angle_to(&rotation) < 1e-4);
    Ok(())
}

#[test]
fn test_ordering_partitions_free_variables() -> TestResult {
    let mut problem = Problem::new();
    let a = problem.create_variable(ManifoldType::RN, DVector::zeros(2))?;
    let r = problem.create_variable(ManifoldType::SO3, Rotation3::to_vector(&UnitQuaternion::identity()))?;
    let fixed = problem.create_variable(ManifoldType::RN, DVector::zeros(1))?;
    let c = problem.create_variable(ManifoldType::RN, DVector::zeros(3))?;
    problem.set_variable_fixed(fixed, true);

    let dimension = problem.assign_ordering();
    assert_eq!(dimension, 2 + 3 + 3);

    let mut blocks = Vec::new();
    for id in [a, r, fixed, c] {
        let variable = problem.variable(id).ok_or("missing variable")?;
        match variable.ordering_id() {
            Some(offset) => blocks.push((offset, variable.local_dimension())),
            None => assert!(variable.is_fixed()),
        }
    }
    blocks.sort();
    let mut next = 0;
    for (offset, dim) in blocks {
        assert_eq!(offset, next);
        next += dim;
    }
    assert_eq!(next, dimension);
    Ok(())
}

#[test]
fn test_assembled_hessian_is_symmetric() -> TestResult {
    let mut problem = Problem::new();
    let a = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![0.3, 1.1]))?;
    let b = problem.create_variable(ManifoldType::RN, DVector::from_vec(vec![-0.7, 2.0]))?;
    let id = problem.next_constraint_id();
    let information = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 1.0]);
    problem.try_add_constraint(
        Constraint::new(
            id,
            vec![a, b],
            Box::new(BetweenFactor::new(DVector::from_vec(vec![1.0, -1.0]))),
        )
        .with_information(information)?,
    )?;
    problem.create_constraint(&[a], Box::new(PriorFactor::new(DVector::zeros(2))))?;

    problem.assemble_system()?;
    let hessian = problem.hessian();
    assert_eq!(hessian.nrows(), 4);
    assert_eq!(hessian, &hessian.transpose());
    Ok(())
}

#[test]
fn test_zero_timeout_leaves_problem_untouched() -> TestResult {
    let mut problem = Problem::new();
    let x = problem.create_variable(ManifoldType::RN, scalar(10.0))?;
    problem.create_constraint(&[x], Box::new(PriorFactor::new(scalar(3.0))))?;

    let config = LevenbergMarquardtConfig::new().with_timeout(Duration::ZERO);
    let summary = problem.try_solve(config)?;

    assert_eq!(summary.convergence_status, OptimizationStatus::Timeout);
    assert_eq!(summary.iterations, 0);
    assert_eq!(value_of(&problem, x)[0], 10.0);
    assert_eq!(summary.final_cost, summary.initial_cost);
    Ok(())
}

#[test]
fn test_observer_sees_every_iteration() -> TestResult {
    let mut problem = Problem::new();
    let abc = problem.create_variable(ManifoldType::RN, DVector::zeros(3))?;
    let truth = DVector::from_vec(vec![0.5, -1.0, 0.2]);
    for i in 0..40 {
        let x = i as f64 / 40.0;
        let y = CurveFittingFactor::new(x, 0.0).model(&truth);
        problem.create_constraint(&[abc], Box::new(CurveFittingFactor::new(x, y)))?;
    }

    let recorder = CostRecorder::new();
    let mut solver =
        LevenbergMarquardt::with_config(LevenbergMarquardtConfig::new().with_max_iterations(30));
    solver.add_observer(recorder.clone());
    let summary = solver.optimize(&mut problem)?;

    let steps = recorder.steps();
    assert_eq!(steps.len(), summary.iterations);
    for (k, step) in steps.iter().enumerate() {
        assert_eq!(step.iteration, k + 1);
        assert!(step.cost <= summary.initial_cost);
        assert!(step.damping > 0.0);
    }
    for pair in steps.windows(2) {
        assert!(pair[1].cost <= pair[0].cost);
    }
    Ok(())
}

#[test]
fn test_removed_variable_drops_its_constraints() -> TestResult {
    let mut problem = Problem::new();
    let a = problem.create_variable(ManifoldType::RN, scalar(0.0))?;
    let b = problem.create_variable(ManifoldType::RN, scalar(4.0))?;
    problem.create_constraint(&[a], Box::new(PriorFactor::new(scalar(1.0))))?;
    problem.create_constraint(&[a, b], Box::new(BetweenFactor::new(scalar(1.0))))?;

    assert!(problem.remove_variable(b));
    assert_eq!(problem.num_constraints(), 1);
    assert!(problem.solve(20));
    assert!((value_of(&problem, a)[0] - 1.0).abs() < 1e-4);
    Ok(())
}
