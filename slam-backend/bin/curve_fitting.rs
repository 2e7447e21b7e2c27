use clap::Parser;
use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use slam_backend::core::constraint::Constraint;
use slam_backend::core::loss_functions::{CauchyLoss, HuberLoss, LossFunction};
use slam_backend::core::problem::Problem;
use slam_backend::factors::CurveFittingFactor;
use slam_backend::init_logger;
use slam_backend::linalg::LinearSolverType;
use slam_backend::manifold::ManifoldType;
use slam_backend::observers::CostRecorder;
use slam_backend::optimizer::{LevenbergMarquardt, LevenbergMarquardtConfig};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "curve_fitting")]
#[command(about = "Fit y = exp(a*x^2 + b*x + c) to noisy samples with Levenberg-Marquardt")]
struct Args {
    /// True coefficient a
    #[arg(short, long, default_value = "1.0")]
    a: f64,

    /// True coefficient b
    #[arg(short, long, default_value = "2.0")]
    b: f64,

    /// True coefficient c
    #[arg(short, long, default_value = "1.0")]
    c: f64,

    /// Number of samples, taken at x = i / samples
    #[arg(short = 'n', long, default_value = "100")]
    samples: usize,

    /// Standard deviation of the Gaussian noise added to y
    #[arg(long, default_value = "1.0")]
    sigma: f64,

    /// Seed of the noise generator
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Maximum number of optimization iterations
    #[arg(short, long, default_value = "30")]
    max_iterations: usize,

    /// Linear solver: "dense-cholesky", "dense-lu" or "sparse-cholesky"
    #[arg(long, default_value = "dense-cholesky")]
    linear_solver: String,

    /// Robust loss: "l2", "huber" or "cauchy"
    #[arg(long, default_value = "l2")]
    loss_function: String,

    /// Scale parameter of the robust loss
    #[arg(long, default_value = "1.0")]
    loss_scale: f64,
}

fn parse_linear_solver(name: &str) -> Option<LinearSolverType> {
    match name.to_lowercase().as_str() {
        "dense-cholesky" | "cholesky" => Some(LinearSolverType::DenseCholesky),
        "dense-lu" | "lu" => Some(LinearSolverType::DenseLu),
        "sparse-cholesky" | "sparse" => Some(LinearSolverType::SparseCholesky),
        _ => None,
    }
}

fn create_loss(name: &str, scale: f64) -> Result<Option<Box<dyn LossFunction>>, String> {
    match name.to_lowercase().as_str() {
        "l2" | "none" => Ok(None),
        "huber" => HuberLoss::new(scale)
            .map(|loss| Some(Box::new(loss) as Box<dyn LossFunction>))
            .map_err(|e| e.to_string()),
        "cauchy" => CauchyLoss::new(scale)
            .map(|loss| Some(Box::new(loss) as Box<dyn LossFunction>))
            .map_err(|e| e.to_string()),
        other => Err(format!("unknown loss function '{other}'")),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();
    let args = Args::parse();

    let Some(linear_solver) = parse_linear_solver(&args.linear_solver) else {
        error!("Unknown linear solver '{}'", args.linear_solver);
        return Err(format!("unknown linear solver '{}'", args.linear_solver).into());
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let noise = Normal::new(0.0, args.sigma)?;

    let mut problem = Problem::new();
    let abc = problem.create_variable(ManifoldType::RN, DVector::zeros(3))?;

    let truth = DVector::from_vec(vec![args.a, args.b, args.c]);
    for i in 0..args.samples {
        let x = i as f64 / args.samples as f64;
        let y = CurveFittingFactor::new(x, 0.0).model(&truth) + noise.sample(&mut rng);

        let id = problem.next_constraint_id();
        let mut constraint = Constraint::new(id, vec![abc], Box::new(CurveFittingFactor::new(x, y)));
        if let Some(loss) = create_loss(&args.loss_function, args.loss_scale)? {
            constraint = constraint.with_loss(loss);
        }
        problem.try_add_constraint(constraint)?;
    }

    info!(
        "Curve fitting: {} samples, sigma {}, truth a={} b={} c={}",
        args.samples, args.sigma, args.a, args.b, args.c
    );

    let config = LevenbergMarquardtConfig::new()
        .with_max_iterations(args.max_iterations)
        .with_linear_solver_type(linear_solver);
    let recorder = CostRecorder::new();
    let mut solver = LevenbergMarquardt::with_config(config);
    solver.add_observer(recorder.clone());

    let summary = match solver.optimize(&mut problem) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Optimization failed:\n{}", e.chain());
            return Err(e.into());
        }
    };

    for step in recorder.steps() {
        info!(
            "iteration {:>3}: cost {:.6e}, lambda {:.3e}",
            step.iteration, step.cost, step.damping
        );
    }
    info!("\n{}", summary);

    if let Some(estimate) = problem.variable(abc) {
        let value = estimate.value();
        info!(
            "Estimated a={:.6} b={:.6} c={:.6}",
            value[0], value[1], value[2]
        );
    }
    Ok(())
}
