//! Observer pattern for optimization monitoring.
//!
//! Observers are registered with the optimizer and notified after every outer
//! iteration with the current Variable values. They keep monitoring code (plots,
//! CSV dumps, metrics) out of the solver loop.
//!
//! ```text
//! ┌─────────────────────┐
//! │ LevenbergMarquardt  │
//! └──────────┬──────────┘
//!            │ observers.notify(variables, iteration)
//!            ├─────────────────┐
//!            ▼                 ▼
//!    ┌──────────────┐  ┌──────────────┐
//!    │ CostRecorder │  │    Custom    │
//!    └──────────────┘  └──────────────┘
//! ```
//!
//! # Custom Observer
//!
//! ```no_run
//! use slam_backend::observers::OptObserver;
//! use slam_backend::core::{id::VariableId, variable::Variable};
//! use std::collections::BTreeMap;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct StepCounter {
//!     steps: AtomicUsize,
//! }
//!
//! impl OptObserver for StepCounter {
//!     fn on_step(&self, _variables: &BTreeMap<VariableId, Variable>, _iteration: usize) {
//!         self.steps.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```

use crate::core::{id::VariableId, variable::Variable};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Observer trait for monitoring optimization progress.
///
/// Observers receive immutable views of the optimization state. Use interior
/// mutability (`Mutex`, atomics) to record anything.
pub trait OptObserver: Send {
    /// Called after each outer iteration.
    ///
    /// # Arguments
    ///
    /// * `variables` - Current Variable values, in id order
    /// * `iteration` - Iteration number (1 = after the first iteration)
    fn on_step(&self, variables: &BTreeMap<VariableId, Variable>, iteration: usize);

    /// Called before `on_step` with the metrics of the iteration.
    ///
    /// The default implementation does nothing.
    fn set_iteration_metrics(&self, _cost: f64, _damping: f64, _step_norm: f64, _rho: f64) {}
}

/// Collection of observers, notified in registration order.
#[derive(Default)]
pub struct OptObserverVec {
    observers: Vec<Box<dyn OptObserver>>,
}

impl OptObserverVec {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    pub fn add(&mut self, observer: impl OptObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn set_iteration_metrics(&self, cost: f64, damping: f64, step_norm: f64, rho: f64) {
        for observer in &self.observers {
            observer.set_iteration_metrics(cost, damping, step_norm, rho);
        }
    }

    pub fn notify(&self, variables: &BTreeMap<VariableId, Variable>, iteration: usize) {
        for observer in &self.observers {
            observer.on_step(variables, iteration);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }
}

/// One recorded iteration of a [`CostRecorder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordedStep {
    pub iteration: usize,
    pub cost: f64,
    pub damping: f64,
}

/// Observer that keeps the cost and damping of every iteration.
///
/// Clones share the same record, so keep one clone and hand the other to the solver.
#[derive(Debug, Clone, Default)]
pub struct CostRecorder {
    pending: Arc<Mutex<Option<(f64, f64)>>>,
    steps: Arc<Mutex<Vec<RecordedStep>>>,
}

impl CostRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded iterations.
    pub fn steps(&self) -> Vec<RecordedStep> {
        match self.steps.lock() {
            Ok(steps) => steps.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OptObserver for CostRecorder {
    fn on_step(&self, _variables: &BTreeMap<VariableId, Variable>, iteration: usize) {
        let metrics = match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(_) => None,
        };
        let Some((cost, damping)) = metrics else {
            warn!("CostRecorder notified without metrics at iteration {iteration}");
            return;
        };
        match self.steps.lock() {
            Ok(mut steps) => steps.push(RecordedStep {
                iteration,
                cost,
                damping,
            }),
            Err(e) => warn!("CostRecorder lock poisoned: {e}"),
        }
    }

    fn set_iteration_metrics(&self, cost: f64, damping: f64, _step_norm: f64, _rho: f64) {
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some((cost, damping));
        }
    }
}
