//! Step runner contract: what a plan step actually does.

use crate::{
    executor::WorkResult,
    models::{Plan, PlanStep},
};

/// Produces the unit of work for a plan step.
///
/// `run_step` is called on an executor worker thread with snapshots of the
/// plan and the step as they were when the step started, and may block.
pub trait StepRunner: Send + Sync {
    fn run_step(&self, plan: &Plan, step: &PlanStep) -> WorkResult;
}

impl<F> StepRunner for F
where
    F: Fn(&Plan, &PlanStep) -> WorkResult + Send + Sync,
{
    fn run_step(&self, plan: &Plan, step: &PlanStep) -> WorkResult {
        self(plan, step)
    }
}
