//! Sequential step execution.
//!
//! `advance_locked` is the only place a step is handed to the executor. It
//! runs with the plan lock held, either from an operator call (execute,
//! retry) or from the completion callback of the previous step, which is what
//! moves a plan forward without a thread waiting on it.

use std::sync::Arc;

use log::{debug, error, info, warn};
use serde_json::Value;

use super::{
    plan_ops::{plan_entry, step_entry},
    Engine,
};
use crate::{
    error::Result,
    events::EventKind,
    executor::{WorkId, WorkOutcome},
    models::{HistoryAction, Metadata, Plan, PlanStatus, StepStatus},
};

/// Key under which a non-object step result is stored.
const OUTPUT_KEY: &str = "output";

impl Engine {
    /// Single completion callback for every unit of work this engine submits.
    ///
    /// Errors cannot travel past the executor, so they end here in the log.
    pub(crate) fn on_work_complete(self: &Arc<Self>, outcome: WorkOutcome) {
        let work_id = outcome.task_id().to_string();
        let result = match WorkId::parse(&work_id) {
            Some(WorkId::Generate { plan_id }) => self.on_generation_complete(&plan_id, outcome),
            Some(WorkId::Step { plan_id, step_id }) => {
                self.on_step_complete(&plan_id, &step_id, outcome)
            }
            Some(WorkId::Task { task_id }) => self.on_task_complete(&task_id, outcome),
            None => {
                warn!("Dropping completion for unrecognized unit of work {work_id}");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Failed to record completion of {work_id}: {e}");
        }
    }

    /// Submits the step at `current_step_index`, or completes the plan once
    /// every step has been walked past. The caller holds the plan lock and
    /// passes the plan as just read from the store.
    pub(crate) fn advance_locked(self: &Arc<Self>, mut plan: Plan) -> Result<Plan> {
        if plan.status != PlanStatus::Executing {
            debug!("Not advancing plan {}: plan is {}", plan.id, plan.status);
            return Ok(plan);
        }

        if plan.all_steps_done() {
            plan.complete()?;
            let details = format!("Plan completed after {} steps", plan.steps.len());
            self.commit_plan(
                &plan,
                vec![plan_entry(&plan, HistoryAction::StatusChange, details)],
                Some(EventKind::PlanCompleted),
            )?;
            info!("Plan {} completed", plan.id);
            return Ok(plan);
        }

        let plan_id = plan.id.clone();
        let Some(step) = plan.current_step_mut() else {
            // executing plans always carry an index; treat a missing one as the start
            plan.current_step_index = Some(0);
            return self.advance_locked(plan);
        };
        step.start()?;
        let step_snapshot = step.clone();
        plan.touch();

        self.commit_plan(
            &plan,
            vec![step_entry(
                &plan_id,
                &step_snapshot.id,
                HistoryAction::Execute,
                format!("Step {} started", step_snapshot.name),
            )],
            None,
        )?;
        debug!("Submitting step {} of plan {plan_id}", step_snapshot.id);

        let runner = Arc::clone(&self.runner);
        let plan_snapshot = plan.clone();
        let engine = Arc::clone(self);
        let work_id = WorkId::Step {
            plan_id: plan_id.clone(),
            step_id: step_snapshot.id.clone(),
        };
        let submitted = self.executor.submit(
            work_id.to_string(),
            Box::new(move || runner.run_step(&plan_snapshot, &step_snapshot)),
            Box::new(move |outcome| engine.on_work_complete(outcome)),
        );

        if let Err(e) = submitted {
            self.fail_current_step(&mut plan, &format!("could not be scheduled: {e}"))?;
            return Err(e);
        }
        Ok(plan)
    }

    fn on_step_complete(
        self: &Arc<Self>,
        plan_id: &str,
        step_id: &str,
        outcome: WorkOutcome,
    ) -> Result<()> {
        self.with_lock(plan_id, || {
            let Some(mut plan) = self.store.get_plan(plan_id)? else {
                warn!("Step {step_id} finished for unknown plan {plan_id}");
                return Ok(());
            };
            if plan.status != PlanStatus::Executing {
                debug!(
                    "Ignoring result of step {step_id}: plan {plan_id} is {}",
                    plan.status
                );
                return Ok(());
            }
            let is_current = plan
                .current_step()
                .is_some_and(|step| step.id == step_id && step.status == StepStatus::Running);
            if !is_current {
                debug!("Ignoring stale result of step {step_id} in plan {plan_id}");
                return Ok(());
            }

            match outcome {
                WorkOutcome::Succeeded {
                    result, elapsed, ..
                } => {
                    if let Some(step) = plan.current_step_mut() {
                        step.complete(into_metadata(result))?;
                    }
                    plan.current_step_index = plan.current_step_index.map(|index| index + 1);
                    plan.touch();

                    let entry = step_entry(
                        plan_id,
                        step_id,
                        HistoryAction::StatusChange,
                        format!("Step succeeded in {}ms", elapsed.as_millis()),
                    );
                    self.commit_plan(&plan, vec![entry], None)?;
                    debug!("Step {step_id} of plan {plan_id} succeeded");

                    self.advance_locked(plan).map(|_| ())
                }
                WorkOutcome::Failed { error, .. } => self.fail_current_step(&mut plan, &error),
            }
        })
    }

    /// Marks the current step and the plan failed. Nothing runs afterwards
    /// until an explicit retry.
    fn fail_current_step(&self, plan: &mut Plan, error: &str) -> Result<()> {
        let plan_id = plan.id.clone();
        let mut entries = Vec::new();
        let mut message = format!("Plan failed: {error}");

        if let Some(step) = plan.current_step_mut() {
            if step.status == StepStatus::Running {
                step.fail(error)?;
            }
            message = format!("Step {} ({}) failed: {error}", step.id, step.name);
            entries.push(step_entry(
                &plan_id,
                &step.id,
                HistoryAction::Error,
                error.to_string(),
            ));
        }
        plan.fail(message.clone())?;
        entries.push(plan_entry(plan, HistoryAction::Error, message));

        self.commit_plan(plan, entries, Some(EventKind::PlanFailed))?;
        info!("Plan {plan_id} failed");
        Ok(())
    }
}

/// Step results are maps; anything else is wrapped under `output`.
fn into_metadata(result: Value) -> Metadata {
    match result {
        Value::Object(map) => map,
        Value::Null => Metadata::new(),
        other => {
            let mut map = Metadata::new();
            map.insert(OUTPUT_KEY.to_string(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_into_metadata() {
        assert_eq!(into_metadata(json!({"a": 1}))["a"], json!(1));
        assert!(into_metadata(Value::Null).is_empty());
        assert_eq!(into_metadata(json!("done"))[OUTPUT_KEY], json!("done"));
    }
}
