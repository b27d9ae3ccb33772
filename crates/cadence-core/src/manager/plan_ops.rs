//! Plan operations for the PlanManager.

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::{Engine, PlanManager};
use crate::{
    error::{OrchestrationError, Result},
    events::{EventKind, LifecycleEvent},
    executor::{WorkId, WorkOutcome},
    models::{
        history::PLAN_ID_KEY, plan::USER_ID_KEY, EntityType, HistoryAction, HistoryEntry, Plan,
        PlanStatus, StepStatus,
    },
    params::{CreatePlan, ExecutePlan, Id, RetryStep},
};

impl PlanManager {
    /// Creates a plan for a goal and starts generating its steps.
    ///
    /// The plan is returned in `Planning` status as soon as it is stored.
    /// Step generation runs on the executor; poll [`PlanManager::get_plan`]
    /// or subscribe to the event bus for the `Ready` or `Failed` outcome.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::InvalidInput` for an empty goal and
    /// `OrchestrationError::Executor` if the executor rejects the generation
    /// work, in which case the plan is stored as `Failed`.
    pub async fn create_plan(&self, params: &CreatePlan) -> Result<Plan> {
        let goal = params.goal.trim().to_string();
        let user_id = params.user_id.clone();

        self.run_blocking(move |engine| engine.create_plan(goal, user_id))
            .await
    }

    /// Starts executing a `Ready` plan from its first step.
    ///
    /// Returns the plan with its first step already running.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::PlanNotFound` for an unknown id and
    /// `OrchestrationError::InvalidPlanState` unless the plan is `Ready`.
    pub async fn execute_plan(&self, params: &ExecutePlan) -> Result<Plan> {
        let plan_id = params.plan_id.clone();
        let user_id = params.user_id.clone();

        self.run_blocking(move |engine| engine.execute_plan(&plan_id, user_id.as_deref()))
            .await
    }

    /// Cancels a plan that has not reached a terminal status.
    ///
    /// Returns false if the plan does not exist or is already terminal. A
    /// step already handed to the executor keeps running; its result is
    /// ignored.
    pub async fn cancel_plan(&self, params: &Id) -> Result<bool> {
        let plan_id = params.id.clone();

        self.run_blocking(move |engine| engine.cancel_plan(&plan_id))
            .await
    }

    /// Resumes a failed plan at the given step.
    ///
    /// Accepted steps are the one that failed the plan and any step before
    /// it. The step and every later step that was attempted are reset to
    /// `Pending`; earlier steps keep their result. Returns false if the plan
    /// has no step with that id.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::PlanNotFound` for an unknown id,
    /// `OrchestrationError::InvalidPlanState` unless the plan is `Failed`, and
    /// `OrchestrationError::InvalidInput` for a step after the failed one.
    pub async fn retry_failed_step(&self, params: &RetryStep) -> Result<bool> {
        let plan_id = params.plan_id.clone();
        let step_id = params.step_id.clone();

        self.run_blocking(move |engine| engine.retry_failed_step(&plan_id, &step_id))
            .await
    }
}

impl Engine {
    pub(crate) fn load_plan(&self, plan_id: &str) -> Result<Plan> {
        self.store
            .get_plan(plan_id)?
            .ok_or_else(|| OrchestrationError::PlanNotFound {
                id: plan_id.to_string(),
            })
    }

    /// Stores the plan, then its audit entries, then announces the change.
    pub(crate) fn commit_plan(
        &self,
        plan: &Plan,
        entries: Vec<HistoryEntry>,
        event: Option<EventKind>,
    ) -> Result<()> {
        self.store.save_plan(plan)?;
        for entry in entries {
            self.record(entry)?;
        }
        if let Some(kind) = event {
            self.publish(LifecycleEvent::plan(
                kind,
                &plan.id,
                plan.status,
                plan.user_id(),
            ));
        }
        Ok(())
    }

    fn create_plan(self: &Arc<Self>, goal: String, user_id: Option<String>) -> Result<Plan> {
        if goal.is_empty() {
            return Err(OrchestrationError::invalid_input("goal").with_reason("must not be empty"));
        }

        let mut plan = Plan::new(goal);
        if let Some(user_id) = user_id {
            plan.metadata
                .insert(USER_ID_KEY.to_string(), Value::String(user_id));
        }
        plan.begin_planning()?;

        let plan_id = plan.id.clone();
        self.with_lock(&plan_id, move || {
            self.commit_plan(
                &plan,
                vec![plan_entry(
                    &plan,
                    HistoryAction::Create,
                    format!("Plan created for goal: {}", plan.goal),
                )],
                Some(EventKind::PlanCreated),
            )?;
            info!("Created plan {} for goal {:?}", plan.id, plan.goal);

            let router = Arc::clone(&self.router);
            let goal = plan.goal.clone();
            let engine = Arc::clone(self);
            let submitted = self.executor.submit(
                WorkId::Generate {
                    plan_id: plan.id.clone(),
                }
                .to_string(),
                Box::new(move || {
                    let routed = router
                        .route_plan_creation(&goal)
                        .map_err(|e| e.to_string())?;
                    serde_json::to_value(routed).map_err(|e| e.to_string())
                }),
                Box::new(move |outcome| engine.on_work_complete(outcome)),
            );

            if let Err(e) = submitted {
                plan.fail(format!("Plan generation could not be scheduled: {e}"))?;
                self.commit_plan(
                    &plan,
                    vec![plan_entry(&plan, HistoryAction::Error, e.to_string())],
                    Some(EventKind::PlanFailed),
                )?;
                return Err(e);
            }
            Ok(plan)
        })
    }

    /// Completion of a plan generation unit of work.
    pub(crate) fn on_generation_complete(&self, plan_id: &str, outcome: WorkOutcome) -> Result<()> {
        self.with_lock(plan_id, || {
            let Some(mut plan) = self.store.get_plan(plan_id)? else {
                debug!("Generation finished for unknown plan {plan_id}");
                return Ok(());
            };
            if plan.status != PlanStatus::Planning {
                debug!(
                    "Ignoring generation result for plan {plan_id}: plan is {}",
                    plan.status
                );
                return Ok(());
            }

            let routed = match outcome {
                WorkOutcome::Succeeded {
                    result, elapsed, ..
                } => serde_json::from_value::<crate::router::RoutedPlan>(result)
                    .map(|routed| (routed, elapsed))
                    .map_err(|e| format!("Model router returned malformed steps: {e}")),
                WorkOutcome::Failed { error, .. } => Err(error),
            };

            match routed {
                Ok((routed, elapsed)) => {
                    let provider = routed.provider.clone();
                    plan.mark_ready(routed.into_steps(), provider)?;
                    plan.metadata.insert(
                        crate::models::plan::GENERATION_LATENCY_KEY.to_string(),
                        Value::from(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
                    );
                    let details = format!(
                        "Plan ready with {} steps from {}",
                        plan.steps.len(),
                        plan.provider.as_deref().unwrap_or("unknown provider")
                    );
                    self.commit_plan(
                        &plan,
                        vec![plan_entry(&plan, HistoryAction::StatusChange, details)],
                        Some(EventKind::PlanReady),
                    )?;
                    info!("Plan {plan_id} is ready with {} steps", plan.steps.len());
                }
                Err(error) => {
                    let message = format!("Plan generation failed: {error}");
                    plan.fail(message.clone())?;
                    self.commit_plan(
                        &plan,
                        vec![plan_entry(&plan, HistoryAction::Error, message)],
                        Some(EventKind::PlanFailed),
                    )?;
                    info!("Plan {plan_id} failed during generation");
                }
            }
            Ok(())
        })
    }

    pub(crate) fn execute_plan(
        self: &Arc<Self>,
        plan_id: &str,
        user_id: Option<&str>,
    ) -> Result<Plan> {
        self.with_lock(plan_id, || {
            let mut plan = self.load_plan(plan_id)?;
            if plan.status != PlanStatus::Ready {
                return Err(OrchestrationError::InvalidPlanState {
                    id: plan.id,
                    status: plan.status,
                    operation: "execute",
                });
            }

            plan.start()?;
            let mut entry = plan_entry(
                &plan,
                HistoryAction::Execute,
                format!("Started execution of {} steps", plan.steps.len()),
            );
            if let Some(user_id) = user_id {
                entry = entry.with_metadata(USER_ID_KEY, user_id);
            }
            self.store.save_plan(&plan)?;
            self.record(entry)?;
            let event_user = user_id.or(plan.user_id());
            self.publish(LifecycleEvent::plan(
                EventKind::PlanStarted,
                &plan.id,
                plan.status,
                event_user,
            ));
            info!("Executing plan {plan_id}");

            self.advance_locked(plan)
        })
    }

    pub(crate) fn cancel_plan(&self, plan_id: &str) -> Result<bool> {
        self.with_lock(plan_id, || {
            let Some(mut plan) = self.store.get_plan(plan_id)? else {
                return Ok(false);
            };
            if plan.status.is_terminal() {
                debug!("Plan {plan_id} is already {}, nothing to cancel", plan.status);
                return Ok(false);
            }

            let mut entries = Vec::new();
            if let Some(step) = plan.current_step_mut() {
                if step.status == StepStatus::Running {
                    step.skip()?;
                    entries.push(step_entry(
                        plan_id,
                        &step.id,
                        HistoryAction::Cancel,
                        format!("Step {} skipped by plan cancellation", step.name),
                    ));
                }
            }
            plan.cancel()?;
            entries.insert(
                0,
                plan_entry(&plan, HistoryAction::Cancel, "Plan cancelled".to_string()),
            );

            self.commit_plan(&plan, entries, Some(EventKind::PlanCancelled))?;
            info!("Cancelled plan {plan_id}");
            Ok(true)
        })
    }

    pub(crate) fn retry_failed_step(self: &Arc<Self>, plan_id: &str, step_id: &str) -> Result<bool> {
        self.with_lock(plan_id, || {
            let mut plan = self.load_plan(plan_id)?;
            if plan.status != PlanStatus::Failed {
                return Err(OrchestrationError::InvalidPlanState {
                    id: plan.id,
                    status: plan.status,
                    operation: "retry",
                });
            }
            let Some(position) = plan.step_position(step_id) else {
                return Ok(false);
            };
            // resuming past the failed step would complete the plan over it
            if plan
                .failed_step_position()
                .map_or(true, |failed| position > failed)
            {
                return Err(OrchestrationError::invalid_input("step_id").with_reason(format!(
                    "step {step_id} comes after the step that failed plan {plan_id}"
                )));
            }

            for step in plan.steps.iter_mut().skip(position) {
                if step.status != StepStatus::Pending {
                    step.reset();
                }
            }
            plan.reopen_at(position)?;

            self.store.save_plan(&plan)?;
            self.record(plan_entry(
                &plan,
                HistoryAction::Retry,
                format!("Retrying from step {step_id}"),
            ))?;
            self.record(step_entry(
                plan_id,
                step_id,
                HistoryAction::Retry,
                "Step reset to pending".to_string(),
            ))?;
            self.publish(
                LifecycleEvent::plan(EventKind::PlanStarted, &plan.id, plan.status, plan.user_id())
                    .with_step(step_id),
            );
            info!("Retrying plan {plan_id} from step {step_id}");

            self.advance_locked(plan)?;
            Ok(true)
        })
    }
}

pub(super) fn plan_entry(plan: &Plan, action: HistoryAction, details: String) -> HistoryEntry {
    HistoryEntry::new(EntityType::Plan, &plan.id, action, details)
}

/// Step entries carry their plan so the plan's history includes them.
pub(super) fn step_entry(
    plan_id: &str,
    step_id: &str,
    action: HistoryAction,
    details: String,
) -> HistoryEntry {
    HistoryEntry::new(EntityType::Step, step_id, action, details).with_metadata(PLAN_ID_KEY, plan_id)
}
