//! Standalone task operations for the PlanManager.

use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use super::{Engine, PlanManager};
use crate::{
    error::{OrchestrationError, Result},
    events::{EventKind, LifecycleEvent},
    executor::{Work, WorkId, WorkOutcome},
    models::{
        history::PLAN_ID_KEY, plan::USER_ID_KEY, EntityType, HistoryAction, HistoryEntry, Task,
        TaskStatus,
    },
    params::{CreateTask, Id},
};

/// Error reported for work that was skipped because its task was cancelled.
const SKIPPED_WORK: &str = "task was cancelled before it started";

impl PlanManager {
    /// Creates a task in `Created` status.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::InvalidInput` for an empty description or
    /// a step id without a plan id, `OrchestrationError::PlanNotFound` if the
    /// referenced plan does not exist.
    pub async fn create_task(&self, params: &CreateTask) -> Result<Task> {
        let params = params.clone();
        self.run_blocking(move |engine| engine.create_task(params))
            .await
    }

    /// Queues a created task's unit of work on the executor.
    ///
    /// The task is `Pending` until a worker picks it up, `Running` while the
    /// work runs, then `Succeeded` or `Failed`.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::TaskNotFound` for an unknown id,
    /// `OrchestrationError::InvalidTaskState` unless the task is `Created`
    /// and `OrchestrationError::Executor` if the executor rejects the work,
    /// in which case the task is stored as `Failed`.
    pub async fn submit_task(&self, params: &Id, work: Work) -> Result<Task> {
        let task_id = params.id.clone();
        self.run_blocking(move |engine| engine.submit_task(&task_id, work))
            .await
    }

    /// Cancels a task that has not reached a terminal status.
    ///
    /// Returns false if the task does not exist or is already terminal. Work
    /// that has already started is not interrupted; its result is ignored.
    pub async fn cancel_task(&self, params: &Id) -> Result<bool> {
        let task_id = params.id.clone();
        self.run_blocking(move |engine| engine.cancel_task(&task_id))
            .await
    }
}

impl Engine {
    fn load_task(&self, task_id: &str) -> Result<Task> {
        self.store
            .get_task(task_id)?
            .ok_or_else(|| OrchestrationError::TaskNotFound {
                id: task_id.to_string(),
            })
    }

    fn commit_task(
        &self,
        task: &Task,
        action: HistoryAction,
        details: String,
        event: Option<EventKind>,
    ) -> Result<()> {
        self.store.save_task(task)?;
        let mut entry = HistoryEntry::new(EntityType::Task, &task.id, action, details);
        if let Some(plan_id) = &task.plan_id {
            entry = entry.with_metadata(PLAN_ID_KEY, plan_id.as_str());
        }
        self.record(entry)?;
        if let Some(kind) = event {
            self.publish(LifecycleEvent::task(kind, task));
        }
        Ok(())
    }

    fn create_task(&self, params: CreateTask) -> Result<Task> {
        let description = params.description.trim();
        if description.is_empty() {
            return Err(OrchestrationError::invalid_input("description")
                .with_reason("must not be empty"));
        }
        if params.step_id.is_some() && params.plan_id.is_none() {
            return Err(OrchestrationError::invalid_input("step_id")
                .with_reason("a step can only be referenced together with its plan"));
        }
        if let Some(plan_id) = &params.plan_id {
            self.load_plan(plan_id)?;
        }

        let mut task = Task::new(description);
        task.plan_id = params.plan_id;
        task.step_id = params.step_id;
        task.environment_id = params.environment_id;
        task.metadata = params.metadata;
        if let Some(user_id) = params.user_id {
            task.metadata
                .insert(USER_ID_KEY.to_string(), Value::String(user_id));
        }

        self.with_lock(&task.id.clone(), || {
            self.commit_task(
                &task,
                HistoryAction::Create,
                format!("Task created: {}", task.description),
                Some(EventKind::TaskCreated),
            )
        })?;
        info!("Created task {}", task.id);
        Ok(task)
    }

    fn submit_task(self: &Arc<Self>, task_id: &str, work: Work) -> Result<Task> {
        self.with_lock(task_id, || {
            let mut task = self.load_task(task_id)?;
            if task.status != TaskStatus::Created {
                return Err(OrchestrationError::InvalidTaskState {
                    id: task.id,
                    status: task.status,
                    operation: "submit",
                });
            }

            task.enqueue()?;
            self.commit_task(
                &task,
                HistoryAction::Execute,
                "Task queued".to_string(),
                None,
            )?;

            let starter = Arc::clone(self);
            let engine = Arc::clone(self);
            let id = task.id.clone();
            let submitted = self.executor.submit(
                WorkId::Task {
                    task_id: task.id.clone(),
                }
                .to_string(),
                Box::new(move || match starter.start_task(&id) {
                    Ok(true) => work(),
                    Ok(false) => Err(SKIPPED_WORK.to_string()),
                    Err(e) => Err(format!("task could not be started: {e}")),
                }),
                Box::new(move |outcome| engine.on_work_complete(outcome)),
            );

            if let Err(e) = submitted {
                task.fail(format!("Task could not be scheduled: {e}"))?;
                self.commit_task(
                    &task,
                    HistoryAction::Error,
                    e.to_string(),
                    Some(EventKind::TaskCompleted),
                )?;
                return Err(e);
            }
            debug!("Submitted task {task_id}");
            Ok(task)
        })
    }

    /// Moves a pending task to `Running` on the worker thread. Returns false
    /// if the task left `Pending` in the meantime, e.g. by cancellation.
    fn start_task(&self, task_id: &str) -> Result<bool> {
        self.with_lock(task_id, || {
            let mut task = self.load_task(task_id)?;
            if task.status != TaskStatus::Pending {
                debug!("Not starting task {task_id}: task is {}", task.status);
                return Ok(false);
            }
            task.start()?;
            self.commit_task(
                &task,
                HistoryAction::StatusChange,
                "Task started".to_string(),
                Some(EventKind::TaskStarted),
            )?;
            Ok(true)
        })
    }

    pub(crate) fn on_task_complete(&self, task_id: &str, outcome: WorkOutcome) -> Result<()> {
        self.with_lock(task_id, || {
            let Some(mut task) = self.store.get_task(task_id)? else {
                debug!("Work finished for unknown task {task_id}");
                return Ok(());
            };
            if task.status != TaskStatus::Running {
                debug!("Ignoring result of task {task_id}: task is {}", task.status);
                return Ok(());
            }

            match outcome {
                WorkOutcome::Succeeded {
                    result, elapsed, ..
                } => {
                    task.complete(result)?;
                    self.commit_task(
                        &task,
                        HistoryAction::StatusChange,
                        format!("Task succeeded in {}ms", elapsed.as_millis()),
                        Some(EventKind::TaskCompleted),
                    )?;
                }
                WorkOutcome::Failed { error, .. } => {
                    task.fail(error.clone())?;
                    self.commit_task(
                        &task,
                        HistoryAction::Error,
                        error,
                        Some(EventKind::TaskCompleted),
                    )?;
                }
            }
            info!("Task {task_id} is {}", task.status);
            Ok(())
        })
    }

    fn cancel_task(&self, task_id: &str) -> Result<bool> {
        self.with_lock(task_id, || {
            let Some(mut task) = self.store.get_task(task_id)? else {
                return Ok(false);
            };
            if task.status.is_terminal() {
                return Ok(false);
            }

            task.cancel()?;
            self.commit_task(
                &task,
                HistoryAction::Cancel,
                "Task cancelled".to_string(),
                Some(EventKind::TaskCompleted),
            )?;
            info!("Cancelled task {task_id}");
            Ok(true)
        })
    }
}
