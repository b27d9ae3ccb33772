//! Command handlers.
//!
//! Plan generation, step execution and task work run on the manager's
//! worker pool inside this process, so every command that starts work waits
//! for it to settle before returning. Ctrl-C while waiting cancels the plan
//! or task being waited on.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use cadence_core::{
    params::{ExecutePlan, Id, ListPlans, ListTasks, ShowHistory},
    HistoryEntries, OperationStatus, Plan, PlanManager, PlanStatus, Plans, Task, TaskStatus,
    Tasks,
};
use log::{debug, info};
use tokio::{signal, time};

use crate::{
    adapters::command_result,
    args::{
        CreatePlanArgs, HistoryArgs, ListPlansArgs, ListTasksArgs, PlanCommands, RunTaskArgs,
        TaskCommands,
    },
    renderer::TerminalRenderer,
};

pub struct Cli {
    manager: PlanManager,
    renderer: TerminalRenderer,
    poll_interval: Duration,
}

impl Cli {
    pub fn new(manager: PlanManager, renderer: TerminalRenderer, poll_interval: Duration) -> Self {
        Self {
            manager,
            renderer,
            poll_interval,
        }
    }

    pub async fn handle_plan_command(&self, command: PlanCommands) -> Result<()> {
        match command {
            PlanCommands::Create(args) => {
                let plan = self.create_plan(args).await?;
                self.renderer.render(&plan);
                ensure_not_failed(&plan)
            }
            PlanCommands::Execute(args) => {
                let plan = self.manager.execute_plan(&args.into()).await?;
                let plan = self.wait_for_plan(&plan.id, |p| p.status.is_terminal()).await?;
                self.renderer.render(&plan);
                ensure_not_failed(&plan)
            }
            PlanCommands::Run(args) => {
                let user_id = args.user.clone();
                let plan = self.create_plan(args).await?;
                if plan.status != PlanStatus::Ready {
                    self.renderer.render(&plan);
                    return ensure_not_failed(&plan);
                }
                let params = ExecutePlan {
                    plan_id: plan.id,
                    user_id,
                };
                let plan = self.manager.execute_plan(&params).await?;
                let plan = self.wait_for_plan(&plan.id, |p| p.status.is_terminal()).await?;
                self.renderer.render(&plan);
                ensure_not_failed(&plan)
            }
            PlanCommands::Show(args) => {
                let id = args.id.clone();
                let plan = self
                    .manager
                    .get_plan(&args.into())
                    .await?
                    .with_context(|| format!("Plan {id} not found"))?;
                self.renderer.render(&plan);
                Ok(())
            }
            PlanCommands::List(args) => self.list_plans(&args).await,
            PlanCommands::Cancel(args) => {
                let id = args.id.clone();
                let status = if self.manager.cancel_plan(&args.into()).await? {
                    OperationStatus::success(format!("Cancelled plan {id}"))
                } else {
                    OperationStatus::failure(format!(
                        "Plan {id} does not exist or has already finished"
                    ))
                };
                self.renderer.render(&status);
                Ok(())
            }
            PlanCommands::Retry(args) => {
                let plan_id = args.plan_id.clone();
                let step_id = args.step_id.clone();
                if !self.manager.retry_failed_step(&args.into()).await? {
                    bail!("Plan {plan_id} has no step {step_id}");
                }
                let plan = self.wait_for_plan(&plan_id, |p| p.status.is_terminal()).await?;
                self.renderer.render(&plan);
                ensure_not_failed(&plan)
            }
            PlanCommands::History(args) => self.show_plan_history(args).await,
        }
    }

    pub async fn handle_task_command(&self, command: TaskCommands) -> Result<()> {
        match command {
            TaskCommands::Run(args) => self.run_task(args).await,
            TaskCommands::Show(args) => {
                let id = args.id.clone();
                let task = self
                    .manager
                    .get_task(&args.into())
                    .await?
                    .with_context(|| format!("Task {id} not found"))?;
                self.renderer.render(&task);
                Ok(())
            }
            TaskCommands::List(args) => self.list_tasks(args).await,
            TaskCommands::Cancel(args) => {
                let id = args.id.clone();
                let status = if self.manager.cancel_task(&args.into()).await? {
                    OperationStatus::success(format!("Cancelled task {id}"))
                } else {
                    OperationStatus::failure(format!(
                        "Task {id} does not exist or has already finished"
                    ))
                };
                self.renderer.render(&status);
                Ok(())
            }
            TaskCommands::History(args) => {
                let entries = self.manager.get_task_history(&args.into()).await?;
                self.renderer.render(HistoryEntries(entries));
                Ok(())
            }
        }
    }

    /// Default view: plans that have not finished.
    pub async fn list_active_plans(&self) -> Result<()> {
        let plans = Plans(self.manager.get_active_plans().await?);
        self.renderer.render(plans.summary());
        Ok(())
    }

    async fn create_plan(&self, args: CreatePlanArgs) -> Result<Plan> {
        let plan = self
            .manager
            .create_plan(&args.into())
            .await
            .context("Failed to create plan")?;
        info!("Created plan {}, waiting for its steps", plan.id);
        self.wait_for_plan(&plan.id, |p| p.status != PlanStatus::Planning)
            .await
    }

    async fn list_plans(&self, args: &ListPlansArgs) -> Result<()> {
        let plans = if args.active {
            self.manager.get_active_plans().await?
        } else {
            self.manager.get_plans(&ListPlans::from(args)).await?
        };
        let plans = Plans(plans);
        if args.full {
            self.renderer.render(&plans);
        } else {
            self.renderer.render(plans.summary());
        }
        Ok(())
    }

    async fn show_plan_history(&self, args: HistoryArgs) -> Result<()> {
        let params = ShowHistory::from(args);
        // unknown plans are an error rather than an empty trail
        if self.manager.get_plan(&Id::from(params.id.as_str())).await?.is_none() {
            bail!("Plan {} not found", params.id);
        }
        let entries = self.manager.get_plan_history(&params).await?;
        self.renderer.render(HistoryEntries(entries));
        Ok(())
    }

    async fn run_task(&self, args: RunTaskArgs) -> Result<()> {
        let task = self
            .manager
            .create_task(&(&args).into())
            .await
            .context("Failed to create task")?;

        let command = args.command;
        let task_id = task.id.clone();
        let work = Box::new(move || {
            command_result(&command, &[("CADENCE_TASK_ID", task_id.as_str())], "")
        });
        self.manager
            .submit_task(&Id::from(task.id.as_str()), work)
            .await
            .context("Failed to submit task")?;

        let task = self.wait_for_task(&task.id).await?;
        self.renderer.render(&task);
        if task.status == TaskStatus::Failed {
            bail!(
                "Task {} failed: {}",
                task.id,
                task.error.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }

    async fn list_tasks(&self, args: ListTasksArgs) -> Result<()> {
        let tasks = self.manager.get_tasks(&ListTasks::from(args)).await?;
        self.renderer.render(Tasks(tasks));
        Ok(())
    }

    /// Polls a plan until `settled` holds. Ctrl-C cancels the plan.
    async fn wait_for_plan(&self, plan_id: &str, settled: impl Fn(&Plan) -> bool) -> Result<Plan> {
        let id = Id::from(plan_id);
        loop {
            let plan = self
                .manager
                .get_plan(&id)
                .await?
                .with_context(|| format!("Plan {plan_id} not found"))?;
            if settled(&plan) {
                return Ok(plan);
            }
            debug!("Plan {plan_id} is {}, waiting", plan.status);

            tokio::select! {
                _ = time::sleep(self.poll_interval) => {}
                _ = signal::ctrl_c() => {
                    info!("Interrupted, cancelling plan {plan_id}");
                    self.manager.cancel_plan(&id).await?;
                }
            }
        }
    }

    /// Polls a task until it reaches a terminal status. Ctrl-C cancels it.
    async fn wait_for_task(&self, task_id: &str) -> Result<Task> {
        let id = Id::from(task_id);
        loop {
            let task = self
                .manager
                .get_task(&id)
                .await?
                .with_context(|| format!("Task {task_id} not found"))?;
            if task.status.is_terminal() {
                return Ok(task);
            }
            debug!("Task {task_id} is {}, waiting", task.status);

            tokio::select! {
                _ = time::sleep(self.poll_interval) => {}
                _ = signal::ctrl_c() => {
                    info!("Interrupted, cancelling task {task_id}");
                    self.manager.cancel_task(&id).await?;
                }
            }
        }
    }
}

/// Failed plans are printed like any other, then reported through the exit
/// status.
fn ensure_not_failed(plan: &Plan) -> Result<()> {
    if plan.status == PlanStatus::Failed {
        bail!(
            "Plan {} failed: {}",
            plan.id,
            plan.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
