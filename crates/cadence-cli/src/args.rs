//! Command-line argument definitions using clap
//!
//! Each subcommand has its own clap argument struct that converts into the
//! matching `cadence_core::params` type, keeping clap derives out of the core:
//!
//! ```text
//! User Input → CLI Args (clap) → Core Params → PlanManager
//! ```

use std::path::PathBuf;

use cadence_core::{
    params::{CreatePlan, CreateTask, ExecutePlan, Id, ListPlans, ListTasks, RetryStep, ShowHistory},
    PlanStatus, TaskStatus,
};
use clap::{Args as ClapArgs, Parser, Subcommand};

/// Plan and task orchestration from the command line
///
/// Cadence asks a model router to break a goal into steps, then runs the
/// steps one by one, recording every transition in a SQLite database. The
/// router and the step runner are external commands run through `sh -c`.
#[derive(Parser)]
#[command(version, about, name = "cadence")]
pub struct Args {
    /// Path to the SQLite database file. Defaults to
    /// $XDG_DATA_HOME/cadence/cadence.db
    #[arg(long, global = true, env = "CADENCE_DATABASE")]
    pub database_file: Option<PathBuf>,

    /// Maximum number of units of work running at once
    #[arg(long, global = true, env = "CADENCE_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Command that prints the steps for a goal read from stdin
    #[arg(long, global = true, env = "CADENCE_ROUTER_COMMAND")]
    pub router_command: Option<String>,

    /// Command run for every plan step, with the step in CADENCE_* variables
    #[arg(long, global = true, env = "CADENCE_STEP_COMMAND")]
    pub step_command: Option<String>,

    /// How often waiting commands check on a plan or task, in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Disable colored output and use plain text
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Without a subcommand the active plans are listed.
#[derive(Subcommand)]
pub enum Commands {
    /// Manage plans
    #[command(alias = "p")]
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Run and inspect standalone tasks
    #[command(alias = "t")]
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Create a plan and wait until its steps are generated
    #[command(alias = "c")]
    Create(CreatePlanArgs),
    /// Execute a ready plan and wait until it finishes
    #[command(alias = "x")]
    Execute(ExecutePlanArgs),
    /// Create a plan, then execute it as soon as it is ready
    #[command(alias = "r")]
    Run(CreatePlanArgs),
    /// Show a plan with its steps
    #[command(alias = "s")]
    Show(PlanIdArgs),
    /// List plans, newest first
    #[command(aliases = ["l", "ls"])]
    List(ListPlansArgs),
    /// Cancel a plan that has not finished
    Cancel(PlanIdArgs),
    /// Resume a failed plan at the given step and wait until it finishes
    Retry(RetryStepArgs),
    /// Show the audit trail of a plan and its steps
    #[command(alias = "h")]
    History(HistoryArgs),
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task, run its command and wait for the result
    #[command(alias = "r")]
    Run(RunTaskArgs),
    /// Show a task
    #[command(alias = "s")]
    Show(TaskIdArgs),
    /// List tasks, newest first
    #[command(aliases = ["l", "ls"])]
    List(ListTasksArgs),
    /// Cancel a task that has not finished
    Cancel(TaskIdArgs),
    /// Show the audit trail of a task
    #[command(alias = "h")]
    History(HistoryArgs),
}

#[derive(ClapArgs)]
pub struct CreatePlanArgs {
    /// Goal to break down into steps
    pub goal: String,
    /// User on whose behalf the plan runs
    #[arg(short, long)]
    pub user: Option<String>,
}

impl From<CreatePlanArgs> for CreatePlan {
    fn from(val: CreatePlanArgs) -> Self {
        CreatePlan {
            goal: val.goal,
            user_id: val.user,
        }
    }
}

#[derive(ClapArgs)]
pub struct ExecutePlanArgs {
    #[arg(help = "Identifier of the ready plan to execute")]
    pub id: String,
    /// User starting the execution
    #[arg(short, long)]
    pub user: Option<String>,
}

impl From<ExecutePlanArgs> for ExecutePlan {
    fn from(val: ExecutePlanArgs) -> Self {
        ExecutePlan {
            plan_id: val.id,
            user_id: val.user,
        }
    }
}

#[derive(ClapArgs)]
pub struct PlanIdArgs {
    #[arg(help = "Identifier of the plan")]
    pub id: String,
}

impl From<PlanIdArgs> for Id {
    fn from(val: PlanIdArgs) -> Self {
        Id { id: val.id }
    }
}

/// List plans
///
/// Shows one line per plan by default. `--active` restricts the list to
/// plans that are planning, ready or executing.
#[derive(ClapArgs)]
pub struct ListPlansArgs {
    /// Only plans in this status (created, planning, ready, executing,
    /// completed, failed, cancelled)
    #[arg(short, long)]
    pub status: Option<PlanStatus>,
    /// Only plans that have not finished
    #[arg(long, conflicts_with = "status")]
    pub active: bool,
    /// Maximum number of plans to show
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Number of plans to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
    /// Show every plan with its steps instead of one line per plan
    #[arg(long)]
    pub full: bool,
}

impl From<&ListPlansArgs> for ListPlans {
    fn from(val: &ListPlansArgs) -> Self {
        ListPlans {
            status: val.status,
            limit: val.limit,
            skip: val.skip,
        }
    }
}

#[derive(ClapArgs)]
pub struct RetryStepArgs {
    #[arg(help = "Identifier of the failed plan")]
    pub plan_id: String,
    #[arg(help = "Identifier of the step to resume from")]
    pub step_id: String,
}

impl From<RetryStepArgs> for RetryStep {
    fn from(val: RetryStepArgs) -> Self {
        RetryStep {
            plan_id: val.plan_id,
            step_id: val.step_id,
        }
    }
}

#[derive(ClapArgs)]
pub struct HistoryArgs {
    #[arg(help = "Identifier of the plan or task")]
    pub id: String,
    /// Maximum number of entries to show
    #[arg(short, long)]
    pub limit: Option<usize>,
}

impl From<HistoryArgs> for ShowHistory {
    fn from(val: HistoryArgs) -> Self {
        ShowHistory {
            id: val.id,
            limit: val.limit,
        }
    }
}

/// Run a standalone task
///
/// The command runs through `sh -c` on a worker; a zero exit status
/// succeeds with the command's stdout as the result.
#[derive(ClapArgs)]
pub struct RunTaskArgs {
    /// What the task does
    pub description: String,
    /// Shell command to run
    #[arg(short, long)]
    pub command: String,
    /// Plan the task belongs to
    #[arg(long)]
    pub plan: Option<String>,
    /// Step of that plan the task belongs to
    #[arg(long, requires = "plan")]
    pub step: Option<String>,
    /// Environment the task runs in
    #[arg(long)]
    pub environment: Option<String>,
    /// User on whose behalf the task runs
    #[arg(short, long)]
    pub user: Option<String>,
}

impl From<&RunTaskArgs> for CreateTask {
    fn from(val: &RunTaskArgs) -> Self {
        CreateTask {
            description: val.description.clone(),
            plan_id: val.plan.clone(),
            step_id: val.step.clone(),
            environment_id: val.environment.clone(),
            user_id: val.user.clone(),
            ..Default::default()
        }
    }
}

#[derive(ClapArgs)]
pub struct TaskIdArgs {
    #[arg(help = "Identifier of the task")]
    pub id: String,
}

impl From<TaskIdArgs> for Id {
    fn from(val: TaskIdArgs) -> Self {
        Id { id: val.id }
    }
}

#[derive(ClapArgs)]
pub struct ListTasksArgs {
    /// Only tasks belonging to this plan
    #[arg(long)]
    pub plan: Option<String>,
    /// Only tasks in this status (created, pending, running, succeeded,
    /// failed, cancelled)
    #[arg(short, long)]
    pub status: Option<TaskStatus>,
    /// Maximum number of tasks to show
    #[arg(short, long)]
    pub limit: Option<usize>,
    /// Number of tasks to skip
    #[arg(long, default_value_t = 0)]
    pub skip: usize,
}

impl From<ListTasksArgs> for ListTasks {
    fn from(val: ListTasksArgs) -> Self {
        ListTasks {
            plan_id: val.plan,
            status: val.status,
            limit: val.limit,
            skip: val.skip,
        }
    }
}
