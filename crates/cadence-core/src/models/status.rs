//! Status enumerations for plans, steps and tasks.
//!
//! Each enum knows its own legal transition graph. Model methods consult
//! `can_transition_to` before mutating, so a terminal status is never moved
//! backward by accident.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Plan record exists but generation has not been requested yet
    #[default]
    Created,

    /// Model router is generating the steps
    Planning,

    /// Steps are populated, waiting for execution
    Ready,

    /// Steps are being executed one at a time
    Executing,

    /// Every step reached a terminal status
    Completed,

    /// Generation or a step failed
    Failed,

    /// Cancelled by an operator
    Cancelled,
}

impl PlanStatus {
    /// Statuses that count as "active" for queries.
    pub const ACTIVE: [PlanStatus; 3] = [
        PlanStatus::Planning,
        PlanStatus::Ready,
        PlanStatus::Executing,
    ];

    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Created => "created",
            PlanStatus::Planning => "planning",
            PlanStatus::Ready => "ready",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStatus::Completed | PlanStatus::Failed | PlanStatus::Cancelled
        )
    }

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    /// Whether `next` is a legal successor of this status.
    ///
    /// `Failed -> Executing` is only reached through an explicit step retry.
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        use PlanStatus::*;

        match (self, next) {
            (Created, Planning) => true,
            (Planning, Ready) => true,
            (Ready, Executing) => true,
            (Executing, Completed) => true,
            (Failed, Executing) => true,
            (Created | Planning | Executing, Failed) => true,
            (Created | Planning | Ready | Executing, Cancelled) => true,
            _ => false,
        }
    }
}

impl FromStr for PlanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(PlanStatus::Created),
            "planning" => Ok(PlanStatus::Planning),
            "ready" => Ok(PlanStatus::Ready),
            "executing" => Ok(PlanStatus::Executing),
            "completed" => Ok(PlanStatus::Completed),
            "failed" => Ok(PlanStatus::Failed),
            "cancelled" | "canceled" => Ok(PlanStatus::Cancelled),
            _ => Err(format!("Invalid plan status: {s}")),
        }
    }
}

/// Execution status of a single plan step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step has not been reached yet
    #[default]
    Pending,

    /// Step's unit of work is in flight
    Running,

    /// Step finished successfully
    Succeeded,

    /// Step's unit of work reported an error
    Failed,

    /// Step was abandoned, e.g. by plan cancellation
    Skipped,
}

impl StepStatus {
    /// Convert to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Succeeded => "succeeded",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Succeeded | StepStatus::Failed | StepStatus::Skipped
        )
    }

    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        use StepStatus::*;

        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Succeeded)
                | (Running, Failed)
                | (Pending | Running, Skipped)
        )
    }

    /// Get status with consistent icon formatting for display.
    ///
    /// ```rust
    /// use cadence_core::models::StepStatus;
    ///
    /// assert_eq!(StepStatus::Succeeded.with_icon(), "✓ Succeeded");
    /// assert_eq!(StepStatus::Running.with_icon(), "➤ Running");
    /// assert_eq!(StepStatus::Pending.with_icon(), "○ Pending");
    /// ```
    pub fn with_icon(&self) -> &'static str {
        match self {
            StepStatus::Pending => "○ Pending",
            StepStatus::Running => "➤ Running",
            StepStatus::Succeeded => "✓ Succeeded",
            StepStatus::Failed => "✗ Failed",
            StepStatus::Skipped => "– Skipped",
        }
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "succeeded" => Ok(StepStatus::Succeeded),
            "failed" => Ok(StepStatus::Failed),
            "skipped" => Ok(StepStatus::Skipped),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

/// Lifecycle status of a standalone task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Created,
    /// Queued on the executor but not started
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const ACTIVE: [TaskStatus; 3] = [
        TaskStatus::Created,
        TaskStatus::Pending,
        TaskStatus::Running,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;

        match (self, next) {
            (Created, Pending) => true,
            (Created | Pending, Running) => true,
            (Running, Succeeded) => true,
            // a pending task can fail without ever running, e.g. rejected work
            (Pending | Running, Failed) => true,
            (Created | Pending | Running, Cancelled) => true,
            _ => false,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(TaskStatus::Created),
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}
