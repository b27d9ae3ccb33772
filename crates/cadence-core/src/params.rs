//! Parameter structures for orchestration operations
//!
//! These structures are shared by every front end (the CLI, an HTTP layer,
//! tests) and carry no framework-specific derives. Interface layers wrap them
//! with their own argument types and convert with `From`/`Into`:
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   CLI Args      │    │  Core Params    │    │  PlanManager    │
//! │  (clap derives) │───▶│ (minimal deps)  │───▶│   operations    │
//! └─────────────────┘    └─────────────────┘    └─────────────────┘
//! ```

use crate::models::{Metadata, PlanStatus, TaskStatus};

/// Parameters for creating a new plan from a goal
#[derive(Debug, Clone)]
pub struct CreatePlan {
    /// Goal the model router decomposes into steps
    pub goal: String,
    /// User on whose behalf the plan is created
    pub user_id: Option<String>,
}

/// Parameters for starting execution of a ready plan
#[derive(Debug, Clone)]
pub struct ExecutePlan {
    pub plan_id: String,
    pub user_id: Option<String>,
}

/// Simple ID parameter for operations on a single plan or task
#[derive(Debug, Clone)]
pub struct Id {
    pub id: String,
}

impl From<&str> for Id {
    fn from(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl From<String> for Id {
    fn from(id: String) -> Self {
        Self { id }
    }
}

/// Parameters for resuming a failed plan at a given step
#[derive(Debug, Clone)]
pub struct RetryStep {
    pub plan_id: String,
    pub step_id: String,
}

/// Parameters for listing plans
#[derive(Debug, Clone, Default)]
pub struct ListPlans {
    /// Only plans in this status
    pub status: Option<PlanStatus>,
    /// Maximum number of plans returned
    pub limit: Option<usize>,
    /// Number of plans skipped, newest first
    pub skip: usize,
}

/// Parameters for reading an entity's audit trail
#[derive(Debug, Clone)]
pub struct ShowHistory {
    pub id: String,
    pub limit: Option<usize>,
}

/// Parameters for creating a standalone task
#[derive(Debug, Clone, Default)]
pub struct CreateTask {
    pub description: String,
    pub plan_id: Option<String>,
    pub step_id: Option<String>,
    pub environment_id: Option<String>,
    pub user_id: Option<String>,
    pub metadata: Metadata,
}

/// Parameters for listing tasks
#[derive(Debug, Clone, Default)]
pub struct ListTasks {
    pub plan_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: Option<usize>,
    pub skip: usize,
}
