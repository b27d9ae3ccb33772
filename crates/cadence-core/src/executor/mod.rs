//! Task executor contract and unit-of-work identifiers.
//!
//! The executor is a bounded worker pool that runs named units of work and
//! reports each one through a single completion callback carrying a tagged
//! [`WorkOutcome`]. An accepted submission gets exactly one callback, on a
//! worker thread, never inline in [`TaskExecutor::submit`]. A rejected
//! submission returns an error and gets none.
//!
//! The plan manager never keeps per-submission state: the unit-of-work
//! identifier embeds the plan and step (or task) ids, and the callback
//! recovers them with [`WorkId::parse`].

use std::{fmt, time::Duration};

use serde_json::Value;

use crate::error::Result;

pub mod pool;

pub use pool::WorkerPool;

/// Result produced by a unit of work.
pub type WorkResult = std::result::Result<Value, String>;

/// A unit of work handed to the executor.
pub type Work = Box<dyn FnOnce() -> WorkResult + Send + 'static>;

/// Completion callback, invoked exactly once per accepted submission.
pub type Completion = Box<dyn FnOnce(WorkOutcome) + Send + 'static>;

/// How a unit of work finished.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkOutcome {
    Succeeded {
        task_id: String,
        result: Value,
        elapsed: Duration,
    },
    Failed {
        task_id: String,
        error: String,
    },
}

impl WorkOutcome {
    pub fn task_id(&self) -> &str {
        match self {
            WorkOutcome::Succeeded { task_id, .. } | WorkOutcome::Failed { task_id, .. } => task_id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, WorkOutcome::Succeeded { .. })
    }
}

/// Bounded worker pool consumed by the plan manager.
pub trait TaskExecutor: Send + Sync {
    /// Starts accepting submissions.
    fn start(&self) -> Result<()>;

    /// Stops accepting submissions. Work already accepted still completes
    /// and still gets its callback.
    fn stop(&self) -> Result<()>;

    /// Queues `work` under `task_id`.
    fn submit(&self, task_id: String, work: Work, on_complete: Completion) -> Result<()>;
}

/// Structured unit-of-work identifier.
///
/// ```rust
/// use cadence_core::executor::WorkId;
///
/// let id = WorkId::Step { plan_id: "p1".into(), step_id: "s1".into() };
/// assert_eq!(id.to_string(), "plan:p1:step:s1");
/// assert_eq!(WorkId::parse("plan:p1:step:s1"), Some(id));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkId {
    /// Step generation for a plan
    Generate { plan_id: String },
    /// Execution of one plan step
    Step { plan_id: String, step_id: String },
    /// A standalone task
    Task { task_id: String },
}

impl WorkId {
    /// Parses an identifier produced by `Display`. Plan ids never contain a
    /// colon; step ids may.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(task_id) = raw.strip_prefix("task:") {
            return (!task_id.is_empty()).then(|| WorkId::Task {
                task_id: task_id.to_string(),
            });
        }

        let rest = raw.strip_prefix("plan:")?;
        let (plan_id, tail) = rest.split_once(':')?;
        if plan_id.is_empty() {
            return None;
        }
        if tail == "generate" {
            return Some(WorkId::Generate {
                plan_id: plan_id.to_string(),
            });
        }
        let step_id = tail.strip_prefix("step:")?;
        (!step_id.is_empty()).then(|| WorkId::Step {
            plan_id: plan_id.to_string(),
            step_id: step_id.to_string(),
        })
    }
}

impl fmt::Display for WorkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkId::Generate { plan_id } => write!(f, "plan:{plan_id}:generate"),
            WorkId::Step { plan_id, step_id } => write!(f, "plan:{plan_id}:step:{step_id}"),
            WorkId::Task { task_id } => write!(f, "task:{task_id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_id_parse() {
        assert_eq!(
            WorkId::parse("plan:abc:generate"),
            Some(WorkId::Generate {
                plan_id: "abc".to_string()
            })
        );
        assert_eq!(
            WorkId::parse("plan:abc:step:build:docs"),
            Some(WorkId::Step {
                plan_id: "abc".to_string(),
                step_id: "build:docs".to_string()
            })
        );
        assert_eq!(
            WorkId::parse("task:t-1"),
            Some(WorkId::Task {
                task_id: "t-1".to_string()
            })
        );
    }

    #[test]
    fn test_work_id_parse_rejects_garbage() {
        assert_eq!(WorkId::parse(""), None);
        assert_eq!(WorkId::parse("plan:"), None);
        assert_eq!(WorkId::parse("plan::generate"), None);
        assert_eq!(WorkId::parse("plan:abc:step:"), None);
        assert_eq!(WorkId::parse("plan:abc:other"), None);
        assert_eq!(WorkId::parse("task:"), None);
        assert_eq!(WorkId::parse("job:1"), None);
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = WorkOutcome::Failed {
            task_id: "task:1".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(outcome.task_id(), "task:1");
        assert!(!outcome.is_success());
    }
}
