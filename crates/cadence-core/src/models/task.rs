//! Standalone task model.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{EntityType, Metadata, TaskStatus};
use crate::error::{OrchestrationError, Result};

/// An independently trackable unit of work, optionally tied to a plan step.
///
/// The plan and step are referenced by id only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,

    pub description: String,

    pub plan_id: Option<String>,

    pub step_id: Option<String>,

    #[serde(default)]
    pub status: TaskStatus,

    pub created_at: Timestamp,

    pub started_at: Option<Timestamp>,

    pub completed_at: Option<Timestamp>,

    pub result: Option<Value>,

    pub error: Option<String>,

    /// Execution environment the task targets
    pub environment_id: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Task {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            description: description.into(),
            plan_id: None,
            step_id: None,
            status: TaskStatus::Created,
            created_at: Timestamp::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
            environment_id: None,
            metadata: Metadata::new(),
        }
    }

    fn transition(&mut self, next: TaskStatus) -> Result<Timestamp> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::transition(
                EntityType::Task,
                self.status,
                next,
            ));
        }
        self.status = next;
        Ok(Timestamp::now())
    }

    /// Marks the task as queued on the executor.
    pub fn enqueue(&mut self) -> Result<()> {
        self.transition(TaskStatus::Pending).map(|_| ())
    }

    pub fn start(&mut self) -> Result<()> {
        let now = self.transition(TaskStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, result: Value) -> Result<()> {
        let now = self.transition(TaskStatus::Succeeded)?;
        self.completed_at = Some(now);
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        let now = self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        let now = self.transition(TaskStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn duration(&self) -> Option<SignedDuration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed.duration_since(started)),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(super::plan::USER_ID_KEY)
            .and_then(|v| v.as_str())
    }
}
