//! Plan step model definition.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use super::{EntityType, Metadata, StepStatus};
use crate::error::{OrchestrationError, Result};

/// One unit of plan execution. Owned by its [`super::Plan`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanStep {
    /// Identifier, unique within the owning plan
    pub id: String,

    pub name: String,

    pub description: String,

    /// Names of the artifacts the step consumes
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Names of the artifacts the step produces
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub challenges: Vec<String>,

    #[serde(default)]
    pub mitigations: Vec<String>,

    #[serde(default)]
    pub status: StepStatus,

    pub started_at: Option<Timestamp>,

    pub completed_at: Option<Timestamp>,

    pub error: Option<String>,

    /// Output reported by the step's unit of work
    #[serde(default)]
    pub result: Metadata,
}

impl PlanStep {
    /// Creates a pending step.
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            challenges: Vec::new(),
            mitigations: Vec::new(),
            status: StepStatus::Pending,
            started_at: None,
            completed_at: None,
            error: None,
            result: Metadata::new(),
        }
    }

    fn transition(&mut self, next: StepStatus) -> Result<Timestamp> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::transition(
                EntityType::Step,
                self.status,
                next,
            ));
        }
        self.status = next;
        Ok(Timestamp::now())
    }

    pub fn start(&mut self) -> Result<()> {
        let now = self.transition(StepStatus::Running)?;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, result: Metadata) -> Result<()> {
        let now = self.transition(StepStatus::Succeeded)?;
        self.completed_at = Some(now);
        self.result = result;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        let now = self.transition(StepStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn skip(&mut self) -> Result<()> {
        let now = self.transition(StepStatus::Skipped)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Puts the step back to `Pending` with no trace of earlier attempts.
    pub fn reset(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.error = None;
        self.result.clear();
    }

    pub fn duration(&self) -> Option<SignedDuration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed.duration_since(started)),
            _ => None,
        }
    }
}
