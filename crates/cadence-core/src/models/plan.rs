//! Plan model definition and its lifecycle transitions.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

use super::{EntityType, Metadata, PlanStatus, PlanStep, StepStatus};
use crate::error::{OrchestrationError, Result};

/// Metadata key under which the requesting user is recorded.
pub const USER_ID_KEY: &str = "user_id";

/// Metadata key under which plan generation latency is recorded.
pub const GENERATION_LATENCY_KEY: &str = "generation_latency_ms";

/// A goal decomposed into an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Unique identifier for the plan
    pub id: String,

    /// What the plan is meant to achieve
    pub goal: String,

    /// Ordered steps, owned by the plan
    #[serde(default)]
    pub steps: Vec<PlanStep>,

    #[serde(default)]
    pub status: PlanStatus,

    /// Model router backend that generated the steps
    pub provider: Option<String>,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,

    pub started_at: Option<Timestamp>,

    /// Set only once the plan reaches a terminal status
    pub completed_at: Option<Timestamp>,

    /// Index of the step being executed; `steps.len()` once all are done
    pub current_step_index: Option<usize>,

    pub error: Option<String>,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Plan {
    /// Creates a new plan in `Created` status with a fresh identifier.
    pub fn new(goal: impl Into<String>) -> Self {
        let now = Timestamp::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps: Vec::new(),
            status: PlanStatus::Created,
            provider: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            current_step_index: None,
            error: None,
            metadata: Metadata::new(),
        }
    }

    fn transition(&mut self, next: PlanStatus) -> Result<Timestamp> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::transition(
                EntityType::Plan,
                self.status,
                next,
            ));
        }
        let now = Timestamp::now();
        self.status = next;
        self.updated_at = now;
        Ok(now)
    }

    /// Moves the plan into `Planning` while the model router runs.
    pub fn begin_planning(&mut self) -> Result<()> {
        self.transition(PlanStatus::Planning).map(|_| ())
    }

    /// Populates the steps produced by the model router and marks the plan
    /// `Ready`.
    pub fn mark_ready(&mut self, steps: Vec<PlanStep>, provider: impl Into<String>) -> Result<()> {
        self.transition(PlanStatus::Ready)?;
        self.steps = steps;
        self.provider = Some(provider.into());
        Ok(())
    }

    /// Starts execution from the first step.
    pub fn start(&mut self) -> Result<()> {
        let now = self.transition(PlanStatus::Executing)?;
        self.started_at = Some(now);
        self.current_step_index = Some(0);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        let now = self.transition(PlanStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        let now = self.transition(PlanStatus::Failed)?;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<()> {
        let now = self.transition(PlanStatus::Cancelled)?;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Re-enters `Executing` from `Failed` so execution can resume at
    /// `position`. Steps before `position` keep their status.
    pub fn reopen_at(&mut self, position: usize) -> Result<()> {
        if position >= self.steps.len() {
            return Err(OrchestrationError::invalid_input("position")
                .with_reason(format!("plan {} has no step at index {position}", self.id)));
        }
        self.transition(PlanStatus::Executing)?;
        self.completed_at = None;
        self.error = None;
        self.current_step_index = Some(position);
        if self.started_at.is_none() {
            self.started_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Marks the plan as modified without changing its status.
    pub fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    /// Percentage of steps in a terminal status, 0 for an empty plan.
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let done = self
            .steps
            .iter()
            .filter(|step| step.status.is_terminal())
            .count();
        done as f64 / self.steps.len() as f64 * 100.0
    }

    /// Wall time between start and completion, if both are known.
    pub fn duration(&self) -> Option<SignedDuration> {
        match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => Some(completed.duration_since(started)),
            _ => None,
        }
    }

    /// Whether every step has been walked past.
    pub fn all_steps_done(&self) -> bool {
        self.current_step_index
            .is_some_and(|index| index >= self.steps.len())
    }

    pub fn current_step(&self) -> Option<&PlanStep> {
        self.current_step_index
            .and_then(|index| self.steps.get(index))
    }

    pub fn current_step_mut(&mut self) -> Option<&mut PlanStep> {
        match self.current_step_index {
            Some(index) => self.steps.get_mut(index),
            None => None,
        }
    }

    /// Position of the step with the given id.
    pub fn step_position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.id == step_id)
    }

    /// Position of the step that stopped the plan: the first `Failed` step,
    /// or the current step when none is marked failed.
    pub fn failed_step_position(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::Failed)
            .or(self.current_step_index)
    }

    /// User that requested the plan, if recorded.
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get(USER_ID_KEY).and_then(|v| v.as_str())
    }
}
