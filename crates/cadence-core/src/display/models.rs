//! Display implementations for domain models.
//!
//! Status enums display as their storage string. Plans, steps, tasks and
//! history entries display as markdown blocks.

use std::fmt;

use super::datetime::{Elapsed, LocalDateTime};
use crate::models::{
    EntityType, HistoryAction, HistoryEntry, Plan, PlanStatus, PlanStep, StepStatus, Task,
    TaskStatus,
};

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# {}", self.goal)?;
        writeln!(f)?;

        writeln!(f, "- ID: {}", self.id)?;
        writeln!(f, "- Status: {}", self.status)?;
        if !self.steps.is_empty() {
            let done = self.steps.iter().filter(|s| s.status.is_terminal()).count();
            writeln!(
                f,
                "- Progress: {done}/{} ({:.0}%)",
                self.steps.len(),
                self.progress()
            )?;
        }
        if let Some(provider) = &self.provider {
            writeln!(f, "- Provider: {provider}")?;
        }
        if let Some(user_id) = self.user_id() {
            writeln!(f, "- User: {user_id}")?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(started) = &self.started_at {
            writeln!(f, "- Started: {}", LocalDateTime(started))?;
        }
        if let Some(completed) = &self.completed_at {
            writeln!(f, "- Finished: {}", LocalDateTime(completed))?;
        }
        if let Some(duration) = self.duration() {
            writeln!(f, "- Duration: {}", Elapsed(duration))?;
        }

        if let Some(error) = &self.error {
            writeln!(f)?;
            writeln!(f, "**Error**: {error}")?;
        }

        if self.steps.is_empty() {
            writeln!(f, "\nNo steps in this plan.")?;
        } else {
            writeln!(f, "\n## Steps")?;
            writeln!(f)?;
            for (position, step) in self.steps.iter().enumerate() {
                write!(f, "### {}. ", position + 1)?;
                write!(f, "{step}")?;
            }
        }

        Ok(())
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.status.with_icon())?;
        writeln!(f)?;
        writeln!(f, "- ID: {}", self.id)?;
        if let Some(duration) = self.duration() {
            writeln!(f, "- Duration: {}", Elapsed(duration))?;
        }
        writeln!(f)?;

        if !self.description.is_empty() {
            writeln!(f, "{}", self.description)?;
            writeln!(f)?;
        }

        for (title, items) in [
            ("Inputs", &self.inputs),
            ("Outputs", &self.outputs),
            ("Challenges", &self.challenges),
            ("Mitigations", &self.mitigations),
        ] {
            if items.is_empty() {
                continue;
            }
            writeln!(f, "#### {title}")?;
            writeln!(f)?;
            for item in items {
                writeln!(f, "- {item}")?;
            }
            writeln!(f)?;
        }

        if let Some(error) = &self.error {
            writeln!(f, "**Error**: {error}")?;
            writeln!(f)?;
        }

        if self.status == StepStatus::Succeeded && !self.result.is_empty() {
            writeln!(f, "#### Result")?;
            writeln!(f)?;
            writeln!(f, "```json")?;
            let rendered =
                serde_json::to_string_pretty(&self.result).map_err(|_| fmt::Error)?;
            writeln!(f, "{rendered}")?;
            writeln!(f, "```")?;
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {} ({})", self.description, self.status)?;
        writeln!(f)?;
        writeln!(f, "- ID: {}", self.id)?;
        if let Some(plan_id) = &self.plan_id {
            match &self.step_id {
                Some(step_id) => writeln!(f, "- Plan: {plan_id} (step {step_id})")?,
                None => writeln!(f, "- Plan: {plan_id}")?,
            }
        }
        if let Some(environment_id) = &self.environment_id {
            writeln!(f, "- Environment: {environment_id}")?;
        }
        writeln!(f, "- Created: {}", LocalDateTime(&self.created_at))?;
        if let Some(duration) = self.duration() {
            writeln!(f, "- Duration: {}", Elapsed(duration))?;
        }
        writeln!(f)?;

        if let Some(error) = &self.error {
            writeln!(f, "**Error**: {error}")?;
            writeln!(f)?;
        }
        if let Some(result) = &self.result {
            writeln!(f, "```json")?;
            let rendered = serde_json::to_string_pretty(result).map_err(|_| fmt::Error)?;
            writeln!(f, "{rendered}")?;
            writeln!(f, "```")?;
            writeln!(f)?;
        }

        Ok(())
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "- {} **{} {}** `{}`: {}",
            LocalDateTime(&self.timestamp),
            self.entity_type,
            self.action,
            self.entity_id,
            self.details
        )
    }
}
