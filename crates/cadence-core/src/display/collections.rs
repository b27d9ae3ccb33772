//! Collection newtypes with empty-case handling.

use std::{fmt, ops::Index};

use crate::models::{HistoryEntry, Plan, Task};

/// Plans rendered one after another.
///
/// Each plan renders with its full step list, so `list` style output usually
/// wants [`Plans::summary`] instead.
pub struct Plans(pub Vec<Plan>);

impl Plans {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Plan> {
        self.0.iter()
    }

    /// One line per plan: goal, status, progress and id.
    pub fn summary(&self) -> PlanSummaries<'_> {
        PlanSummaries(&self.0)
    }
}

impl Index<usize> for Plans {
    type Output = Plan;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl IntoIterator for Plans {
    type Item = Plan;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Plans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for plan in &self.0 {
            writeln!(f, "{plan}")?;
        }
        Ok(())
    }
}

/// Compact listing of plans.
pub struct PlanSummaries<'a>(&'a [Plan]);

impl fmt::Display for PlanSummaries<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No plans found.");
        }
        for plan in self.0 {
            writeln!(
                f,
                "- **{}** ({}, {:.0}%) `{}`",
                plan.goal,
                plan.status,
                plan.progress(),
                plan.id
            )?;
        }
        Ok(())
    }
}

/// Tasks rendered one after another.
pub struct Tasks(pub Vec<Task>);

impl Tasks {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Task> {
        self.0.iter()
    }
}

impl IntoIterator for Tasks {
    type Item = Task;
    type IntoIter = std::vec::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Tasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No tasks found.");
        }
        for task in &self.0 {
            write!(f, "{task}")?;
        }
        Ok(())
    }
}

/// Audit trail, one bullet per entry, in the order given.
pub struct HistoryEntries(pub Vec<HistoryEntry>);

impl HistoryEntries {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for HistoryEntries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No history recorded.");
        }
        for entry in &self.0 {
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
