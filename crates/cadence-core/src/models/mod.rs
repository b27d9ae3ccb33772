//! Data models for plans, steps, tasks and their audit trail.
//!
//! The models are plain values. Each one carries its own status transition
//! methods (`start`, `complete`, `fail`, ...), which check the legal status
//! graph, capture timestamps and have no other side effects. Persistence and
//! scheduling live in [`crate::db`] and [`crate::manager`].
//!
//! # Status graphs
//!
//! ```text
//! Plan:  created ─▶ planning ─▶ ready ─▶ executing ─▶ completed
//!                      │                   │ ▲
//!                      ▼                   ▼ │ (step retry)
//!                    failed ◀──────────── failed
//!        (any non-terminal) ─▶ cancelled
//!
//! Step:  pending ─▶ running ─▶ succeeded | failed | skipped
//! Task:  created ─▶ [pending] ─▶ running ─▶ succeeded | failed | cancelled
//! ```
//!
//! Display implementations for these models live in
//! [`crate::display::models`].
//!
//! # Examples
//!
//! ```rust
//! use cadence_core::models::{Plan, PlanStatus, PlanStep};
//!
//! let mut plan = Plan::new("build widget");
//! plan.begin_planning()?;
//! plan.mark_ready(
//!     vec![PlanStep::new("s1", "Design", "Sketch the widget")],
//!     "static",
//! )?;
//! plan.start()?;
//! assert_eq!(plan.status, PlanStatus::Executing);
//! assert_eq!(plan.progress(), 0.0);
//! # Ok::<(), cadence_core::OrchestrationError>(())
//! ```

pub mod filters;
pub mod history;
pub mod plan;
pub mod status;
pub mod step;
pub mod task;

#[cfg(test)]
mod tests;

/// Open key/value map carried by plans, steps, tasks and history entries.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

pub use filters::{HistoryFilter, PlanFilter, TaskFilter, DEFAULT_PAGE_SIZE};
pub use history::{EntityType, HistoryAction, HistoryEntry};
pub use plan::Plan;
pub use status::{PlanStatus, StepStatus, TaskStatus};
pub use step::PlanStep;
pub use task::Task;
