//! State store contract.
//!
//! The store is the single source of truth for plans, tasks and their
//! history. The plan manager never caches records: every mutation is a
//! read-modify-write against the store, serialized per entity by the manager.
//! [`crate::db::Database`] is the bundled SQLite implementation.

use crate::{
    error::Result,
    models::{HistoryEntry, HistoryFilter, Plan, PlanFilter, Task, TaskFilter},
};

/// Persistence for plan, task and history records.
///
/// Implementations are called from async request handlers and from executor
/// worker threads alike, so every method is synchronous and `&self`.
pub trait StateStore: Send + Sync {
    /// Inserts or replaces a plan together with all of its steps.
    fn save_plan(&self, plan: &Plan) -> Result<()>;

    fn get_plan(&self, id: &str) -> Result<Option<Plan>>;

    /// Plans matching the filter, newest first.
    fn get_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>>;

    /// Plans in a non-terminal, post-creation status.
    fn get_active_plans(&self) -> Result<Vec<Plan>>;

    fn save_task(&self, task: &Task) -> Result<()>;

    fn get_task(&self, id: &str) -> Result<Option<Task>>;

    fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// Tasks that have not reached a terminal status, optionally scoped to a
    /// plan.
    fn get_active_tasks(&self, plan_id: Option<&str>) -> Result<Vec<Task>>;

    /// Tasks referencing the given plan.
    fn get_plan_tasks(&self, plan_id: &str) -> Result<Vec<Task>>;

    /// Appends an audit record. Returns false if the entry was not stored,
    /// e.g. because an entry with the same id already exists.
    fn add_history_entry(&self, entry: &HistoryEntry) -> Result<bool>;

    /// History entries matching the filter, newest first.
    fn get_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>>;

    /// Entries for the plan itself and for its steps, newest first.
    fn get_plan_history(&self, plan_id: &str, limit: usize) -> Result<Vec<HistoryEntry>>;

    fn get_task_history(&self, task_id: &str, limit: usize) -> Result<Vec<HistoryEntry>>;

    /// Releases underlying resources. Later calls fail.
    fn close(&self) -> Result<()>;
}
