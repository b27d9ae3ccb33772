//! Read-only queries for the PlanManager.
//!
//! Queries go straight to the store without taking entity locks; they see
//! the last committed state.

use jiff::SignedDuration;

use super::PlanManager;
use crate::{
    error::Result,
    models::{HistoryEntry, HistoryFilter, Plan, PlanFilter, Task, TaskFilter, DEFAULT_PAGE_SIZE},
    params::{Id, ListPlans, ListTasks, ShowHistory},
};

impl PlanManager {
    /// Retrieves a plan with all of its steps.
    pub async fn get_plan(&self, params: &Id) -> Result<Option<Plan>> {
        let plan_id = params.id.clone();
        self.run_blocking(move |engine| engine.store.get_plan(&plan_id))
            .await
    }

    /// Lists plans, newest first.
    pub async fn get_plans(&self, params: &ListPlans) -> Result<Vec<Plan>> {
        let filter = PlanFilter::from(params);
        self.run_blocking(move |engine| engine.store.get_plans(&filter))
            .await
    }

    /// Plans in `Planning`, `Ready` or `Executing` status.
    pub async fn get_active_plans(&self) -> Result<Vec<Plan>> {
        self.run_blocking(|engine| engine.store.get_active_plans())
            .await
    }

    /// Percentage of the plan's steps in a terminal status.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::PlanNotFound` for an unknown id.
    pub async fn get_plan_progress(&self, params: &Id) -> Result<f64> {
        let plan_id = params.id.clone();
        self.run_blocking(move |engine| engine.load_plan(&plan_id).map(|plan| plan.progress()))
            .await
    }

    /// Wall time of the plan's execution, once it has finished.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::PlanNotFound` for an unknown id.
    pub async fn get_plan_duration(&self, params: &Id) -> Result<Option<SignedDuration>> {
        let plan_id = params.id.clone();
        self.run_blocking(move |engine| engine.load_plan(&plan_id).map(|plan| plan.duration()))
            .await
    }

    /// Audit trail of a plan and its steps, newest first.
    pub async fn get_plan_history(&self, params: &ShowHistory) -> Result<Vec<HistoryEntry>> {
        let plan_id = params.id.clone();
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        self.run_blocking(move |engine| engine.store.get_plan_history(&plan_id, limit))
            .await
    }

    /// History entries matching an arbitrary filter, newest first.
    pub async fn get_history(&self, filter: HistoryFilter) -> Result<Vec<HistoryEntry>> {
        self.run_blocking(move |engine| engine.store.get_history(&filter))
            .await
    }

    pub async fn get_task(&self, params: &Id) -> Result<Option<Task>> {
        let task_id = params.id.clone();
        self.run_blocking(move |engine| engine.store.get_task(&task_id))
            .await
    }

    /// Lists tasks, newest first.
    pub async fn get_tasks(&self, params: &ListTasks) -> Result<Vec<Task>> {
        let filter = TaskFilter::from(params);
        self.run_blocking(move |engine| engine.store.get_tasks(&filter))
            .await
    }

    /// Tasks that have not reached a terminal status, optionally for one
    /// plan only.
    pub async fn get_active_tasks(&self, plan_id: Option<&str>) -> Result<Vec<Task>> {
        let plan_id = plan_id.map(String::from);
        self.run_blocking(move |engine| engine.store.get_active_tasks(plan_id.as_deref()))
            .await
    }

    /// Tasks that reference the given plan, oldest first.
    pub async fn get_plan_tasks(&self, params: &Id) -> Result<Vec<Task>> {
        let plan_id = params.id.clone();
        self.run_blocking(move |engine| engine.store.get_plan_tasks(&plan_id))
            .await
    }

    pub async fn get_task_history(&self, params: &ShowHistory) -> Result<Vec<HistoryEntry>> {
        let task_id = params.id.clone();
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        self.run_blocking(move |engine| engine.store.get_task_history(&task_id, limit))
            .await
    }
}
