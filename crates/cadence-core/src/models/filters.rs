//! Filter types for querying plans, tasks and history.

use super::{EntityType, PlanStatus, TaskStatus};

/// Page size used when a query does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Filter options for querying plans.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanFilter {
    /// Only plans in this status; all statuses if None
    pub status: Option<PlanStatus>,

    pub limit: usize,

    pub skip: usize,
}

impl Default for PlanFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: DEFAULT_PAGE_SIZE,
            skip: 0,
        }
    }
}

impl PlanFilter {
    /// Filter for a single status with the default page size.
    pub fn with_status(status: PlanStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl From<&crate::params::ListPlans> for PlanFilter {
    /// Convert ListPlans parameters to a PlanFilter.
    ///
    /// ```rust
    /// use cadence_core::{models::{PlanFilter, PlanStatus}, params::ListPlans};
    ///
    /// let params = ListPlans { status: Some(PlanStatus::Ready), limit: Some(5), skip: 10 };
    /// let filter: PlanFilter = (&params).into();
    /// assert_eq!(filter.status, Some(PlanStatus::Ready));
    /// assert_eq!(filter.limit, 5);
    /// assert_eq!(filter.skip, 10);
    /// ```
    fn from(params: &crate::params::ListPlans) -> Self {
        Self {
            status: params.status,
            limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            skip: params.skip,
        }
    }
}

/// Filter options for querying tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFilter {
    pub plan_id: Option<String>,
    pub status: Option<TaskStatus>,
    pub limit: usize,
    pub skip: usize,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            plan_id: None,
            status: None,
            limit: DEFAULT_PAGE_SIZE,
            skip: 0,
        }
    }
}

impl From<&crate::params::ListTasks> for TaskFilter {
    fn from(params: &crate::params::ListTasks) -> Self {
        Self {
            plan_id: params.plan_id.clone(),
            status: params.status,
            limit: params.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            skip: params.skip,
        }
    }
}

/// Filter options for querying the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<String>,
    pub limit: usize,
    pub skip: usize,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            entity_type: None,
            entity_id: None,
            limit: DEFAULT_PAGE_SIZE,
            skip: 0,
        }
    }
}
