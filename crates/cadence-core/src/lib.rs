//! Core library for the Cadence plan and task orchestration engine.
//!
//! A goal is decomposed into an ordered list of steps by a [`ModelRouter`],
//! then the steps are executed one at a time on a bounded worker pool. Every
//! transition is persisted to a [`StateStore`] together with an audit entry,
//! and announced on an [`EventBus`]. Failed plans can be resumed from a
//! chosen step; running plans can be cancelled.
//!
//! # Crate layout
//!
//! - [`models`]: plans, steps, tasks, history entries and their status graphs
//! - [`store`] / [`db`]: the persistence contract and its SQLite implementation
//! - [`executor`]: the worker-pool contract and the tokio-backed [`WorkerPool`]
//! - [`router`] / [`runner`]: what generates steps and what a step does
//! - [`events`]: lifecycle notifications
//! - [`manager`]: the [`PlanManager`] engine and its [`ManagerBuilder`]
//! - [`display`]: markdown formatting for terminal output
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use cadence_core::{
//!     executor::WorkResult,
//!     models::{Plan, PlanStep},
//!     params::{CreatePlan, ExecutePlan},
//!     ManagerBuilder, StaticRouter, StepDescriptor,
//! };
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let router = StaticRouter::new(
//!     "static",
//!     vec![
//!         StepDescriptor::new("Design", "Sketch the widget"),
//!         StepDescriptor::new("Build", "Assemble the widget"),
//!     ],
//! );
//! let runner = |_: &Plan, step: &PlanStep| -> WorkResult { Ok(json!({"done": step.name})) };
//!
//! let manager = ManagerBuilder::new()
//!     .with_database_path(Some("cadence.db"))
//!     .with_router(Arc::new(router))
//!     .with_step_runner(Arc::new(runner))
//!     .build()
//!     .await?;
//!
//! let plan = manager
//!     .create_plan(&CreatePlan { goal: "build widget".to_string(), user_id: None })
//!     .await?;
//!
//! // once generation has finished and the plan is ready
//! let plan = manager
//!     .execute_plan(&ExecutePlan { plan_id: plan.id, user_id: None })
//!     .await?;
//! println!("{plan}");
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod display;
pub mod error;
pub mod events;
pub mod executor;
pub mod manager;
pub mod models;
pub mod params;
pub mod router;
pub mod runner;
pub mod store;

// Re-export commonly used types
pub use db::Database;
pub use display::{HistoryEntries, LocalDateTime, OperationStatus, Plans, Tasks};
pub use error::{OrchestrationError, Result};
pub use events::{BroadcastEventBus, EventBus, EventKind, LifecycleEvent, NoopEventBus};
pub use executor::{TaskExecutor, WorkOutcome, WorkerPool};
pub use manager::{ManagerBuilder, PlanManager};
pub use models::{
    EntityType, HistoryAction, HistoryEntry, Plan, PlanStatus, PlanStep, StepStatus, Task,
    TaskStatus,
};
pub use router::{ModelRouter, RoutedPlan, RoutingError, StaticRouter, StepDescriptor};
pub use runner::StepRunner;
pub use store::StateStore;
