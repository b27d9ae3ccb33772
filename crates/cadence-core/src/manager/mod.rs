//! The plan manager: the orchestration engine.
//!
//! [`PlanManager`] turns goals into plans through the [`ModelRouter`], walks
//! their steps one at a time through the [`TaskExecutor`], and writes every
//! transition through the [`StateStore`] along with an audit entry and a
//! lifecycle event.
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌─────────────────┐
//! │   PlanManager   │    │     Engine      │    │   StateStore    │
//! │  (async API,    │───▶│ (sync routines, │───▶│   (SQLite by    │
//! │ spawn_blocking) │    │ per-entity lock)│    │    default)     │
//! └─────────────────┘    └────────┬────────┘    └─────────────────┘
//!                                 │ submit
//!                                 ▼
//!                        ┌─────────────────┐
//!                        │  TaskExecutor   │── completion ──▶ Engine
//!                        └─────────────────┘
//! ```
//!
//! ## Submodules
//!
//! - [`builder`]: [`ManagerBuilder`], wiring the collaborators together
//! - `plan_ops`: plan creation, execution, cancellation and retry
//! - `advance`: the step-advance routine and executor completion callbacks
//! - `task_ops`: standalone task lifecycle
//! - `queries`: read-only plan, task and history queries
//!
//! ## Concurrency
//!
//! Every mutating routine holds the lock of the plan or task it touches for
//! the whole read-modify-write cycle, and re-reads the record from the store
//! under that lock. Completion callbacks check that the plan is still
//! executing the step they report on before touching it, so a late callback
//! after a cancellation is dropped.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use cadence_core::{
//!     executor::WorkResult,
//!     models::{Plan, PlanStatus, PlanStep},
//!     params::CreatePlan,
//!     Database, ManagerBuilder, StaticRouter, StepDescriptor,
//! };
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> cadence_core::Result<()> {
//! let router = StaticRouter::new("static", vec![StepDescriptor::new("Design", "Sketch it")]);
//! let runner = |_: &Plan, _: &PlanStep| -> WorkResult { Ok(json!({"ok": true})) };
//! let manager = ManagerBuilder::new()
//!     .with_store(Arc::new(Database::open_in_memory()?))
//!     .with_router(Arc::new(router))
//!     .with_step_runner(Arc::new(runner))
//!     .build()
//!     .await?;
//!
//! let plan = manager
//!     .create_plan(&CreatePlan { goal: "build widget".to_string(), user_id: None })
//!     .await?;
//! assert_eq!(plan.status, PlanStatus::Planning);
//! # manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, sync::Arc};

use log::warn;
use parking_lot::Mutex;
use tokio::task;

use crate::{
    error::{OrchestrationError, Result},
    events::{EventBus, LifecycleEvent},
    executor::TaskExecutor,
    models::HistoryEntry,
    router::ModelRouter,
    runner::StepRunner,
    store::StateStore,
};

pub mod builder;

mod advance;
mod plan_ops;
mod queries;
mod task_ops;


pub use builder::ManagerBuilder;

/// Async handle to the orchestration engine. Cheap to clone.
#[derive(Clone)]
pub struct PlanManager {
    engine: Arc<Engine>,
}

impl PlanManager {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Runs a synchronous engine routine on tokio's blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Arc<Engine>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| OrchestrationError::Configuration {
                message: format!("Task join error: {e}"),
            })?
    }

    /// Stops accepting new work and closes the store.
    ///
    /// Units of work already on the executor still finish, but their
    /// callbacks can no longer persist anything.
    pub async fn shutdown(&self) -> Result<()> {
        self.engine.executor.stop()?;
        self.run_blocking(|engine| engine.store.close()).await
    }
}

/// Synchronous core shared by the async API and the executor callbacks.
pub(crate) struct Engine {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) executor: Arc<dyn TaskExecutor>,
    pub(crate) router: Arc<dyn ModelRouter>,
    pub(crate) runner: Arc<dyn StepRunner>,
    pub(crate) events: Arc<dyn EventBus>,
    locks: EntityLocks,
}

impl Engine {
    pub(crate) fn new(
        store: Arc<dyn StateStore>,
        executor: Arc<dyn TaskExecutor>,
        router: Arc<dyn ModelRouter>,
        runner: Arc<dyn StepRunner>,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            executor,
            router,
            runner,
            events,
            locks: EntityLocks::default(),
        }
    }

    /// Runs `f` while holding the lock for one plan or task id.
    pub(crate) fn with_lock<T>(&self, id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.get(id);
        let result = {
            let _guard = lock.lock();
            f()
        };
        self.locks.release(id, &lock);
        result
    }

    /// Appends an audit entry. A rejected entry is logged, not raised.
    pub(crate) fn record(&self, entry: HistoryEntry) -> Result<()> {
        if !self.store.add_history_entry(&entry)? {
            warn!(
                "History entry {} for {} {} was not stored",
                entry.id, entry.entity_type, entry.entity_id
            );
        }
        Ok(())
    }

    pub(crate) fn publish(&self, event: LifecycleEvent) {
        self.events.publish(event);
    }
}

/// One mutex per plan or task id.
#[derive(Default)]
struct EntityLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    fn get(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock();
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    /// Drops the entry for `id` once no caller other than the holder of `lock`
    /// has a copy of it.
    fn release(&self, id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.inner.lock();
        // the map's copy plus ours
        let unused = locks
            .get(id)
            .is_some_and(|entry| Arc::ptr_eq(entry, lock) && Arc::strong_count(lock) == 2);
        if unused {
            locks.remove(id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}
