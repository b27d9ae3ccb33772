//! Builder for creating and configuring PlanManager instances.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use log::debug;
use tokio::task;

use super::{Engine, PlanManager};
use crate::{
    db::Database,
    error::{OrchestrationError, Result},
    events::{EventBus, NoopEventBus},
    executor::{TaskExecutor, WorkerPool},
    router::ModelRouter,
    runner::StepRunner,
    store::StateStore,
};

/// Worker-pool bound used when none is configured.
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Builder for creating and configuring PlanManager instances.
///
/// The model router and the step runner are required; everything else has a
/// default: a SQLite store at the XDG data path, a [`WorkerPool`] with
/// [`DEFAULT_MAX_WORKERS`] workers and a [`NoopEventBus`].
pub struct ManagerBuilder {
    database_path: Option<PathBuf>,
    store: Option<Arc<dyn StateStore>>,
    max_workers: usize,
    executor: Option<Arc<dyn TaskExecutor>>,
    router: Option<Arc<dyn ModelRouter>>,
    runner: Option<Arc<dyn StepRunner>>,
    events: Option<Arc<dyn EventBus>>,
}

impl ManagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            database_path: None,
            store: None,
            max_workers: DEFAULT_MAX_WORKERS,
            executor: None,
            router: None,
            runner: None,
            events: None,
        }
    }

    /// Sets a custom database file path.
    ///
    /// If not specified, uses XDG Base Directory specification:
    /// `$XDG_DATA_HOME/cadence/cadence.db` or `~/.local/share/cadence/cadence.db`
    pub fn with_database_path<P: AsRef<Path>>(mut self, path: Option<P>) -> Self {
        if let Some(path) = path {
            self.database_path = Some(path.as_ref().to_path_buf());
        }
        self
    }

    /// Uses an already opened store instead of a database file.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Bounds the default worker pool. Ignored when an executor is injected.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_executor(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_router(mut self, router: Arc<dyn ModelRouter>) -> Self {
        self.router = Some(router);
        self
    }

    pub fn with_step_runner(mut self, runner: Arc<dyn StepRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn with_event_bus(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Builds the manager and starts its executor.
    ///
    /// # Errors
    ///
    /// Returns `OrchestrationError::Configuration` if the router or the step
    /// runner is missing, `OrchestrationError::InvalidInput` for a zero
    /// worker count, `OrchestrationError::FileSystem` if the database
    /// directory cannot be created and `OrchestrationError::Database` if
    /// database initialization fails.
    pub async fn build(self) -> Result<PlanManager> {
        let router = self.router.ok_or_else(|| OrchestrationError::Configuration {
            message: "a model router is required".to_string(),
        })?;
        let runner = self.runner.ok_or_else(|| OrchestrationError::Configuration {
            message: "a step runner is required".to_string(),
        })?;

        let executor: Arc<dyn TaskExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(WorkerPool::new(self.max_workers)?),
        };

        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => Arc::new(Self::open_database(self.database_path).await?),
        };

        executor.start()?;

        let events = self
            .events
            .unwrap_or_else(|| Arc::new(NoopEventBus) as Arc<dyn EventBus>);

        Ok(PlanManager::new(Engine::new(
            store, executor, router, runner, events,
        )))
    }

    async fn open_database(path: Option<PathBuf>) -> Result<Database> {
        let db_path = match path {
            Some(path) => path,
            None => Self::default_database_path()?,
        };

        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| OrchestrationError::FileSystem {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        debug!("Opening database at {}", db_path.display());
        task::spawn_blocking(move || Database::new(&db_path))
            .await
            .map_err(|e| OrchestrationError::Configuration {
                message: format!("Task join error: {e}"),
            })?
    }

    /// Returns the default database path following XDG Base Directory
    /// specification.
    fn default_database_path() -> Result<PathBuf> {
        xdg::BaseDirectories::with_prefix("cadence")
            .place_data_file("cadence.db")
            .map_err(|e| OrchestrationError::XdgDirectory(e.to_string()))
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
