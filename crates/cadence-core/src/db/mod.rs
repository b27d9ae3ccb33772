//! SQLite implementation of the [`StateStore`] contract.
//!
//! This module handles the connection, schema management and the queries
//! behind plans, tasks and the history table. A single connection is shared
//! behind a mutex. Each store call is a short synchronous transaction, which
//! is safe to make from executor worker threads.

use std::{path::Path, time::Duration};

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::{
    error::{DatabaseResultExt, OrchestrationError, Result},
    models::{HistoryEntry, HistoryFilter, Plan, PlanFilter, Task, TaskFilter},
    store::StateStore,
};

mod history_queries;
mod migrations;
mod plan_queries;
mod task_queries;
mod utils;

/// How long a statement waits on a lock held by another connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection and operations handler.
pub struct Database {
    connection: Mutex<Option<Connection>>,
}

impl Database {
    /// Opens (or creates) a database file and initializes the schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path).db_context("Failed to open database connection")?;
        Self::from_connection(connection)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().db_context("Failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection
            .busy_timeout(BUSY_TIMEOUT)
            .db_context("Failed to set busy timeout")?;
        migrations::initialize_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(Some(connection)),
        })
    }

    fn with_connection<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.connection.lock();
        let connection = guard.as_mut().ok_or(OrchestrationError::StoreClosed)?;
        f(connection)
    }
}

impl StateStore for Database {
    fn save_plan(&self, plan: &Plan) -> Result<()> {
        self.with_connection(|conn| plan_queries::save_plan(conn, plan))
    }

    fn get_plan(&self, id: &str) -> Result<Option<Plan>> {
        self.with_connection(|conn| plan_queries::get_plan(conn, id))
    }

    fn get_plans(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        self.with_connection(|conn| plan_queries::get_plans(conn, filter))
    }

    fn get_active_plans(&self) -> Result<Vec<Plan>> {
        self.with_connection(|conn| plan_queries::get_active_plans(conn))
    }

    fn save_task(&self, task: &Task) -> Result<()> {
        self.with_connection(|conn| task_queries::save_task(conn, task))
    }

    fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.with_connection(|conn| task_queries::get_task(conn, id))
    }

    fn get_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.with_connection(|conn| task_queries::get_tasks(conn, filter))
    }

    fn get_active_tasks(&self, plan_id: Option<&str>) -> Result<Vec<Task>> {
        self.with_connection(|conn| task_queries::get_active_tasks(conn, plan_id))
    }

    fn get_plan_tasks(&self, plan_id: &str) -> Result<Vec<Task>> {
        self.with_connection(|conn| task_queries::get_plan_tasks(conn, plan_id))
    }

    fn add_history_entry(&self, entry: &HistoryEntry) -> Result<bool> {
        self.with_connection(|conn| history_queries::add_history_entry(conn, entry))
    }

    fn get_history(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| history_queries::get_history(conn, filter))
    }

    fn get_plan_history(&self, plan_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| history_queries::get_plan_history(conn, plan_id, limit))
    }

    fn get_task_history(&self, task_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        self.with_connection(|conn| history_queries::get_task_history(conn, task_id, limit))
    }

    fn close(&self) -> Result<()> {
        match self.connection.lock().take() {
            Some(connection) => connection
                .close()
                .map_err(|(_, e)| OrchestrationError::database("Failed to close database").with_source(e)),
            None => Ok(()),
        }
    }
}
