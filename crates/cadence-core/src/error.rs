//! Error types for the orchestration engine.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::{EntityType, PlanStatus, TaskStatus};

/// Comprehensive error type for all orchestration operations.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    /// Database connection or query errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: rusqlite::Error,
    },
    /// The state store was closed and can no longer serve requests
    #[error("State store is closed")]
    StoreClosed,
    /// Plan not found for the given ID
    #[error("Plan with ID {id} not found")]
    PlanNotFound { id: String },
    /// Task not found for the given ID
    #[error("Task with ID {id} not found")]
    TaskNotFound { id: String },
    /// Operation requires the plan to be in a different status
    #[error("Cannot {operation} plan {id}: plan is {status}")]
    InvalidPlanState {
        id: String,
        status: PlanStatus,
        operation: &'static str,
    },
    /// Operation requires the task to be in a different status
    #[error("Cannot {operation} task {id}: task is {status}")]
    InvalidTaskState {
        id: String,
        status: TaskStatus,
        operation: &'static str,
    },
    /// Illegal edge in a status graph
    #[error("Illegal {entity} transition from {from} to {to}")]
    InvalidTransition {
        entity: EntityType,
        from: String,
        to: String,
    },
    /// Unit of work rejected by the task executor
    #[error("Executor error: {message}")]
    Executor { message: String },
    /// File system operation errors
    #[error("File system error at path '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        source: std::io::Error,
    },
    /// XDG directory specification errors
    #[error("XDG directory error: {0}")]
    XdgDirectory(String),
    /// Invalid input validation errors
    #[error("Invalid input for field '{field}': {reason}")]
    InvalidInput { field: String, reason: String },
    /// Serialization/deserialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Builder for creating database errors with optional context.
pub struct DatabaseErrorBuilder {
    message: String,
}

impl DatabaseErrorBuilder {
    /// Create a new database error builder with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error with the given source.
    pub fn with_source(self, source: rusqlite::Error) -> OrchestrationError {
        OrchestrationError::Database {
            message: self.message,
            source,
        }
    }
}

/// Builder for creating input validation errors.
pub struct InvalidInputBuilder {
    field: String,
}

impl InvalidInputBuilder {
    /// Create a new invalid input error builder for a field.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// Build the error with the given reason.
    pub fn with_reason(self, reason: impl Into<String>) -> OrchestrationError {
        OrchestrationError::InvalidInput {
            field: self.field,
            reason: reason.into(),
        }
    }
}

impl OrchestrationError {
    /// Creates a builder for database errors.
    pub fn database(message: impl Into<String>) -> DatabaseErrorBuilder {
        DatabaseErrorBuilder::new(message)
    }

    /// Creates a builder for input validation errors.
    pub fn invalid_input(field: impl Into<String>) -> InvalidInputBuilder {
        InvalidInputBuilder::new(field)
    }

    pub(crate) fn transition(
        entity: EntityType,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Whether the error was raised by the caller operating on a missing
    /// entity or on an entity in the wrong status.
    pub fn is_invocation_error(&self) -> bool {
        matches!(
            self,
            Self::PlanNotFound { .. }
                | Self::TaskNotFound { .. }
                | Self::InvalidPlanState { .. }
                | Self::InvalidTaskState { .. }
                | Self::InvalidInput { .. }
        )
    }
}

/// Specialized extension trait for database-related Results.
pub trait DatabaseResultExt<T> {
    /// Map database errors with a message.
    fn db_context(self, message: &str) -> Result<T>;
}

impl<T> DatabaseResultExt<T> for std::result::Result<T, rusqlite::Error> {
    fn db_context(self, message: &str) -> Result<T> {
        self.map_err(|e| OrchestrationError::database(message).with_source(e))
    }
}

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;
