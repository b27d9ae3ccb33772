//! Audit trail records.

use std::str::FromStr;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::Metadata;

/// Metadata key linking a step entry back to its plan.
pub const PLAN_ID_KEY: &str = "plan_id";

/// Kind of entity a history entry describes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Plan,
    Task,
    Step,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Plan => "plan",
            EntityType::Task => "task",
            EntityType::Step => "step",
        }
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plan" => Ok(EntityType::Plan),
            "task" => Ok(EntityType::Task),
            "step" => Ok(EntityType::Step),
            _ => Err(format!("Invalid entity type: {s}")),
        }
    }
}

/// What happened to the entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Create,
    Execute,
    Cancel,
    Retry,
    Error,
    StatusChange,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Create => "create",
            HistoryAction::Execute => "execute",
            HistoryAction::Cancel => "cancel",
            HistoryAction::Retry => "retry",
            HistoryAction::Error => "error",
            HistoryAction::StatusChange => "status_change",
        }
    }
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(HistoryAction::Create),
            "execute" => Ok(HistoryAction::Execute),
            "cancel" => Ok(HistoryAction::Cancel),
            "retry" => Ok(HistoryAction::Retry),
            "error" => Ok(HistoryAction::Error),
            "status_change" => Ok(HistoryAction::StatusChange),
            _ => Err(format!("Invalid history action: {s}")),
        }
    }
}

/// Immutable, append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: Timestamp,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: HistoryAction,
    pub details: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl HistoryEntry {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        action: HistoryAction,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Timestamp::now(),
            entity_type,
            entity_id: entity_id.into(),
            action,
            details: details.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attaches a metadata value, consuming and returning the entry.
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}
