//! Lifecycle event bus.
//!
//! The plan manager publishes a [`LifecycleEvent`] after each committed state
//! change. Publishing is fire-and-forget: it never blocks and never fails the
//! operation that triggered it.

use std::fmt;

use jiff::Timestamp;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity used by [`BroadcastEventBus::default`].
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// What happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    PlanCreated,
    PlanReady,
    PlanStarted,
    PlanCompleted,
    PlanFailed,
    PlanCancelled,
    TaskCreated,
    TaskStarted,
    TaskCompleted,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PlanCreated => "PLAN_CREATED",
            EventKind::PlanReady => "PLAN_READY",
            EventKind::PlanStarted => "PLAN_STARTED",
            EventKind::PlanCompleted => "PLAN_COMPLETED",
            EventKind::PlanFailed => "PLAN_FAILED",
            EventKind::PlanCancelled => "PLAN_CANCELLED",
            EventKind::TaskCreated => "TASK_CREATED",
            EventKind::TaskStarted => "TASK_STARTED",
            EventKind::TaskCompleted => "TASK_COMPLETED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification about a plan or task state change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub plan_id: Option<String>,
    pub step_id: Option<String>,
    pub task_id: Option<String>,
    pub user_id: Option<String>,
    /// Status of the plan or task after the change
    pub status: String,
    pub timestamp: Timestamp,
}

impl LifecycleEvent {
    /// Event about a plan.
    pub fn plan(
        kind: EventKind,
        plan_id: impl Into<String>,
        status: impl ToString,
        user_id: Option<&str>,
    ) -> Self {
        Self {
            kind,
            plan_id: Some(plan_id.into()),
            step_id: None,
            task_id: None,
            user_id: user_id.map(String::from),
            status: status.to_string(),
            timestamp: Timestamp::now(),
        }
    }

    /// Event about a task, linked to its plan and step when it has them.
    pub fn task(kind: EventKind, task: &crate::models::Task) -> Self {
        Self {
            kind,
            plan_id: task.plan_id.clone(),
            step_id: task.step_id.clone(),
            task_id: Some(task.id.clone()),
            user_id: task.user_id().map(String::from),
            status: task.status.to_string(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_step(mut self, step_id: impl Into<String>) -> Self {
        self.step_id = Some(step_id.into());
        self
    }
}

/// Outbound sink for lifecycle events.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: LifecycleEvent);
}

/// Bus that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventBus;

impl EventBus for NoopEventBus {
    fn publish(&self, _event: LifecycleEvent) {}
}

/// Bus backed by a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events rather than holding back
/// the publisher.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<LifecycleEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: LifecycleEvent) {
        // an error only means nobody is listening
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!("No subscribers for {} event", event.kind);
        }
    }
}
