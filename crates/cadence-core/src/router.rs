//! Model router contract: turns a goal into step descriptors.
//!
//! Routers talk to LLM providers in real deployments; the core only needs
//! the resulting step list and the provider tag. Routing runs on an executor
//! worker thread, so implementations may block.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::PlanStep;

/// One step as described by the router, before it becomes a [`PlanStep`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StepDescriptor {
    /// Optional id; generated when missing or duplicated
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub challenges: Vec<String>,
    #[serde(default)]
    pub mitigations: Vec<String>,
}

impl StepDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Steps produced for a goal, tagged with the backend that produced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutedPlan {
    pub provider: String,
    pub steps: Vec<StepDescriptor>,
}

impl RoutedPlan {
    /// Converts the descriptors into pending plan steps, assigning ids where
    /// a descriptor has none or repeats an earlier one.
    pub fn into_steps(self) -> Vec<PlanStep> {
        let mut seen = HashSet::new();
        self.steps
            .into_iter()
            .map(|descriptor| {
                let id = match descriptor.id {
                    Some(id) if !id.is_empty() && !seen.contains(&id) => id,
                    _ => uuid::Uuid::new_v4().to_string(),
                };
                seen.insert(id.clone());

                let mut step = PlanStep::new(id, descriptor.name, descriptor.description);
                step.inputs = descriptor.inputs;
                step.outputs = descriptor.outputs;
                step.challenges = descriptor.challenges;
                step.mitigations = descriptor.mitigations;
                step
            })
            .collect()
    }
}

/// Failure reported by a router backend.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{provider}: {message}")]
pub struct RoutingError {
    pub provider: String,
    pub message: String,
}

impl RoutingError {
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Goal → steps generator.
pub trait ModelRouter: Send + Sync {
    fn route_plan_creation(&self, goal: &str) -> Result<RoutedPlan, RoutingError>;
}

/// Router that answers every goal with the same steps.
#[derive(Debug, Clone)]
pub struct StaticRouter {
    provider: String,
    steps: Vec<StepDescriptor>,
}

impl StaticRouter {
    pub fn new(provider: impl Into<String>, steps: Vec<StepDescriptor>) -> Self {
        Self {
            provider: provider.into(),
            steps,
        }
    }
}

impl ModelRouter for StaticRouter {
    fn route_plan_creation(&self, _goal: &str) -> Result<RoutedPlan, RoutingError> {
        Ok(RoutedPlan {
            provider: self.provider.clone(),
            steps: self.steps.clone(),
        })
    }
}

impl<F> ModelRouter for F
where
    F: Fn(&str) -> Result<RoutedPlan, RoutingError> + Send + Sync,
{
    fn route_plan_creation(&self, goal: &str) -> Result<RoutedPlan, RoutingError> {
        self(goal)
    }
}
