//! Shell-command adapters for the model router and the step runner.
//!
//! Both run a user supplied command through `sh -c`. The router writes the
//! goal to the command's stdin and reads step descriptors back from stdout;
//! the step runner exposes the step through `CADENCE_*` environment variables
//! and its JSON form on stdin.

use std::{
    io::Write,
    process::{Command, Output, Stdio},
    thread,
};

use cadence_core::{
    executor::WorkResult, models::PlanStep, ModelRouter, Plan, RoutedPlan, RoutingError,
    StepDescriptor, StepRunner,
};
use log::debug;
use serde::Deserialize;
use serde_json::json;

/// Provider name reported for plans generated by [`CommandRouter`].
const COMMAND_PROVIDER: &str = "command";

/// Step descriptors as printed by a router command: either wrapped in an
/// object, optionally naming the provider, or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RouterOutput {
    Wrapped {
        provider: Option<String>,
        steps: Vec<StepDescriptor>,
    },
    Bare(Vec<StepDescriptor>),
}

/// Generates plan steps by running an external command.
pub struct CommandRouter {
    command: Option<String>,
}

impl CommandRouter {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl ModelRouter for CommandRouter {
    fn route_plan_creation(&self, goal: &str) -> Result<RoutedPlan, RoutingError> {
        let failure = |message: String| RoutingError::new(COMMAND_PROVIDER, message);
        let command = self.command.as_deref().ok_or_else(|| {
            failure(
                "no router command configured; set --router-command or CADENCE_ROUTER_COMMAND"
                    .to_string(),
            )
        })?;

        let output = run_shell(command, &[], goal).map_err(failure)?;
        if !output.status.success() {
            return Err(failure(exit_message(command, &output)));
        }

        let parsed: RouterOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| failure(format!("router command printed invalid steps: {e}")))?;
        let (provider, steps) = match parsed {
            RouterOutput::Wrapped { provider, steps } => {
                (provider.unwrap_or_else(|| COMMAND_PROVIDER.to_string()), steps)
            }
            RouterOutput::Bare(steps) => (COMMAND_PROVIDER.to_string(), steps),
        };
        if steps.is_empty() {
            return Err(failure("router command produced no steps".to_string()));
        }
        debug!("Router command produced {} steps", steps.len());
        Ok(RoutedPlan { provider, steps })
    }
}

/// Runs each plan step as an external command.
pub struct CommandStepRunner {
    command: Option<String>,
}

impl CommandStepRunner {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

impl StepRunner for CommandStepRunner {
    fn run_step(&self, plan: &Plan, step: &PlanStep) -> WorkResult {
        let command = self.command.as_deref().ok_or_else(|| {
            "no step command configured; set --step-command or CADENCE_STEP_COMMAND".to_string()
        })?;
        let input = serde_json::to_string(step).map_err(|e| e.to_string())?;
        let env = [
            ("CADENCE_PLAN_ID", plan.id.as_str()),
            ("CADENCE_GOAL", plan.goal.as_str()),
            ("CADENCE_STEP_ID", step.id.as_str()),
            ("CADENCE_STEP_NAME", step.name.as_str()),
            ("CADENCE_STEP_DESCRIPTION", step.description.as_str()),
        ];
        debug!("Running step {} of plan {}", step.id, plan.id);
        command_result(command, &env, &input)
    }
}

/// Runs a command and turns a zero exit status into a `{stdout, exit_code}`
/// result. Used for steps and for standalone tasks.
pub fn command_result(command: &str, env: &[(&str, &str)], input: &str) -> WorkResult {
    let output = run_shell(command, env, input)?;
    if !output.status.success() {
        return Err(exit_message(command, &output));
    }
    Ok(json!({
        "stdout": String::from_utf8_lossy(&output.stdout).trim_end(),
        "exit_code": output.status.code().unwrap_or(0),
    }))
}

fn run_shell(command: &str, env: &[(&str, &str)], input: &str) -> Result<Output, String> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to spawn `{command}`: {e}"))?;

    let stdin = child.stdin.take();
    // stdin is fed while the output is drained so large echoes cannot fill
    // both pipes
    thread::scope(|scope| {
        if let Some(mut stdin) = stdin {
            scope.spawn(move || {
                // a command that ignores its input may exit before reading it
                if let Err(e) = stdin.write_all(input.as_bytes()) {
                    debug!("Could not write stdin of `{command}`: {e}");
                }
            });
        }

        child
            .wait_with_output()
            .map_err(|e| format!("failed to wait for `{command}`: {e}"))
    })
}

fn exit_message(command: &str, output: &Output) -> String {
    let code = output
        .status
        .code()
        .map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("`{command}` exited with {code}")
    } else {
        format!("`{command}` exited with {code}: {stderr}")
    }
}
