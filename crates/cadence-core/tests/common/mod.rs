#![allow(dead_code)]

use std::{
    collections::HashSet,
    future::Future,
    sync::{mpsc, Arc, Mutex},
    time::{Duration, Instant},
};

use cadence_core::{
    executor::{Completion, Work, WorkResult},
    params::{CreatePlan, Id},
    ManagerBuilder, OrchestrationError, Plan, PlanManager, PlanStatus, PlanStep, StaticRouter,
    StepDescriptor, StepRunner, Task, TaskExecutor, WorkOutcome,
};
use tempfile::TempDir;

pub const WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(10);

/// Router producing the two-step "build widget" plan used across the tests.
pub fn widget_router() -> StaticRouter {
    StaticRouter::new(
        "static",
        vec![
            StepDescriptor::new("Design", "Sketch the widget").with_id("s1"),
            StepDescriptor::new("Build", "Assemble the widget").with_id("s2"),
        ],
    )
}

/// Step runner whose behavior the test scripts per step id.
#[derive(Default)]
pub struct ScriptedRunner {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Mutex<mpsc::Receiver<()>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner that blocks every step until the returned sender releases it.
    pub fn gated() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let runner = Self {
            gate: Some(Mutex::new(rx)),
            ..Self::default()
        };
        (runner, tx)
    }

    pub fn fail_on(&self, step_id: &str) {
        self.failing.lock().unwrap().insert(step_id.to_string());
    }

    pub fn heal(&self, step_id: &str) {
        self.failing.lock().unwrap().remove(step_id);
    }

    /// Step ids in the order their work started.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl StepRunner for ScriptedRunner {
    fn run_step(&self, plan: &Plan, step: &PlanStep) -> WorkResult {
        self.calls.lock().unwrap().push(step.id.clone());
        if let Some(gate) = &self.gate {
            gate.lock()
                .unwrap()
                .recv_timeout(WAIT)
                .map_err(|_| "gate was never opened".to_string())?;
        }
        if self.failing.lock().unwrap().contains(&step.id) {
            return Err(format!("{} exploded", step.name));
        }
        Ok(serde_json::json!({ "plan": plan.id, "step": step.name }))
    }
}

/// Executor that holds submissions until the test runs them by hand.
#[derive(Default)]
pub struct ManualExecutor {
    queue: Mutex<Vec<(String, Work, Completion)>>,
    rejecting: Mutex<bool>,
}

impl ManualExecutor {
    pub fn reject_submissions(&self) {
        *self.rejecting.lock().unwrap() = true;
    }

    /// Identifiers of the submissions not yet run, oldest first.
    pub fn pending(&self) -> Vec<String> {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _, _)| id.clone())
            .collect()
    }

    /// Takes the oldest submission without running it.
    pub fn take_next(&self) -> Option<(String, Work, Completion)> {
        let mut queue = self.queue.lock().unwrap();
        (!queue.is_empty()).then(|| queue.remove(0))
    }

    /// Runs the oldest submission and delivers its outcome.
    pub fn run_next(&self) -> Option<String> {
        let (task_id, work, on_complete) = self.take_next()?;
        let outcome = match work() {
            Ok(result) => WorkOutcome::Succeeded {
                task_id: task_id.clone(),
                result,
                elapsed: Duration::from_millis(1),
            },
            Err(error) => WorkOutcome::Failed {
                task_id: task_id.clone(),
                error,
            },
        };
        on_complete(outcome);
        Some(task_id)
    }
}

impl TaskExecutor for ManualExecutor {
    fn start(&self) -> cadence_core::Result<()> {
        Ok(())
    }

    fn stop(&self) -> cadence_core::Result<()> {
        Ok(())
    }

    fn submit(
        &self,
        task_id: String,
        work: Work,
        on_complete: Completion,
    ) -> cadence_core::Result<()> {
        if *self.rejecting.lock().unwrap() {
            return Err(OrchestrationError::Executor {
                message: format!("rejected {task_id}"),
            });
        }
        self.queue.lock().unwrap().push((task_id, work, on_complete));
        Ok(())
    }
}

/// Manager on a temporary database with the real worker pool.
pub async fn create_test_manager(runner: Arc<ScriptedRunner>) -> (TempDir, PlanManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ManagerBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_max_workers(2)
        .with_router(Arc::new(widget_router()))
        .with_step_runner(runner)
        .build()
        .await
        .expect("Failed to create manager");
    (temp_dir, manager)
}

/// Manager on a temporary database whose work only runs when the test says.
pub async fn create_manual_manager(
    runner: Arc<ScriptedRunner>,
) -> (TempDir, PlanManager, Arc<ManualExecutor>) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let executor = Arc::new(ManualExecutor::default());
    let manager = ManagerBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_executor(executor.clone())
        .with_router(Arc::new(widget_router()))
        .with_step_runner(runner)
        .build()
        .await
        .expect("Failed to create manager");
    (temp_dir, manager, executor)
}

/// Polls `fetch` until `done` holds, panicking after [`WAIT`].
pub async fn wait_until<T, F, Fut>(what: &str, mut fetch: F, done: impl Fn(&T) -> bool) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(value) = fetch().await {
            if done(&value) {
                return value;
            }
        }
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(POLL).await;
    }
}

pub async fn wait_for_plan(manager: &PlanManager, plan_id: &str, status: PlanStatus) -> Plan {
    let id = &Id::from(plan_id);
    wait_until(
        &format!("plan {plan_id} to become {status}"),
        || async move { manager.get_plan(id).await.expect("Failed to get plan") },
        |plan: &Plan| plan.status == status,
    )
    .await
}

pub async fn wait_for_task(manager: &PlanManager, task_id: &str) -> Task {
    let id = &Id::from(task_id);
    wait_until(
        &format!("task {task_id} to settle"),
        || async move { manager.get_task(id).await.expect("Failed to get task") },
        |task: &Task| task.status.is_terminal(),
    )
    .await
}

/// Creates the widget plan and waits until its steps are generated.
pub async fn create_ready_plan(manager: &PlanManager) -> Plan {
    let plan = manager
        .create_plan(&CreatePlan {
            goal: "build widget".to_string(),
            user_id: Some("alice".to_string()),
        })
        .await
        .expect("Failed to create plan");
    assert_eq!(plan.status, PlanStatus::Planning);
    wait_for_plan(manager, &plan.id, PlanStatus::Ready).await
}
