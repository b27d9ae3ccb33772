mod common;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use cadence_core::{
    models::{HistoryFilter, Metadata},
    params::{CreatePlan, CreateTask, ExecutePlan, Id, ListPlans, RetryStep, ShowHistory},
    BroadcastEventBus, EntityType, EventKind, HistoryAction, ManagerBuilder, OrchestrationError,
    PlanStatus, RoutedPlan, RoutingError, StepStatus, TaskStatus, WorkOutcome,
};
use common::{
    create_manual_manager, create_ready_plan, create_test_manager, wait_for_plan,
    wait_for_task, wait_until, widget_router, ScriptedRunner,
};
use serde_json::json;
use tempfile::TempDir;

fn execute(plan_id: &str) -> ExecutePlan {
    ExecutePlan {
        plan_id: plan_id.to_string(),
        user_id: None,
    }
}

fn goal(goal: &str) -> CreatePlan {
    CreatePlan {
        goal: goal.to_string(),
        user_id: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_plan_runs_to_completion() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager) = create_test_manager(runner.clone()).await;

    let plan = create_ready_plan(&manager).await;
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.provider.as_deref(), Some("static"));
    assert!(plan.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert!(plan.metadata.contains_key("generation_latency_ms"));

    let started = manager
        .execute_plan(&execute(&plan.id))
        .await
        .expect("Failed to execute plan");
    assert_eq!(started.status, PlanStatus::Executing);
    assert_eq!(started.current_step_index, Some(0));
    assert!(started.started_at.is_some());

    let done = wait_for_plan(&manager, &plan.id, PlanStatus::Completed).await;
    assert_eq!(done.progress(), 100.0);
    assert_eq!(done.current_step_index, Some(2));
    assert!(done.steps.iter().all(|s| s.status == StepStatus::Succeeded));
    assert_eq!(done.steps[1].result["step"], json!("Build"));
    assert!(done.duration().is_some());
    assert!(done.completed_at.is_some());
    assert_eq!(runner.calls(), vec!["s1", "s2"]);

    let id = Id::from(plan.id.as_str());
    assert_eq!(manager.get_plan_progress(&id).await.unwrap(), 100.0);
    assert!(manager.get_plan_duration(&id).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_step_fails_plan() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.fail_on("s2");
    let (_temp_dir, manager) = create_test_manager(runner.clone()).await;

    let plan = create_ready_plan(&manager).await;
    manager
        .execute_plan(&execute(&plan.id))
        .await
        .expect("Failed to execute plan");

    let failed = wait_for_plan(&manager, &plan.id, PlanStatus::Failed).await;
    assert_eq!(failed.steps[0].status, StepStatus::Succeeded);
    assert_eq!(failed.steps[1].status, StepStatus::Failed);
    assert_eq!(failed.steps[1].error.as_deref(), Some("Build exploded"));
    let error = failed.error.clone().expect("plan error recorded");
    assert!(error.contains("s2"), "error should name the step: {error}");
    assert_eq!(failed.current_step_index, Some(1));
    assert_eq!(failed.progress(), 100.0);

    // nothing runs after a failure
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(runner.calls(), vec!["s1", "s2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_while_step_running() {
    let (runner, release) = ScriptedRunner::gated();
    let runner = Arc::new(runner);
    let (_temp_dir, manager) = create_test_manager(runner.clone()).await;

    let plan = create_ready_plan(&manager).await;
    manager
        .execute_plan(&execute(&plan.id))
        .await
        .expect("Failed to execute plan");

    let calls = &runner;
    wait_until(
        "step s1 to start",
        || async move { Some(calls.calls()) },
        |calls: &Vec<String>| calls.len() == 1,
    )
    .await;

    let id = Id::from(plan.id.as_str());
    assert!(manager.cancel_plan(&id).await.expect("Failed to cancel"));

    let cancelled = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(cancelled.status, PlanStatus::Cancelled);
    assert_eq!(cancelled.steps[0].status, StepStatus::Skipped);
    assert!(cancelled.steps[0].completed_at.is_some());
    assert!(cancelled.completed_at.is_some());

    // let the in-flight step finish; its result must be ignored
    release.send(()).expect("runner waiting");
    tokio::time::sleep(Duration::from_millis(200)).await;

    let after = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(after.status, PlanStatus::Cancelled);
    assert_eq!(after.steps[0].status, StepStatus::Skipped);
    assert_eq!(after.steps[1].status, StepStatus::Pending);
    assert_eq!(runner.calls(), vec!["s1"]);

    assert!(!manager.cancel_plan(&id).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_resumes_from_failed_step() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.fail_on("s2");
    let (_temp_dir, manager, executor) = create_manual_manager(runner.clone()).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    executor.run_next().expect("generation queued");
    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    executor.run_next().expect("s1 queued");
    executor.run_next().expect("s2 queued");

    let id = Id::from(plan.id.as_str());
    let failed = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, PlanStatus::Failed);
    let s1_finished = failed.steps[0].completed_at;

    runner.heal("s2");
    let retried = manager
        .retry_failed_step(&RetryStep {
            plan_id: plan.id.clone(),
            step_id: "s2".to_string(),
        })
        .await
        .expect("Failed to retry");
    assert!(retried);

    let resumed = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(resumed.status, PlanStatus::Executing);
    assert_eq!(resumed.current_step_index, Some(1));
    assert!(resumed.error.is_none());
    assert!(resumed.completed_at.is_none());
    assert_eq!(resumed.steps[0].status, StepStatus::Succeeded);
    assert_eq!(resumed.steps[0].completed_at, s1_finished);
    assert_eq!(resumed.steps[1].status, StepStatus::Running);
    assert!(resumed.steps[1].error.is_none());
    assert_eq!(
        executor.pending(),
        vec![format!("plan:{}:step:s2", plan.id)]
    );

    executor.run_next().expect("retried s2 queued");
    let done = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(done.status, PlanStatus::Completed);
    assert_eq!(runner.calls(), vec!["s1", "s2", "s2"]);

    let history = manager
        .get_plan_history(&ShowHistory {
            id: plan.id.clone(),
            limit: None,
        })
        .await
        .unwrap();
    assert!(history
        .iter()
        .any(|e| e.entity_type == EntityType::Step && e.action == HistoryAction::Retry));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_requires_failed_plan_and_known_step() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.fail_on("s1");
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    executor.run_next();

    let retry = |step_id: &str| RetryStep {
        plan_id: plan.id.clone(),
        step_id: step_id.to_string(),
    };
    let err = manager.retry_failed_step(&retry("s1")).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::InvalidPlanState {
            status: PlanStatus::Ready,
            ..
        }
    ));

    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    executor.run_next();
    assert!(!manager.retry_failed_step(&retry("nope")).await.unwrap());

    let unknown = manager
        .retry_failed_step(&RetryStep {
            plan_id: "missing".to_string(),
            step_id: "s1".to_string(),
        })
        .await;
    assert!(matches!(unknown, Err(OrchestrationError::PlanNotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_retry_cannot_skip_the_failed_step() {
    let runner = Arc::new(ScriptedRunner::new());
    runner.fail_on("s1");
    let (_temp_dir, manager, executor) = create_manual_manager(runner.clone()).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    executor.run_next();
    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    executor.run_next().expect("s1 queued");

    let err = manager
        .retry_failed_step(&RetryStep {
            plan_id: plan.id.clone(),
            step_id: "s2".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestrationError::InvalidInput { .. }));

    let id = Id::from(plan.id.as_str());
    let unchanged = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PlanStatus::Failed);
    assert_eq!(unchanged.steps[0].status, StepStatus::Failed);
    assert_eq!(unchanged.steps[1].status, StepStatus::Pending);
    assert!(unchanged.progress() < 100.0);
    assert!(executor.pending().is_empty());
    assert_eq!(runner.calls(), vec!["s1"]);

    runner.heal("s1");
    assert!(manager
        .retry_failed_step(&RetryStep {
            plan_id: plan.id.clone(),
            step_id: "s1".to_string(),
        })
        .await
        .unwrap());
    executor.run_next().expect("retried s1 queued");
    executor.run_next().expect("s2 queued");
    let done = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(done.status, PlanStatus::Completed);
    assert_eq!(runner.calls(), vec!["s1", "s1", "s2"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stale_step_result_after_cancel_is_ignored() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    executor.run_next();
    manager.execute_plan(&execute(&plan.id)).await.unwrap();

    let (task_id, work, on_complete) = executor.take_next().expect("s1 queued");
    let id = Id::from(plan.id.as_str());
    assert!(manager.cancel_plan(&id).await.unwrap());

    let result = work().expect("runner succeeds");
    on_complete(WorkOutcome::Succeeded {
        task_id,
        result,
        elapsed: Duration::from_millis(5),
    });

    let plan = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert_eq!(plan.steps[0].status, StepStatus::Skipped);
    assert_eq!(plan.current_step_index, Some(0));
    assert!(executor.pending().is_empty(), "s2 must never be submitted");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_during_planning_discards_generation() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    let id = Id::from(plan.id.as_str());
    assert!(manager.cancel_plan(&id).await.unwrap());

    executor.run_next().expect("generation queued");
    let plan = manager.get_plan(&id).await.unwrap().unwrap();
    assert_eq!(plan.status, PlanStatus::Cancelled);
    assert!(plan.steps.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_requires_ready_plan() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    let err = manager.execute_plan(&execute(&plan.id)).await.unwrap_err();
    assert!(matches!(
        err,
        OrchestrationError::InvalidPlanState {
            status: PlanStatus::Planning,
            operation: "execute",
            ..
        }
    ));
    assert!(err.is_invocation_error());

    executor.run_next();
    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    let again = manager.execute_plan(&execute(&plan.id)).await;
    assert!(matches!(
        again,
        Err(OrchestrationError::InvalidPlanState {
            status: PlanStatus::Executing,
            ..
        })
    ));

    let missing = manager.execute_plan(&execute("missing")).await;
    assert!(matches!(missing, Err(OrchestrationError::PlanNotFound { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_generation_failure_marks_plan_failed() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let router = |_: &str| -> Result<RoutedPlan, RoutingError> {
        Err(RoutingError::new("flaky", "rate limited"))
    };
    let manager = ManagerBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_router(Arc::new(router))
        .with_step_runner(Arc::new(ScriptedRunner::new()))
        .build()
        .await
        .expect("Failed to create manager");

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    let failed = wait_for_plan(&manager, &plan.id, PlanStatus::Failed).await;
    let error = failed.error.expect("generation error recorded");
    assert!(error.contains("flaky: rate limited"), "{error}");
    assert!(failed.steps.is_empty());

    let history = manager
        .get_plan_history(&ShowHistory {
            id: plan.id,
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(history[0].action, HistoryAction::Error);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_generation_fails_plan() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;
    executor.reject_submissions();

    let err = manager.create_plan(&goal("build widget")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Executor { .. }));

    let plans = manager.get_plans(&ListPlans::default()).await.unwrap();
    assert_eq!(plans.len(), 1);
    assert_eq!(plans[0].status, PlanStatus::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_empty_goal_rejected() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let err = manager.create_plan(&goal("   ")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::InvalidInput { .. }));
    assert!(executor.pending().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_active_plans() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let ready = manager.create_plan(&goal("ready")).await.unwrap();
    executor.run_next();

    let executing = manager.create_plan(&goal("executing")).await.unwrap();
    executor.run_next();
    manager.execute_plan(&execute(&executing.id)).await.unwrap();

    let cancelled = manager.create_plan(&goal("cancelled")).await.unwrap();
    manager
        .cancel_plan(&Id::from(cancelled.id.as_str()))
        .await
        .unwrap();

    let planning = manager.create_plan(&goal("planning")).await.unwrap();

    let mut active: Vec<_> = manager
        .get_active_plans()
        .await
        .unwrap()
        .into_iter()
        .map(|p| (p.id, p.status))
        .collect();
    active.sort_by(|a, b| a.0.cmp(&b.0));

    let mut expected = vec![
        (ready.id, PlanStatus::Ready),
        (executing.id, PlanStatus::Executing),
        (planning.id, PlanStatus::Planning),
    ];
    expected.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(active, expected);

    let cancelled_only = manager
        .get_plans(&ListPlans {
            status: Some(PlanStatus::Cancelled),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(cancelled_only.len(), 1);
    assert_eq!(cancelled_only[0].goal, "cancelled");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_plan_history_is_recorded() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager) = create_test_manager(runner).await;

    let plan = create_ready_plan(&manager).await;
    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    wait_for_plan(&manager, &plan.id, PlanStatus::Completed).await;

    let history = manager
        .get_plan_history(&ShowHistory {
            id: plan.id.clone(),
            limit: None,
        })
        .await
        .unwrap();

    // newest first
    assert_eq!(history[0].entity_type, EntityType::Plan);
    assert_eq!(history[0].action, HistoryAction::StatusChange);
    assert!(history[0].details.contains("completed"));
    assert_eq!(history.last().unwrap().action, HistoryAction::Create);

    let plan_actions: Vec<_> = history
        .iter()
        .filter(|e| e.entity_type == EntityType::Plan)
        .map(|e| e.action)
        .collect();
    assert_eq!(
        plan_actions,
        vec![
            HistoryAction::StatusChange,
            HistoryAction::Execute,
            HistoryAction::StatusChange,
            HistoryAction::Create,
        ]
    );
    // two entries per step: started and succeeded
    assert_eq!(
        history
            .iter()
            .filter(|e| e.entity_type == EntityType::Step)
            .count(),
        4
    );

    let limited = manager
        .get_plan_history(&ShowHistory {
            id: plan.id.clone(),
            limit: Some(2),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);

    let step_entries = manager
        .get_history(HistoryFilter {
            entity_type: Some(EntityType::Step),
            entity_id: Some("s1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(step_entries.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lifecycle_events_are_published() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let bus = BroadcastEventBus::default();
    let mut events = bus.subscribe();
    let manager = ManagerBuilder::new()
        .with_database_path(Some(temp_dir.path().join("test.db")))
        .with_router(Arc::new(widget_router()))
        .with_step_runner(Arc::new(ScriptedRunner::new()))
        .with_event_bus(Arc::new(bus))
        .build()
        .await
        .expect("Failed to create manager");

    let plan = create_ready_plan(&manager).await;
    manager.execute_plan(&execute(&plan.id)).await.unwrap();
    wait_for_plan(&manager, &plan.id, PlanStatus::Completed).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    let kinds: Vec<_> = received.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::PlanCreated,
            EventKind::PlanReady,
            EventKind::PlanStarted,
            EventKind::PlanCompleted,
        ]
    );
    assert!(received
        .iter()
        .all(|e| e.plan_id.as_deref() == Some(plan.id.as_str())));
    assert_eq!(received[0].user_id.as_deref(), Some("alice"));
    assert_eq!(received[3].status, "completed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_task_lifecycle() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager) = create_test_manager(runner).await;

    let task = manager
        .create_task(&CreateTask {
            description: "lint the repo".to_string(),
            user_id: Some("bob".to_string()),
            ..Default::default()
        })
        .await
        .expect("Failed to create task");
    assert_eq!(task.status, TaskStatus::Created);
    assert_eq!(task.user_id(), Some("bob"));

    let id = Id::from(task.id.as_str());
    let queued = manager
        .submit_task(&id, Box::new(|| Ok(json!({"warnings": 0}))))
        .await
        .expect("Failed to submit task");
    assert_eq!(queued.status, TaskStatus::Pending);

    let done = wait_for_task(&manager, &task.id).await;
    assert_eq!(done.status, TaskStatus::Succeeded);
    assert_eq!(done.result, Some(json!({"warnings": 0})));
    assert!(done.started_at.is_some());
    assert!(done.duration().is_some());

    let again = manager.submit_task(&id, Box::new(|| Ok(json!(null)))).await;
    assert!(matches!(
        again,
        Err(OrchestrationError::InvalidTaskState {
            status: TaskStatus::Succeeded,
            ..
        })
    ));
    assert!(!manager.cancel_task(&id).await.unwrap());

    let history = manager
        .get_task_history(&ShowHistory {
            id: task.id.clone(),
            limit: None,
        })
        .await
        .unwrap();
    let actions: Vec<_> = history.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::StatusChange,
            HistoryAction::StatusChange,
            HistoryAction::Execute,
            HistoryAction::Create,
        ]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_task() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager) = create_test_manager(runner).await;

    let task = manager
        .create_task(&CreateTask {
            description: "flaky".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    manager
        .submit_task(
            &Id::from(task.id.as_str()),
            Box::new(|| Err("network unreachable".to_string())),
        )
        .await
        .unwrap();

    let failed = wait_for_task(&manager, &task.id).await;
    assert_eq!(failed.status, TaskStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("network unreachable"));
    assert!(failed.result.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancelled_task_work_never_runs() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let task = manager
        .create_task(&CreateTask {
            description: "slow job".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let id = Id::from(task.id.as_str());

    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    manager
        .submit_task(
            &id,
            Box::new(move || {
                flag.store(true, Ordering::SeqCst);
                Ok(json!(null))
            }),
        )
        .await
        .unwrap();

    assert!(manager.cancel_task(&id).await.unwrap());
    executor.run_next().expect("task queued");

    assert!(!ran.load(Ordering::SeqCst));
    let task = manager.get_task(&id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Cancelled);
    assert!(task.started_at.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_plan_linked_tasks() {
    let runner = Arc::new(ScriptedRunner::new());
    let (_temp_dir, manager, executor) = create_manual_manager(runner).await;

    let plan = manager.create_plan(&goal("build widget")).await.unwrap();
    executor.run_next();

    let mut metadata = Metadata::new();
    metadata.insert("priority".to_string(), json!("high"));
    let linked = manager
        .create_task(&CreateTask {
            description: "review design".to_string(),
            plan_id: Some(plan.id.clone()),
            step_id: Some("s1".to_string()),
            environment_id: Some("staging".to_string()),
            metadata,
            ..Default::default()
        })
        .await
        .unwrap();
    manager
        .create_task(&CreateTask {
            description: "unrelated".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    let plan_tasks = manager
        .get_plan_tasks(&Id::from(plan.id.as_str()))
        .await
        .unwrap();
    assert_eq!(plan_tasks.len(), 1);
    assert_eq!(plan_tasks[0].id, linked.id);
    assert_eq!(plan_tasks[0].metadata["priority"], json!("high"));
    assert_eq!(plan_tasks[0].environment_id.as_deref(), Some("staging"));

    let active = manager.get_active_tasks(Some(plan.id.as_str())).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(manager.get_active_tasks(None).await.unwrap().len(), 2);

    // task entries tied to a plan show up in the plan's history
    let history = manager
        .get_plan_history(&ShowHistory {
            id: plan.id.clone(),
            limit: None,
        })
        .await
        .unwrap();
    assert!(history.iter().any(|e| e.entity_type == EntityType::Task));

    let missing_plan = manager
        .create_task(&CreateTask {
            description: "orphan".to_string(),
            plan_id: Some("missing".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(
        missing_plan,
        Err(OrchestrationError::PlanNotFound { .. })
    ));

    let step_without_plan = manager
        .create_task(&CreateTask {
            description: "orphan step".to_string(),
            step_id: Some("s1".to_string()),
            ..Default::default()
        })
        .await;
    assert!(matches!(
        step_without_plan,
        Err(OrchestrationError::InvalidInput { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reopened_database_keeps_state() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("persist.db");
    let runner = Arc::new(ScriptedRunner::new());

    let plan_id = {
        let manager = ManagerBuilder::new()
            .with_database_path(Some(&db_path))
            .with_router(Arc::new(widget_router()))
            .with_step_runner(runner.clone())
            .build()
            .await
            .unwrap();
        let plan = create_ready_plan(&manager).await;
        manager.shutdown().await.unwrap();
        plan.id
    };

    let manager = ManagerBuilder::new()
        .with_database_path(Some(&db_path))
        .with_router(Arc::new(widget_router()))
        .with_step_runner(runner)
        .build()
        .await
        .unwrap();
    let plan = manager
        .get_plan(&Id::from(plan_id.as_str()))
        .await
        .unwrap()
        .expect("plan persisted");
    assert_eq!(plan.status, PlanStatus::Ready);
    assert_eq!(plan.steps.len(), 2);
    assert_eq!(plan.user_id(), Some("alice"));
}
