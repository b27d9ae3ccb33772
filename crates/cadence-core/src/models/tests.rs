#[cfg(test)]
mod model_tests {
    use std::str::FromStr;

    use jiff::{SignedDuration, Timestamp};
    use serde_json::json;

    use crate::{
        error::OrchestrationError,
        models::{
            EntityType, HistoryAction, Metadata, Plan, PlanStatus, PlanStep, StepStatus, Task,
            TaskStatus,
        },
    };

    fn two_step_plan() -> Plan {
        let mut plan = Plan::new("build widget");
        plan.begin_planning().unwrap();
        plan.mark_ready(
            vec![
                PlanStep::new("s1", "Design", "Sketch the widget"),
                PlanStep::new("s2", "Build", "Assemble the widget"),
            ],
            "static",
        )
        .unwrap();
        plan
    }

    #[test]
    fn test_plan_happy_path_transitions() {
        let mut plan = two_step_plan();
        assert_eq!(plan.status, PlanStatus::Ready);
        assert_eq!(plan.provider.as_deref(), Some("static"));
        assert!(plan.completed_at.is_none());

        plan.start().unwrap();
        assert_eq!(plan.status, PlanStatus::Executing);
        assert_eq!(plan.current_step_index, Some(0));
        assert!(plan.started_at.is_some());

        plan.current_step_index = Some(plan.steps.len());
        assert!(plan.all_steps_done());
        plan.complete().unwrap();
        assert_eq!(plan.status, PlanStatus::Completed);
        assert!(plan.completed_at.is_some());
    }

    #[test]
    fn test_terminal_plan_status_is_never_overwritten() {
        let mut plan = two_step_plan();
        plan.start().unwrap();
        plan.complete().unwrap();

        for result in [plan.clone().cancel(), plan.clone().fail("late"), plan.clone().start()] {
            assert!(matches!(
                result,
                Err(OrchestrationError::InvalidTransition {
                    entity: EntityType::Plan,
                    ..
                })
            ));
        }

        let mut cancelled = two_step_plan();
        cancelled.cancel().unwrap();
        assert!(cancelled.complete().is_err());
        assert!(cancelled.reopen_at(0).is_err());
        assert_eq!(cancelled.status, PlanStatus::Cancelled);
    }

    #[test]
    fn test_ready_plan_cannot_skip_to_completed() {
        let mut plan = two_step_plan();
        assert!(plan.complete().is_err());
        assert_eq!(plan.status, PlanStatus::Ready);
    }

    #[test]
    fn test_reopen_failed_plan_at_step() {
        let mut plan = two_step_plan();
        plan.start().unwrap();
        plan.fail("Step s2 failed: boom").unwrap();
        assert!(plan.completed_at.is_some());

        assert!(matches!(
            plan.reopen_at(5),
            Err(OrchestrationError::InvalidInput { .. })
        ));

        plan.reopen_at(1).unwrap();
        assert_eq!(plan.status, PlanStatus::Executing);
        assert_eq!(plan.current_step_index, Some(1));
        assert!(plan.error.is_none());
        assert!(plan.completed_at.is_none());
    }

    #[test]
    fn test_failed_step_position() {
        let mut plan = two_step_plan();
        assert_eq!(plan.failed_step_position(), None);

        plan.start().unwrap();
        plan.steps[0].start().unwrap();
        plan.steps[0].fail("boom").unwrap();
        plan.fail("Step s1 failed: boom").unwrap();
        assert_eq!(plan.failed_step_position(), Some(0));

        plan.steps[0].reset();
        assert_eq!(plan.failed_step_position(), Some(0));
    }

    #[test]
    fn test_progress() {
        assert_eq!(Plan::new("empty").progress(), 0.0);

        let mut plan = two_step_plan();
        plan.start().unwrap();
        assert_eq!(plan.progress(), 0.0);

        plan.steps[0].start().unwrap();
        assert_eq!(plan.progress(), 0.0);
        plan.steps[0].complete(Metadata::new()).unwrap();
        assert_eq!(plan.progress(), 50.0);

        plan.steps[1].skip().unwrap();
        assert_eq!(plan.progress(), 100.0);
    }

    #[test]
    fn test_duration_requires_both_timestamps() {
        let mut plan = two_step_plan();
        assert!(plan.duration().is_none());

        plan.start().unwrap();
        assert!(plan.duration().is_none());

        let started = Timestamp::from_second(1_640_995_200).unwrap();
        plan.started_at = Some(started);
        plan.completed_at = Some(started + SignedDuration::from_secs(90));
        assert_eq!(plan.duration(), Some(SignedDuration::from_secs(90)));
    }

    #[test]
    fn test_step_transitions() {
        let mut step = PlanStep::new("s1", "Design", "");
        assert!(step.complete(Metadata::new()).is_err());

        step.start().unwrap();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.duration().is_none());

        let mut result = Metadata::new();
        result.insert("ok".to_string(), json!(true));
        step.complete(result).unwrap();
        assert_eq!(step.status, StepStatus::Succeeded);
        assert!(step.duration().is_some());
        assert!(step.skip().is_err());
        assert!(step.start().is_err());

        step.reset();
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.result.is_empty());
        assert!(step.started_at.is_none());
        assert!(step.completed_at.is_none());
    }

    #[test]
    fn test_task_transitions() {
        let mut task = Task::new("lint");
        assert_eq!(task.status, TaskStatus::Created);
        assert!(task.complete(json!(null)).is_err());

        task.enqueue().unwrap();
        task.start().unwrap();
        task.complete(json!({"warnings": 0})).unwrap();
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert!(task.cancel().is_err());

        let mut direct = Task::new("direct");
        direct.start().unwrap();
        direct.fail("boom").unwrap();
        assert_eq!(direct.error.as_deref(), Some("boom"));
        assert!(direct.duration().is_some());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(PlanStatus::from_str("EXECUTING"), Ok(PlanStatus::Executing));
        assert_eq!(PlanStatus::from_str("canceled"), Ok(PlanStatus::Cancelled));
        assert!(PlanStatus::from_str("active").is_err());
        assert_eq!(StepStatus::from_str("skipped"), Ok(StepStatus::Skipped));
        assert_eq!(TaskStatus::from_str("pending"), Ok(TaskStatus::Pending));
        assert_eq!(
            HistoryAction::from_str("status_change"),
            Ok(HistoryAction::StatusChange)
        );
        assert_eq!(EntityType::from_str("step"), Ok(EntityType::Step));
    }

    #[test]
    fn test_active_statuses() {
        let active: Vec<_> = [
            PlanStatus::Created,
            PlanStatus::Planning,
            PlanStatus::Ready,
            PlanStatus::Executing,
            PlanStatus::Completed,
            PlanStatus::Failed,
            PlanStatus::Cancelled,
        ]
        .into_iter()
        .filter(PlanStatus::is_active)
        .collect();
        assert_eq!(active, PlanStatus::ACTIVE.to_vec());
    }

    #[test]
    fn test_plan_serializes_status_as_string() {
        let plan = two_step_plan();
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["status"], json!("ready"));
        assert_eq!(value["steps"][0]["status"], json!("pending"));

        let back: Plan = serde_json::from_value(value).unwrap();
        assert_eq!(back, plan);
    }
}
