// tests/workload_runner.rs

use coopsched::exec::{TaskOutcome, run_workload};
use coopsched::{InterruptPolicy, Priority};
use coopsched_test_utils::builders::{TaskSpecBuilder, WorkloadBuilder};
use coopsched_test_utils::{Recorder, init_tracing};

fn resolved(value: &str) -> TaskOutcome {
    TaskOutcome::Resolved(value.to_string())
}

#[tokio::test]
async fn top_level_tasks_run_by_priority() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "a",
            TaskSpecBuilder::new(Priority::Low)
                .steps(&["log a", "return first"])
                .build(),
        )
        .with_task(
            "b",
            TaskSpecBuilder::new(Priority::High)
                .steps(&["log b", "yield", "log b again"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(report.trace, Recorder::expect(&["b", "b again", "a"]));
    assert_eq!(report.outcome("a"), Some(&resolved("first")));
    assert_eq!(report.outcome("b"), Some(&resolved("")));
    assert!(report.all_resolved());
}

#[tokio::test]
async fn spawned_sub_task_returns_before_the_parent_continues() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "parent",
            TaskSpecBuilder::new(Priority::Normal)
                .steps(&["log parent start", "spawn child", "log parent end", "return parent"])
                .build(),
        )
        .with_task(
            "child",
            TaskSpecBuilder::new(Priority::High)
                .detached(true)
                .steps(&["log child", "sleep 5", "return c"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(
        report.trace,
        Recorder::expect(&["parent start", "child", "parent end"])
    );
    assert_eq!(report.outcome("parent"), Some(&resolved("parent")));
    assert_eq!(report.outcome("child"), None, "detached tasks are not reported");
}

#[tokio::test]
async fn restart_task_replays_after_preemption_with_cleanup() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "sync",
            TaskSpecBuilder::new(Priority::Normal)
                .interrupt(InterruptPolicy::Restart)
                .cleanup(true)
                .steps(&["log sync start", "sleep 300", "log sync end"])
                .build(),
        )
        .with_task(
            "urgent",
            TaskSpecBuilder::new(Priority::High)
                .submit_after_ms(30)
                .steps(&["log urgent"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(
        report.trace,
        Recorder::expect(&[
            "sync start",
            "cleanup sync",
            "urgent",
            "sync start",
            "sync end",
        ])
    );
    assert!(report.all_resolved());
}

#[tokio::test]
async fn cancel_step_removes_tagged_tasks() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "victim",
            TaskSpecBuilder::new(Priority::Low)
                .tag("fw")
                .cleanup(true)
                .steps(&["log victim start", "sleep 5000", "log victim end"])
                .build(),
        )
        .with_task(
            "killer",
            TaskSpecBuilder::new(Priority::Normal)
                .submit_after_ms(20)
                .steps(&["cancel fw", "log killed"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(
        report.trace,
        Recorder::expect(&["victim start", "cleanup victim", "killed"])
    );
    match report.outcome("victim") {
        Some(TaskOutcome::Rejected(msg)) => assert!(msg.contains("cancelled"), "{msg}"),
        other => panic!("expected victim to be rejected, got {other:?}"),
    }
    assert_eq!(report.outcome("killer"), Some(&resolved("")));
}

#[tokio::test]
async fn failing_task_is_reported_without_affecting_others() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "broken",
            TaskSpecBuilder::new(Priority::High)
                .steps(&["log trying", "fail out of cheese"])
                .build(),
        )
        .with_task(
            "fine",
            TaskSpecBuilder::new(Priority::Low)
                .steps(&["return ok"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    match report.outcome("broken") {
        Some(TaskOutcome::Rejected(msg)) => assert!(msg.contains("out of cheese"), "{msg}"),
        other => panic!("expected broken to be rejected, got {other:?}"),
    }
    assert_eq!(report.outcome("fine"), Some(&resolved("ok")));
    assert!(!report.all_resolved());
}

#[tokio::test]
async fn tasks_still_running_at_the_deadline_time_out() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .timeout_ms(50)
        .with_task(
            "slow",
            TaskSpecBuilder::new(Priority::Normal)
                .steps(&["sleep 10000", "return never"])
                .build(),
        )
        .with_task(
            "quick",
            TaskSpecBuilder::new(Priority::Normal)
                .steps(&["return done"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(report.outcome("slow"), Some(&TaskOutcome::TimedOut));
    assert_eq!(report.outcome("quick"), Some(&resolved("done")));
    assert!(report.to_string().contains("timed out"));
}

#[tokio::test]
async fn queued_tasks_run_alongside_their_submitter() {
    init_tracing();
    let workload = WorkloadBuilder::new()
        .with_task(
            "main",
            TaskSpecBuilder::new(Priority::Normal)
                .steps(&["log main start", "queue side", "yield", "log main end", "return m"])
                .build(),
        )
        .with_task(
            "side",
            TaskSpecBuilder::new(Priority::High)
                .detached(true)
                .steps(&["log side"])
                .build(),
        )
        .build();

    let report = run_workload(workload).await.unwrap();

    assert_eq!(
        report.trace,
        Recorder::expect(&["main start", "side", "main end"])
    );
    assert_eq!(report.outcome("main"), Some(&resolved("m")));
}
