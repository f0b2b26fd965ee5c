// tests/config_loading.rs

use std::fs;
use std::path::PathBuf;

use coopsched::config::{Step, load_and_validate, load_from_path};
use coopsched::{InterruptPolicy, Priority, SchedError};
use tempfile::TempDir;

fn write_workload(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("Workload.toml");
    fs::write(&path, contents).expect("write workload");
    (dir, path)
}

#[test]
fn loads_a_complete_workload() {
    let (_dir, path) = write_workload(
        r#"
[scheduler]
timeout_ms = 2500

[task.update]
priority = "low"
interrupt = "restart"
tag = "firmware:5"
cleanup = true
steps = ["log start", "sleep 20", "spawn verify", "return done"]

[task.verify]
priority = "high"
detached = true
steps = ["yield", "return ok"]

[task.late]
priority = "normal"
submit_after_ms = 15
"#,
    );

    let workload = load_and_validate(&path).unwrap();
    assert_eq!(workload.scheduler().timeout_ms, 2500);

    let update = workload.task("update").unwrap();
    assert_eq!(update.priority, Priority::Low);
    assert_eq!(update.interrupt, InterruptPolicy::Restart);
    assert_eq!(update.tag.as_deref(), Some("firmware:5"));
    assert!(update.cleanup);
    assert_eq!(
        update.steps,
        vec![
            Step::Log("start".into()),
            Step::Sleep(20),
            Step::Spawn("verify".into()),
            Step::Return("done".into()),
        ]
    );

    let late = workload.task("late").unwrap();
    assert_eq!(late.interrupt, InterruptPolicy::Resume);
    assert_eq!(late.submit_after_ms, 15);
    assert!(late.steps.is_empty());

    let top_level: Vec<&str> = workload.top_level().map(|(name, _)| name).collect();
    assert_eq!(top_level, vec!["late", "update"]);
}

#[test]
fn missing_scheduler_section_uses_defaults() {
    let (_dir, path) = write_workload(
        r#"
[task.only]
priority = "idle"
"#,
    );

    let workload = load_and_validate(&path).unwrap();
    assert_eq!(workload.scheduler().timeout_ms, 10_000);
}

#[test]
fn spawn_cycles_are_rejected() {
    let (_dir, path) = write_workload(
        r#"
[task.a]
priority = "normal"
steps = ["spawn b"]

[task.b]
priority = "high"
detached = true
steps = ["queue a"]
"#,
    );

    let err = load_and_validate(&path).unwrap_err();
    assert!(matches!(err, SchedError::SpawnCycle(_)), "got {err:?}");
}

#[test]
fn unknown_targets_are_rejected() {
    let (_dir, path) = write_workload(
        r#"
[task.a]
priority = "normal"
steps = ["queue nowhere"]
"#,
    );

    match load_and_validate(&path) {
        Err(SchedError::ConfigError(msg)) => assert!(msg.contains("nowhere"), "{msg}"),
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn malformed_steps_and_priorities_fail_to_parse() {
    let (_dir, bad_step) = write_workload(
        r#"
[task.a]
priority = "normal"
steps = ["teleport home"]
"#,
    );
    assert!(matches!(
        load_from_path(&bad_step),
        Err(SchedError::TomlError(_))
    ));

    let (_dir2, bad_priority) = write_workload(
        r#"
[task.a]
priority = "urgent"
"#,
    );
    assert!(matches!(
        load_from_path(&bad_priority),
        Err(SchedError::TomlError(_))
    ));
}

#[test]
fn zero_timeout_is_rejected() {
    let (_dir, path) = write_workload(
        r#"
[scheduler]
timeout_ms = 0

[task.a]
priority = "normal"
"#,
    );

    assert!(matches!(
        load_and_validate(&path),
        Err(SchedError::ConfigError(_))
    ));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_and_validate(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SchedError::IoError(_)), "got {err:?}");
}
