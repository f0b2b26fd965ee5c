// src/exec/report.rs

use std::fmt;
use std::time::Duration;

use crate::types::Priority;

/// How one top-level task of a workload ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Resolved(String),
    Rejected(String),
    /// Still in flight when the workload deadline passed.
    TimedOut,
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Resolved(value) => write!(f, "resolved {value:?}"),
            TaskOutcome::Rejected(error) => write!(f, "rejected: {error}"),
            TaskOutcome::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: String,
    pub priority: Priority,
    pub outcome: TaskOutcome,
}

/// Everything a workload run produced.
#[derive(Debug, Clone)]
pub struct WorkloadReport {
    /// One entry per top-level task, in name order.
    pub tasks: Vec<TaskReport>,
    /// Trace lines in the order they were recorded.
    pub trace: Vec<String>,
    pub elapsed: Duration,
}

impl WorkloadReport {
    pub fn outcome(&self, name: &str) -> Option<&TaskOutcome> {
        self.tasks
            .iter()
            .find(|task| task.name == name)
            .map(|task| &task.outcome)
    }

    pub fn all_resolved(&self) -> bool {
        self.tasks
            .iter()
            .all(|task| matches!(task.outcome, TaskOutcome::Resolved(_)))
    }
}

impl fmt::Display for WorkloadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trace ({} lines):", self.trace.len())?;
        for line in &self.trace {
            writeln!(f, "  {line}")?;
        }
        writeln!(f)?;
        writeln!(f, "tasks ({}):", self.tasks.len())?;
        for task in &self.tasks {
            writeln!(f, "  - {} [{}]: {}", task.name, task.priority, task.outcome)?;
        }
        write!(f, "finished in {:?}", self.elapsed)
    }
}
