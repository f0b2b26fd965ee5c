#![allow(dead_code)]

use std::collections::BTreeMap;

use coopsched::config::{RawWorkload, SchedulerSection, TaskSpec, Workload};
use coopsched::{InterruptPolicy, Priority};

/// Builder for `Workload` to simplify test setup.
pub struct WorkloadBuilder {
    workload: RawWorkload,
}

impl WorkloadBuilder {
    pub fn new() -> Self {
        Self {
            workload: RawWorkload {
                scheduler: SchedulerSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.workload.scheduler.timeout_ms = ms;
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskSpec) -> Self {
        self.workload.task.insert(name.to_string(), task);
        self
    }

    /// The unvalidated workload, for validation tests.
    pub fn build_raw(self) -> RawWorkload {
        self.workload
    }

    pub fn build(self) -> Workload {
        Workload::try_from(self.workload).expect("Failed to build valid workload from builder")
    }
}

impl Default for WorkloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskSpec`.
pub struct TaskSpecBuilder {
    task: TaskSpec,
}

impl TaskSpecBuilder {
    pub fn new(priority: Priority) -> Self {
        Self {
            task: TaskSpec::new(priority),
        }
    }

    pub fn interrupt(mut self, policy: InterruptPolicy) -> Self {
        self.task.interrupt = policy;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.task.tag = Some(tag.to_string());
        self
    }

    pub fn cleanup(mut self, val: bool) -> Self {
        self.task.cleanup = val;
        self
    }

    pub fn detached(mut self, val: bool) -> Self {
        self.task.detached = val;
        self
    }

    pub fn submit_after_ms(mut self, ms: u64) -> Self {
        self.task.submit_after_ms = ms;
        self
    }

    /// Append one step, written the way it would be in TOML.
    pub fn step(mut self, step: &str) -> Self {
        let step = step
            .parse()
            .unwrap_or_else(|e| panic!("invalid step '{step}': {e}"));
        self.task.steps.push(step);
        self
    }

    pub fn steps(self, steps: &[&str]) -> Self {
        steps.iter().fold(self, |builder, step| builder.step(step))
    }

    pub fn build(self) -> TaskSpec {
        self.task
    }
}
