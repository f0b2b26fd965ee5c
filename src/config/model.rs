// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{InterruptPolicy, Priority};

/// Raw workload as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// timeout_ms = 5000
///
/// [task.update]
/// priority = "low"
/// interrupt = "restart"
/// tag = "firmware:5"
/// steps = ["log start", "sleep 50", "spawn verify", "return ok"]
///
/// [task.verify]
/// priority = "high"
/// detached = true
/// steps = ["log verifying", "yield", "return verified"]
/// ```
///
/// This is the unvalidated form; [`Workload`] is built from it through
/// `TryFrom`, which runs the semantic checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWorkload {
    #[serde(default)]
    pub scheduler: SchedulerSection,

    /// All tasks from `[task.<name>]`, keyed by name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskSpec>,
}

/// A validated workload.
#[derive(Debug, Clone)]
pub struct Workload {
    scheduler: SchedulerSection,
    tasks: BTreeMap<String, TaskSpec>,
}

impl Workload {
    /// Only `validate` should call this, after the checks passed.
    pub(crate) fn new_unchecked(
        scheduler: SchedulerSection,
        tasks: BTreeMap<String, TaskSpec>,
    ) -> Self {
        Self { scheduler, tasks }
    }

    pub fn scheduler(&self) -> &SchedulerSection {
        &self.scheduler
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskSpec> {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.get(name)
    }

    /// Tasks submitted at start-up (everything not marked `detached`), in
    /// name order.
    pub fn top_level(&self) -> impl Iterator<Item = (&str, &TaskSpec)> {
        self.tasks
            .iter()
            .filter(|(_, spec)| !spec.detached)
            .map(|(name, spec)| (name.as_str(), spec))
    }
}

/// `[scheduler]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Overall deadline for a workload run, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl SchedulerSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub priority: Priority,

    #[serde(default)]
    pub interrupt: InterruptPolicy,

    /// Lookup key for `cancel` steps.
    #[serde(default)]
    pub tag: Option<String>,

    /// Record `cleanup <name>` in the trace whenever the task is abandoned.
    #[serde(default)]
    pub cleanup: bool,

    /// Detached tasks are not submitted at start-up; they only run when
    /// another task spawns or queues them.
    #[serde(default)]
    pub detached: bool,

    /// Delay before a top-level task is submitted.
    #[serde(default)]
    pub submit_after_ms: u64,

    #[serde(default)]
    pub steps: Vec<Step>,
}

impl TaskSpec {
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            interrupt: InterruptPolicy::default(),
            tag: None,
            cleanup: false,
            detached: false,
            submit_after_ms: 0,
            steps: Vec::new(),
        }
    }

    /// Names of the tasks this one spawns or queues.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::Spawn(target) | Step::Queue(target) => Some(target.as_str()),
            _ => None,
        })
    }
}

/// One scripted action of a task body.
///
/// Written in TOML as a short string: `"log <message>"`, `"yield"`,
/// `"sleep <ms>"`, `"spawn <task>"`, `"queue <task>"`, `"cancel <tag>"`,
/// `"fail <message>"` or `"return <value>"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Step {
    /// Append a line to the run trace.
    Log(String),
    /// Bare cooperative yield.
    Yield,
    /// Wait on a timer as an external operation.
    Sleep(u64),
    /// Spawn the named task as a sub-task and wait for it.
    Spawn(String),
    /// Submit the named task without waiting for it.
    Queue(String),
    /// Cancel every task carrying this tag.
    Cancel(String),
    /// Fail the task with this message.
    Fail(String),
    /// Finish the task with this value.
    Return(String),
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (verb, arg) = match s.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (s, ""),
        };

        let need_arg = |what: &str| -> Result<String, String> {
            if arg.is_empty() {
                Err(format!("step '{verb}' needs {what}"))
            } else {
                Ok(arg.to_string())
            }
        };

        match verb {
            "log" => Ok(Step::Log(arg.to_string())),
            "yield" if arg.is_empty() => Ok(Step::Yield),
            "yield" => Err(format!("step 'yield' takes no argument (got '{arg}')")),
            "sleep" => arg
                .parse::<u64>()
                .map(Step::Sleep)
                .map_err(|_| format!("step 'sleep' needs a duration in ms (got '{arg}')")),
            "spawn" => need_arg("a task name").map(Step::Spawn),
            "queue" => need_arg("a task name").map(Step::Queue),
            "cancel" => need_arg("a tag").map(Step::Cancel),
            "fail" => Ok(Step::Fail(arg.to_string())),
            "return" => Ok(Step::Return(arg.to_string())),
            other => Err(format!(
                "unknown step '{other}' (expected log, yield, sleep, spawn, queue, cancel, fail or return)"
            )),
        }
    }
}

impl TryFrom<String> for Step {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Log(msg) => write!(f, "log {msg}"),
            Step::Yield => f.write_str("yield"),
            Step::Sleep(ms) => write!(f, "sleep {ms}"),
            Step::Spawn(task) => write!(f, "spawn {task}"),
            Step::Queue(task) => write!(f, "queue {task}"),
            Step::Cancel(tag) => write!(f, "cancel {tag}"),
            Step::Fail(msg) => write!(f, "fail {msg}"),
            Step::Return(value) => write!(f, "return {value}"),
        }
    }
}
