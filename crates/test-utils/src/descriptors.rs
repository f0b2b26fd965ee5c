//! Ready-made task bodies for scheduler tests.

use std::sync::{Arc, Mutex};

use coopsched::{Priority, TaskContext, WorkDescriptor};

use crate::gate::Gate;

/// Ordered log that task bodies append to.
#[derive(Clone, Default)]
pub struct Recorder {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: impl Into<String>) {
        self.lines.lock().unwrap().push(line.into());
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Convenience for `assert_eq!(recorder.lines(), ...)`.
    pub fn expect(expected: &[&str]) -> Vec<String> {
        expected.iter().map(|s| s.to_string()).collect()
    }
}

/// Body that logs `<prefix>a`, yields, `<prefix>b`, yields, `<prefix>c`.
pub fn phased(recorder: &Recorder, prefix: &str, priority: Priority) -> WorkDescriptor<()> {
    let name = prefix_name(prefix);
    let recorder = recorder.clone();
    let prefix = prefix.to_string();
    WorkDescriptor::new(priority, move |ctx: TaskContext| {
        let recorder = recorder.clone();
        let prefix = prefix.clone();
        async move {
            recorder.push(format!("{prefix}a"));
            ctx.yield_now().await;
            recorder.push(format!("{prefix}b"));
            ctx.yield_now().await;
            recorder.push(format!("{prefix}c"));
            Ok(())
        }
    })
    .name(name)
}

/// Body that logs `<prefix>a`, waits on `gate`, logs `<prefix>b` and returns
/// the gate's value.
pub fn gated<T>(recorder: &Recorder, prefix: &str, priority: Priority, gate: &Gate<T>) -> WorkDescriptor<T>
where
    T: Clone + Send + Sync + 'static,
{
    let name = prefix_name(prefix);
    let recorder = recorder.clone();
    let prefix = prefix.to_string();
    let gate = gate.clone();
    WorkDescriptor::new(priority, move |ctx: TaskContext| {
        let recorder = recorder.clone();
        let prefix = prefix.clone();
        let wait = gate.wait();
        async move {
            recorder.push(format!("{prefix}a"));
            let value = ctx.wait_for(wait).await?;
            recorder.push(format!("{prefix}b"));
            Ok(value)
        }
    })
    .name(name)
}

/// Body that returns `value` without suspending.
pub fn returning<T>(priority: Priority, value: T) -> WorkDescriptor<T>
where
    T: Clone + Send + Sync + 'static,
{
    WorkDescriptor::new(priority, move |_ctx: TaskContext| {
        let value = value.clone();
        async move { Ok(value) }
    })
}

fn prefix_name(prefix: &str) -> String {
    format!("task-{prefix}")
}
