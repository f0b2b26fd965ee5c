#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use coopsched::{InterruptPolicy, Priority, Scheduler, TaskContext, WorkDescriptor};
use coopsched_test_utils::{Recorder, init_tracing};

/// A fresh scheduler with test logging enabled.
pub fn scheduler() -> Scheduler {
    init_tracing();
    Scheduler::new()
}

/// Poll `condition` every few milliseconds until it holds (5s max).
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    coopsched_test_utils::with_timeout(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
}

/// Logs `1a`, submits `intruder` (only on the first run), yields, logs `1b`,
/// yields, logs `1c`.
///
/// This is the "a more urgent task shows up while I'm running" shape used by
/// the preemption tests.
pub fn interrupted(
    recorder: &Recorder,
    priority: Priority,
    policy: InterruptPolicy,
    intruder: WorkDescriptor<()>,
) -> WorkDescriptor<()> {
    let recorder = recorder.clone();
    let intruder = Arc::new(Mutex::new(Some(intruder)));
    WorkDescriptor::new(priority, move |ctx: TaskContext| {
        let recorder = recorder.clone();
        let intruder = intruder.lock().unwrap().take();
        async move {
            recorder.push("1a");
            if let Some(intruder) = intruder {
                ctx.scheduler().queue_task(intruder);
            }
            ctx.yield_now().await;
            recorder.push("1b");
            ctx.yield_now().await;
            recorder.push("1c");
            Ok(())
        }
    })
    .name("interrupted")
    .interrupt(policy)
}
