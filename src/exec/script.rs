// src/exec/script.rs

//! Turn `[task.<name>]` entries into runnable work descriptors.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tracing::debug;

use crate::config::{Step, Workload};
use crate::errors::{Result, SchedError};
use crate::exec::trace::Trace;
use crate::task::{TaskContext, WorkDescriptor};

/// Build the descriptor for task `name` of `workload`.
///
/// Every run of the body walks the task's steps from the top, so a task
/// with the `restart` policy replays its earlier steps after preemption.
/// A body that runs out of steps resolves to an empty string.
pub fn scripted_descriptor(
    workload: &Arc<Workload>,
    name: &str,
    trace: &Trace,
) -> Result<WorkDescriptor<String>> {
    let spec = workload
        .task(name)
        .ok_or_else(|| SchedError::ConfigError(format!("unknown task '{name}'")))?;

    let body = {
        let workload = Arc::clone(workload);
        let trace = trace.clone();
        let name = name.to_string();
        let steps = spec.steps.clone();
        move |ctx: TaskContext| {
            run_steps(
                ctx,
                Arc::clone(&workload),
                trace.clone(),
                name.clone(),
                steps.clone(),
            )
        }
    };

    let mut descriptor = WorkDescriptor::new(spec.priority, body)
        .name(name)
        .interrupt(spec.interrupt);

    if let Some(tag) = &spec.tag {
        descriptor = descriptor.tag(tag.clone());
    }

    if spec.cleanup {
        let trace = trace.clone();
        let line = format!("cleanup {name}");
        descriptor = descriptor.cleanup(move || {
            trace.record(line.clone());
            async { Ok(()) }
        });
    }

    Ok(descriptor)
}

async fn run_steps(
    ctx: TaskContext,
    workload: Arc<Workload>,
    trace: Trace,
    name: String,
    steps: Vec<Step>,
) -> anyhow::Result<String> {
    for step in steps {
        match step {
            Step::Log(message) => trace.record(message),
            Step::Yield => ctx.yield_now().await,
            Step::Sleep(ms) => {
                ctx.wait_for(async move {
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                    Ok::<_, anyhow::Error>(())
                })
                .await?;
            }
            Step::Spawn(target) => {
                let child = scripted_descriptor(&workload, &target, &trace)?;
                let value = ctx.spawn_and_wait(child).await?;
                debug!(task = %name, child = %target, %value, "sub-task finished");
            }
            Step::Queue(target) => {
                let descriptor = scripted_descriptor(&workload, &target, &trace)?;
                let queued = ctx.scheduler().queue_task(descriptor);
                debug!(task = %name, queued = %target, id = queued.id(), "queued task");
            }
            Step::Cancel(tag) => {
                let removal = ctx
                    .scheduler()
                    .remove_tasks(move |info| info.tag == Some(tag.as_str()), None);
                let removed = ctx.wait_for(removal).await?;
                debug!(task = %name, removed, "cancel step done");
            }
            Step::Fail(message) => return Err(anyhow!(message)),
            Step::Return(value) => return Ok(value),
        }
    }

    Ok(String::new())
}
