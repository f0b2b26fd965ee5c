// src/exec/mod.rs

//! Running scripted workloads on a [`Scheduler`].
//!
//! - [`script`] turns `[task.<name>]` entries into work descriptors.
//! - [`trace`] is the shared log those descriptors write to.
//! - [`report`] is what a run produces.

pub mod report;
pub mod script;
pub mod trace;

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{info, warn};

use crate::config::Workload;
use crate::engine::Scheduler;
use crate::errors::{Result, TaskError};

pub use report::{TaskOutcome, TaskReport, WorkloadReport};
pub use script::scripted_descriptor;
pub use trace::Trace;

/// Run every top-level task of `workload` to completion (or until the
/// workload deadline) and report what happened.
///
/// Tasks without a submission delay are queued before the scheduler starts,
/// in name order; delayed ones are queued once their delay elapsed. Tasks
/// reached only through `queue` steps are not waited for.
pub async fn run_workload(workload: Workload) -> Result<WorkloadReport> {
    let workload = Arc::new(workload);
    let trace = Trace::new();
    let mut scheduler = Scheduler::new();

    let started = Instant::now();
    let deadline = tokio::time::Instant::now() + workload.scheduler().timeout();

    let mut pending: Vec<(String, _, BoxFuture<'static, std::result::Result<String, TaskError>>)> =
        Vec::new();
    for (name, spec) in workload.top_level() {
        let descriptor = scripted_descriptor(&workload, name, &trace)?;
        let result = if spec.submit_after_ms == 0 {
            scheduler.queue_task(descriptor).into_future().boxed()
        } else {
            let handle = scheduler.handle();
            let delay = Duration::from_millis(spec.submit_after_ms);
            async move {
                tokio::time::sleep(delay).await;
                handle.queue_task(descriptor).await
            }
            .boxed()
        };
        pending.push((name.to_string(), spec.priority, result));
    }

    info!(tasks = pending.len(), "starting workload");
    scheduler.start()?;

    let tasks = join_all(pending.into_iter().map(|(name, priority, result)| async move {
        let outcome = match tokio::time::timeout_at(deadline, result).await {
            Ok(Ok(value)) => TaskOutcome::Resolved(value),
            Ok(Err(err)) => TaskOutcome::Rejected(err.to_string()),
            Err(_) => {
                warn!(task = %name, "task did not settle before the workload deadline");
                TaskOutcome::TimedOut
            }
        };
        TaskReport {
            name,
            priority,
            outcome,
        }
    }))
    .await;

    scheduler.stop().await?;

    let report = WorkloadReport {
        tasks,
        trace: trace.lines(),
        elapsed: started.elapsed(),
    };
    info!(
        resolved = report.all_resolved(),
        elapsed = ?report.elapsed,
        "workload finished"
    );
    Ok(report)
}
