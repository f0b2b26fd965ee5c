// src/lib.rs

//! A cooperative, single-loop priority task scheduler.
//!
//! Callers submit [`WorkDescriptor`]s; the scheduler steps one task at a
//! time, always picking the most urgent runnable one, and waits on external
//! operations on behalf of suspended tasks. See [`engine`] for the loop and
//! [`task`] for the body-facing API.

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod task;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{Workload, load_and_validate};

pub use crate::engine::{Scheduler, SchedulerHandle, TaskId};
pub use crate::errors::{SchedError, TaskError};
pub use crate::task::{TaskContext, TaskHandle, TaskInfo, TaskState, WorkDescriptor};
pub use crate::types::{InterruptPolicy, Priority};

/// High-level entry point used by `main.rs`: load a workload, then either
/// print it (`--dry-run`) or run it and print the report.
pub async fn run(args: CliArgs) -> Result<()> {
    let path = PathBuf::from(&args.workload);
    let workload = load_and_validate(&path)?;
    info!(path = %path.display(), tasks = workload.tasks().len(), "workload loaded");

    if args.dry_run {
        print_dry_run(&workload);
        return Ok(());
    }

    let report = exec::run_workload(workload).await?;
    println!("{report}");
    Ok(())
}

fn print_dry_run(workload: &Workload) {
    println!("coopsched dry-run");
    println!("  scheduler.timeout_ms = {}", workload.scheduler().timeout_ms);
    println!();

    println!("tasks ({}):", workload.tasks().len());
    for (name, task) in workload.tasks() {
        println!("  - {name}");
        println!("      priority: {}", task.priority);
        println!("      interrupt: {}", task.interrupt);
        if let Some(tag) = &task.tag {
            println!("      tag: {tag}");
        }
        if task.cleanup {
            println!("      cleanup: true");
        }
        if task.detached {
            println!("      detached: true");
        }
        if task.submit_after_ms > 0 {
            println!("      submit_after_ms: {}", task.submit_after_ms);
        }
        for step in &task.steps {
            println!("      step: {step}");
        }
    }

    debug!("dry-run complete (nothing was scheduled)");
}
