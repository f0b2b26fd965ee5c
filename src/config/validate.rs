// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{RawWorkload, Workload};
use crate::errors::{Result, SchedError};

impl TryFrom<RawWorkload> for Workload {
    type Error = SchedError;

    fn try_from(raw: RawWorkload) -> std::result::Result<Self, Self::Error> {
        validate_workload(&raw)?;
        Ok(Workload::new_unchecked(raw.scheduler, raw.task))
    }
}

/// Semantic checks that serde cannot express.
pub fn validate_workload(raw: &RawWorkload) -> Result<()> {
    ensure_has_tasks(raw)?;
    validate_scheduler_section(raw)?;
    validate_targets(raw)?;
    validate_spawn_graph(raw)?;
    Ok(())
}

fn ensure_has_tasks(raw: &RawWorkload) -> Result<()> {
    if raw.task.is_empty() {
        return Err(SchedError::ConfigError(
            "workload must contain at least one [task.<name>] section".to_string(),
        ));
    }
    if raw.task.values().all(|task| task.detached) {
        return Err(SchedError::ConfigError(
            "every task is detached; nothing would be submitted".to_string(),
        ));
    }
    Ok(())
}

fn validate_scheduler_section(raw: &RawWorkload) -> Result<()> {
    if raw.scheduler.timeout_ms == 0 {
        return Err(SchedError::ConfigError(
            "[scheduler].timeout_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_targets(raw: &RawWorkload) -> Result<()> {
    for (name, task) in raw.task.iter() {
        for target in task.targets() {
            if !raw.task.contains_key(target) {
                return Err(SchedError::ConfigError(format!(
                    "task '{name}' refers to unknown task '{target}'"
                )));
            }
        }
    }
    Ok(())
}

/// A task that (transitively) spawns or queues itself would never finish
/// submitting work.
fn validate_spawn_graph(raw: &RawWorkload) -> Result<()> {
    // Edge direction: task -> target.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in raw.task.keys() {
        graph.add_node(name.as_str());
    }
    for (name, task) in raw.task.iter() {
        for target in task.targets() {
            graph.add_edge(name.as_str(), target, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(SchedError::SpawnCycle(format!(
            "task '{}' spawns or queues itself (directly or indirectly)",
            cycle.node_id()
        ))),
    }
}
