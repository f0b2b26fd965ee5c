// src/exec/trace.rs

//! Shared, ordered record of what scripted tasks did.

use std::sync::{Arc, Mutex, PoisonError};

/// Append-only log shared by every task of one workload run.
///
/// Cloning is cheap; all clones append to the same list.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, line: impl Into<String>) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.into());
    }

    /// Snapshot of everything recorded so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
