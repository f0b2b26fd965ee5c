// src/task/mod.rs

//! Tasks: what callers submit, what bodies see, and what the scheduler
//! steps.
//!
//! - [`WorkDescriptor`] is the caller's description of one unit of work.
//! - [`TaskContext`] is the suspension API handed to a running body.
//! - [`TaskHandle`] is the caller's view of the eventual result.
//! - `instance::Task` is the runtime state machine the engine steps.

pub mod context;
pub mod descriptor;
pub mod handle;
pub mod instance;
pub mod state;

pub use context::TaskContext;
pub use descriptor::{CleanupFuture, WorkDescriptor};
pub use handle::TaskHandle;
pub use instance::TaskInfo;
pub use state::TaskState;
