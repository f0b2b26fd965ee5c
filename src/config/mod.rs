// src/config/mod.rs

//! Workload files.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `loader.rs`: reading a workload from disk.
//! - `validate.rs`: semantic checks (unknown targets, spawn cycles).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{RawWorkload, SchedulerSection, Step, TaskSpec, Workload};
pub use validate::validate_workload;
