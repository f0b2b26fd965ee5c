// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawWorkload, Workload};
use crate::errors::Result;

/// Read a workload file without semantic validation.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWorkload> {
    let contents = fs::read_to_string(path.as_ref())?;
    let workload: RawWorkload = toml::from_str(&contents)?;
    Ok(workload)
}

/// Read a workload file and run the checks in `validate.rs`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Workload> {
    let raw = load_from_path(path)?;
    Workload::try_from(raw)
}
