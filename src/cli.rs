// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `coopsched`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "coopsched",
    version,
    about = "Run a scripted workload on a cooperative priority scheduler.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the workload file (TOML).
    ///
    /// Default: `Workload.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Workload.toml")]
    pub workload: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `COOPSCHED_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate and print the workload, but don't run it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_workload_toml() {
        let args = CliArgs::parse_from(["coopsched"]);
        assert_eq!(args.workload, "Workload.toml");
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn parses_all_flags() {
        let args = CliArgs::parse_from([
            "coopsched",
            "--workload",
            "w.toml",
            "--dry-run",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.workload, "w.toml");
        assert!(args.dry_run);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
    }
}
