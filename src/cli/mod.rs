//! Command-line interface for mlforge.
//!
//! Provides commands for project initialization, function and workflow
//! registration, git synchronization, and pipeline submission.

mod commands;

pub use commands::{parse_cli, run_with_cli, Cli};
