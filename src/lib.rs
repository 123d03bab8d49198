//! mlforge: pipeline project registry with git-backed persistence.
//!
//! This library provides a registry of named functions and workflows under a
//! project, persisted as a canonical YAML document, synchronized through git,
//! and submitted to a remote pipeline-execution engine.

// Core modules
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod project;
pub mod submit;

// Re-export commonly used error types
pub use error::{ConfigError, FetchError, RegistryError, RunError, SubmissionError, SyncError};
