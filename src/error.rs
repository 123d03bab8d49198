//! Error types for mlforge operations.
//!
//! Defines error types for the major subsystems:
//! - Project registry (creation, lookup, persistence)
//! - Remote function descriptor fetching
//! - Git synchronization
//! - Pipeline submission
//! - Configuration loading

use thiserror::Error;

/// Errors that can occur during project registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to initialize project at '{path}': {reason}")]
    Initialization { path: String, reason: String },

    #[error("Function '{0}' not found in project")]
    FunctionNotFound(String),

    #[error("Workflow '{0}' not found in project")]
    WorkflowNotFound(String),

    #[error("Project document not found at '{0}'")]
    DocumentNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors that can occur while fetching a remote function descriptor.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Descriptor fetch returned status {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Malformed function descriptor from '{url}': {reason}")]
    Malformed { url: String, reason: String },
}

/// Errors that can occur during git synchronization.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote 'origin' already set to '{configured}', refusing to replace with '{requested}'")]
    RemoteConflict {
        configured: String,
        requested: String,
    },

    #[error("No remote configured for project")]
    NoRemote,

    #[error("git {operation} failed: {stderr}")]
    GitFailed { operation: String, stderr: String },

    #[error("Failed to persist project document: {0}")]
    Persist(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by operations that combine registry lookup with a
/// remote engine call (`run`, `deploy`).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Errors that can occur while submitting work to the execution engine.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Execution engine unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    #[error("Engine rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Engine accepted the submission but returned no run identifier")]
    MissingRunId,

    #[error("Failed to parse engine response: {0}")]
    ParseError(String),
}

/// Errors that can occur during configuration loading.
///
/// Every engine setting has a default, so only malformed values fail.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
