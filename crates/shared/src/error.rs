//! Error types for the ChatOps console

use std::time::Duration;
use thiserror::Error;

/// Errors raised by policy mutations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("only admins may perform this operation")]
    NotAuthorized,

    #[error("user '{0}' is already an admin")]
    AlreadyExists(String),

    #[error("user '{0}' is not an admin")]
    NotFound(String),

    #[error("cannot remove the last remaining admin")]
    LastAdmin,

    #[error("an admin is already configured")]
    AlreadyBootstrapped,

    #[error("failed to persist policy state: {0}")]
    Storage(String),
}

/// Errors raised by the query backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("query backend unreachable: {0}")]
    Unreachable(String),

    #[error("query backend did not answer within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("query backend returned a bad response: {0}")]
    BadResponse(String),
}

/// Errors raised by the audit log. Always fatal to the operation in progress.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    WriteFailure(String),

    #[error("audit store unreadable: {0}")]
    Corrupt(String),

    #[error("audit export failed: {0}")]
    Export(String),
}

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        AuditError::WriteFailure(err.to_string())
    }
}

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for '{key}': {value}")]
    Invalid { key: String, value: String },
}
