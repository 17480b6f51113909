//! Error types for Xylem
//!
//! Provides structured error types for the volume and database provisioners,
//! the job-dispatch fan-out, configuration loading and the API surface.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the service
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("{resource} provisioning is not configured")]
    NotConfigured { resource: String },

    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("{0}")]
    Validation(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Database {name} exists but not known to xylem")]
    Conflict { name: String },

    // =========================================================================
    // Storage Backend Errors
    // =========================================================================
    #[error("Backend command failed: {command}: {reason}")]
    BackendCommand { command: String, reason: String },

    #[error("Backend state error: {0}")]
    BackendState(String),

    // =========================================================================
    // Fan-out Errors
    // =========================================================================
    #[error("Fan-out to {member} timed out after {timeout_secs}s")]
    FanoutTimeout { member: String, timeout_secs: u64 },

    #[error("Fan-out to {member} failed: {reason}")]
    FanoutFailed { member: String, reason: String },

    #[error("Job dispatch error: {0}")]
    Dispatch(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Registry already holds a record for {name}")]
    RegistryConflict { name: String },

    #[error("Credential cipher error: {0}")]
    Cipher(String),

    // =========================================================================
    // Parse / Transport Errors
    // =========================================================================
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an error, carried on command replies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad resource name or malformed request
    Validation,
    /// Resource exists but is not owned by this system
    Conflict,
    /// Storage backend, database server or HTTP peer failure
    Backend,
    /// A cluster member failed or timed out during fan-out
    Fanout,
    /// The requested resource type is not configured
    Configuration,
    /// Anything else
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Validation => write!(f, "validation"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Backend => write!(f, "backend"),
            ErrorKind::Fanout => write!(f, "fanout"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) | Error::UnknownCommand(_) => ErrorKind::Validation,

            Error::Conflict { .. } | Error::RegistryConflict { .. } => ErrorKind::Conflict,

            Error::BackendCommand { .. }
            | Error::BackendState(_)
            | Error::Database(_)
            | Error::Http(_) => ErrorKind::Backend,

            Error::FanoutTimeout { .. } | Error::FanoutFailed { .. } | Error::Dispatch(_) => {
                ErrorKind::Fanout
            }

            Error::Configuration(_) | Error::NotConfigured { .. } | Error::YamlParse(_) => {
                ErrorKind::Configuration
            }

            Error::Internal(_) | Error::Cipher(_) | Error::JsonParse(_) | Error::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Check if a caller retry could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Validation | ErrorKind::Conflict | ErrorKind::Configuration
        )
    }

    /// Build a backend command failure
    pub fn backend(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::BackendCommand {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for the service
pub type Result<T> = std::result::Result<T, Error>;
