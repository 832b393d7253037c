//! Core error types for dosewatch-core.
//!
//! Each concern gets its own `thiserror` enum; `CoreError` unifies them for
//! callers that do not care which layer failed.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for dosewatch-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed medicine data handed to the engine
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Persistence collaborator failures
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Notification delivery failures
    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Data-integrity errors.
///
/// Raised for a single medicine; the engine skips that medicine for the
/// current tick and carries on with the rest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A `times` entry that is not a valid `HH:MM` 24-hour value
    #[error("Invalid time of day '{value}': expected HH:MM (00:00-23:59)")]
    InvalidTimeOfDay { value: String },

    /// Required field is empty
    #[error("Medicine '{medicine_id}' is missing required field '{field}'")]
    MissingField { medicine_id: String, field: String },

    /// Time entry rejected while expanding a specific medicine
    #[error("Medicine '{medicine_id}' has a malformed schedule: {source}")]
    MalformedSchedule {
        medicine_id: String,
        #[source]
        source: Box<DataError>,
    },

    /// Unknown frequency label
    #[error("Unknown frequency: {0}")]
    UnknownFrequency(String),

    /// Unknown dose status label
    #[error("Unknown dose status: {0}")]
    UnknownStatus(String),
}

impl DataError {
    /// The medicine the error is about, when known.
    pub fn medicine_id(&self) -> Option<&str> {
        match self {
            DataError::MissingField { medicine_id, .. }
            | DataError::MalformedSchedule { medicine_id, .. } => Some(medicine_id),
            _ => None,
        }
    }
}

/// Persistence collaborator errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// No medicine with the given id
    #[error("Medicine not found: {id}")]
    NotFound { id: String },

    /// Stored row could not be turned back into a medicine
    #[error("Corrupt record for medicine '{id}': {message}")]
    Corrupt { id: String, message: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Input refused before reaching the database
    #[error("Rejected: {0}")]
    Rejected(#[from] DataError),

    /// Collaborator is unreachable (or its worker went away)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg)
                if code.code == rusqlite::ErrorCode::DatabaseLocked
                    || code.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StoreError::Locked
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
