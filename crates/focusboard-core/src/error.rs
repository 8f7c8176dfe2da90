//! Core error types for focusboard-core.
//!
//! Local operations fail with [`CoreError`]. [`RemoteError`] stays separate:
//! queued writes record it on the outbox entry, and the stats queries hand
//! it straight back to the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A persisted value could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Another process holds the write lock past the busy timeout.
    #[error("Database is locked")]
    Locked,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    /// config.toml exists but is not valid TOML for [`crate::Config`].
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// `config get`/`config set` path that names no field.
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{operation} returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Body parsed, but not into the row shape the operation expects.
    #[error("Unexpected response for {operation}: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    #[error("Invalid remote URL: {0}")]
    Url(#[from] url::ParseError),

    /// Raised by [`crate::MemoryStore`] when taken offline.
    #[error("Remote store unavailable")]
    Unavailable,
}

#[derive(Error, Debug)]
pub enum ValidationError {
    /// Blank task name.
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// Task index past the end of the list.
    #[error("Index {index} out of bounds for {collection} (length: {len})")]
    OutOfBounds {
        collection: String,
        index: usize,
        len: usize,
    },

    /// Zero durations, a zero long-break interval and the like.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    #[error("Unknown phase '{0}' (expected focus, short_break or long_break)")]
    UnknownPhase(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(code, _msg) => {
                if code.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
