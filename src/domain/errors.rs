//! Domain error types
//!
//! This module defines the error hierarchy for Karst. All errors are
//! domain-specific and don't expose third-party types.
//!
//! Row-level problems (orphans, rejections) are *not* errors: they are
//! recorded on the staged row and surface in the import report. Only
//! file-level or storage-level faults become a [`KarstError`].

use thiserror::Error;

/// Main Karst error type
///
/// This is the primary error type used throughout the application.
#[derive(Debug, Error)]
pub enum KarstError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Malformed input file; fatal before any staging relation exists
    #[error("Decode error: {0}")]
    Decode(String),

    /// Import pipeline errors
    #[error("Import error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Database-related errors (connection, pool, statement)
    #[error("Database error: {0}")]
    Database(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Pipeline-stage errors
///
/// Each variant names the stage that failed. Every one of them is fatal to
/// the run; the run controller drops the staging relation before the error
/// reaches the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bulk load into the staging relation failed
    #[error("Bulk load failed after {rows_done}/{rows_total} rows: {message}")]
    LoadFailed {
        rows_done: usize,
        rows_total: usize,
        message: String,
    },

    /// Natural-key resolution could not execute
    #[error("Key resolution failed: {0}")]
    ResolveFailed(String),

    /// Invariant evaluation could not execute
    #[error("Invariant validation failed: {0}")]
    ValidationFailed(String),

    /// Transaction-level failure during commit; nothing was migrated
    #[error("Migration failed and was rolled back: {0}")]
    MigrationFailed(String),

    /// The run controller was asked to move between incompatible states
    #[error("Illegal state transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    /// A decoded record does not match the batch's entity kind
    #[error("Row {row_index} is a {found} record but the batch imports {expected} rows")]
    KindMismatch {
        row_index: usize,
        expected: String,
        found: String,
    },
}

// Conversion from std::io::Error
impl From<std::io::Error> for KarstError {
    fn from(err: std::io::Error) -> Self {
        KarstError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for KarstError {
    fn from(err: serde_json::Error) -> Self {
        KarstError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for KarstError {
    fn from(err: toml::de::Error) -> Self {
        KarstError::Configuration(format!("TOML parse error: {err}"))
    }
}

// Conversion from csv reader errors
impl From<csv::Error> for KarstError {
    fn from(err: csv::Error) -> Self {
        match err.position() {
            Some(pos) => KarstError::Decode(format!("line {}: {}", pos.line(), err)),
            None => KarstError::Decode(err.to_string()),
        }
    }
}
