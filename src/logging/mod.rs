//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - A human-readable console layer
//! - An optional JSON file layer with rotation
//! - Log level selection via configuration or `RUST_LOG`
//!
//! # Example
//!
//! ```no_run
//! use karst::logging::init_logging;
//! use karst::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!(batch_id = "…", "Import started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log a run-controller state transition
///
/// # Example
///
/// ```no_run
/// use karst::log_state_transition;
/// use karst::domain::BatchId;
///
/// let batch_id = BatchId::new();
/// log_state_transition!(batch_id, "Loaded", "Resolved");
/// ```
#[macro_export]
macro_rules! log_state_transition {
    ($batch_id:expr, $from:expr, $to:expr) => {
        tracing::debug!(
            batch_id = %$batch_id,
            from = %$from,
            to = %$to,
            "Batch state transition"
        );
    };
}

/// Log bulk-load progress for a batch
///
/// # Example
///
/// ```no_run
/// use karst::log_load_progress;
/// use karst::domain::BatchId;
///
/// let batch_id = BatchId::new();
/// log_load_progress!(batch_id, 1000, 4500);
/// ```
#[macro_export]
macro_rules! log_load_progress {
    ($batch_id:expr, $done:expr, $total:expr) => {
        tracing::debug!(
            batch_id = %$batch_id,
            rows_done = $done,
            rows_total = $total,
            progress_pct = ($done as f64 / ($total as f64).max(1.0) * 100.0),
            "Staging load progress"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use karst::log_error_with_context;
/// use karst::domain::KarstError;
///
/// let error = KarstError::Configuration("Invalid config".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::domain::{BatchId, KarstError};

    #[test]
    fn test_macros_expand_without_subscriber() {
        let batch_id = BatchId::new();
        log_state_transition!(batch_id, "Created", "Loaded");
        log_load_progress!(batch_id, 0usize, 0usize);
        log_error_with_context!(&KarstError::Other("x".to_string()), "test");
    }
}
