//! Configuration management for Karst.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Karst uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `KARST_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use karst::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("karst.toml")?;
//!
//! println!("Chunk size: {}", config.import.chunk_size);
//! println!("Staging schema: {}", config.import.staging_schema);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Application settings (log level, default dry-run)
//! - [`ImportConfig`] - Pipeline settings (chunk size, staging schema, shutdown timeout)
//! - [`PostgreSQLConfig`] - Canonical store connection
//! - [`LoggingConfig`] - Logging configuration
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [import]
//! chunk_size = 1000
//! staging_schema = "import_staging"
//!
//! [postgresql]
//! connection_string = "${KARST_DATABASE_URL}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{ApplicationConfig, ImportConfig, KarstConfig, LoggingConfig, PostgreSQLConfig};
pub use secret::{redact_connection_string, secret_string, SecretString, SecretValue};
