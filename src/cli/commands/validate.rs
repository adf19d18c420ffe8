//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Karst configuration file.

use crate::config::{load_config, redact_connection_string};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates; a config that loads is valid.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration is invalid");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Default Dry Run: {}", config.application.dry_run);
        println!("  Chunk Size: {}", config.import.chunk_size);
        println!("  Staging Schema: {}", config.import.staging_schema);
        println!(
            "  Shutdown Timeout: {}s",
            config.import.shutdown_timeout_secs
        );
        println!(
            "  PostgreSQL Connection: {}",
            redact_connection_string(&config.postgresql.connection_string)
        );
        println!(
            "  Max Connections: {}",
            config.postgresql.max_connections
        );
        println!("  SSL Mode: {}", config.postgresql.ssl_mode);
        if config.logging.local_enabled {
            println!(
                "  Log File: {}/karst.log ({})",
                config.logging.local_path, config.logging.local_rotation
            );
        }
        println!();
        Ok(0)
    }
}
