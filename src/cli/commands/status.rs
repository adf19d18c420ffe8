//! Status command implementation
//!
//! This module implements the `status` command: check connectivity and list
//! staging relations left behind by interrupted runs, optionally dropping
//! them.

use crate::adapters::database::create_import_store;
use crate::config::{load_config, redact_connection_string};
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Drop every leftover staging relation
    #[arg(long)]
    pub purge: bool,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(purge = self.purge, "Checking import status");

        println!("📊 Import Status");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {}", e);
                return Ok(2);
            }
        };

        let store = match create_import_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {}", e);
                return Ok(4);
            }
        };
        if let Err(e) = store.test_connection().await {
            println!("❌ Failed to connect to database");
            println!("   Error: {}", e);
            return Ok(4);
        }

        println!(
            "  Database: {}",
            redact_connection_string(&config.postgresql.connection_string)
        );
        println!("  Staging schema: {}", config.import.staging_schema);
        println!();

        let leftovers = match store.list_staging().await {
            Ok(l) => l,
            Err(e) => {
                println!("❌ Failed to list staging relations");
                println!("   Error: {}", e);
                return Ok(5);
            }
        };

        if leftovers.is_empty() {
            println!("✅ No leftover staging relations.");
            return Ok(0);
        }

        println!("Leftover staging relations: {}", leftovers.len());
        for listing in &leftovers {
            println!("  - {} ({} rows)", listing.name, listing.row_count);
        }
        println!();

        if !self.purge {
            println!("Run 'karst status --purge' to drop them.");
            return Ok(0);
        }

        let mut failed = 0;
        for listing in &leftovers {
            match store.drop_staging_by_name(&listing.name).await {
                Ok(_) => {
                    tracing::info!(relation = %listing.name, "Dropped leftover staging relation");
                    println!("  🗑  Dropped {}", listing.name);
                }
                Err(e) => {
                    failed += 1;
                    tracing::error!(relation = %listing.name, error = %e, "Failed to drop staging relation");
                    println!("  ❌ Failed to drop {}: {}", listing.name, e);
                }
            }
        }
        println!();

        if failed > 0 {
            println!("⚠️  {} relation(s) could not be dropped", failed);
            Ok(5)
        } else {
            println!("✅ Purge complete.");
            Ok(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_args_default() {
        let args = StatusArgs { purge: false };
        assert!(!args.purge);
    }
}
