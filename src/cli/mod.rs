//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Karst using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Karst - Cave Catalogue Bulk Import
#[derive(Parser, Debug)]
#[command(name = "karst")]
#[command(version, about, long_about = None)]
#[command(author = "Karst Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "karst.toml", env = "KARST_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "KARST_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import caves or entrances from a CSV file
    Import(commands::import::ImportArgs),

    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Show leftover staging relations, optionally dropping them
    Status(commands::status::StatusArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::import::OutputFormat;
    use crate::domain::EntityKind;

    #[test]
    fn test_cli_parse_import() {
        let cli = Cli::parse_from(["karst", "import", "--kind", "entrance", "--file", "e.csv"]);
        assert_eq!(cli.config, "karst.toml");
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.kind, EntityKind::Entrance);
                assert_eq!(args.file, "e.csv");
                assert!(!args.dry_run);
                assert_eq!(args.format, OutputFormat::Text);
                assert!(args.chunk_size.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_import_options() {
        let cli = Cli::parse_from([
            "karst",
            "import",
            "-k",
            "cave",
            "-f",
            "c.csv",
            "--dry-run",
            "--yes",
            "--format",
            "json",
            "--chunk-size",
            "500",
        ]);
        match cli.command {
            Commands::Import(args) => {
                assert!(args.dry_run);
                assert!(args.yes);
                assert_eq!(args.format, OutputFormat::Json);
                assert_eq!(args.chunk_size, Some(500));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["karst", "import", "--kind", "passage", "--file", "x.csv"]).is_err());
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["karst", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["karst", "--log-level", "debug", "status"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_status_purge() {
        let cli = Cli::parse_from(["karst", "status", "--purge"]);
        assert!(matches!(cli.command, Commands::Status(args) if args.purge));
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["karst", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
