//! Import command implementation
//!
//! This module implements the `import` command: decode a CSV file, then run
//! it through the staging pipeline as a dry run or a commit.

use crate::adapters::database::create_import_store;
use crate::config::load_config;
use crate::core::decode::RowDecoder;
use crate::core::import::{ImportReport, RunController, RunOutcome};
use crate::domain::{EntityKind, ImportMode, KarstError, PipelineError};
use clap::{Args, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::watch;

/// How the report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Entity kind contained in the file
    #[arg(short, long, value_parser = parse_kind)]
    pub kind: EntityKind,

    /// CSV file to import
    #[arg(short, long)]
    pub file: String,

    /// Dry run mode - validate and report without writing canonical data
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Report format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Override import.chunk_size
    #[arg(long)]
    pub chunk_size: Option<usize>,
}

fn parse_kind(value: &str) -> Result<EntityKind, String> {
    value.parse()
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!(kind = %self.kind, file = %self.file, "Starting import command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("❌ {e}");
                return Ok(2);
            }
        };

        if let Some(chunk_size) = self.chunk_size {
            tracing::info!(chunk_size, "Overriding chunk size from CLI");
            config.import.chunk_size = chunk_size;
        }
        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("❌ Configuration validation failed: {e}");
            return Ok(2);
        }

        let mode = if self.dry_run || config.application.dry_run {
            ImportMode::DryRun
        } else {
            ImportMode::Commit
        };

        // Decode before touching the database; a malformed file never stages
        let bytes = match tokio::fs::read(&self.file).await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, file = %self.file, "Failed to read import file");
                eprintln!("❌ Failed to read {}: {e}", self.file);
                return Ok(3);
            }
        };
        let rows = match RowDecoder::new().decode(self.kind, &bytes) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(error = %e, "Failed to decode import file");
                eprintln!("❌ {e}");
                return Ok(3);
            }
        };

        if mode.is_dry_run() && self.format == OutputFormat::Text {
            println!("🔍 DRY RUN MODE - canonical data will not be modified");
            println!();
        }

        if !self.yes && !mode.is_dry_run() {
            println!("Import Configuration:");
            println!("  Kind: {}", self.kind);
            println!("  File: {}", self.file);
            println!("  Rows: {}", rows.len());
            println!("  Chunk size: {}", config.import.chunk_size);
            println!();
            print!("Proceed with import? [y/N]: ");
            use std::io::{self, Write};
            io::stdout().flush()?;

            let mut input = String::new();
            io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                println!("Import cancelled.");
                return Ok(0);
            }
        }

        let store = match create_import_store(&config).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create import store");
                eprintln!("❌ Failed to connect: {e}");
                return Ok(4);
            }
        };
        if let Err(e) = store.ensure_schema().await {
            tracing::error!(error = %e, "Failed to prepare database schema");
            eprintln!("❌ Failed to prepare schema: {e}");
            return Ok(4);
        }

        let controller = RunController::new(store, config.import.chunk_size, shutdown_signal)
            .with_cleanup_timeout(Duration::from_secs(config.import.shutdown_timeout_secs));

        let bar = progress_bar(rows.len() as u64, self.format);
        let on_progress = |done: usize, _total: usize| bar.set_position(done as u64);

        let outcome = controller
            .run_import(self.kind, &rows, mode, Some(&on_progress))
            .await;
        bar.finish_and_clear();

        let outcome = match outcome {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(error = %e, "Import failed");
                eprintln!("❌ Import failed: {e}");
                return Ok(exit_code_for_error(&e));
            }
        };

        match outcome {
            RunOutcome::Cancelled { batch_id } => {
                if self.format == OutputFormat::Json {
                    println!(
                        "{}",
                        serde_json::json!({ "batch_id": batch_id, "cancelled": true })
                    );
                } else {
                    println!();
                    println!("⚠️  Import cancelled. Staging data discarded, nothing was migrated.");
                }
                Ok(130)
            }
            RunOutcome::Completed { batch_id, report } => {
                match self.format {
                    OutputFormat::Json => {
                        let mut value = serde_json::to_value(&report)?;
                        value["batch_id"] = serde_json::to_value(batch_id)?;
                        println!("{}", serde_json::to_string_pretty(&value)?);
                    }
                    OutputFormat::Text => print_report(&report),
                }
                Ok(if report.has_problems() { 1 } else { 0 })
            }
        }
    }
}

/// Exit code for a fatal run error
pub fn exit_code_for_error(error: &KarstError) -> i32 {
    match error {
        KarstError::Configuration(_) => 2,
        KarstError::Decode(_) | KarstError::Pipeline(PipelineError::KindMismatch { .. }) => 3,
        KarstError::Database(_) => 4,
        _ => 5,
    }
}

fn progress_bar(total: u64, format: OutputFormat) -> ProgressBar {
    let bar = ProgressBar::new(total);
    if format == OutputFormat::Json {
        bar.set_draw_target(ProgressDrawTarget::hidden());
        return bar;
    }
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows")
    {
        bar.set_style(style.progress_chars("#>-"));
    }
    bar.set_message("Staging");
    bar
}

fn print_report(report: &ImportReport) {
    println!();
    println!("📊 Import Summary ({} {}):", report.mode, report.entity_kind);
    println!("  Total rows: {}", report.total_rows);
    println!("  Accepted: {}", report.accepted_count);
    println!("  Rejected: {}", report.rejected_rows.len());
    println!("  Orphaned: {}", report.orphan_rows.len());
    println!("  Migrated: {}", report.migrated_count);
    println!();

    if !report.rejected_rows.is_empty() {
        println!("⚠️  Rejected rows:");
        for issue in report.rejected_rows.iter().take(20) {
            println!("  - row {} ({}): {}", issue.row_index, issue.key, issue.reason);
        }
        if report.rejected_rows.len() > 20 {
            println!("  ... and {} more", report.rejected_rows.len() - 20);
        }
        println!();
    }

    if !report.orphan_rows.is_empty() {
        println!("⚠️  Orphaned rows:");
        for issue in report.orphan_rows.iter().take(20) {
            println!("  - row {} ({}): {}", issue.row_index, issue.key, issue.reason);
        }
        if report.orphan_rows.len() > 20 {
            println!("  ... and {} more", report.orphan_rows.len() - 20);
        }
        println!();
    }

    if report.has_problems() {
        println!("⚠️  Import completed with problem rows");
    } else {
        println!("✅ Import completed successfully!");
    }
}
