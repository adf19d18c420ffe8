// Karst - Cave Catalogue Bulk Import
// Copyright (c) 2025 Karst Contributors
// Licensed under the MIT License

//! # Karst - Cave Catalogue Bulk Import
//!
//! Karst ingests externally produced spreadsheets of caves and cave entrances
//! into a PostgreSQL/PostGIS catalogue without corrupting existing data and
//! without failing a whole file because of a few bad rows.
//!
//! ## Overview
//!
//! Every run:
//! - **Stages** the decoded rows in a table of its own, in fixed-size chunks
//! - **Resolves** each row's natural key (`TN001`) to exactly one canonical parent
//! - **Validates** required fields, in-file duplicates, existing rows and the
//!   one-primary-entrance-per-cave rule
//! - **Reports** (dry run) or **migrates** the accepted rows in one transaction
//! - **Drops** its staging table on every exit path
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Row decoding and the import pipeline
//! - [`adapters`] - Storage backends (PostgreSQL, in-memory)
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use karst::adapters::database::create_import_store;
//! use karst::config::load_config;
//! use karst::core::decode::RowDecoder;
//! use karst::core::import::{RunController, RunOutcome};
//! use karst::domain::{EntityKind, ImportMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("karst.toml")?;
//!     let store = create_import_store(&config).await?;
//!
//!     let bytes = std::fs::read("entrances.csv")?;
//!     let rows = RowDecoder::new().decode(EntityKind::Entrance, &bytes)?;
//!
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!     let controller = RunController::new(store, config.import.chunk_size, shutdown_rx);
//!
//!     match controller
//!         .run_import(EntityKind::Entrance, &rows, ImportMode::Commit, None)
//!         .await?
//!     {
//!         RunOutcome::Completed { report, .. } => {
//!             println!("Migrated {} entrances", report.migrated_count);
//!         }
//!         RunOutcome::Cancelled { batch_id } => println!("Run {batch_id} cancelled"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fatal conditions surface as [`domain::KarstError`]; rows that fail
//! resolution or validation are reported, never raised:
//!
//! ```rust,no_run
//! use karst::domain::KarstError;
//!
//! fn example() -> Result<(), KarstError> {
//!     let config = karst::config::load_config("karst.toml")?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
