//! Core business logic for Karst.
//!
//! # Modules
//!
//! - [`decode`] - CSV files into typed import rows
//! - [`import`] - Staging, key resolution, validation, migration and the run controller
//!
//! # Import Workflow
//!
//! 1. **Decode**: Parse the CSV file into [`crate::domain::ImportRow`]s
//! 2. **Stage**: Create a per-batch staging relation and bulk-load the rows
//! 3. **Resolve**: Join natural keys to canonical parents in one pass
//! 4. **Validate**: Label every resolved row accepted or rejected
//! 5. **Report or Migrate**: Dry runs stop here; commits copy accepted rows in one transaction
//! 6. **Clean up**: Drop the staging relation on every exit path
//!
//! # Example
//!
//! ```rust,no_run
//! use karst::adapters::memory::MemoryStore;
//! use karst::core::decode::RowDecoder;
//! use karst::core::import::{RunController, RunOutcome};
//! use karst::domain::{EntityKind, ImportMode};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! store.add_region("TN", "Tennessee");
//!
//! let rows = RowDecoder::new().decode(EntityKind::Cave, b"key,name\nTN001,Blue Spring Cave\n")?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let controller = RunController::new(store, 1000, shutdown_rx);
//!
//! if let RunOutcome::Completed { report, .. } = controller
//!     .run_import(EntityKind::Cave, &rows, ImportMode::DryRun, None)
//!     .await?
//! {
//!     println!("Accepted: {}", report.accepted_count);
//!     println!("Rejected: {}", report.rejected_rows.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod import;
