//! Bulk import pipeline
//!
//! Load, resolve, validate, then report or migrate, and always clean up.
//! [`RunController`] is the entry point; the step types are public for
//! embedders that want to drive a batch themselves.

pub mod batch;
pub mod committer;
pub mod controller;
pub mod report;
pub mod resolver;
pub mod staging;
pub mod validator;

pub use batch::{ImportBatch, RunState};
pub use committer::MigrationCommitter;
pub use controller::{RunController, RunOutcome};
pub use report::{ImportReport, RowIssue};
pub use resolver::{KeyResolver, Resolution};
pub use staging::{check_kind, ProgressFn, StagingStore};
pub use validator::{check_row, InvariantValidator, Partition};
