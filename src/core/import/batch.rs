//! Import batch and its run-state machine
//!
//! ```text
//! Created -> Loaded -> Resolved -> Partitioned -> Reported (dry-run) -> Cleaned
//!                                             \-> Migrated (commit)  -> Cleaned
//! ```
//!
//! Every non-terminal state may also jump straight to `Cleaned` when a step
//! fails or the run is cancelled.

use crate::adapters::database::StagingRelation;
use crate::domain::{BatchId, EntityKind, ImportMode, PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Where a batch is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    Created,
    Loaded,
    Resolved,
    Partitioned,
    Reported,
    Migrated,
    Cleaned,
}

impl RunState {
    /// Returns true if `self -> next` is a legal transition for `mode`
    pub fn can_advance_to(self, next: RunState, mode: ImportMode) -> bool {
        use RunState::*;
        match (self, next) {
            (Cleaned, _) => false,
            (_, Cleaned) => true,
            (Created, Loaded) | (Loaded, Resolved) | (Resolved, Partitioned) => true,
            (Partitioned, Reported) => mode == ImportMode::DryRun,
            (Partitioned, Migrated) => mode == ImportMode::Commit,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One import run
///
/// Owns exactly one staging relation from creation until it reaches
/// [`RunState::Cleaned`].
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub batch_id: BatchId,
    pub kind: EntityKind,
    pub created_at: DateTime<Utc>,
    pub mode: ImportMode,
    pub relation: StagingRelation,
    state: RunState,
}

impl ImportBatch {
    /// Allocates a new batch in the `Created` state
    pub fn new(kind: EntityKind, mode: ImportMode, staging_schema: Option<String>) -> Self {
        let batch_id = BatchId::new();
        Self {
            batch_id,
            kind,
            created_at: Utc::now(),
            mode,
            relation: StagingRelation::for_batch(batch_id, kind, staging_schema),
            state: RunState::Created,
        }
    }

    /// Current state
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Moves to `next`
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IllegalTransition`] if the move is not allowed
    /// from the current state in this batch's mode.
    pub fn advance(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_advance_to(next, self.mode) {
            return Err(PipelineError::IllegalTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        crate::log_state_transition!(self.batch_id, self.state, next);
        self.state = next;
        Ok(())
    }

    /// Returns true once the staging relation has been dropped
    pub fn is_cleaned(&self) -> bool {
        self.state == RunState::Cleaned
    }
}
