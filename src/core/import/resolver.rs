//! Key resolver: natural key to canonical parent, in one set-based pass

use crate::adapters::database::ImportStore;
use crate::core::import::batch::{ImportBatch, RunState};
use crate::domain::{PipelineError, Result};
use std::sync::Arc;

/// Result of resolving one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Rows tied to exactly one canonical parent
    pub resolved_count: usize,

    /// Rows left unresolved, in row order
    pub orphan_row_ids: Vec<usize>,

    /// Reason per orphan, parallel to `orphan_row_ids`
    pub orphan_reasons: Vec<String>,
}

/// Joins staged rows to canonical parents by natural key
///
/// Zero or multiple matches leave a row unresolved; there is no tie-break.
/// Malformed keys become orphans too, never a pipeline failure.
pub struct KeyResolver {
    store: Arc<dyn ImportStore>,
}

impl KeyResolver {
    pub fn new(store: Arc<dyn ImportStore>) -> Self {
        Self { store }
    }

    /// Resolve every staged row of the batch
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ResolveFailed`] if the join cannot execute.
    pub async fn resolve(&self, batch: &mut ImportBatch) -> Result<Resolution> {
        let outcome = self
            .store
            .resolve_parents(&batch.relation)
            .await
            .map_err(|e| PipelineError::ResolveFailed(e.to_string()))?;

        let (orphan_row_ids, orphan_reasons) = outcome.orphans.into_iter().unzip();
        let resolution = Resolution {
            resolved_count: outcome.resolved_count,
            orphan_row_ids,
            orphan_reasons,
        };

        batch.advance(RunState::Resolved)?;
        tracing::info!(
            batch_id = %batch.batch_id,
            resolved = resolution.resolved_count,
            orphans = resolution.orphan_row_ids.len(),
            "Natural keys resolved"
        );
        Ok(resolution)
    }
}
