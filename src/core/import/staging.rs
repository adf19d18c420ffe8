//! Staging store: per-batch relation lifecycle and chunked bulk load

use crate::adapters::database::ImportStore;
use crate::core::import::batch::{ImportBatch, RunState};
use crate::domain::{EntityKind, ImportMode, ImportRow, PipelineError, Result, StagedRow};
use std::sync::Arc;

/// Progress callback: `(rows_done, rows_total)`
///
/// Called synchronously after each chunk. It must not call back into the
/// staging store.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Creates, fills and drops staging relations
///
/// The only component that creates or drops a staging relation.
pub struct StagingStore {
    store: Arc<dyn ImportStore>,
    chunk_size: usize,
}

impl StagingStore {
    /// Create a staging store appending `chunk_size` rows per round trip
    pub fn new(store: Arc<dyn ImportStore>, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Allocate a batch and create its empty staging relation
    ///
    /// # Errors
    ///
    /// Returns an error if the relation cannot be created. No relation is
    /// left behind in that case.
    pub async fn create_batch(&self, kind: EntityKind, mode: ImportMode) -> Result<ImportBatch> {
        let batch = ImportBatch::new(
            kind,
            mode,
            self.store.staging_schema().map(str::to_string),
        );

        self.store.create_staging(&batch.relation).await?;

        tracing::info!(
            batch_id = %batch.batch_id,
            kind = %kind,
            mode = %mode,
            relation = %batch.relation,
            "Created staging relation"
        );
        Ok(batch)
    }

    /// Bulk-append decoded rows in fixed-size chunks
    ///
    /// Row indices are positions in `rows`. Returns the number of rows loaded.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::LoadFailed`] on the first chunk that fails;
    /// the caller is responsible for cleanup.
    pub async fn load_rows(
        &self,
        batch: &mut ImportBatch,
        rows: &[ImportRow],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<usize> {
        let total = rows.len();
        let mut done = 0;

        for chunk in rows.chunks(self.chunk_size) {
            let staged: Vec<StagedRow> = chunk
                .iter()
                .enumerate()
                .map(|(offset, row)| StagedRow::from_import_row(done + offset, row))
                .collect();

            self.store
                .append_staged(&batch.relation, &staged)
                .await
                .map_err(|e| PipelineError::LoadFailed {
                    rows_done: done,
                    rows_total: total,
                    message: e.to_string(),
                })?;

            done += chunk.len();
            crate::log_load_progress!(batch.batch_id, done, total);
            if let Some(progress) = on_progress {
                progress(done, total);
            }
        }

        batch.advance(RunState::Loaded)?;
        tracing::info!(batch_id = %batch.batch_id, rows = total, "Staging load complete");
        Ok(total)
    }

    /// Drop the batch's staging relation
    ///
    /// Idempotent: a batch that is already cleaned is left alone. Returns
    /// whether a relation was dropped by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the drop; the batch then stays
    /// in its current state so the caller can retry.
    pub async fn cleanup(&self, batch: &mut ImportBatch) -> Result<bool> {
        if batch.is_cleaned() {
            return Ok(false);
        }

        let dropped = self.store.drop_staging(&batch.relation).await?;
        batch.advance(RunState::Cleaned)?;

        tracing::debug!(
            batch_id = %batch.batch_id,
            relation = %batch.relation,
            dropped,
            "Staging relation cleaned up"
        );
        Ok(dropped)
    }
}

/// Checks that every decoded record matches the batch's entity kind
///
/// # Errors
///
/// Returns [`PipelineError::KindMismatch`] naming the first offending row.
pub fn check_kind(kind: EntityKind, rows: &[ImportRow]) -> Result<()> {
    match rows.iter().position(|row| row.kind() != kind) {
        Some(row_index) => Err(PipelineError::KindMismatch {
            row_index,
            expected: kind.to_string(),
            found: rows[row_index].kind().to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::{CaveRecord, KarstError};
    use std::sync::Mutex;

    fn caves(n: usize) -> Vec<ImportRow> {
        (1..=n)
            .map(|i| {
                ImportRow::Cave(CaveRecord {
                    key: format!("TN{i:03}"),
                    name: Some(format!("Cave {i}")),
                    ..Default::default()
                })
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_reports_progress_per_chunk() {
        let memory = Arc::new(MemoryStore::new());
        let staging = StagingStore::new(memory.clone(), 2);
        let mut batch = staging
            .create_batch(EntityKind::Cave, ImportMode::DryRun)
            .await
            .unwrap();

        let calls = Mutex::new(Vec::new());
        let progress = |done: usize, total: usize| calls.lock().unwrap().push((done, total));
        let loaded = staging
            .load_rows(&mut batch, &caves(5), Some(&progress))
            .await
            .unwrap();

        assert_eq!(loaded, 5);
        assert_eq!(*calls.lock().unwrap(), vec![(2, 5), (4, 5), (5, 5)]);
        assert_eq!(batch.state(), RunState::Loaded);

        let staged = memory.fetch_staged(&batch.relation).await.unwrap();
        let indices: Vec<usize> = staged.iter().map(|r| r.row_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let memory = Arc::new(MemoryStore::new());
        let staging = StagingStore::new(memory.clone(), 100);
        let mut batch = staging
            .create_batch(EntityKind::Cave, ImportMode::Commit)
            .await
            .unwrap();

        assert!(staging.cleanup(&mut batch).await.unwrap());
        assert!(!staging.cleanup(&mut batch).await.unwrap());
        assert!(batch.is_cleaned());
        assert!(memory.staging_names().is_empty());
    }

    #[test]
    fn test_check_kind_names_first_mismatch() {
        let err = check_kind(EntityKind::Entrance, &caves(3)).unwrap_err();
        assert!(matches!(
            err,
            KarstError::Pipeline(PipelineError::KindMismatch { row_index: 0, .. })
        ));
        assert!(check_kind(EntityKind::Cave, &caves(3)).is_ok());
        assert!(check_kind(EntityKind::Entrance, &[]).is_ok());
    }

    #[test]
    fn test_chunk_size_floor() {
        let staging = StagingStore::new(Arc::new(MemoryStore::new()), 0);
        assert_eq!(staging.chunk_size(), 1);
    }
}
