//! Run controller: drives one batch through the pipeline
//!
//! The controller owns the guaranteed-release scope: once a staging relation
//! exists, every exit path (success, failure, cancellation) goes through
//! [`StagingStore::cleanup`] before returning to the caller.

use crate::adapters::database::ImportStore;
use crate::core::import::batch::{ImportBatch, RunState};
use crate::core::import::committer::MigrationCommitter;
use crate::core::import::report::ImportReport;
use crate::core::import::resolver::KeyResolver;
use crate::core::import::staging::{check_kind, ProgressFn, StagingStore};
use crate::core::import::validator::InvariantValidator;
use crate::domain::{BatchId, EntityKind, ImportMode, ImportRow, KarstError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// How a run ended, when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every step ran; the report describes every row
    Completed {
        batch_id: BatchId,
        report: ImportReport,
    },

    /// The shutdown signal was observed between steps; no report
    Cancelled { batch_id: BatchId },
}

impl RunOutcome {
    pub fn batch_id(&self) -> BatchId {
        match self {
            RunOutcome::Completed { batch_id, .. } | RunOutcome::Cancelled { batch_id } => {
                *batch_id
            }
        }
    }

    pub fn report(&self) -> Option<&ImportReport> {
        match self {
            RunOutcome::Completed { report, .. } => Some(report),
            RunOutcome::Cancelled { .. } => None,
        }
    }
}

/// Orchestrates staging, resolution, validation and migration
pub struct RunController {
    store: Arc<dyn ImportStore>,
    staging: StagingStore,
    resolver: KeyResolver,
    validator: InvariantValidator,
    committer: MigrationCommitter,
    shutdown_signal: watch::Receiver<bool>,
    cleanup_timeout: Duration,
}

impl RunController {
    /// Create a controller that checks `shutdown_signal` between steps
    pub fn new(
        store: Arc<dyn ImportStore>,
        chunk_size: usize,
        shutdown_signal: watch::Receiver<bool>,
    ) -> Self {
        Self {
            staging: StagingStore::new(store.clone(), chunk_size),
            resolver: KeyResolver::new(store.clone()),
            validator: InvariantValidator::new(store.clone()),
            committer: MigrationCommitter::new(store.clone()),
            store,
            shutdown_signal,
            cleanup_timeout: Duration::from_secs(30),
        }
    }

    /// Bound how long the final staging drop may take
    pub fn with_cleanup_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_timeout = timeout;
        self
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown_signal.borrow()
    }

    /// Run one import
    ///
    /// Returns either a complete report or a cancellation, never a partial
    /// report. Row-level problems are part of the report, not errors.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error of the run (kind mismatch, load, resolve,
    /// validate or migrate failure). If the run succeeded but the staging
    /// relation could not be dropped, returns the cleanup error instead.
    pub async fn run_import(
        &self,
        kind: EntityKind,
        rows: &[ImportRow],
        mode: ImportMode,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<RunOutcome> {
        check_kind(kind, rows)?;

        let start = Instant::now();
        let mut batch = self.staging.create_batch(kind, mode).await?;
        tracing::info!(
            batch_id = %batch.batch_id,
            kind = %kind,
            mode = %mode,
            rows = rows.len(),
            backend = self.store.backend_name(),
            "Import run started"
        );

        let result = self.drive(&mut batch, rows, on_progress).await;
        if let Err(e) = &result {
            crate::log_error_with_context!(e, "Import run failed, cleaning up staging");
        }

        let timed =
            tokio::time::timeout(self.cleanup_timeout, self.staging.cleanup(&mut batch)).await;
        let cleanup = match timed {
            Ok(outcome) => outcome,
            Err(_) => Err(KarstError::Database(format!(
                "Dropping staging relation {} timed out after {}s",
                batch.relation,
                self.cleanup_timeout.as_secs()
            ))),
        };

        let batch_id = batch.batch_id;
        match (result, cleanup) {
            (Err(e), Err(cleanup_err)) => {
                tracing::error!(
                    batch_id = %batch_id,
                    relation = %batch.relation,
                    error = %cleanup_err,
                    "Staging cleanup failed; run `karst status --purge` to remove it"
                );
                Err(e)
            }
            (Err(e), Ok(_)) => Err(e),
            (Ok(_), Err(cleanup_err)) => {
                tracing::error!(
                    batch_id = %batch_id,
                    relation = %batch.relation,
                    error = %cleanup_err,
                    "Staging cleanup failed; run `karst status --purge` to remove it"
                );
                Err(cleanup_err)
            }
            (Ok(None), Ok(_)) => {
                tracing::warn!(batch_id = %batch_id, "Import run cancelled");
                Ok(RunOutcome::Cancelled { batch_id })
            }
            (Ok(Some(report)), Ok(_)) => {
                report.log_summary();
                tracing::info!(
                    batch_id = %batch_id,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Import run completed"
                );
                Ok(RunOutcome::Completed { batch_id, report })
            }
        }
    }

    /// Steps 2 to 5; `Ok(None)` means cancelled
    async fn drive(
        &self,
        batch: &mut ImportBatch,
        rows: &[ImportRow],
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<Option<ImportReport>> {
        if self.is_cancelled() {
            return Ok(None);
        }
        self.staging.load_rows(batch, rows, on_progress).await?;

        if self.is_cancelled() {
            return Ok(None);
        }
        self.resolver.resolve(batch).await?;

        if self.is_cancelled() {
            return Ok(None);
        }
        self.validator.partition(batch).await?;

        if self.is_cancelled() {
            return Ok(None);
        }
        let labelled = self.store.fetch_staged(&batch.relation).await?;

        let migrated = match batch.mode {
            ImportMode::DryRun => {
                batch.advance(RunState::Reported)?;
                0
            }
            ImportMode::Commit => self.committer.migrate(batch).await?,
        };

        Ok(Some(ImportReport::from_staged(
            batch.kind, batch.mode, labelled, migrated,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::domain::{CaveRecord, EntranceRecord, PipelineError};

    fn controller(memory: Arc<MemoryStore>) -> (RunController, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (RunController::new(memory, 100, rx), tx)
    }

    #[tokio::test]
    async fn test_dry_run_leaves_canonical_untouched() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let (controller, _tx) = controller(memory.clone());

        let rows = vec![ImportRow::Cave(CaveRecord {
            key: "TN001".to_string(),
            name: Some("Blue Spring Cave".to_string()),
            ..Default::default()
        })];
        let outcome = controller
            .run_import(EntityKind::Cave, &rows, ImportMode::DryRun, None)
            .await
            .unwrap();

        let report = outcome.report().unwrap();
        assert_eq!(report.accepted_count, 1);
        assert_eq!(report.migrated_count, 0);
        assert!(memory.caves().is_empty());
        assert!(memory.staging_names().is_empty());
    }

    #[tokio::test]
    async fn test_kind_mismatch_creates_no_staging() {
        let memory = Arc::new(MemoryStore::new());
        let (controller, _tx) = controller(memory.clone());

        let rows = vec![ImportRow::Entrance(EntranceRecord::default())];
        let err = controller
            .run_import(EntityKind::Cave, &rows, ImportMode::Commit, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            KarstError::Pipeline(PipelineError::KindMismatch { .. })
        ));
        assert!(memory.staging_names().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_load() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let (controller, tx) = controller(memory.clone());
        tx.send(true).unwrap();

        let outcome = controller
            .run_import(EntityKind::Cave, &[], ImportMode::Commit, None)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Cancelled { .. }));
        assert!(outcome.report().is_none());
        assert!(memory.staging_names().is_empty());
    }

    #[tokio::test]
    async fn test_progress_callback_borrows_local_state() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let (tx, rx) = watch::channel(false);
        let controller = RunController::new(memory.clone(), 2, rx);

        let rows: Vec<ImportRow> = (1..=5)
            .map(|n| {
                ImportRow::Cave(CaveRecord {
                    key: format!("TN{n:03}"),
                    ..Default::default()
                })
            })
            .collect();

        let seen = std::sync::Mutex::new(Vec::new());
        let on_progress = |done: usize, total: usize| seen.lock().unwrap().push((done, total));
        controller
            .run_import(EntityKind::Cave, &rows, ImportMode::DryRun, Some(&on_progress))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![(2, 5), (4, 5), (5, 5)]);
        drop(tx);
    }
}
