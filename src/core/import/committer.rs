//! Migration committer: accepted staged rows into canonical storage

use crate::adapters::database::ImportStore;
use crate::core::import::batch::{ImportBatch, RunState};
use crate::domain::{ImportMode, PipelineError, Result};
use std::sync::Arc;
use std::time::Instant;

/// Copies the accepted subset of a batch in one transaction
///
/// Batches are single-use: a successful migration moves the batch to
/// [`RunState::Migrated`], after which a second call fails with an illegal
/// transition.
pub struct MigrationCommitter {
    store: Arc<dyn ImportStore>,
}

impl MigrationCommitter {
    pub fn new(store: Arc<dyn ImportStore>) -> Self {
        Self { store }
    }

    /// Migrate every accepted row of a partitioned commit-mode batch
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MigrationFailed`] if the transaction fails;
    /// nothing from the batch is visible in canonical storage afterwards.
    pub async fn migrate(&self, batch: &mut ImportBatch) -> Result<u64> {
        if batch.mode != ImportMode::Commit || batch.state() != RunState::Partitioned {
            return Err(PipelineError::IllegalTransition {
                from: batch.state().to_string(),
                to: RunState::Migrated.to_string(),
            }
            .into());
        }

        let start = Instant::now();
        let migrated = self
            .store
            .migrate_accepted(&batch.relation)
            .await
            .map_err(|e| PipelineError::MigrationFailed(e.to_string()))?;

        batch.advance(RunState::Migrated)?;
        tracing::info!(
            batch_id = %batch.batch_id,
            kind = %batch.kind,
            migrated,
            duration_ms = start.elapsed().as_millis() as u64,
            "Accepted rows migrated"
        );
        Ok(migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::import::resolver::KeyResolver;
    use crate::core::import::staging::StagingStore;
    use crate::core::import::validator::InvariantValidator;
    use crate::domain::{CaveRecord, EntityKind, ImportRow, KarstError};

    async fn partitioned(memory: Arc<MemoryStore>, mode: ImportMode) -> ImportBatch {
        let staging = StagingStore::new(memory.clone(), 100);
        let mut batch = staging.create_batch(EntityKind::Cave, mode).await.unwrap();
        let rows = vec![
            ImportRow::Cave(CaveRecord {
                key: "TN001".to_string(),
                name: Some("Blue Spring Cave".to_string()),
                length_ft: Some(120.0),
                depth_ft: Some(30.0),
            }),
            ImportRow::Cave(CaveRecord {
                key: "TN002".to_string(),
                name: None,
                ..Default::default()
            }),
        ];
        staging.load_rows(&mut batch, &rows, None).await.unwrap();
        KeyResolver::new(memory.clone())
            .resolve(&mut batch)
            .await
            .unwrap();
        InvariantValidator::new(memory)
            .partition(&mut batch)
            .await
            .unwrap();
        batch
    }

    #[tokio::test]
    async fn test_migrates_only_accepted_rows() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let mut batch = partitioned(memory.clone(), ImportMode::Commit).await;

        let migrated = MigrationCommitter::new(memory.clone())
            .migrate(&mut batch)
            .await
            .unwrap();

        assert_eq!(migrated, 1);
        assert_eq!(batch.state(), RunState::Migrated);
        let caves = memory.caves();
        assert_eq!(caves.len(), 1);
        assert_eq!(caves[0].number, 1);
        assert_eq!(caves[0].name, "Blue Spring Cave");
    }

    #[tokio::test]
    async fn test_batches_are_single_use() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let mut batch = partitioned(memory.clone(), ImportMode::Commit).await;
        let committer = MigrationCommitter::new(memory.clone());

        committer.migrate(&mut batch).await.unwrap();
        let err = committer.migrate(&mut batch).await.unwrap_err();

        assert!(matches!(
            err,
            KarstError::Pipeline(PipelineError::IllegalTransition { .. })
        ));
        assert_eq!(memory.caves().len(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_batch_is_refused() {
        let memory = Arc::new(MemoryStore::new());
        memory.add_region("TN", "Tennessee");
        let mut batch = partitioned(memory.clone(), ImportMode::DryRun).await;

        assert!(MigrationCommitter::new(memory.clone())
            .migrate(&mut batch)
            .await
            .is_err());
        assert!(memory.caves().is_empty());
    }
}
