//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use fake::faker::name::en::Name;
use fake::Fake;
use karst::adapters::database::{
    ImportStore, ResolutionOutcome, RowFacts, RowLabel, StagingListing, StagingRelation,
};
use karst::adapters::memory::MemoryStore;
use karst::core::import::RunController;
use karst::domain::{
    CaveRecord, EntranceRecord, ImportRow, KarstError, Result, StagedRow,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// A small catalogue:
///
/// - regions TN, AL, and two regions coded GA (so `GA…` keys are ambiguous)
/// - caves TN001 Blue Spring Cave, TN002 Cumberland Caverns, AL001 Fern Cave
/// - TN002 already has a primary entrance "Main"
pub fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let tn = store.add_region("TN", "Tennessee");
    let al = store.add_region("AL", "Alabama");
    store.add_region("GA", "Georgia");
    store.add_region("GA", "Georgia (survey)");

    store.add_cave(tn, 1, "Blue Spring Cave");
    let cumberland = store.add_cave(tn, 2, "Cumberland Caverns");
    store.add_cave(al, 1, "Fern Cave");
    store.add_entrance(cumberland, Some("Main"), true);
    store
}

pub fn cave(key: &str, name: &str) -> ImportRow {
    ImportRow::Cave(CaveRecord {
        key: key.to_string(),
        name: Some(name.to_string()),
        length_ft: Some(250.0),
        depth_ft: Some(40.0),
    })
}

pub fn entrance(cave_key: &str, name: &str, is_primary: bool) -> ImportRow {
    ImportRow::Entrance(EntranceRecord {
        cave_key: cave_key.to_string(),
        name: Some(name.to_string()),
        latitude: Some(35.62),
        longitude: Some(-85.31),
        elevation_ft: Some(1020.0),
        is_primary,
    })
}

/// `count` non-primary entrances with generated names and coordinates
pub fn generated_entrances(cave_key: &str, count: usize) -> Vec<ImportRow> {
    (0..count)
        .map(|i| {
            let name: String = Name().fake();
            ImportRow::Entrance(EntranceRecord {
                cave_key: cave_key.to_string(),
                name: Some(format!("{name} {i}")),
                latitude: Some((30.0..40.0).fake::<f64>()),
                longitude: Some((-90.0..-80.0).fake::<f64>()),
                elevation_ft: Some((200.0..3000.0).fake::<f64>()),
                is_primary: false,
            })
        })
        .collect()
}

pub fn controller(store: Arc<dyn ImportStore>, chunk_size: usize) -> (RunController, watch::Sender<bool>) {
    let (tx, rx) = watch::channel(false);
    (RunController::new(store, chunk_size, rx), tx)
}

/// Operation a [`FaultyStore`] can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    Create,
    Append,
    Resolve,
    Snapshot,
    Label,
    Fetch,
    Migrate,
    Drop,
}

/// Wraps a [`MemoryStore`] and fails chosen operations
pub struct FaultyStore {
    pub inner: Arc<MemoryStore>,
    fail: Mutex<Vec<FailPoint>>,
    before_migrate: Mutex<Option<Box<dyn FnOnce(&MemoryStore) + Send>>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail: Mutex::new(Vec::new()),
            before_migrate: Mutex::new(None),
        }
    }

    /// Fail the next call of `point`; later calls succeed
    pub fn fail_once(&self, point: FailPoint) {
        self.fail.lock().unwrap().push(point);
    }

    /// Run `hook` against the canonical store just before migration starts
    pub fn before_migrate(&self, hook: impl FnOnce(&MemoryStore) + Send + 'static) {
        *self.before_migrate.lock().unwrap() = Some(Box::new(hook));
    }

    fn check(&self, point: FailPoint) -> Result<()> {
        let mut fail = self.fail.lock().unwrap();
        match fail.iter().position(|p| *p == point) {
            Some(i) => {
                fail.remove(i);
                Err(KarstError::Database(format!("injected {point:?} failure")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ImportStore for FaultyStore {
    fn backend_name(&self) -> &'static str {
        "faulty-memory"
    }

    fn staging_schema(&self) -> Option<&str> {
        self.inner.staging_schema()
    }

    async fn test_connection(&self) -> Result<()> {
        self.inner.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.inner.ensure_schema().await
    }

    async fn create_staging(&self, relation: &StagingRelation) -> Result<()> {
        self.check(FailPoint::Create)?;
        self.inner.create_staging(relation).await
    }

    async fn append_staged(&self, relation: &StagingRelation, rows: &[StagedRow]) -> Result<()> {
        self.check(FailPoint::Append)?;
        self.inner.append_staged(relation, rows).await
    }

    async fn resolve_parents(&self, relation: &StagingRelation) -> Result<ResolutionOutcome> {
        self.check(FailPoint::Resolve)?;
        self.inner.resolve_parents(relation).await
    }

    async fn validation_snapshot(&self, relation: &StagingRelation) -> Result<Vec<RowFacts>> {
        self.check(FailPoint::Snapshot)?;
        self.inner.validation_snapshot(relation).await
    }

    async fn label_rows(&self, relation: &StagingRelation, labels: &[RowLabel]) -> Result<()> {
        self.check(FailPoint::Label)?;
        self.inner.label_rows(relation, labels).await
    }

    async fn fetch_staged(&self, relation: &StagingRelation) -> Result<Vec<StagedRow>> {
        self.check(FailPoint::Fetch)?;
        self.inner.fetch_staged(relation).await
    }

    async fn migrate_accepted(&self, relation: &StagingRelation) -> Result<u64> {
        let hook = self.before_migrate.lock().unwrap().take();
        if let Some(hook) = hook {
            hook(&self.inner);
        }
        self.check(FailPoint::Migrate)?;
        self.inner.migrate_accepted(relation).await
    }

    async fn drop_staging(&self, relation: &StagingRelation) -> Result<bool> {
        self.check(FailPoint::Drop)?;
        self.inner.drop_staging(relation).await
    }

    async fn staging_exists(&self, relation: &StagingRelation) -> Result<bool> {
        self.inner.staging_exists(relation).await
    }

    async fn list_staging(&self) -> Result<Vec<StagingListing>> {
        self.inner.list_staging().await
    }

    async fn drop_staging_by_name(&self, name: &str) -> Result<bool> {
        self.inner.drop_staging_by_name(name).await
    }
}
