//! In-memory implementation of [`ImportStore`]
//!
//! Canonical tables and staging relations live behind one mutex. Every
//! operation takes the lock once, so each call is atomic with respect to
//! other batches, the same way a single SQL statement is.

use crate::adapters::database::traits::{
    ImportStore, ResolutionOutcome, RowFacts, RowLabel, StagingListing, StagingRelation,
};
use crate::domain::{
    Cave, EntityKind, Entrance, GeoPoint, KarstError, OrphanReason, Region, Result, RowOutcome,
    StagedRow,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct StagingTable {
    kind: EntityKind,
    rows: BTreeMap<usize, StagedRow>,
}

#[derive(Debug, Default)]
struct MemoryState {
    regions: Vec<Region>,
    caves: Vec<Cave>,
    entrances: Vec<Entrance>,
    next_id: i64,
    staging: BTreeMap<String, StagingTable>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn table(&self, relation: &StagingRelation) -> Result<&StagingTable> {
        self.staging
            .get(&relation.qualified_name())
            .ok_or_else(|| missing_relation(relation))
    }

    fn table_mut(&mut self, relation: &StagingRelation) -> Result<&mut StagingTable> {
        self.staging
            .get_mut(&relation.qualified_name())
            .ok_or_else(|| missing_relation(relation))
    }

    /// Canonical parent ids keyed by natural key text (`TN` or `TN001`)
    fn parent_index(&self, kind: EntityKind) -> HashMap<String, Vec<i64>> {
        let mut index: HashMap<String, Vec<i64>> = HashMap::new();
        match kind {
            EntityKind::Cave => {
                for region in &self.regions {
                    index
                        .entry(region.code.to_ascii_uppercase())
                        .or_default()
                        .push(region.id);
                }
            }
            EntityKind::Entrance => {
                let codes: HashMap<i64, String> = self
                    .regions
                    .iter()
                    .map(|r| (r.id, r.code.to_ascii_uppercase()))
                    .collect();
                for cave in &self.caves {
                    if let Some(code) = codes.get(&cave.region_id) {
                        index
                            .entry(format!("{code}{:03}", cave.number))
                            .or_default()
                            .push(cave.id);
                    }
                }
            }
        }
        index
    }
}

fn missing_relation(relation: &StagingRelation) -> KarstError {
    KarstError::Database(format!("relation \"{relation}\" does not exist"))
}

fn lookup_key(kind: EntityKind, row: &StagedRow) -> Option<String> {
    let key = row.natural_key.as_ref()?;
    Some(match kind {
        EntityKind::Cave => key.region.as_str().to_string(),
        EntityKind::Entrance => key.to_string(),
    })
}

/// In-process import store
///
/// Behaves like the PostgreSQL backend: same resolution rules, same
/// rejection facts, same one-primary-entrance-per-cave constraint, and an
/// all-or-nothing migration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock leaves plain data behind; keep serving it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a canonical region, returning its id
    pub fn add_region(&self, code: &str, name: &str) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.regions.push(Region {
            id,
            code: code.to_string(),
            name: name.to_string(),
        });
        id
    }

    /// Seed a canonical cave, returning its id
    pub fn add_cave(&self, region_id: i64, number: u32, name: &str) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.caves.push(Cave {
            id,
            region_id,
            number,
            name: name.to_string(),
            length_ft: None,
            depth_ft: None,
        });
        id
    }

    /// Seed a canonical entrance, returning its id
    ///
    /// Seeding bypasses the primary constraint, so tests can also stage a
    /// competing primary right before a commit.
    pub fn add_entrance(&self, cave_id: i64, name: Option<&str>, is_primary: bool) -> i64 {
        let mut state = self.lock();
        let id = state.allocate_id();
        state.entrances.push(Entrance {
            id,
            cave_id,
            name: name.map(str::to_string),
            latitude: 0.0,
            longitude: 0.0,
            elevation_ft: 0.0,
            is_primary,
            location: GeoPoint::from_lat_lon_elev(0.0, 0.0, 0.0),
        });
        id
    }

    /// Snapshot of canonical regions
    pub fn regions(&self) -> Vec<Region> {
        self.lock().regions.clone()
    }

    /// Snapshot of canonical caves
    pub fn caves(&self) -> Vec<Cave> {
        self.lock().caves.clone()
    }

    /// Snapshot of canonical entrances
    pub fn entrances(&self) -> Vec<Entrance> {
        self.lock().entrances.clone()
    }

    /// Names of the staging relations currently held
    pub fn staging_names(&self) -> Vec<String> {
        self.lock().staging.keys().cloned().collect()
    }
}

#[async_trait]
impl ImportStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn staging_schema(&self) -> Option<&str> {
        None
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn create_staging(&self, relation: &StagingRelation) -> Result<()> {
        let mut state = self.lock();
        let name = relation.qualified_name();
        if state.staging.contains_key(&name) {
            return Err(KarstError::Database(format!(
                "relation \"{name}\" already exists"
            )));
        }
        state.staging.insert(
            name,
            StagingTable {
                kind: relation.kind,
                rows: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn append_staged(&self, relation: &StagingRelation, rows: &[StagedRow]) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(relation)?;

        if let Some(dup) = rows.iter().find(|r| table.rows.contains_key(&r.row_index)) {
            return Err(KarstError::Database(format!(
                "duplicate row_index {} in \"{relation}\"",
                dup.row_index
            )));
        }

        for row in rows {
            table.rows.insert(row.row_index, row.clone());
        }
        Ok(())
    }

    async fn resolve_parents(&self, relation: &StagingRelation) -> Result<ResolutionOutcome> {
        let mut state = self.lock();
        let kind = state.table(relation)?.kind;
        let index = state.parent_index(kind);
        let table = state.table_mut(relation)?;

        let mut outcome = ResolutionOutcome::default();
        for row in table.rows.values_mut() {
            let matches = lookup_key(kind, row).and_then(|key| index.get(&key));
            let orphan = match (&row.natural_key, matches.map(Vec::as_slice)) {
                (None, _) => Some(OrphanReason::MalformedKey),
                (Some(_), None) | (Some(_), Some([])) => Some(OrphanReason::NoMatchingParent),
                (Some(_), Some([parent_id])) => {
                    row.parent_id = Some(*parent_id);
                    None
                }
                (Some(_), Some(_)) => Some(OrphanReason::AmbiguousKey),
            };

            match orphan {
                Some(reason) => {
                    row.parent_id = None;
                    row.outcome = Some(reason.into());
                    outcome.orphans.push((row.row_index, reason.to_string()));
                }
                None => outcome.resolved_count += 1,
            }
        }

        Ok(outcome)
    }

    async fn validation_snapshot(&self, relation: &StagingRelation) -> Result<Vec<RowFacts>> {
        let state = self.lock();
        let table = state.table(relation)?;

        let mut identity_counts: HashMap<&str, usize> = HashMap::new();
        let mut primary_claims: HashMap<i64, u32> = HashMap::new();
        for row in table.rows.values() {
            if let Some(identity) = row.identity_key.as_deref() {
                *identity_counts.entry(identity).or_default() += 1;
            }
            if let (Some(parent_id), true) = (row.parent_id, row.is_primary) {
                *primary_claims.entry(parent_id).or_default() += 1;
            }
        }

        let primary_parents: HashSet<i64> = state
            .entrances
            .iter()
            .filter(|e| e.is_primary)
            .map(|e| e.cave_id)
            .collect();
        let canonical_caves: HashSet<(i64, u32)> =
            state.caves.iter().map(|c| (c.region_id, c.number)).collect();
        let canonical_entrances: HashSet<(i64, String)> = state
            .entrances
            .iter()
            .filter_map(|e| e.name.as_deref().map(|n| (e.cave_id, n.to_lowercase())))
            .collect();

        let facts = table
            .rows
            .values()
            .filter(|row| row.parent_id.is_some() && row.outcome.is_none())
            .map(|row| {
                let parent_id = row.parent_id.unwrap_or_default();
                let canonical_duplicate_exists = match table.kind {
                    EntityKind::Cave => row
                        .natural_key
                        .as_ref()
                        .is_some_and(|key| canonical_caves.contains(&(parent_id, key.number))),
                    EntityKind::Entrance => row.name.as_deref().is_some_and(|name| {
                        canonical_entrances.contains(&(parent_id, name.to_lowercase()))
                    }),
                };

                RowFacts {
                    duplicate_within_import: row
                        .identity_key
                        .as_deref()
                        .is_some_and(|identity| identity_counts[identity] > 1),
                    canonical_duplicate_exists,
                    primary_claims_for_parent: if row.is_primary {
                        primary_claims.get(&parent_id).copied().unwrap_or(0)
                    } else {
                        0
                    },
                    canonical_primary_exists: table.kind == EntityKind::Entrance
                        && primary_parents.contains(&parent_id),
                    row: row.clone(),
                }
            })
            .collect();

        Ok(facts)
    }

    async fn label_rows(&self, relation: &StagingRelation, labels: &[RowLabel]) -> Result<()> {
        let mut state = self.lock();
        let table = state.table_mut(relation)?;

        if let Some(missing) = labels.iter().find(|l| !table.rows.contains_key(&l.row_index)) {
            return Err(KarstError::Database(format!(
                "no staged row {} in \"{relation}\"",
                missing.row_index
            )));
        }

        for label in labels {
            if let Some(row) = table.rows.get_mut(&label.row_index) {
                row.outcome = Some(label.outcome.clone());
            }
        }
        Ok(())
    }

    async fn fetch_staged(&self, relation: &StagingRelation) -> Result<Vec<StagedRow>> {
        let state = self.lock();
        Ok(state.table(relation)?.rows.values().cloned().collect())
    }

    async fn migrate_accepted(&self, relation: &StagingRelation) -> Result<u64> {
        let mut state = self.lock();
        let table = state.table(relation)?;
        let kind = table.kind;
        let accepted: Vec<StagedRow> = table
            .rows
            .values()
            .filter(|r| r.outcome == Some(RowOutcome::Accepted))
            .cloned()
            .collect();

        // Build every new row first; canonical tables change only if all succeed
        match kind {
            EntityKind::Cave => {
                let mut new_caves = Vec::with_capacity(accepted.len());
                for row in &accepted {
                    let (region_id, key, name) = match (row.parent_id, &row.natural_key, &row.name)
                    {
                        (Some(p), Some(k), Some(n)) => (p, k, n),
                        _ => {
                            return Err(KarstError::Database(format!(
                                "null value in accepted cave row {}",
                                row.row_index
                            )))
                        }
                    };
                    if !state.regions.iter().any(|r| r.id == region_id) {
                        return Err(KarstError::Database(format!(
                            "region {region_id} referenced by row {} does not exist",
                            row.row_index
                        )));
                    }
                    new_caves.push((region_id, key.number, name.clone(), row));
                }

                let count = new_caves.len() as u64;
                for (region_id, number, name, row) in new_caves {
                    let id = state.allocate_id();
                    state.caves.push(Cave {
                        id,
                        region_id,
                        number,
                        name,
                        length_ft: row.length_ft,
                        depth_ft: row.depth_ft,
                    });
                }
                Ok(count)
            }
            EntityKind::Entrance => {
                let mut primaries: HashSet<i64> = state
                    .entrances
                    .iter()
                    .filter(|e| e.is_primary)
                    .map(|e| e.cave_id)
                    .collect();

                let mut new_entrances = Vec::with_capacity(accepted.len());
                for row in &accepted {
                    let (cave_id, lat, lon, elev) =
                        match (row.parent_id, row.latitude, row.longitude, row.elevation_ft) {
                            (Some(c), Some(lat), Some(lon), Some(elev)) => (c, lat, lon, elev),
                            _ => {
                                return Err(KarstError::Database(format!(
                                    "null value in accepted entrance row {}",
                                    row.row_index
                                )))
                            }
                        };
                    if !state.caves.iter().any(|c| c.id == cave_id) {
                        return Err(KarstError::Database(format!(
                            "cave {cave_id} referenced by row {} does not exist",
                            row.row_index
                        )));
                    }
                    if row.is_primary && !primaries.insert(cave_id) {
                        return Err(KarstError::Database(format!(
                            "duplicate key value violates unique constraint \
                             \"entrances_one_primary_per_cave\" (cave_id)=({cave_id})"
                        )));
                    }
                    new_entrances.push((cave_id, lat, lon, elev, row));
                }

                let count = new_entrances.len() as u64;
                for (cave_id, lat, lon, elev, row) in new_entrances {
                    let id = state.allocate_id();
                    state.entrances.push(Entrance {
                        id,
                        cave_id,
                        name: row.name.clone(),
                        latitude: lat,
                        longitude: lon,
                        elevation_ft: elev,
                        is_primary: row.is_primary,
                        location: GeoPoint::from_lat_lon_elev(lat, lon, elev),
                    });
                }
                Ok(count)
            }
        }
    }

    async fn drop_staging(&self, relation: &StagingRelation) -> Result<bool> {
        Ok(self
            .lock()
            .staging
            .remove(&relation.qualified_name())
            .is_some())
    }

    async fn staging_exists(&self, relation: &StagingRelation) -> Result<bool> {
        Ok(self.lock().staging.contains_key(&relation.qualified_name()))
    }

    async fn list_staging(&self) -> Result<Vec<StagingListing>> {
        Ok(self
            .lock()
            .staging
            .iter()
            .map(|(name, table)| StagingListing {
                name: name.clone(),
                row_count: table.rows.len() as u64,
            })
            .collect())
    }

    async fn drop_staging_by_name(&self, name: &str) -> Result<bool> {
        Ok(self.lock().staging.remove(name).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BatchId, CaveRecord, EntranceRecord, ImportRow, RejectReason};

    fn entrance_row(index: usize, key: &str, name: &str, primary: bool) -> StagedRow {
        StagedRow::from_import_row(
            index,
            &ImportRow::Entrance(EntranceRecord {
                cave_key: key.to_string(),
                name: Some(name.to_string()),
                latitude: Some(36.0),
                longitude: Some(-85.0),
                elevation_ft: Some(1000.0),
                is_primary: primary,
            }),
        )
    }

    async fn staged(store: &MemoryStore, rows: Vec<StagedRow>) -> StagingRelation {
        let relation = StagingRelation::for_batch(BatchId::new(), EntityKind::Entrance, None);
        store.create_staging(&relation).await.unwrap();
        store.append_staged(&relation, &rows).await.unwrap();
        relation
    }

    #[tokio::test]
    async fn test_resolve_exact_missing_and_ambiguous() {
        let store = MemoryStore::new();
        let tn = store.add_region("TN", "Tennessee");
        let cave = store.add_cave(tn, 1, "Blue Spring Cave");
        store.add_cave(tn, 2, "Twin A");
        store.add_cave(tn, 2, "Twin B");

        let relation = staged(
            &store,
            vec![
                entrance_row(0, "TN001", "Main", false),
                entrance_row(1, "TN002", "Upper", false),
                entrance_row(2, "ZZ999", "Lost", false),
                entrance_row(3, "??", "Bad", false),
            ],
        )
        .await;

        let outcome = store.resolve_parents(&relation).await.unwrap();
        assert_eq!(outcome.resolved_count, 1);
        assert_eq!(
            outcome.orphans,
            vec![
                (1, "ambiguous key".to_string()),
                (2, "no matching parent".to_string()),
                (3, "malformed key".to_string()),
            ]
        );

        let rows = store.fetch_staged(&relation).await.unwrap();
        assert_eq!(rows[0].parent_id, Some(cave));
        assert!(rows[1].parent_id.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_counts_primary_claims_per_parent() {
        let store = MemoryStore::new();
        let tn = store.add_region("TN", "Tennessee");
        let one = store.add_cave(tn, 1, "One");
        let two = store.add_cave(tn, 2, "Two");
        store.add_entrance(two, Some("Old"), true);

        let relation = staged(
            &store,
            vec![
                entrance_row(0, "TN001", "A", true),
                entrance_row(1, "TN001", "B", true),
                entrance_row(2, "TN002", "C", true),
                entrance_row(3, "TN002", "old", false),
            ],
        )
        .await;
        store.resolve_parents(&relation).await.unwrap();

        let facts = store.validation_snapshot(&relation).await.unwrap();
        assert_eq!(facts.len(), 4);
        assert_eq!(facts[0].row.parent_id, Some(one));
        assert_eq!(facts[0].primary_claims_for_parent, 2);
        assert!(!facts[0].canonical_primary_exists);
        assert_eq!(facts[2].primary_claims_for_parent, 1);
        assert!(facts[2].canonical_primary_exists);
        assert!(facts[3].canonical_duplicate_exists);
        assert!(!facts[3].duplicate_within_import);
    }

    #[tokio::test]
    async fn test_snapshot_flags_canonical_duplicates_among_many() {
        let store = MemoryStore::new();
        let tn = store.add_region("TN", "Tennessee");
        let al = store.add_region("AL", "Alabama");
        for number in 1..=200 {
            store.add_cave(tn, number, &format!("Cave {number}"));
        }
        let cave = store.caves()[0].id;
        for n in 0..500 {
            store.add_entrance(cave, Some(&format!("Shaft {n}")), false);
        }
        store.add_cave(al, 7, "Elsewhere");

        let relation = staged(
            &store,
            vec![
                entrance_row(0, "TN001", "SHAFT 499", false),
                entrance_row(1, "TN001", "Shaft 500", false),
                entrance_row(2, "TN002", "Shaft 1", false),
            ],
        )
        .await;
        store.resolve_parents(&relation).await.unwrap();
        let facts = store.validation_snapshot(&relation).await.unwrap();
        assert!(facts[0].canonical_duplicate_exists);
        assert!(!facts[1].canonical_duplicate_exists);
        assert!(!facts[2].canonical_duplicate_exists);

        let caves = StagingRelation::for_batch(BatchId::new(), EntityKind::Cave, None);
        store.create_staging(&caves).await.unwrap();
        let rows: Vec<StagedRow> = ["TN200", "TN201", "AL007", "AL200"]
            .iter()
            .enumerate()
            .map(|(i, key)| {
                StagedRow::from_import_row(
                    i,
                    &ImportRow::Cave(CaveRecord {
                        key: key.to_string(),
                        name: Some("Staged".to_string()),
                        ..Default::default()
                    }),
                )
            })
            .collect();
        store.append_staged(&caves, &rows).await.unwrap();
        store.resolve_parents(&caves).await.unwrap();

        let flags: Vec<bool> = store
            .validation_snapshot(&caves)
            .await
            .unwrap()
            .iter()
            .map(|f| f.canonical_duplicate_exists)
            .collect();
        assert_eq!(flags, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn test_migrate_is_all_or_nothing() {
        let store = MemoryStore::new();
        let tn = store.add_region("TN", "Tennessee");
        let cave = store.add_cave(tn, 1, "One");

        let relation = staged(
            &store,
            vec![
                entrance_row(0, "TN001", "A", false),
                entrance_row(1, "TN001", "B", true),
            ],
        )
        .await;
        store.resolve_parents(&relation).await.unwrap();
        store
            .label_rows(
                &relation,
                &[
                    RowLabel {
                        row_index: 0,
                        outcome: RowOutcome::Accepted,
                    },
                    RowLabel {
                        row_index: 1,
                        outcome: RowOutcome::Accepted,
                    },
                ],
            )
            .await
            .unwrap();

        // A competing primary lands after validation
        store.add_entrance(cave, Some("Rival"), true);

        assert!(store.migrate_accepted(&relation).await.is_err());
        assert_eq!(store.entrances().len(), 1);
    }

    #[tokio::test]
    async fn test_migrate_derives_location() {
        let store = MemoryStore::new();
        let tn = store.add_region("TN", "Tennessee");
        store.add_cave(tn, 1, "One");

        let relation = staged(&store, vec![entrance_row(0, "TN001", "A", true)]).await;
        store.resolve_parents(&relation).await.unwrap();
        store
            .label_rows(
                &relation,
                &[RowLabel {
                    row_index: 0,
                    outcome: RowOutcome::Accepted,
                }],
            )
            .await
            .unwrap();

        assert_eq!(store.migrate_accepted(&relation).await.unwrap(), 1);
        let entrance = &store.entrances()[0];
        assert_eq!(entrance.location, GeoPoint::from_lat_lon_elev(36.0, -85.0, 1000.0));
    }

    #[tokio::test]
    async fn test_drop_staging_is_idempotent() {
        let store = MemoryStore::new();
        let relation = staged(&store, vec![]).await;

        assert!(store.drop_staging(&relation).await.unwrap());
        assert!(!store.drop_staging(&relation).await.unwrap());
        assert!(!store.staging_exists(&relation).await.unwrap());
        assert!(store.fetch_staged(&relation).await.is_err());
    }

    #[tokio::test]
    async fn test_label_unknown_row_fails() {
        let store = MemoryStore::new();
        let relation = staged(&store, vec![entrance_row(0, "TN001", "A", false)]).await;
        let result = store
            .label_rows(
                &relation,
                &[RowLabel {
                    row_index: 9,
                    outcome: RejectReason::DuplicateWithinImport.into(),
                }],
            )
            .await;
        assert!(result.is_err());
    }
}
