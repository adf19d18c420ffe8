//! Storage abstraction traits
//!
//! This module defines the trait that storage backends must implement to
//! host an import run. Every method is a set-based operation over a whole
//! staging relation (or one chunk of it); none of them loops row by row
//! against canonical storage.

use crate::domain::{BatchId, EntityKind, Result, RowOutcome, StagedRow};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Handle to one batch's staging relation
///
/// Created by the staging store and passed to every later step. The name is
/// derived from the batch id, so two batches never share a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagingRelation {
    /// Owning batch
    pub batch_id: BatchId,

    /// Entity kind the relation holds
    pub kind: EntityKind,

    /// Schema holding the relation (SQL backends only)
    pub schema: Option<String>,

    /// Unqualified relation name
    pub name: String,
}

impl StagingRelation {
    /// Builds the relation handle for a batch
    pub fn for_batch(batch_id: BatchId, kind: EntityKind, schema: Option<String>) -> Self {
        let name = batch_id.relation_name(kind);
        Self {
            batch_id,
            kind,
            schema,
            name,
        }
    }

    /// Schema-qualified name, e.g. `import_staging.cave_0f3a…`
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for StagingRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Result of one set-based resolution pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionOutcome {
    /// Rows that matched exactly one canonical parent
    pub resolved_count: usize,

    /// Rows that matched zero or several parents, or had a malformed key,
    /// with the reason written onto them
    pub orphans: Vec<(usize, String)>,
}

/// Cross-row facts materialized for one resolved, unlabeled staged row
///
/// Computed by the backend in a single pass over the whole relation; the
/// validator then decides each row from its own facts alone.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFacts {
    /// The staged row itself
    pub row: StagedRow,

    /// Another staged row carries the same identity key
    pub duplicate_within_import: bool,

    /// Canonical storage already holds this identity
    pub canonical_duplicate_exists: bool,

    /// Resolved staged rows claiming primary for this row's parent
    pub primary_claims_for_parent: u32,

    /// Canonical storage already has a primary child for this row's parent
    pub canonical_primary_exists: bool,
}

/// An outcome to write back onto a staged row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLabel {
    pub row_index: usize,
    pub outcome: RowOutcome,
}

/// A staging relation found in storage, possibly left behind by a crash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagingListing {
    /// Schema-qualified relation name
    pub name: String,

    /// Rows currently held
    pub row_count: u64,
}

/// Storage backend for the import pipeline
///
/// The staging half (create, append, resolve, snapshot, label, fetch, drop)
/// is only ever called by the pipeline components that own each step.
/// `migrate_accepted` is the only method that writes canonical storage.
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Schema that staging relations are created in, if the backend has schemas
    fn staging_schema(&self) -> Option<&str>;

    /// Test the storage connection
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn test_connection(&self) -> Result<()>;

    /// Ensure canonical tables and the staging area exist
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    async fn ensure_schema(&self) -> Result<()>;

    /// Create an empty staging relation
    ///
    /// # Errors
    ///
    /// Returns an error if the relation cannot be created or already exists.
    async fn create_staging(&self, relation: &StagingRelation) -> Result<()>;

    /// Append one chunk of rows to a staging relation
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be written; nothing from the
    /// chunk is visible afterwards.
    async fn append_staged(&self, relation: &StagingRelation, rows: &[StagedRow]) -> Result<()>;

    /// Join every staged row to canonical parents by natural key
    ///
    /// Writes the parent id onto rows with exactly one match and an orphan
    /// outcome onto every other row, in one set-based update.
    ///
    /// # Errors
    ///
    /// Returns an error if the join cannot execute.
    async fn resolve_parents(&self, relation: &StagingRelation) -> Result<ResolutionOutcome>;

    /// Materialize the cross-row facts for every resolved, unlabeled row
    ///
    /// # Errors
    ///
    /// Returns an error if the facts cannot be computed.
    async fn validation_snapshot(&self, relation: &StagingRelation) -> Result<Vec<RowFacts>>;

    /// Write outcomes back onto staged rows in one update
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn label_rows(&self, relation: &StagingRelation, labels: &[RowLabel]) -> Result<()>;

    /// Read every staged row in row order
    ///
    /// # Errors
    ///
    /// Returns an error if the relation cannot be read.
    async fn fetch_staged(&self, relation: &StagingRelation) -> Result<Vec<StagedRow>>;

    /// Copy the accepted subset into canonical storage in one transaction
    ///
    /// Derived columns (the entrance location point) are computed in the
    /// same statement. Either every accepted row lands or none does.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails; canonical storage is then
    /// unchanged.
    async fn migrate_accepted(&self, relation: &StagingRelation) -> Result<u64>;

    /// Drop a staging relation
    ///
    /// Returns whether a relation was actually dropped. Dropping a relation
    /// that does not exist is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend refuses the drop.
    async fn drop_staging(&self, relation: &StagingRelation) -> Result<bool>;

    /// Check whether a staging relation exists
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be queried.
    async fn staging_exists(&self, relation: &StagingRelation) -> Result<bool>;

    /// List every staging relation currently in storage
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue cannot be queried.
    async fn list_staging(&self) -> Result<Vec<StagingListing>>;

    /// Drop a staging relation by its listed name
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a staging relation or the drop fails.
    async fn drop_staging_by_name(&self, name: &str) -> Result<bool>;
}
