//! PostgreSQL adapter implementing [`ImportStore`]
//!
//! Each pipeline step is one statement against the batch's staging relation.
//! Relation names are never user input: the schema is validated at config
//! load and the table name is derived from the batch UUID.

use crate::adapters::database::traits::{
    ImportStore, ResolutionOutcome, RowFacts, RowLabel, StagingListing, StagingRelation,
};
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::adapters::postgresql::models::{
    staged_row_from_pg, LabelColumns, StagedColumns, STAGED_COLUMNS,
};
use crate::domain::{EntityKind, KarstError, Result, StagedRow};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

fn staging_table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(cave|entrance)_[0-9a-f]{32}$").expect("staging table pattern is valid")
    })
}

fn db_error(context: &str, relation: &StagingRelation, e: tokio_postgres::Error) -> KarstError {
    KarstError::Database(format!("{context} on {relation}: {e}"))
}

/// PostgreSQL implementation of the import store
pub struct PostgreSQLStore {
    client: Arc<PostgreSQLClient>,
    staging_schema: String,
}

impl PostgreSQLStore {
    /// Create a new PostgreSQL store
    pub fn new(client: PostgreSQLClient, staging_schema: String) -> Self {
        Self {
            client: Arc::new(client),
            staging_schema,
        }
    }

    /// Get a reference to the underlying client
    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

fn create_staging_sql(relation: &StagingRelation) -> String {
    format!(
        "CREATE UNLOGGED TABLE {relation} (
            row_index     INTEGER PRIMARY KEY,
            raw_key       TEXT NOT NULL,
            region_code   TEXT,
            region_number INTEGER,
            key_error     TEXT,
            identity_key  TEXT,
            name          TEXT,
            length_ft     DOUBLE PRECISION,
            depth_ft      DOUBLE PRECISION,
            latitude      DOUBLE PRECISION,
            longitude     DOUBLE PRECISION,
            elevation_ft  DOUBLE PRECISION,
            is_primary    BOOLEAN NOT NULL DEFAULT FALSE,
            parent_id     BIGINT,
            outcome       TEXT,
            reason        TEXT
        )"
    )
}

fn append_sql(relation: &StagingRelation) -> String {
    format!(
        "INSERT INTO {relation} (
            row_index, raw_key, region_code, region_number, key_error, identity_key,
            name, length_ft, depth_ft, latitude, longitude, elevation_ft, is_primary
        )
        SELECT * FROM UNNEST(
            $1::int4[], $2::text[], $3::text[], $4::int4[], $5::text[], $6::text[],
            $7::text[], $8::float8[], $9::float8[], $10::float8[], $11::float8[],
            $12::float8[], $13::bool[]
        )"
    )
}

/// One set-based update: count candidate parents per row, keep the id only
/// when the count is exactly one, otherwise write the orphan reason
fn resolve_sql(relation: &StagingRelation) -> String {
    let parent_join = match relation.kind {
        EntityKind::Cave => "LEFT JOIN regions p ON upper(p.code) = s2.region_code",
        EntityKind::Entrance => {
            "LEFT JOIN (caves p JOIN regions r ON r.id = p.region_id)
                ON upper(r.code) = s2.region_code AND p.number = s2.region_number"
        }
    };

    format!(
        "WITH matches AS (
            SELECT s2.row_index, COUNT(p.id) AS match_count, MIN(p.id) AS parent_id
            FROM {relation} s2
            {parent_join}
            GROUP BY s2.row_index
        )
        UPDATE {relation} s
        SET parent_id = CASE
                WHEN s.region_code IS NOT NULL AND m.match_count = 1 THEN m.parent_id
            END,
            outcome = CASE
                WHEN s.region_code IS NULL OR m.match_count <> 1 THEN 'orphaned'
            END,
            reason = CASE
                WHEN s.region_code IS NULL THEN 'malformed key'
                WHEN m.match_count = 0 THEN 'no matching parent'
                WHEN m.match_count > 1 THEN 'ambiguous key'
            END
        FROM matches m
        WHERE m.row_index = s.row_index
        RETURNING s.row_index, s.parent_id, s.reason"
    )
}

/// Window functions materialize the cross-row facts over the whole relation;
/// the outer filter then keeps only rows still awaiting a verdict
fn snapshot_sql(relation: &StagingRelation) -> String {
    let (canonical_duplicate, canonical_primary) = match relation.kind {
        EntityKind::Cave => (
            "EXISTS (SELECT 1 FROM caves c
                     WHERE c.region_id = f.parent_id AND c.number = f.region_number)",
            "FALSE",
        ),
        EntityKind::Entrance => (
            "EXISTS (SELECT 1 FROM entrances e
                     WHERE e.cave_id = f.parent_id AND lower(e.name) = lower(f.name))",
            "EXISTS (SELECT 1 FROM entrances e
                     WHERE e.cave_id = f.parent_id AND e.is_primary)",
        ),
    };

    format!(
        "WITH facts AS (
            SELECT s.*,
                (s.identity_key IS NOT NULL
                    AND COUNT(*) OVER (PARTITION BY s.identity_key) > 1) AS duplicate_within_import,
                CASE WHEN s.parent_id IS NOT NULL AND s.is_primary
                    THEN COUNT(*) FILTER (WHERE s.is_primary) OVER (PARTITION BY s.parent_id)
                    ELSE 0
                END AS primary_claims
            FROM {relation} s
        )
        SELECT {STAGED_COLUMNS},
            f.duplicate_within_import,
            f.primary_claims,
            {canonical_duplicate} AS canonical_duplicate_exists,
            {canonical_primary} AS canonical_primary_exists
        FROM facts f
        WHERE f.parent_id IS NOT NULL AND f.outcome IS NULL
        ORDER BY f.row_index"
    )
}

fn label_sql(relation: &StagingRelation) -> String {
    format!(
        "UPDATE {relation} s
        SET outcome = l.outcome, reason = l.reason
        FROM UNNEST($1::int4[], $2::text[], $3::text[]) AS l(row_index, outcome, reason)
        WHERE s.row_index = l.row_index"
    )
}

/// The location point is derived inside the same INSERT
fn migrate_sql(relation: &StagingRelation) -> String {
    match relation.kind {
        EntityKind::Cave => format!(
            "INSERT INTO caves (region_id, number, name, length_ft, depth_ft)
            SELECT s.parent_id, s.region_number, s.name, s.length_ft, s.depth_ft
            FROM {relation} s
            WHERE s.outcome = 'accepted'
            ORDER BY s.row_index"
        ),
        EntityKind::Entrance => format!(
            "INSERT INTO entrances
                (cave_id, name, latitude, longitude, elevation_ft, is_primary, location)
            SELECT s.parent_id, s.name, s.latitude, s.longitude, s.elevation_ft, s.is_primary,
                ST_SetSRID(ST_MakePoint(s.longitude, s.latitude, s.elevation_ft), 4326)
            FROM {relation} s
            WHERE s.outcome = 'accepted'
            ORDER BY s.row_index"
        ),
    }
}

#[async_trait]
impl ImportStore for PostgreSQLStore {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    fn staging_schema(&self) -> Option<&str> {
        Some(&self.staging_schema)
    }

    async fn test_connection(&self) -> Result<()> {
        self.client.test_connection().await
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.client.ensure_schema(&self.staging_schema).await
    }

    async fn create_staging(&self, relation: &StagingRelation) -> Result<()> {
        let conn = self.client.get_connection().await?;
        conn.batch_execute(&create_staging_sql(relation))
            .await
            .map_err(|e| db_error("Failed to create staging relation", relation, e))
    }

    async fn append_staged(&self, relation: &StagingRelation, rows: &[StagedRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let cols = StagedColumns::from_rows(rows)?;
        let conn = self.client.get_connection().await?;
        let inserted = conn
            .execute(
                &append_sql(relation),
                &[
                    &cols.row_index,
                    &cols.raw_key,
                    &cols.region_code,
                    &cols.region_number,
                    &cols.key_error,
                    &cols.identity_key,
                    &cols.name,
                    &cols.length_ft,
                    &cols.depth_ft,
                    &cols.latitude,
                    &cols.longitude,
                    &cols.elevation_ft,
                    &cols.is_primary,
                ],
            )
            .await
            .map_err(|e| db_error("Bulk append failed", relation, e))?;

        if inserted as usize != cols.len() {
            return Err(KarstError::Database(format!(
                "Bulk append on {relation} wrote {inserted} of {} rows",
                cols.len()
            )));
        }
        Ok(())
    }

    async fn resolve_parents(&self, relation: &StagingRelation) -> Result<ResolutionOutcome> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(&resolve_sql(relation), &[])
            .await
            .map_err(|e| db_error("Key resolution failed", relation, e))?;

        let mut outcome = ResolutionOutcome::default();
        for row in &rows {
            let row_index: i32 = row
                .try_get("row_index")
                .map_err(|e| KarstError::Database(e.to_string()))?;
            let parent_id: Option<i64> = row
                .try_get("parent_id")
                .map_err(|e| KarstError::Database(e.to_string()))?;
            let reason: Option<String> = row
                .try_get("reason")
                .map_err(|e| KarstError::Database(e.to_string()))?;

            match (parent_id, reason) {
                (Some(_), _) => outcome.resolved_count += 1,
                (None, reason) => outcome
                    .orphans
                    .push((row_index as usize, reason.unwrap_or_default())),
            }
        }
        outcome.orphans.sort_by_key(|(index, _)| *index);

        Ok(outcome)
    }

    async fn validation_snapshot(&self, relation: &StagingRelation) -> Result<Vec<RowFacts>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(&snapshot_sql(relation), &[])
            .await
            .map_err(|e| db_error("Validation snapshot failed", relation, e))?;

        rows.iter()
            .map(|row| -> Result<RowFacts> {
                let primary_claims: i64 = row
                    .try_get("primary_claims")
                    .map_err(|e| KarstError::Database(e.to_string()))?;
                Ok(RowFacts {
                    row: staged_row_from_pg(row)?,
                    duplicate_within_import: row
                        .try_get("duplicate_within_import")
                        .map_err(|e| KarstError::Database(e.to_string()))?,
                    canonical_duplicate_exists: row
                        .try_get("canonical_duplicate_exists")
                        .map_err(|e| KarstError::Database(e.to_string()))?,
                    primary_claims_for_parent: u32::try_from(primary_claims).unwrap_or(u32::MAX),
                    canonical_primary_exists: row
                        .try_get("canonical_primary_exists")
                        .map_err(|e| KarstError::Database(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn label_rows(&self, relation: &StagingRelation, labels: &[RowLabel]) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }

        let cols = LabelColumns::from_labels(labels.iter().map(|l| (l.row_index, &l.outcome)))?;
        let conn = self.client.get_connection().await?;
        let updated = conn
            .execute(
                &label_sql(relation),
                &[&cols.row_index, &cols.outcome, &cols.reason],
            )
            .await
            .map_err(|e| db_error("Labelling staged rows failed", relation, e))?;

        if updated as usize != labels.len() {
            return Err(KarstError::Database(format!(
                "Labelled {updated} of {} rows on {relation}",
                labels.len()
            )));
        }
        Ok(())
    }

    async fn fetch_staged(&self, relation: &StagingRelation) -> Result<Vec<StagedRow>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                &format!("SELECT {STAGED_COLUMNS} FROM {relation} ORDER BY row_index"),
                &[],
            )
            .await
            .map_err(|e| db_error("Reading staged rows failed", relation, e))?;

        rows.iter().map(staged_row_from_pg).collect()
    }

    async fn migrate_accepted(&self, relation: &StagingRelation) -> Result<u64> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| db_error("Failed to begin migration", relation, e))?;

        // Dropping `tx` on any early return rolls the transaction back
        let migrated = tx
            .execute(&migrate_sql(relation), &[])
            .await
            .map_err(|e| db_error("Migration insert failed", relation, e))?;

        tx.commit()
            .await
            .map_err(|e| db_error("Migration commit failed", relation, e))?;

        Ok(migrated)
    }

    async fn drop_staging(&self, relation: &StagingRelation) -> Result<bool> {
        let existed = self.staging_exists(relation).await?;
        let conn = self.client.get_connection().await?;
        conn.batch_execute(&format!("DROP TABLE IF EXISTS {relation}"))
            .await
            .map_err(|e| db_error("Failed to drop staging relation", relation, e))?;
        Ok(existed)
    }

    async fn staging_exists(&self, relation: &StagingRelation) -> Result<bool> {
        let conn = self.client.get_connection().await?;
        let row = conn
            .query_one(
                "SELECT to_regclass($1) IS NOT NULL AS present",
                &[&relation.qualified_name()],
            )
            .await
            .map_err(|e| db_error("Catalogue lookup failed", relation, e))?;
        row.try_get("present")
            .map_err(|e| KarstError::Database(e.to_string()))
    }

    async fn list_staging(&self) -> Result<Vec<StagingListing>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(
                "SELECT c.relname FROM pg_class c
                 JOIN pg_namespace n ON n.oid = c.relnamespace
                 WHERE n.nspname = $1 AND c.relkind = 'r'
                 ORDER BY c.relname",
                &[&self.staging_schema],
            )
            .await
            .map_err(|e| KarstError::Database(format!("Listing staging relations failed: {e}")))?;

        let mut listings = Vec::new();
        for row in &rows {
            let relname: String = row
                .try_get("relname")
                .map_err(|e| KarstError::Database(e.to_string()))?;
            if !staging_table_pattern().is_match(&relname) {
                continue;
            }

            let name = format!("{}.{}", self.staging_schema, relname);
            let count_row = conn
                .query_one(&format!("SELECT COUNT(*) AS n FROM {name}"), &[])
                .await
                .map_err(|e| KarstError::Database(format!("Counting {name} failed: {e}")))?;
            let row_count: i64 = count_row
                .try_get("n")
                .map_err(|e| KarstError::Database(e.to_string()))?;

            listings.push(StagingListing {
                name,
                row_count: row_count.max(0) as u64,
            });
        }

        Ok(listings)
    }

    async fn drop_staging_by_name(&self, name: &str) -> Result<bool> {
        let relname = name
            .strip_prefix(&format!("{}.", self.staging_schema))
            .filter(|rel| staging_table_pattern().is_match(rel))
            .ok_or_else(|| {
                KarstError::Validation(format!("'{name}' is not a staging relation"))
            })?;

        let conn = self.client.get_connection().await?;
        let qualified = format!("{}.{}", self.staging_schema, relname);
        let existed: bool = conn
            .query_one("SELECT to_regclass($1) IS NOT NULL AS present", &[&qualified])
            .await
            .and_then(|row| row.try_get("present"))
            .map_err(|e| KarstError::Database(format!("Catalogue lookup failed: {e}")))?;

        conn.batch_execute(&format!("DROP TABLE IF EXISTS {qualified}"))
            .await
            .map_err(|e| KarstError::Database(format!("Failed to drop {qualified}: {e}")))?;

        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BatchId;

    fn relation(kind: EntityKind) -> StagingRelation {
        StagingRelation::for_batch(BatchId::new(), kind, Some("import_staging".to_string()))
    }

    #[test]
    fn test_create_sql_is_unlogged_and_qualified() {
        let rel = relation(EntityKind::Cave);
        let sql = create_staging_sql(&rel);
        assert!(sql.starts_with("CREATE UNLOGGED TABLE import_staging.cave_"));
        assert!(sql.contains("row_index     INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_append_binds_thirteen_arrays() {
        let sql = append_sql(&relation(EntityKind::Entrance));
        assert!(sql.contains("$13::bool[]"));
        assert!(!sql.contains("$14"));
    }

    #[test]
    fn test_resolve_sql_joins_the_right_parent() {
        let cave_sql = resolve_sql(&relation(EntityKind::Cave));
        assert!(cave_sql.contains("LEFT JOIN regions p"));
        assert!(!cave_sql.contains("caves p"));

        let entrance_sql = resolve_sql(&relation(EntityKind::Entrance));
        assert!(entrance_sql.contains("LEFT JOIN (caves p JOIN regions r"));
        assert!(entrance_sql.contains("'ambiguous key'"));
        assert!(entrance_sql.contains("RETURNING"));
    }

    #[test]
    fn test_snapshot_sql_checks_canonical_primary_for_entrances_only() {
        let cave_sql = snapshot_sql(&relation(EntityKind::Cave));
        assert!(cave_sql.contains("FALSE AS canonical_primary_exists"));

        let entrance_sql = snapshot_sql(&relation(EntityKind::Entrance));
        assert!(entrance_sql.contains("e.is_primary"));
        assert!(entrance_sql.contains("PARTITION BY s.identity_key"));
    }

    #[test]
    fn test_migrate_sql_derives_point_in_same_statement() {
        let sql = migrate_sql(&relation(EntityKind::Entrance));
        assert!(sql.contains("ST_SetSRID(ST_MakePoint(s.longitude, s.latitude, s.elevation_ft), 4326)"));
        assert!(sql.contains("WHERE s.outcome = 'accepted'"));
    }

    #[test]
    fn test_staging_table_pattern() {
        let rel = relation(EntityKind::Entrance);
        assert!(staging_table_pattern().is_match(&rel.name));
        assert!(!staging_table_pattern().is_match("caves"));
        assert!(!staging_table_pattern().is_match("cave_1; DROP TABLE caves"));
    }
}
