//! PostgreSQL staging-row models
//!
//! Conversion between [`StagedRow`] and the staging relation's columns:
//! column-major buffers for `UNNEST` bulk appends, and row mapping for reads.

use crate::domain::{KarstError, NaturalKey, RegionCode, Result, RowOutcome, StagedRow};
use tokio_postgres::Row;

/// Column list shared by every statement that reads a staged row
pub const STAGED_COLUMNS: &str = "row_index, raw_key, region_code, region_number, key_error, \
     identity_key, name, length_ft, depth_ft, latitude, longitude, elevation_ft, is_primary, \
     parent_id, outcome, reason";

/// One chunk of staged rows laid out column by column
///
/// Each vector binds to one `$n::<type>[]` parameter of the append statement.
#[derive(Debug, Default)]
pub struct StagedColumns {
    pub row_index: Vec<i32>,
    pub raw_key: Vec<String>,
    pub region_code: Vec<Option<String>>,
    pub region_number: Vec<Option<i32>>,
    pub key_error: Vec<Option<String>>,
    pub identity_key: Vec<Option<String>>,
    pub name: Vec<Option<String>>,
    pub length_ft: Vec<Option<f64>>,
    pub depth_ft: Vec<Option<f64>>,
    pub latitude: Vec<Option<f64>>,
    pub longitude: Vec<Option<f64>>,
    pub elevation_ft: Vec<Option<f64>>,
    pub is_primary: Vec<bool>,
}

impl StagedColumns {
    /// Transposes a chunk of rows
    ///
    /// # Errors
    ///
    /// Returns an error if a row index or key number exceeds the `int4` range.
    pub fn from_rows(rows: &[StagedRow]) -> Result<Self> {
        let mut cols = Self::default();
        for row in rows {
            cols.row_index.push(to_int4(row.row_index, "row_index")?);
            cols.raw_key.push(row.raw_key.clone());
            cols.region_code.push(
                row.natural_key
                    .as_ref()
                    .map(|k| k.region.as_str().to_string()),
            );
            cols.region_number.push(match &row.natural_key {
                Some(key) => Some(to_int4(key.number as usize, "region_number")?),
                None => None,
            });
            cols.key_error.push(row.key_error.clone());
            cols.identity_key.push(row.identity_key.clone());
            cols.name.push(row.name.clone());
            cols.length_ft.push(row.length_ft);
            cols.depth_ft.push(row.depth_ft);
            cols.latitude.push(row.latitude);
            cols.longitude.push(row.longitude);
            cols.elevation_ft.push(row.elevation_ft);
            cols.is_primary.push(row.is_primary);
        }
        Ok(cols)
    }

    pub fn len(&self) -> usize {
        self.row_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_index.is_empty()
    }
}

/// Outcome labels laid out column by column for the label statement
#[derive(Debug, Default)]
pub struct LabelColumns {
    pub row_index: Vec<i32>,
    pub outcome: Vec<String>,
    pub reason: Vec<Option<String>>,
}

impl LabelColumns {
    /// Transposes `(row_index, outcome)` pairs
    ///
    /// # Errors
    ///
    /// Returns an error if a row index exceeds the `int4` range.
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = (usize, &'a RowOutcome)>) -> Result<Self> {
        let mut cols = Self::default();
        for (row_index, outcome) in labels {
            cols.row_index.push(to_int4(row_index, "row_index")?);
            cols.outcome.push(outcome.label().to_string());
            cols.reason.push(outcome.reason().map(str::to_string));
        }
        Ok(cols)
    }
}

fn to_int4(value: usize, column: &str) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| KarstError::Database(format!("{column} {value} exceeds the int4 range")))
}

fn column_error(column: &str, e: impl std::fmt::Display) -> KarstError {
    KarstError::Database(format!("Failed to read staging column {column}: {e}"))
}

/// Maps a row selected with [`STAGED_COLUMNS`] back to a [`StagedRow`]
///
/// # Errors
///
/// Returns an error if a column is missing, has an unexpected type, or holds
/// an unknown outcome label.
pub fn staged_row_from_pg(row: &Row) -> Result<StagedRow> {
    let row_index: i32 = row
        .try_get("row_index")
        .map_err(|e| column_error("row_index", e))?;
    let region_code: Option<String> = row
        .try_get("region_code")
        .map_err(|e| column_error("region_code", e))?;
    let region_number: Option<i32> = row
        .try_get("region_number")
        .map_err(|e| column_error("region_number", e))?;

    let natural_key = match (region_code, region_number) {
        (Some(code), Some(number)) => {
            let region = RegionCode::new(code).map_err(KarstError::Database)?;
            let number = u32::try_from(number).map_err(|e| column_error("region_number", e))?;
            Some(NaturalKey::new(region, number).map_err(KarstError::Database)?)
        }
        _ => None,
    };

    let outcome_label: Option<String> = row
        .try_get("outcome")
        .map_err(|e| column_error("outcome", e))?;
    let reason: Option<String> = row
        .try_get("reason")
        .map_err(|e| column_error("reason", e))?;
    let outcome = outcome_label
        .map(|label| RowOutcome::from_parts(&label, reason))
        .transpose()
        .map_err(KarstError::Database)?;

    Ok(StagedRow {
        row_index: usize::try_from(row_index).map_err(|e| column_error("row_index", e))?,
        raw_key: row
            .try_get("raw_key")
            .map_err(|e| column_error("raw_key", e))?,
        natural_key,
        key_error: row
            .try_get("key_error")
            .map_err(|e| column_error("key_error", e))?,
        identity_key: row
            .try_get("identity_key")
            .map_err(|e| column_error("identity_key", e))?,
        name: row.try_get("name").map_err(|e| column_error("name", e))?,
        length_ft: row
            .try_get("length_ft")
            .map_err(|e| column_error("length_ft", e))?,
        depth_ft: row
            .try_get("depth_ft")
            .map_err(|e| column_error("depth_ft", e))?,
        latitude: row
            .try_get("latitude")
            .map_err(|e| column_error("latitude", e))?,
        longitude: row
            .try_get("longitude")
            .map_err(|e| column_error("longitude", e))?,
        elevation_ft: row
            .try_get("elevation_ft")
            .map_err(|e| column_error("elevation_ft", e))?,
        is_primary: row
            .try_get("is_primary")
            .map_err(|e| column_error("is_primary", e))?,
        parent_id: row
            .try_get("parent_id")
            .map_err(|e| column_error("parent_id", e))?,
        outcome,
    })
}
