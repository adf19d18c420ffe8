//! Row decoder: CSV bytes into typed import rows
//!
//! Headers are matched case-insensitively against a small alias table, so
//! `Cave Key`, `cave_key` and `key` all name the same column. Cell values are
//! trimmed. A numeric cell that does not parse decodes as absent; the
//! validator later rejects the row as missing that field. Structural problems
//! (bad UTF-8, ragged rows, missing key column) fail the whole file.

use crate::domain::{CaveRecord, EntityKind, EntranceRecord, ImportRow, KarstError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use std::io::Read;
use std::sync::OnceLock;

const KEY: &[&str] = &["key", "cave_key", "cave", "cave_id", "id"];
const NAME: &[&str] = &["name", "cave_name", "entrance_name", "entrance"];
const LENGTH: &[&str] = &["length_ft", "length", "surveyed_length"];
const DEPTH: &[&str] = &["depth_ft", "depth", "vertical_extent"];
const LATITUDE: &[&str] = &["latitude", "lat"];
const LONGITUDE: &[&str] = &["longitude", "lon", "lng", "long"];
const ELEVATION: &[&str] = &["elevation_ft", "elevation", "elev"];
const PRIMARY: &[&str] = &["is_primary", "primary", "main"];

/// Column positions for one file
#[derive(Debug, Default)]
struct Columns {
    key: Option<usize>,
    name: Option<usize>,
    length: Option<usize>,
    depth: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    elevation: Option<usize>,
    primary: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        let normalized: Vec<String> = headers.iter().map(normalize_header).collect();
        let find = |aliases: &[&str]| {
            aliases
                .iter()
                .find_map(|alias| normalized.iter().position(|h| h == alias))
        };

        Self {
            key: find(KEY),
            name: find(NAME),
            length: find(LENGTH),
            depth: find(DEPTH),
            latitude: find(LATITUDE),
            longitude: find(LONGITUDE),
            elevation: find(ELEVATION),
            primary: find(PRIMARY),
        }
    }

    fn require(&self, kind: EntityKind) -> Result<()> {
        let mut missing = Vec::new();
        if self.key.is_none() {
            missing.push("key");
        }
        if kind == EntityKind::Entrance {
            if self.latitude.is_none() {
                missing.push("latitude");
            }
            if self.longitude.is_none() {
                missing.push("longitude");
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(KarstError::Decode(format!(
                "Missing required {kind} column(s): {}",
                missing.join(", ")
            )))
        }
    }
}

/// Stateless CSV decoder
#[derive(Debug, Clone)]
pub struct RowDecoder {
    delimiter: u8,
}

impl Default for RowDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RowDecoder {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Use a different field delimiter, e.g. `b'\t'`
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Decode a whole file held in memory
    ///
    /// # Errors
    ///
    /// Returns [`KarstError::Decode`] for malformed files.
    pub fn decode(&self, kind: EntityKind, bytes: &[u8]) -> Result<Vec<ImportRow>> {
        self.decode_reader(kind, bytes)
    }

    /// Decode from any reader
    ///
    /// # Errors
    ///
    /// Returns [`KarstError::Decode`] for malformed files.
    pub fn decode_reader<R: Read>(&self, kind: EntityKind, reader: R) -> Result<Vec<ImportRow>> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .trim(Trim::All)
            .from_reader(reader);

        let columns = Columns::from_headers(rdr.headers()?);
        columns.require(kind)?;

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(match kind {
                EntityKind::Cave => ImportRow::Cave(CaveRecord {
                    key: text(&record, columns.key).unwrap_or_default(),
                    name: text(&record, columns.name),
                    length_ft: number(&record, columns.length),
                    depth_ft: number(&record, columns.depth),
                }),
                EntityKind::Entrance => ImportRow::Entrance(EntranceRecord {
                    cave_key: text(&record, columns.key).unwrap_or_default(),
                    name: text(&record, columns.name),
                    latitude: number(&record, columns.latitude),
                    longitude: number(&record, columns.longitude),
                    elevation_ft: number(&record, columns.elevation),
                    is_primary: columns
                        .primary
                        .and_then(|i| record.get(i))
                        .map(parse_flag)
                        .unwrap_or(false),
                }),
            });
        }

        tracing::debug!(kind = %kind, rows = rows.len(), "Decoded import file");
        Ok(rows)
    }
}

fn normalize_header(header: &str) -> String {
    header
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .replace([' ', '-'], "_")
}

fn text(record: &StringRecord, column: Option<usize>) -> Option<String> {
    column
        .and_then(|i| record.get(i))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(record: &StringRecord, column: Option<usize>) -> Option<f64> {
    column.and_then(|i| record.get(i)).and_then(parse_number)
}

fn grouped_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?\d{1,3}(,\d{3})+(\.\d+)?$").expect("grouped number pattern is valid")
    })
}

/// Parses a numeric cell
///
/// Commas are accepted only as thousands separators (`1,200`). A cell such
/// as `12,5` is ambiguous and reads as absent.
pub fn parse_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    let parsed = if cell.contains(',') {
        if !grouped_number_pattern().is_match(cell) {
            return None;
        }
        cell.replace(',', "").parse::<f64>()
    } else {
        cell.parse::<f64>()
    };
    parsed.ok().filter(|v| v.is_finite())
}

/// Parses spreadsheet-style truthy cells; anything unrecognized is false
pub fn parse_flag(cell: &str) -> bool {
    matches!(
        cell.trim().to_lowercase().as_str(),
        "true" | "yes" | "y" | "1" | "x"
    )
}
