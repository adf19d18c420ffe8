//! Decoded and staged import rows
//!
//! A [`ImportRow`] is what the row decoder hands the pipeline: a typed record
//! exactly as submitted. A [`StagedRow`] is that record plus everything the
//! pipeline derives about it (natural key, resolved parent, outcome).

use crate::domain::entity::EntityKind;
use crate::domain::ids::NaturalKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded cave record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaveRecord {
    /// The cave's own natural key as written in the file (e.g. `TN001`)
    pub key: String,
    pub name: Option<String>,
    pub length_ft: Option<f64>,
    pub depth_ft: Option<f64>,
}

/// A decoded entrance record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntranceRecord {
    /// Natural key of the owning cave as written in the file
    pub cave_key: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_ft: Option<f64>,
    pub is_primary: bool,
}

/// One record produced by the row decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ImportRow {
    Cave(CaveRecord),
    Entrance(EntranceRecord),
}

impl ImportRow {
    /// The entity kind this record describes
    pub fn kind(&self) -> EntityKind {
        match self {
            ImportRow::Cave(_) => EntityKind::Cave,
            ImportRow::Entrance(_) => EntityKind::Entrance,
        }
    }
}

/// Why a row could not be tied to exactly one canonical parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanReason {
    /// The key text could not be parsed into region code + number
    MalformedKey,
    /// No canonical parent carries the key
    NoMatchingParent,
    /// More than one canonical parent carries the key
    AmbiguousKey,
}

impl fmt::Display for OrphanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrphanReason::MalformedKey => f.write_str("malformed key"),
            OrphanReason::NoMatchingParent => f.write_str("no matching parent"),
            OrphanReason::AmbiguousKey => f.write_str("ambiguous key"),
        }
    }
}

/// Why the invariant validator refused a resolved row
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// A mandatory field is absent or blank
    MissingField(&'static str),
    /// A field is present but out of range
    InvalidField { field: &'static str, detail: String },
    /// Another staged row claims the same identity
    DuplicateWithinImport,
    /// Canonical storage already holds this identity
    AlreadyExists(String),
    /// More than one primary flag for the same parent
    DuplicatePrimary(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MissingField(field) => write!(f, "missing required field: {field}"),
            RejectReason::InvalidField { field, detail } => {
                write!(f, "invalid {field}: {detail}")
            }
            RejectReason::DuplicateWithinImport => f.write_str("duplicate within import"),
            RejectReason::AlreadyExists(identity) => write!(f, "{identity} already exists"),
            RejectReason::DuplicatePrimary(parent) => {
                write!(f, "duplicate primary for parent {parent}")
            }
        }
    }
}

/// The pipeline's verdict on one staged row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RowOutcome {
    Accepted,
    Rejected { reason: String },
    Orphaned { reason: String },
}

impl RowOutcome {
    /// Column value used by the SQL backend
    pub fn label(&self) -> &'static str {
        match self {
            RowOutcome::Accepted => "accepted",
            RowOutcome::Rejected { .. } => "rejected",
            RowOutcome::Orphaned { .. } => "orphaned",
        }
    }

    /// Human-readable reason, if any
    pub fn reason(&self) -> Option<&str> {
        match self {
            RowOutcome::Accepted => None,
            RowOutcome::Rejected { reason } | RowOutcome::Orphaned { reason } => Some(reason),
        }
    }

    /// Rebuilds an outcome from its stored label and reason
    pub fn from_parts(label: &str, reason: Option<String>) -> Result<Self, String> {
        match label {
            "accepted" => Ok(RowOutcome::Accepted),
            "rejected" => Ok(RowOutcome::Rejected {
                reason: reason.unwrap_or_default(),
            }),
            "orphaned" => Ok(RowOutcome::Orphaned {
                reason: reason.unwrap_or_default(),
            }),
            other => Err(format!("Unknown row outcome '{other}'")),
        }
    }
}

impl From<OrphanReason> for RowOutcome {
    fn from(reason: OrphanReason) -> Self {
        RowOutcome::Orphaned {
            reason: reason.to_string(),
        }
    }
}

impl From<RejectReason> for RowOutcome {
    fn from(reason: RejectReason) -> Self {
        RowOutcome::Rejected {
            reason: reason.to_string(),
        }
    }
}

/// A decoded record plus the fields the pipeline derives for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedRow {
    /// Zero-based position in the decoded file
    pub row_index: usize,

    /// Key text exactly as submitted
    pub raw_key: String,

    /// Parsed natural key; `None` when the key is malformed
    pub natural_key: Option<NaturalKey>,

    /// Parse error for a malformed key
    pub key_error: Option<String>,

    /// Identity used for in-batch duplicate detection
    pub identity_key: Option<String>,

    pub name: Option<String>,
    pub length_ft: Option<f64>,
    pub depth_ft: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation_ft: Option<f64>,
    pub is_primary: bool,

    /// Canonical parent id, set only when exactly one parent matched
    pub parent_id: Option<i64>,

    /// Outcome, set by the resolver (orphans) or the validator
    pub outcome: Option<RowOutcome>,
}

impl StagedRow {
    /// Derives a staged row from a decoded record
    pub fn from_import_row(row_index: usize, row: &ImportRow) -> Self {
        match row {
            ImportRow::Cave(record) => {
                let mut staged = Self::blank(row_index, &record.key);
                staged.name = non_blank(&record.name);
                staged.length_ft = record.length_ft;
                staged.depth_ft = record.depth_ft;
                staged.identity_key = staged.natural_key.as_ref().map(|key| key.to_string());
                staged
            }
            ImportRow::Entrance(record) => {
                let mut staged = Self::blank(row_index, &record.cave_key);
                staged.name = non_blank(&record.name);
                staged.latitude = record.latitude;
                staged.longitude = record.longitude;
                staged.elevation_ft = record.elevation_ft;
                staged.is_primary = record.is_primary;
                staged.identity_key = match (&staged.natural_key, &staged.name) {
                    (Some(key), Some(name)) => Some(format!("{key}/{}", name.to_lowercase())),
                    _ => None,
                };
                staged
            }
        }
    }

    fn blank(row_index: usize, raw_key: &str) -> Self {
        let (natural_key, key_error) = match NaturalKey::parse(raw_key) {
            Ok(key) => (Some(key), None),
            Err(e) => (None, Some(e)),
        };

        Self {
            row_index,
            raw_key: raw_key.to_string(),
            natural_key,
            key_error,
            identity_key: None,
            name: None,
            length_ft: None,
            depth_ft: None,
            latitude: None,
            longitude: None,
            elevation_ft: None,
            is_primary: false,
            parent_id: None,
            outcome: None,
        }
    }

    /// Returns true once the resolver found exactly one parent
    pub fn is_resolved(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Natural key text for messages: the parsed key, or the raw text
    pub fn display_key(&self) -> String {
        self.natural_key
            .as_ref()
            .map(|key| key.to_string())
            .unwrap_or_else(|| self.raw_key.clone())
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
