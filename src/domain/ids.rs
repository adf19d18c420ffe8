//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for the identifiers that flow
//! through an import run: the batch id that names a staging relation, and the
//! natural key (region code + region-relative number) that staged rows use to
//! find their canonical parent.

use crate::domain::entity::EntityKind;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use uuid::Uuid;

/// Import batch identifier
///
/// A random v4 UUID. Its simple (hyphen-free) form is embedded in the name
/// of the batch's staging relation, so two concurrent imports never share a
/// relation.
///
/// # Examples
///
/// ```
/// use karst::domain::ids::BatchId;
/// use karst::domain::EntityKind;
///
/// let id = BatchId::new();
/// let name = id.relation_name(EntityKind::Entrance);
/// assert!(name.starts_with("entrance_"));
/// assert_eq!(name.len(), "entrance_".len() + 32);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    /// Allocates a fresh batch id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Name of the staging relation owned by this batch
    ///
    /// Only ASCII lowercase letters, digits and `_`, so the name is a valid
    /// unquoted SQL identifier.
    pub fn relation_name(&self, kind: EntityKind) -> String {
        format!("{}_{}", kind.as_str(), self.0.simple())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BatchId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid batch id '{s}': {e}"))
    }
}

/// Region code newtype wrapper
///
/// One to four ASCII letters (a county or district abbreviation),
/// normalized to uppercase.
///
/// # Examples
///
/// ```
/// use karst::domain::ids::RegionCode;
///
/// let code = RegionCode::new("tn").unwrap();
/// assert_eq!(code.as_str(), "TN");
/// assert!(RegionCode::new("T1").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionCode(String);

impl RegionCode {
    /// Creates a new RegionCode, normalizing to uppercase
    pub fn new(code: impl Into<String>) -> Result<Self, String> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err("Region code cannot be empty".to_string());
        }
        if trimmed.len() > 4 || !trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!(
                "Invalid region code '{trimmed}'. Expected 1-4 ASCII letters"
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// Returns the region code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RegionCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for RegionCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn natural_key_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{1,4})[\s_-]*(\d{1,6})$").expect("natural key pattern is valid")
    })
}

/// Composite natural key: region code plus region-relative number
///
/// Spreadsheets write the key in many shapes (`TN001`, `tn-1`, `TN 12`);
/// all of them parse to the same key. The canonical rendering pads the
/// number to three digits.
///
/// # Examples
///
/// ```
/// use karst::domain::ids::NaturalKey;
/// use std::str::FromStr;
///
/// let key = NaturalKey::from_str("tn-1").unwrap();
/// assert_eq!(key.to_string(), "TN001");
/// assert_eq!(key, NaturalKey::from_str("TN001").unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    /// Region code
    pub region: RegionCode,

    /// Region-relative sequence number (1-based)
    pub number: u32,
}

impl NaturalKey {
    /// Creates a natural key from its components
    pub fn new(region: RegionCode, number: u32) -> Result<Self, String> {
        if number == 0 {
            return Err(format!("Natural key number must be positive for region {region}"));
        }
        Ok(Self { region, number })
    }

    /// Parses a natural key from spreadsheet text
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        let caps = natural_key_pattern()
            .captures(trimmed)
            .ok_or_else(|| format!("'{trimmed}' is not a region code followed by a number"))?;

        let region = RegionCode::new(&caps[1])?;
        let number: u32 = caps[2]
            .parse()
            .map_err(|e| format!("Invalid number in key '{trimmed}': {e}"))?;

        Self::new(region, number)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.region, self.number)
    }
}

impl FromStr for NaturalKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
