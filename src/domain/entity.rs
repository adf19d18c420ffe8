//! Canonical catalogue entities
//!
//! These types mirror the durable tables the rest of the application owns.
//! The import pipeline only reads them (for matching and invariant checks)
//! and appends to them once, at commit time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of entity a batch imports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Caves, parented by a region
    Cave,
    /// Cave entrances, parented by a cave
    Entrance,
}

impl EntityKind {
    /// Lowercase name, also used as the staging relation prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Cave => "cave",
            EntityKind::Entrance => "entrance",
        }
    }

    /// Name of the canonical parent entity
    pub fn parent_name(&self) -> &'static str {
        match self {
            EntityKind::Cave => "region",
            EntityKind::Entrance => "cave",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cave" | "caves" => Ok(EntityKind::Cave),
            "entrance" | "entrances" => Ok(EntityKind::Entrance),
            other => Err(format!(
                "Invalid entity kind '{other}'. Must be one of: cave, entrance"
            )),
        }
    }
}

/// Whether a run may touch canonical storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Load, resolve and validate, then report; canonical storage untouched
    DryRun,
    /// Everything a dry run does, then migrate the accepted rows
    Commit,
}

impl ImportMode {
    /// Returns true for dry-run mode
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ImportMode::DryRun)
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::DryRun => f.write_str("dry-run"),
            ImportMode::Commit => f.write_str("commit"),
        }
    }
}

/// A point derived from latitude, longitude and elevation (WGS 84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude in degrees (x)
    pub x: f64,
    /// Latitude in degrees (y)
    pub y: f64,
    /// Elevation as recorded in the source (z)
    pub z: f64,
}

impl GeoPoint {
    /// Builds the point the same way the SQL backend does:
    /// `ST_MakePoint(longitude, latitude, elevation)`
    pub fn from_lat_lon_elev(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            x: longitude,
            y: latitude,
            z: elevation,
        }
    }
}

/// A region (county, district) that parents caves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A catalogued cave
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cave {
    pub id: i64,
    pub region_id: i64,
    /// Region-relative sequence number
    pub number: u32,
    pub name: String,
    pub length_ft: Option<f64>,
    pub depth_ft: Option<f64>,
}

/// A cave entrance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrance {
    pub id: i64,
    pub cave_id: i64,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_ft: f64,
    /// At most one entrance per cave carries this flag
    pub is_primary: bool,
    pub location: GeoPoint,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_from_str() {
        assert_eq!(EntityKind::from_str("Cave").unwrap(), EntityKind::Cave);
        assert_eq!(
            EntityKind::from_str("entrances").unwrap(),
            EntityKind::Entrance
        );
        assert!(EntityKind::from_str("trip").is_err());
    }

    #[test]
    fn test_entity_kind_parent_name() {
        assert_eq!(EntityKind::Cave.parent_name(), "region");
        assert_eq!(EntityKind::Entrance.parent_name(), "cave");
    }

    #[test]
    fn test_entity_kind_serialization() {
        let json = serde_json::to_string(&EntityKind::Entrance).unwrap();
        assert_eq!(json, "\"entrance\"");
    }

    #[test]
    fn test_import_mode_display() {
        assert_eq!(ImportMode::DryRun.to_string(), "dry-run");
        assert_eq!(ImportMode::Commit.to_string(), "commit");
        assert!(ImportMode::DryRun.is_dry_run());
        assert!(!ImportMode::Commit.is_dry_run());
    }

    #[test]
    fn test_geo_point_axis_order() {
        let point = GeoPoint::from_lat_lon_elev(36.1, -85.4, 1200.0);
        assert_eq!(point.x, -85.4);
        assert_eq!(point.y, 36.1);
        assert_eq!(point.z, 1200.0);
    }
}
