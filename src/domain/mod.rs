//! Domain models and types for Karst.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`BatchId`], [`RegionCode`], [`NaturalKey`])
//! - **Canonical entities** ([`Region`], [`Cave`], [`Entrance`])
//! - **Import rows** ([`ImportRow`] as decoded, [`StagedRow`] as staged)
//! - **Error types** ([`KarstError`], [`PipelineError`])
//! - **Result type alias** ([`Result`])
//!
//! # Natural keys
//!
//! Rows are matched to their canonical parent by a business key, never by a
//! surrogate id:
//!
//! ```rust
//! use karst::domain::NaturalKey;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key = NaturalKey::parse("TN 12")?;
//! assert_eq!(key.region.as_str(), "TN");
//! assert_eq!(key.number, 12);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod errors;
pub mod ids;
pub mod result;
pub mod row;

// Re-export commonly used types for convenience
pub use entity::{Cave, Entrance, EntityKind, GeoPoint, ImportMode, Region};
pub use errors::{KarstError, PipelineError};
pub use ids::{BatchId, NaturalKey, RegionCode};
pub use result::Result;
pub use row::{
    CaveRecord, EntranceRecord, ImportRow, OrphanReason, RejectReason, RowOutcome, StagedRow,
};
