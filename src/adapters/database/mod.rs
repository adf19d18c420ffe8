//! Storage abstraction layer
//!
//! This module provides a trait-based abstraction for the storage operations
//! an import run needs, so the pipeline runs unchanged against PostgreSQL or
//! the in-memory store.

pub mod factory;
pub mod traits;

pub use factory::create_import_store;
pub use traits::{
    ImportStore, ResolutionOutcome, RowFacts, RowLabel, StagingListing, StagingRelation,
};
