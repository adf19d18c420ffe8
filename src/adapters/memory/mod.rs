//! In-memory storage backend
//!
//! Holds canonical regions, caves and entrances plus staging relations in
//! process memory. Used for database-free previews and by the test-suite.

pub mod adapter;

pub use adapter::MemoryStore;
