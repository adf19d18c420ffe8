//! PostgreSQL database integration
//!
//! Canonical catalogue tables (PostGIS-enabled) plus per-batch `UNLOGGED`
//! staging tables in a dedicated schema.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLStore;
pub use client::PostgreSQLClient;
