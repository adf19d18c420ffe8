//! Storage integrations for Karst.
//!
//! - [`database`] - Storage abstraction layer (the [`database::ImportStore`] trait)
//! - [`postgresql`] - PostgreSQL/PostGIS implementation
//! - [`memory`] - In-process implementation for previews and tests
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate storage dependencies.
//! The pipeline only ever holds an `Arc<dyn ImportStore>`.
//!
//! ```rust
//! use karst::adapters::database::ImportStore;
//! use karst::adapters::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! let store = MemoryStore::new();
//! store.add_region("TN", "Tennessee");
//! let store: Arc<dyn ImportStore> = Arc::new(store);
//! assert_eq!(store.backend_name(), "memory");
//! ```

pub mod database;
pub mod memory;
pub mod postgresql;
