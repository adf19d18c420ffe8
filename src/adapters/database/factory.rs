//! Import store factory
//!
//! Builds the configured storage backend behind the [`ImportStore`] trait.

use crate::adapters::database::traits::ImportStore;
use crate::adapters::postgresql::adapter::PostgreSQLStore;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::KarstConfig;
use crate::domain::Result;
use std::sync::Arc;

/// Create the import store described by the configuration
///
/// # Errors
///
/// Returns an error if the connection pool cannot be created.
pub async fn create_import_store(config: &KarstConfig) -> Result<Arc<dyn ImportStore>> {
    tracing::info!(
        staging_schema = %config.import.staging_schema,
        "Creating PostgreSQL import store"
    );

    let client = PostgreSQLClient::new(config.postgresql.clone()).await?;
    let store = PostgreSQLStore::new(client, config.import.staging_schema.clone());

    Ok(Arc::new(store) as Arc<dyn ImportStore>)
}
