//! Sample store backends for the server.
//!
//! PostgreSQL when `DATABASE_URL` is set, otherwise the in-memory store
//! from `ridgeline-core` (samples are lost on restart).

pub mod error;
pub mod postgres;

pub use error::StoreError;
pub use postgres::PostgresRecordStore;

use std::sync::Arc;

use ridgeline_core::{MemoryRecordStore, RecordStore};

use crate::config::Config;

/// Open the store selected by `config`.
pub async fn open_store(config: &Config) -> Result<Arc<dyn RecordStore>, StoreError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Using PostgreSQL sample store");
            Ok(Arc::new(PostgresRecordStore::connect(url, config).await?))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory sample store - samples will be lost on restart!");
            Ok(Arc::new(MemoryRecordStore::new()))
        }
    }
}
