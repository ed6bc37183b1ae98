//! Ridgeline Server Library - REST API for fingerprint enrollment and identification
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod openapi;
pub mod routes;
pub mod sample_store;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use openapi::ApiDoc;
pub use routes::create_router;
pub use sample_store::{open_store, PostgresRecordStore, StoreError};
pub use state::AppState;

use std::sync::Arc;

use ridgeline_core::{Pipeline, ProcessEngine, TempResourceManager};

/// Assemble the pipeline described by `config` and wrap it in [`AppState`].
pub async fn build_state(config: Config) -> Result<AppState, StoreError> {
    let store = open_store(&config).await?;
    let engine = Arc::new(ProcessEngine::new(config.engine.clone()));
    let scratch = match &config.scratch_dir {
        Some(dir) => TempResourceManager::new(dir),
        None => TempResourceManager::system(),
    };

    let pipeline = Pipeline::new(store, engine, scratch).with_config(config.pipeline.clone());
    Ok(AppState::new(pipeline, config))
}
