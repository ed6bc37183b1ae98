//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use ridgeline_core::Pipeline;

use crate::config::Config;

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Enrollment and verification pipeline (store, engine, scratch dir)
    pub pipeline: Arc<Pipeline>,
    /// Configuration the server was started with
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, config: Config) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}
