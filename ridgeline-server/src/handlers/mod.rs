//! HTTP request handlers
//!
//! This module contains all the request handlers for the API endpoints.

pub mod enroll;
pub mod health;
pub mod verify;

pub use crate::state::AppState;
pub use enroll::{upload_handler, UploadResponse};
pub use health::{health, ready, HealthResponse, ReadyResponse};
pub use verify::{
    validate_fingerprint_handler, ValidateFingerprintRequest, ValidateFingerprintResponse,
};
