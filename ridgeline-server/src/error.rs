//! API error handling module
//!
//! Provides a unified error type for all API endpoints. Pipeline errors are
//! mapped by their status class; internal details are logged, never sent.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ridgeline_core::{PipelineError, StatusClass};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Error raised by the enrollment / verification pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(e) => match e.status_class() {
                StatusClass::BadRequest => StatusCode::BAD_REQUEST,
                StatusClass::NotFound => StatusCode::NOT_FOUND,
                StatusClass::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
                StatusClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Pipeline(e) => match e {
                PipelineError::InvalidImageEncoding(_) => "INVALID_IMAGE_ENCODING",
                PipelineError::NoImageProvided(_) => "NO_IMAGE_PROVIDED",
                PipelineError::MissingField(_) => "MISSING_FIELD",
                PipelineError::NoSamplesEnrolled => "NO_SAMPLES_ENROLLED",
                PipelineError::EngineFailure(_) => "ENGINE_FAILURE",
                PipelineError::DescriptorDecodeError(_) => "DESCRIPTOR_DECODE_ERROR",
                PipelineError::NoMatchFound => "NO_MATCH_FOUND",
                PipelineError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
                PipelineError::Scratch(_) => "SCRATCH_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Pipeline(e) => match e {
                PipelineError::InvalidImageEncoding(_) => "Invalid image encoding".to_string(),
                PipelineError::NoImageProvided(field) => format!("No image provided: {}", field),
                PipelineError::MissingField(field) => format!("Missing required field: {}", field),
                PipelineError::NoSamplesEnrolled => "No samples enrolled".to_string(),
                PipelineError::EngineFailure(_) => "Fingerprint processing failed".to_string(),
                PipelineError::DescriptorDecodeError(_) => {
                    "Fingerprint descriptor could not be read".to_string()
                }
                PipelineError::NoMatchFound => "No match found".to_string(),
                PipelineError::StoreUnavailable(_) => "Sample store unavailable".to_string(),
                PipelineError::Scratch(_) => "Internal server error".to_string(),
            },
            Self::BadRequest(_) => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
