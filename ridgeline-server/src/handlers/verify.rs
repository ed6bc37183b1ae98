//! Fingerprint verification handler
//!
//! Handles POST /validatefingerprint requests that identify a probe image
//! against every enrolled sample.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ridgeline_core::{ImagePayload, VerificationRequest};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for fingerprint verification
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFingerprintRequest {
    /// Probe image as a data-URI or bare base64
    #[schema(example = "data:image/png;base64,iVBORw0KGgo...")]
    pub image_file: Option<String>,
}

/// Identity of the matched sample
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateFingerprintResponse {
    #[schema(example = "Fingerprint match found")]
    pub message: &'static str,
    #[schema(example = "Ada")]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    /// Base64 profile photo, if one was enrolled
    pub profile_picture: Option<String>,
    /// Engine confidence on a 0-100 scale
    #[schema(example = 87.5)]
    pub match_percentage: f64,
    pub sample_id: String,
}

/// Identify a fingerprint
///
/// Compares the probe against every enrolled sample in one engine call and
/// returns the matched identity when the engine's best candidate reaches the
/// configured threshold.
#[utoipa::path(
    post,
    path = "/validatefingerprint",
    tag = "Verification",
    request_body = ValidateFingerprintRequest,
    responses(
        (status = 200, description = "Match found", body = ValidateFingerprintResponse),
        (status = 400, description = "No image provided or invalid image encoding"),
        (status = 404, description = "No samples enrolled, or no candidate reached the threshold"),
        (status = 500, description = "Feature engine failure"),
        (status = 503, description = "Sample store unavailable")
    )
)]
pub async fn validate_fingerprint_handler(
    State(state): State<AppState>,
    body: Result<Json<ValidateFingerprintRequest>, JsonRejection>,
) -> Result<Json<ValidateFingerprintResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let request = VerificationRequest {
        probe: body.image_file.map(ImagePayload::Encoded),
    };
    let verified = state.pipeline.verify(request).await?;

    Ok(Json(ValidateFingerprintResponse {
        message: "Fingerprint match found",
        first_name: verified.identity.first_name,
        middle_name: verified.identity.middle_name,
        last_name: verified.identity.last_name,
        profile_picture: verified.profile_image.map(|bytes| BASE64.encode(bytes)),
        match_percentage: verified.match_percentage,
        sample_id: verified.sample_id.to_string(),
    }))
}
