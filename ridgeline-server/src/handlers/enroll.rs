//! Enrollment handler
//!
//! Handles POST /upload requests that enroll a new fingerprint sample.

use axum::{
    extract::{Multipart, State},
    Json,
};
use ridgeline_core::{EnrollmentRequest, ImagePayload};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::multipart::MultipartFields;
use crate::state::AppState;

/// Response for a successful enrollment
#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    #[schema(example = "Sample uploaded successfully")]
    pub message: &'static str,
    /// Identifier of the new sample
    #[schema(example = "0b6f5c8e-4f0a-4d7e-9a51-5d3c2f1e8a90")]
    pub id: String,
}

/// Enroll a fingerprint sample
///
/// Accepts multipart/form-data with:
/// - **firstName** / **lastName** (required): Identity of the sample owner
/// - **middleName** (optional)
/// - **fingerprintImage** (required): Data-URI or base64 text, or an image file
/// - **profilePhoto** (optional unless configured): Image file
///
/// The fingerprint is run through the feature engine before anything is
/// stored; a failed extraction leaves the store untouched.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "Enrollment",
    request_body(
        content_type = "multipart/form-data",
        description = "Identity fields, fingerprint image and optional profile photo"
    ),
    responses(
        (status = 200, description = "Sample enrolled", body = UploadResponse),
        (status = 400, description = "Missing field, missing image or invalid image encoding"),
        (status = 500, description = "Feature engine failure"),
        (status = 503, description = "Sample store unavailable")
    )
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut fields = MultipartFields::parse(
        &mut multipart,
        &["profilePhoto"],
        state.config.max_file_size(),
    )
    .await?;

    let fingerprint = match fields.take_file("fingerprintImage") {
        Some(bytes) => Some(ImagePayload::Binary(bytes)),
        None => fields.take_text("fingerprintImage").map(ImagePayload::Encoded),
    };

    let request = EnrollmentRequest {
        first_name: fields.take_text("firstName"),
        middle_name: fields.take_text("middleName"),
        last_name: fields.take_text("lastName"),
        profile_image: fields.take_file("profilePhoto"),
        fingerprint,
    };

    let enrollment = state.pipeline.enroll(request).await?;

    Ok(Json(UploadResponse {
        message: "Sample uploaded successfully",
        id: enrollment.id.to_string(),
    }))
}
