//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3 document served under `/docs`.

use utoipa::OpenApi;

use crate::handlers::{
    HealthResponse, ReadyResponse, UploadResponse, ValidateFingerprintRequest,
    ValidateFingerprintResponse,
};

/// Ridgeline API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ridgeline - Fingerprint Identification API",
        version = "0.1.0",
        description = r#"
## Fingerprint enrollment and identification

1. **Enroll** a sample via `POST /upload` with the owner's name, a
   fingerprint image and an optional profile photo.
2. **Identify** a probe via `POST /validatefingerprint`. The probe is
   compared against every enrolled sample in one engine call; the best
   candidate is returned when its score reaches the configured threshold.

Errors carry a JSON body `{"error": "...", "code": "..."}`.
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    tags(
        (name = "Enrollment", description = "Enroll fingerprint samples"),
        (name = "Verification", description = "Identify a fingerprint against enrolled samples"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::enroll::upload_handler,
        crate::handlers::verify::validate_fingerprint_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UploadResponse,
            ValidateFingerprintRequest,
            ValidateFingerprintResponse,
        )
    )
)]
pub struct ApiDoc;
