//! Enrollment: validate the identity, normalize the fingerprint, extract its
//! features, then store one record. Nothing is stored unless every earlier
//! step succeeded.

use tracing::{info, instrument};

use super::{FeatureMode, Pipeline};
use crate::error::{PipelineError, Result};
use crate::normalize::{normalize, ImagePayload, NormalizedImage};
use crate::scratch::RequestId;
use crate::store::{FeatureRepresentation, Identity, NewSample, SampleId};

/// Raw enrollment input, as collected from the caller.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image: Option<Vec<u8>>,
    pub fingerprint: Option<ImagePayload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enrollment {
    pub id: SampleId,
    pub request_id: RequestId,
}

impl Pipeline {
    /// Validate, extract, then insert. Nothing is written unless every
    /// earlier step succeeded.
    #[instrument(name = "enroll", skip_all, fields(request_id = %request_id))]
    pub(crate) async fn run_enrollment(
        &self,
        request_id: RequestId,
        request: EnrollmentRequest,
    ) -> Result<Enrollment> {
        let identity = Identity::new(
            request.first_name.as_deref(),
            request.middle_name.as_deref(),
            request.last_name.as_deref(),
        )?;

        let policy = self.config.enrollment;
        let profile_image = request.profile_image.filter(|b| !b.is_empty());
        if policy.require_profile_image && profile_image.is_none() {
            return Err(PipelineError::NoImageProvided("profilePhoto"));
        }

        let features = match request.fingerprint.filter(|p| !p.is_empty()) {
            Some(payload) => {
                let image = normalize(payload)?;
                Some(self.represent(request_id, image).await?)
            }
            None if policy.require_fingerprint => {
                return Err(PipelineError::NoImageProvided("fingerprintImage"));
            }
            None => None,
        };

        let has_features = features.is_some();
        let id = self
            .store
            .insert(NewSample {
                identity,
                profile_image,
                features,
            })
            .await?;

        info!(sample_id = %id, has_features, "Sample enrolled");
        Ok(Enrollment { id, request_id })
    }

    async fn represent(
        &self,
        request_id: RequestId,
        image: NormalizedImage,
    ) -> Result<FeatureRepresentation> {
        match self.config.feature_mode {
            FeatureMode::Descriptor => {
                let descriptor = self.engine.extract(request_id, &image).await?;
                Ok(FeatureRepresentation::Descriptor {
                    format: self.config.descriptor_format.clone(),
                    descriptor,
                })
            }
            FeatureMode::RawImage => Ok(FeatureRepresentation::RawImage {
                image: image.into_bytes(),
            }),
        }
    }
}
