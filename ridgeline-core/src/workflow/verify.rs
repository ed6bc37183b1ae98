//! Verification: compare a probe against every compatible stored record in
//! one engine call and map the engine's answer back to a record.
//!
//! Scratch files staged for the engine are released on every exit path.

use tracing::{info, instrument, warn};

use super::{FeatureMode, Pipeline};
use crate::decision::{decide, Decision};
use crate::engine::{CandidateSource, Descriptor};
use crate::error::{PipelineError, Result};
use crate::normalize::{normalize, sniff_extension, ImagePayload};
use crate::scratch::{Purpose, RequestId, ScratchFile};
use crate::store::{FeatureRepresentation, Identity, SampleId, SampleRecord};

#[derive(Debug, Clone, Default)]
pub struct VerificationRequest {
    pub probe: Option<ImagePayload>,
}

impl VerificationRequest {
    pub fn new(probe: ImagePayload) -> Self {
        Self { probe: Some(probe) }
    }
}

/// The accepted candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedIdentity {
    pub sample_id: SampleId,
    pub identity: Identity,
    pub profile_image: Option<Vec<u8>>,
    pub match_percentage: f64,
}

/// Candidate files staged for one compare call.
struct StagedCandidates {
    files: Vec<ScratchFile>,
    source: CandidateSource,
}

impl StagedCandidates {
    fn release(self) {
        for file in self.files {
            file.release();
        }
    }
}

impl Pipeline {
    #[instrument(name = "verify", skip_all, fields(request_id = %request_id))]
    pub(crate) async fn run_verification(
        &self,
        request_id: RequestId,
        request: VerificationRequest,
    ) -> Result<VerifiedIdentity> {
        let probe = request
            .probe
            .filter(|p| !p.is_empty())
            .ok_or(PipelineError::NoImageProvided("imageFile"))?;
        let probe = normalize(probe)?;

        let candidates = self.candidates(self.store.scan_all().await?);
        if candidates.is_empty() {
            return Err(PipelineError::NoSamplesEnrolled);
        }

        let probe_file = self
            .scratch
            .stage(request_id, Purpose::Probe, probe.extension(), probe.bytes())
            .await?;
        let staged = self.stage_candidates(request_id, &candidates).await?;

        info!(candidates = candidates.len(), "Comparing probe");
        let outcome = self
            .engine
            .compare(request_id, probe_file.path(), &staged.source)
            .await;

        probe_file.release();
        staged.release();

        match decide(&outcome?, self.config.threshold) {
            Decision::NoMatch => {
                info!("No candidate accepted");
                Err(PipelineError::NoMatchFound)
            }
            Decision::Match { index, percentage } => {
                let count = candidates.len();
                let record = candidates.into_iter().nth(index).ok_or_else(|| {
                    PipelineError::EngineFailure(format!(
                        "match index {} out of range for {} candidates",
                        index, count
                    ))
                })?;

                info!(sample_id = %record.id, match_percentage = percentage, "Candidate accepted");
                Ok(VerifiedIdentity {
                    sample_id: record.id,
                    identity: record.identity,
                    profile_image: record.profile_image,
                    match_percentage: percentage,
                })
            }
        }
    }

    /// Keep the records the configured engine can compare, in scan order.
    fn candidates(&self, records: Vec<SampleRecord>) -> Vec<SampleRecord> {
        let total = records.len();
        let kept: Vec<_> = records
            .into_iter()
            .filter(|record| self.is_compatible(record.features.as_ref()))
            .collect();

        let skipped = total - kept.len();
        if skipped > 0 {
            warn!(
                skipped,
                mode = self.config.feature_mode.as_str(),
                format = %self.config.descriptor_format,
                "Excluded samples with an incompatible feature representation"
            );
        }
        kept
    }

    fn is_compatible(&self, features: Option<&FeatureRepresentation>) -> bool {
        match (self.config.feature_mode, features) {
            (FeatureMode::Descriptor, Some(FeatureRepresentation::Descriptor { format, .. })) => {
                *format == self.config.descriptor_format
            }
            (FeatureMode::RawImage, Some(FeatureRepresentation::RawImage { .. })) => true,
            _ => false,
        }
    }

    async fn stage_candidates(
        &self,
        request_id: RequestId,
        candidates: &[SampleRecord],
    ) -> Result<StagedCandidates> {
        match self.config.feature_mode {
            FeatureMode::Descriptor => {
                let descriptors: Vec<&Descriptor> = candidates
                    .iter()
                    .filter_map(|record| match &record.features {
                        Some(FeatureRepresentation::Descriptor { descriptor, .. }) => {
                            Some(descriptor)
                        }
                        _ => None,
                    })
                    .collect();
                let json = serde_json::to_vec(&descriptors)
                    .map_err(|e| PipelineError::DescriptorDecodeError(e.to_string()))?;

                let file = self
                    .scratch
                    .stage(request_id, Purpose::Descriptors, "json", &json)
                    .await?;
                let source = CandidateSource::DescriptorFile(file.path().to_path_buf());
                Ok(StagedCandidates {
                    files: vec![file],
                    source,
                })
            }
            FeatureMode::RawImage => {
                let mut files = Vec::with_capacity(candidates.len());
                for record in candidates {
                    if let Some(FeatureRepresentation::RawImage { image }) = &record.features {
                        let file = self
                            .scratch
                            .stage(request_id, Purpose::Candidate, sniff_extension(image), image)
                            .await?;
                        files.push(file);
                    }
                }
                let source = CandidateSource::ImagePaths(
                    files.iter().map(|f| f.path().to_path_buf()).collect(),
                );
                Ok(StagedCandidates { files, source })
            }
        }
    }
}
