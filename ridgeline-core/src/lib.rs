//! Ridgeline Core - fingerprint enrollment and verification pipeline
//!
//! This crate turns inbound fingerprint images into stored samples and
//! identifies new probes against them. Feature extraction and matching are
//! delegated to an external engine executable, driven over its
//! stdin/stdout/stderr contract one process per call.
//!
//! # Components
//!
//! - [`normalize`] - data-URI / base64 decoding of inbound images
//! - [`scratch`] - uniquely named, self-deleting per-request files
//! - [`engine`] - the engine client ([`ProcessEngine`]) and its seam trait
//! - [`decision`] - sentinel and threshold rule for compare results
//! - [`store`] - record store seam plus an in-memory implementation
//! - [`workflow`] - the enrollment and verification workflows
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ridgeline_core::{
//!     EnrollmentRequest, ImagePayload, MemoryRecordStore, Pipeline, ProcessEngine,
//!     TempResourceManager, VerificationRequest,
//! };
//!
//! # async fn example() -> ridgeline_core::Result<()> {
//! let pipeline = Pipeline::new(
//!     Arc::new(MemoryRecordStore::new()),
//!     Arc::new(ProcessEngine::default()),
//!     TempResourceManager::system(),
//! );
//!
//! let enrollment = pipeline
//!     .enroll(EnrollmentRequest {
//!         first_name: Some("Ada".into()),
//!         last_name: Some("Lovelace".into()),
//!         fingerprint: Some(ImagePayload::Encoded("data:image/png;base64,...".into())),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//! let probe = ImagePayload::Encoded("data:image/png;base64,...".into());
//! let matched = pipeline.verify(VerificationRequest::new(probe)).await?;
//! assert_eq!(matched.sample_id, enrollment.id);
//! # Ok(())
//! # }
//! ```

pub mod decision;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod scratch;
pub mod store;
pub mod workflow;

pub use decision::{decide, Decision, MatchThreshold, DEFAULT_MATCH_THRESHOLD};
pub use engine::{
    CandidateSource, Descriptor, EngineCommand, EngineConfig, FeatureEngine, MatchResult,
    ProcessEngine, DEFAULT_ENGINE_TIMEOUT, NO_CANDIDATE,
};
pub use error::{PipelineError, Result, StatusClass};
pub use normalize::{normalize, ImagePayload, NormalizedImage};
pub use scratch::{Purpose, RequestId, ScratchFile, TempResourceManager};
pub use store::{
    FeatureRepresentation, Identity, MemoryRecordStore, NewSample, RecordStore, SampleId,
    SampleRecord,
};
pub use workflow::{
    Enrollment, EnrollmentPolicy, EnrollmentRequest, FeatureMode, Pipeline, PipelineConfig,
    VerificationRequest, VerifiedIdentity, DEFAULT_DESCRIPTOR_FORMAT,
};
