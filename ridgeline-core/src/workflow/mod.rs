//! Enrollment and verification workflows.
//!
//! A [`Pipeline`] owns the collaborators shared by every request: the
//! record store, the feature engine and the scratch directory. Each call
//! gets its own [`RequestId`], scratch files and engine process; nothing
//! serializes concurrent calls.

mod enroll;
mod verify;

pub use enroll::{Enrollment, EnrollmentRequest};
pub use verify::{VerificationRequest, VerifiedIdentity};

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::decision::MatchThreshold;
use crate::engine::FeatureEngine;
use crate::scratch::{RequestId, TempResourceManager};
use crate::store::RecordStore;

/// Format tag written next to descriptors produced by the stock engine.
pub const DEFAULT_DESCRIPTOR_FORMAT: &str = "orb-v1";

/// What enrollment stores and verification compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureMode {
    /// Extract a descriptor at enrollment; compare descriptor files.
    #[default]
    Descriptor,
    /// Store the fingerprint image; compare image paths.
    RawImage,
}

impl FeatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Descriptor => "descriptor",
            Self::RawImage => "raw-image",
        }
    }
}

impl FromStr for FeatureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "descriptor" => Ok(Self::Descriptor),
            "raw-image" | "raw_image" | "image" => Ok(Self::RawImage),
            other => Err(format!("unknown feature mode '{}'", other)),
        }
    }
}

/// Which enrollment images may be omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentPolicy {
    pub require_profile_image: bool,
    pub require_fingerprint: bool,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            require_profile_image: false,
            require_fingerprint: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub feature_mode: FeatureMode,
    /// Descriptors carrying any other tag are never compared.
    pub descriptor_format: String,
    pub threshold: MatchThreshold,
    pub enrollment: EnrollmentPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            feature_mode: FeatureMode::default(),
            descriptor_format: DEFAULT_DESCRIPTOR_FORMAT.to_string(),
            threshold: MatchThreshold::default(),
            enrollment: EnrollmentPolicy::default(),
        }
    }
}

/// Shared entry point for both workflows.
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    engine: Arc<dyn FeatureEngine>,
    scratch: TempResourceManager,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        engine: Arc<dyn FeatureEngine>,
        scratch: TempResourceManager,
    ) -> Self {
        Self {
            store,
            engine,
            scratch,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Enroll a sample under a fresh request id.
    pub async fn enroll(&self, request: EnrollmentRequest) -> crate::Result<Enrollment> {
        self.run_enrollment(RequestId::new(), request).await
    }

    /// Identify a probe under a fresh request id.
    pub async fn verify(&self, request: VerificationRequest) -> crate::Result<VerifiedIdentity> {
        self.run_verification(RequestId::new(), request).await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("scratch", &self.scratch)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
