//! Record store seam.
//!
//! The pipeline needs two things from persistence: append an enrolled
//! sample, and list every sample in a stable order. Verification relies on
//! that order because the engine reports its match by position.

mod memory;

pub use memory::MemoryRecordStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::Descriptor;
use crate::error::{PipelineError, Result};

/// Store-generated identifier of a sample record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleId(Uuid);

impl SampleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SampleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who a sample belongs to. First and last name are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

impl Identity {
    /// Build an identity from raw form values, trimming whitespace.
    pub fn new(
        first_name: Option<&str>,
        middle_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<Self> {
        let first_name = required(first_name, "firstName")?;
        let last_name = required(last_name, "lastName")?;
        let middle_name = middle_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Self {
            first_name,
            middle_name,
            last_name,
        })
    }
}

fn required(value: Option<&str>, field: &'static str) -> Result<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(PipelineError::MissingField(field))
}

/// How a fingerprint is kept for later comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureRepresentation {
    /// Engine-extracted descriptor, tagged with the engine's format name.
    Descriptor {
        format: String,
        descriptor: Descriptor,
    },
    /// The fingerprint image itself; the engine extracts at compare time.
    RawImage { image: Vec<u8> },
}

/// A sample to be written by enrollment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSample {
    pub identity: Identity,
    pub profile_image: Option<Vec<u8>>,
    pub features: Option<FeatureRepresentation>,
}

/// A stored sample, projected to what verification needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub id: SampleId,
    pub identity: Identity,
    pub profile_image: Option<Vec<u8>>,
    pub features: Option<FeatureRepresentation>,
    pub created_at: DateTime<Utc>,
}

/// Persistence for enrolled samples.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a sample and return its new id.
    async fn insert(&self, sample: NewSample) -> Result<SampleId>;

    /// Every stored sample, oldest first. Two scans with no insert in
    /// between return the same order.
    async fn scan_all(&self) -> Result<Vec<SampleRecord>>;

    /// Whether samples survive a restart.
    fn is_persistent(&self) -> bool {
        false
    }

    async fn check_health(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_requires_first_and_last() {
        let identity = Identity::new(Some(" Ada "), Some(""), Some("Lovelace")).unwrap();
        assert_eq!(identity.first_name, "Ada");
        assert_eq!(identity.middle_name, None);
        assert_eq!(identity.last_name, "Lovelace");

        assert!(matches!(
            Identity::new(None, None, Some("Lovelace")),
            Err(PipelineError::MissingField("firstName"))
        ));
        assert!(matches!(
            Identity::new(Some("Ada"), Some("King"), Some("   ")),
            Err(PipelineError::MissingField("lastName"))
        ));
    }

    #[test]
    fn test_feature_representation_tagging() {
        let features = FeatureRepresentation::Descriptor {
            format: "orb-v1".into(),
            descriptor: Descriptor::new(serde_json::json!([[1, 2]])),
        };
        let json = serde_json::to_value(&features).unwrap();
        assert_eq!(json["kind"], "descriptor");
        assert_eq!(json["format"], "orb-v1");

        let restored: FeatureRepresentation = serde_json::from_value(json).unwrap();
        assert_eq!(restored, features);
    }
}
