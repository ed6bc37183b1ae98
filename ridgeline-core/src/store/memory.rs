//! In-memory record store for development and tests.
//!
//! Samples are lost on restart.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{NewSample, RecordStore, SampleId, SampleRecord};
use crate::error::Result;

/// Insertion-ordered, process-local sample list.
#[derive(Default)]
pub struct MemoryRecordStore {
    samples: RwLock<Vec<SampleRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.samples.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.samples.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, sample: NewSample) -> Result<SampleId> {
        let id = SampleId::new();
        let record = SampleRecord {
            id,
            identity: sample.identity,
            profile_image: sample.profile_image,
            features: sample.features,
            created_at: Utc::now(),
        };
        self.samples.write().await.push(record);
        Ok(id)
    }

    async fn scan_all(&self) -> Result<Vec<SampleRecord>> {
        Ok(self.samples.read().await.clone())
    }
}

impl std::fmt::Debug for MemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.samples.try_read().map(|s| s.len()).ok();
        f.debug_struct("MemoryRecordStore")
            .field("samples", &count)
            .finish()
    }
}
