//! Workflow tests against a scripted in-process engine.
//!
//! The scripted engine records every call so the tests can check what the
//! workflows hand to the engine (and when they don't call it at all).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ridgeline_core::{
    CandidateSource, Descriptor, EnrollmentPolicy, EnrollmentRequest, FeatureEngine,
    FeatureMode, FeatureRepresentation, ImagePayload, MatchResult, MatchThreshold,
    MemoryRecordStore, NormalizedImage, Pipeline, PipelineConfig, PipelineError, RecordStore,
    RequestId, TempResourceManager, VerificationRequest,
};
use serde_json::{json, Value};
use tempfile::TempDir;

/// What the scripted engine saw during one compare call.
#[derive(Debug, Clone)]
struct CompareCall {
    probe: PathBuf,
    probe_existed: bool,
    candidates: Value,
}

struct ScriptedEngine {
    extract_reply: Option<Value>,
    compare_reply: Option<MatchResult>,
    extract_calls: AtomicUsize,
    compare_calls: Mutex<Vec<CompareCall>>,
}

impl ScriptedEngine {
    fn new(extract_reply: Option<Value>, compare_reply: Option<MatchResult>) -> Arc<Self> {
        Arc::new(Self {
            extract_reply,
            compare_reply,
            extract_calls: AtomicUsize::new(0),
            compare_calls: Mutex::new(Vec::new()),
        })
    }

    /// Extracts a descriptor derived from the image bytes.
    fn echoing(compare_reply: Option<MatchResult>) -> Arc<Self> {
        Self::new(None, compare_reply)
    }

    fn extract_count(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    fn compare_calls(&self) -> Vec<CompareCall> {
        self.compare_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeatureEngine for ScriptedEngine {
    async fn extract(
        &self,
        _request: RequestId,
        image: &NormalizedImage,
    ) -> ridgeline_core::Result<Descriptor> {
        self.extract_calls.fetch_add(1, Ordering::SeqCst);
        match &self.extract_reply {
            Some(Value::Null) => Err(PipelineError::EngineFailure("scripted failure".into())),
            Some(value) => Ok(Descriptor::new(value.clone())),
            None => Ok(Descriptor::new(json!(String::from_utf8_lossy(image.bytes())))),
        }
    }

    async fn compare(
        &self,
        _request: RequestId,
        probe: &Path,
        candidates: &CandidateSource,
    ) -> ridgeline_core::Result<MatchResult> {
        let candidates = match candidates {
            CandidateSource::DescriptorFile(path) => {
                serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
            }
            CandidateSource::ImagePaths(paths) => Value::Array(
                paths
                    .iter()
                    .map(|p| json!(String::from_utf8_lossy(&std::fs::read(p).unwrap())))
                    .collect(),
            ),
        };
        self.compare_calls.lock().unwrap().push(CompareCall {
            probe: probe.to_path_buf(),
            probe_existed: probe.exists(),
            candidates,
        });
        self.compare_reply
            .ok_or_else(|| PipelineError::EngineFailure("engine exited with code 1".into()))
    }
}

fn data_uri(bytes: &[u8]) -> ImagePayload {
    ImagePayload::Encoded(format!("data:image/png;base64,{}", BASE64.encode(bytes)))
}

fn enrollment(first: &str, fingerprint: &[u8]) -> EnrollmentRequest {
    EnrollmentRequest {
        first_name: Some(first.into()),
        middle_name: Some("Q".into()),
        last_name: Some("Sample".into()),
        profile_image: Some(format!("{}-photo", first).into_bytes()),
        fingerprint: Some(data_uri(fingerprint)),
    }
}

fn matched(index: i64, percentage: f64) -> Option<MatchResult> {
    Some(MatchResult {
        match_index: index,
        match_percentage: Some(percentage),
    })
}

struct Harness {
    pipeline: Pipeline,
    store: Arc<MemoryRecordStore>,
    engine: Arc<ScriptedEngine>,
    scratch: TempDir,
}

impl Harness {
    fn new(engine: Arc<ScriptedEngine>) -> Self {
        Self::with_config(engine, PipelineConfig::default())
    }

    fn with_config(engine: Arc<ScriptedEngine>, config: PipelineConfig) -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        let pipeline = Pipeline::new(
            store.clone(),
            engine.clone(),
            TempResourceManager::new(scratch.path()),
        )
        .with_config(config);
        Self {
            pipeline,
            store,
            engine,
            scratch,
        }
    }

    fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path()).unwrap().count()
    }
}

// ============================================================================
// Enrollment
// ============================================================================

#[tokio::test]
async fn test_enroll_then_scan_adds_one_record() {
    let h = Harness::new(ScriptedEngine::new(Some(json!([[1, 2, 3]])), None));

    let before = h.store.scan_all().await.unwrap().len();
    let enrolled = h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    let records = h.store.scan_all().await.unwrap();

    assert_eq!(records.len(), before + 1);
    let record = records.last().unwrap();
    assert_eq!(record.id, enrolled.id);
    assert_eq!(record.identity.first_name, "Ada");
    assert_eq!(record.identity.middle_name.as_deref(), Some("Q"));
    assert_eq!(record.identity.last_name, "Sample");
    assert_eq!(record.profile_image.as_deref(), Some(&b"Ada-photo"[..]));
    match &record.features {
        Some(FeatureRepresentation::Descriptor { format, descriptor }) => {
            assert_eq!(format, "orb-v1");
            assert_eq!(descriptor.as_value(), &json!([[1, 2, 3]]));
        }
        other => panic!("expected descriptor, got {:?}", other),
    }
    assert_eq!(h.engine.extract_count(), 1);
}

#[tokio::test]
async fn test_enroll_invalid_encoding_skips_engine_and_store() {
    let h = Harness::new(ScriptedEngine::new(Some(json!([1])), None));

    let mut request = enrollment("Ada", b"print");
    request.fingerprint = Some(ImagePayload::Encoded("data:image/png;base64,@@@".into()));

    let err = h.pipeline.enroll(request).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidImageEncoding(_)));
    assert_eq!(h.engine.extract_count(), 0);
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_enroll_engine_failure_writes_nothing() {
    let h = Harness::new(ScriptedEngine::new(Some(Value::Null), None));

    let err = h.pipeline.enroll(enrollment("Ada", b"print")).await.unwrap_err();
    assert!(matches!(err, PipelineError::EngineFailure(_)));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn test_enroll_requires_identity() {
    let h = Harness::new(ScriptedEngine::echoing(None));

    let mut request = enrollment("Ada", b"print");
    request.last_name = None;

    let err = h.pipeline.enroll(request).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingField("lastName")));
    assert_eq!(h.engine.extract_count(), 0);
}

#[tokio::test]
async fn test_enroll_image_policy() {
    let h = Harness::new(ScriptedEngine::echoing(None));
    let mut request = enrollment("Ada", b"print");
    request.fingerprint = None;
    let err = h.pipeline.enroll(request).await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::NoImageProvided("fingerprintImage")
    ));

    let config = PipelineConfig {
        enrollment: EnrollmentPolicy {
            require_profile_image: true,
            require_fingerprint: false,
        },
        ..Default::default()
    };
    let h = Harness::with_config(ScriptedEngine::echoing(None), config);

    let mut request = enrollment("Ada", b"print");
    request.profile_image = Some(Vec::new());
    let err = h.pipeline.enroll(request).await.unwrap_err();
    assert!(matches!(err, PipelineError::NoImageProvided("profilePhoto")));

    let mut request = enrollment("Ada", b"print");
    request.fingerprint = None;
    h.pipeline.enroll(request).await.unwrap();
    let records = h.store.scan_all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].features.is_none());
    assert_eq!(h.engine.extract_count(), 0);
}

// ============================================================================
// Verification
// ============================================================================

#[tokio::test]
async fn test_verify_empty_store_never_invokes_engine() {
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 99.0)));

    let err = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoSamplesEnrolled));
    assert!(h.engine.compare_calls().is_empty());
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_verify_requires_probe() {
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 99.0)));

    let err = h
        .pipeline
        .verify(VerificationRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoImageProvided("imageFile")));

    let err = h
        .pipeline
        .verify(VerificationRequest::new(ImagePayload::Encoded(String::new())))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoImageProvided(_)));
}

#[tokio::test]
async fn test_verify_invalid_probe_never_invokes_engine() {
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 99.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();

    let err = h
        .pipeline
        .verify(VerificationRequest::new(ImagePayload::Encoded(
            "not base64!".into(),
        )))
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::InvalidImageEncoding(_)));
    assert!(h.engine.compare_calls().is_empty());
}

#[tokio::test]
async fn test_verify_match_resolves_by_position_in_scan_order() {
    let h = Harness::new(ScriptedEngine::echoing(matched(1, 88.5)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    let grace = h.pipeline.enroll(enrollment("Grace", b"print-b")).await.unwrap();
    h.pipeline.enroll(enrollment("Alan", b"print-c")).await.unwrap();

    let verified = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap();

    assert_eq!(verified.sample_id, grace.id);
    assert_eq!(verified.identity.first_name, "Grace");
    assert_eq!(verified.profile_image.as_deref(), Some(&b"Grace-photo"[..]));
    assert_eq!(verified.match_percentage, 88.5);

    let calls = h.engine.compare_calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].probe_existed);
    assert_eq!(
        calls[0].candidates,
        json!(["print-a", "print-b", "print-c"])
    );
}

#[tokio::test]
async fn test_verify_sentinel_is_no_match() {
    let h = Harness::new(ScriptedEngine::echoing(matched(-1, 95.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();

    let err = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoMatchFound));
}

#[tokio::test]
async fn test_verify_below_threshold_is_no_match() {
    let config = PipelineConfig {
        threshold: MatchThreshold::new(80.0).unwrap(),
        ..Default::default()
    };
    let h = Harness::with_config(ScriptedEngine::echoing(matched(0, 79.9)), config);
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();

    let err = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoMatchFound));
}

#[tokio::test]
async fn test_verify_out_of_range_index_is_engine_failure() {
    let h = Harness::new(ScriptedEngine::echoing(matched(5, 99.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();

    let err = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EngineFailure(_)));
}

#[tokio::test]
async fn test_verify_scratch_files_removed_on_every_path() {
    // Success path.
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 90.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    h.pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap();
    let probe = h.engine.compare_calls()[0].probe.clone();
    assert!(!probe.exists());
    assert_eq!(h.scratch_entries(), 0);

    // Engine failure path.
    let h = Harness::new(ScriptedEngine::echoing(None));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    let err = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::EngineFailure(_)));
    assert!(h.engine.compare_calls()[0].probe_existed);
    assert_eq!(h.scratch_entries(), 0);

    // No-match path.
    let h = Harness::new(ScriptedEngine::echoing(matched(-1, 0.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    assert!(h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .is_err());
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_verify_excludes_incompatible_descriptor_formats() {
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 99.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();

    let v2 = Pipeline::new(
        h.store.clone(),
        h.engine.clone(),
        TempResourceManager::new(h.scratch.path()),
    )
    .with_config(PipelineConfig {
        descriptor_format: "orb-v2".into(),
        ..Default::default()
    });

    let err = v2
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoSamplesEnrolled));
    assert!(h.engine.compare_calls().is_empty());
}

#[tokio::test]
async fn test_raw_image_mode_passes_image_paths() {
    let config = PipelineConfig {
        feature_mode: FeatureMode::RawImage,
        ..Default::default()
    };
    let h = Harness::with_config(ScriptedEngine::echoing(matched(0, 75.0)), config);
    let ada = h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    h.pipeline.enroll(enrollment("Grace", b"print-b")).await.unwrap();

    let records = h.store.scan_all().await.unwrap();
    assert!(matches!(
        records[0].features,
        Some(FeatureRepresentation::RawImage { .. })
    ));
    assert_eq!(h.engine.extract_count(), 0);

    let verified = h
        .pipeline
        .verify(VerificationRequest::new(data_uri(b"probe")))
        .await
        .unwrap();
    assert_eq!(verified.sample_id, ada.id);
    assert_eq!(
        h.engine.compare_calls()[0].candidates,
        json!(["print-a", "print-b"])
    );
    assert_eq!(h.scratch_entries(), 0);
}

#[tokio::test]
async fn test_concurrent_verifications_use_distinct_scratch_paths() {
    let h = Harness::new(ScriptedEngine::echoing(matched(0, 90.0)));
    h.pipeline.enroll(enrollment("Ada", b"print-a")).await.unwrap();
    let pipeline = Arc::new(h.pipeline);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                pipeline
                    .verify(VerificationRequest::new(data_uri(
                        format!("probe-{}", i).as_bytes(),
                    )))
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut probes: Vec<_> = h
        .engine
        .compare_calls()
        .into_iter()
        .map(|c| c.probe)
        .collect();
    assert_eq!(probes.len(), 8);
    probes.sort();
    probes.dedup();
    assert_eq!(probes.len(), 8);
    assert_eq!(std::fs::read_dir(h.scratch.path()).unwrap().count(), 0);
}
