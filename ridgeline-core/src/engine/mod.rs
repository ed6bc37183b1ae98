//! Client side of the external feature engine.
//!
//! The engine is a separate executable that turns fingerprint images into
//! descriptors (extract mode) and ranks a probe against stored candidates
//! (compare mode). Ridgeline only knows its I/O contract:
//!
//! - **extract**: base64 image text on stdin, one JSON descriptor on stdout,
//!   any stderr output means failure.
//! - **compare**: `<probe-path> <candidates>` as arguments, where
//!   `<candidates>` is a descriptor JSON file path or a JSON list of image
//!   paths; `{"matchIndex": i, "matchPercentage": p}` on stdout.
//!
//! In both modes a nonzero exit or any stderr output means failure.
//!
//! [`ProcessEngine`] is the production implementation. Tests substitute
//! their own [`FeatureEngine`].

mod process;

pub use process::ProcessEngine;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::normalize::NormalizedImage;
use crate::scratch::RequestId;

/// Default bound on a single engine invocation.
pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);

/// `matchIndex` value the engine uses for "no candidate".
pub const NO_CANDIDATE: i64 = -1;

/// Engine-defined compact feature representation of one fingerprint.
///
/// Opaque to Ridgeline: stored as-is and handed back to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(serde_json::Value);

impl Descriptor {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Outcome of one compare invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Position of the best candidate, or [`NO_CANDIDATE`].
    pub match_index: i64,
    /// Confidence on a 0–100 scale. The engine sends `null` alongside
    /// [`NO_CANDIDATE`].
    #[serde(default)]
    pub match_percentage: Option<f64>,
}

/// How the candidate set is handed to the engine in compare mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// Path of a JSON file holding the ordered list of descriptors.
    DescriptorFile(PathBuf),
    /// Ordered candidate image files, passed as one JSON list argument.
    ImagePaths(Vec<PathBuf>),
}

impl CandidateSource {
    /// Render as the engine's second positional argument.
    pub fn to_arg(&self) -> Result<OsString> {
        match self {
            Self::DescriptorFile(path) => Ok(path.clone().into_os_string()),
            Self::ImagePaths(paths) => serde_json::to_string(paths)
                .map(OsString::from)
                .map_err(|e| {
                    PipelineError::EngineFailure(format!("cannot encode candidate paths: {}", e))
                }),
        }
    }
}

/// A program plus its leading arguments, e.g. `python compare.py`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl EngineCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line with POSIX shell quoting, so
    /// `"/opt/My Engine/match" --fast` keeps the space in the program path.
    /// `None` when blank or when a quote is left unbalanced.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = shlex::split(line)?.into_iter();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }
}

impl std::fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let quoted = |word: &str| match shlex::try_quote(word) {
            Ok(word) => word.into_owned(),
            Err(_) => word.to_string(),
        };
        write!(f, "{}", quoted(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quoted(arg))?;
        }
        Ok(())
    }
}

/// Commands and limits for [`ProcessEngine`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub extract: EngineCommand,
    pub compare: EngineCommand,
    /// Upper bound on one invocation, spawn to exit.
    pub timeout: Duration,
    /// Working directory for the engine, e.g. where its scripts live.
    pub working_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extract: EngineCommand::new("python", ["processor.py"]),
            compare: EngineCommand::new("python", ["compare.py"]),
            timeout: DEFAULT_ENGINE_TIMEOUT,
            working_dir: None,
        }
    }
}

/// The feature extraction / matching engine.
///
/// Each call maps to exactly one engine invocation; implementations must not
/// retry or pool.
#[async_trait]
pub trait FeatureEngine: Send + Sync {
    /// Extract a descriptor from a normalized fingerprint image.
    async fn extract(&self, request: RequestId, image: &NormalizedImage) -> Result<Descriptor>;

    /// Rank the probe image at `probe` against `candidates`.
    async fn compare(
        &self,
        request: RequestId,
        probe: &Path,
        candidates: &CandidateSource,
    ) -> Result<MatchResult>;
}
