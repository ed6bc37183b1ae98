//! Per-request scratch files.
//!
//! The engine's compare mode reads its inputs from disk, so each
//! verification stages the probe and its candidates as files. Names embed
//! the request id, the purpose and a process-wide sequence number on top of
//! the random suffix `tempfile` adds, so concurrent requests never collide.
//! A [`ScratchFile`] removes itself when dropped; [`ScratchFile::release`]
//! does the same eagerly and logs a failed removal.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tempfile::TempPath;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;

/// Identifier of one enrollment or verification call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// What a scratch file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    /// The submitted probe image.
    Probe,
    /// JSON list of candidate descriptors.
    Descriptors,
    /// One stored fingerprint image staged as a compare candidate.
    Candidate,
}

impl Purpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Probe => "probe",
            Self::Descriptors => "descriptors",
            Self::Candidate => "candidate",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allocates uniquely named scratch files under one directory.
#[derive(Debug)]
pub struct TempResourceManager {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl TempResourceManager {
    /// Manager rooted at `dir`, which must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Manager rooted at the operating system's temp directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create an empty scratch file for `request`.
    pub fn acquire(
        &self,
        request: RequestId,
        purpose: Purpose,
        extension: &str,
    ) -> Result<ScratchFile> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let prefix = format!("ridgeline-{}-{}-{}-", request, purpose, seq);
        let suffix = format!(".{}", extension);

        let path = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(&self.dir)?
            .into_temp_path();

        debug!(request_id = %request, purpose = %purpose, path = %path.display(), "Scratch file acquired");
        Ok(ScratchFile { path, purpose })
    }

    /// Create a scratch file for `request` holding `contents`.
    pub async fn stage(
        &self,
        request: RequestId,
        purpose: Purpose,
        extension: &str,
        contents: &[u8],
    ) -> Result<ScratchFile> {
        let file = self.acquire(request, purpose, extension)?;
        tokio::fs::write(file.path(), contents).await?;
        Ok(file)
    }
}

impl Default for TempResourceManager {
    fn default() -> Self {
        Self::system()
    }
}

/// A scratch file owned by one request. Deleted on drop.
#[derive(Debug)]
pub struct ScratchFile {
    path: TempPath,
    purpose: Purpose,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now.
    pub fn release(self) {
        let Self { path, purpose } = self;
        let location = path.to_path_buf();
        if let Err(e) = path.close() {
            warn!(
                path = %location.display(),
                purpose = %purpose,
                error = %e,
                "Failed to remove scratch file"
            );
        }
    }
}
