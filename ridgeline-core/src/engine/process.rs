//! Child-process implementation of [`FeatureEngine`].

use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tracing::{debug, info, instrument, warn};

use super::{CandidateSource, Descriptor, EngineCommand, EngineConfig, FeatureEngine, MatchResult};
use crate::error::{PipelineError, Result};
use crate::normalize::NormalizedImage;
use crate::scratch::RequestId;

/// Size of the first stderr read.
const STDERR_CHUNK: usize = 4096;

/// Everything compare mode may print on stdout.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompareReply {
    Failed { error: String },
    Compared(MatchResult),
}

/// Runs the engine as one child process per call.
///
/// Children are spawned with `kill_on_drop`, so a call abandoned by
/// timeout or request cancellation takes its process down with it.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: EngineConfig,
}

impl ProcessEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    fn command(&self, spec: &EngineCommand) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).kill_on_drop(true);
        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    async fn bounded<T, F>(&self, mode: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    mode,
                    timeout_ms = self.config.timeout.as_millis() as u64,
                    "Feature engine timed out; child killed"
                );
                Err(PipelineError::EngineFailure(format!(
                    "{} timed out after {:?}",
                    mode, self.config.timeout
                )))
            }
        }
    }

    /// Feed stdin and drain stdout, failing fast on stderr.
    async fn run_extract(&self, input: String) -> Result<Vec<u8>> {
        let mut child = self
            .command(&self.config.extract)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_failure(&self.config.extract, e))?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let exchange = async move {
            let (fed, output) = tokio::join!(feed_stdin(stdin, input), read_all(stdout));
            fed?;
            output
        };
        supervise(&mut child, stderr, exchange).await
    }

    /// Drain stdout, failing fast on stderr.
    async fn run_compare(&self, probe: &Path, candidates: &CandidateSource) -> Result<Vec<u8>> {
        let mut child = self
            .command(&self.config.compare)
            .arg(probe)
            .arg(candidates.to_arg()?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_failure(&self.config.compare, e))?;

        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        supervise(&mut child, stderr, read_all(stdout)).await
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl FeatureEngine for ProcessEngine {
    #[instrument(level = "debug", skip_all, fields(request_id = %request, bytes = image.bytes().len()))]
    async fn extract(&self, request: RequestId, image: &NormalizedImage) -> Result<Descriptor> {
        let output = self
            .bounded("extract", self.run_extract(image.to_base64()))
            .await?;

        let value: serde_json::Value = serde_json::from_slice(&output)
            .map_err(|e| PipelineError::DescriptorDecodeError(e.to_string()))?;
        if value.is_null() {
            return Err(PipelineError::DescriptorDecodeError(
                "engine found no descriptor in the image".into(),
            ));
        }

        info!(output_bytes = output.len(), "Descriptor extracted");
        Ok(Descriptor::new(value))
    }

    #[instrument(level = "debug", skip_all, fields(request_id = %request, probe = %probe.display()))]
    async fn compare(
        &self,
        request: RequestId,
        probe: &Path,
        candidates: &CandidateSource,
    ) -> Result<MatchResult> {
        let output = self
            .bounded("compare", self.run_compare(probe, candidates))
            .await?;

        let reply: CompareReply = serde_json::from_slice(&output)
            .map_err(|e| PipelineError::DescriptorDecodeError(e.to_string()))?;

        match reply {
            CompareReply::Failed { error } => Err(PipelineError::EngineFailure(error)),
            CompareReply::Compared(result) => {
                info!(
                    match_index = result.match_index,
                    match_percentage = ?result.match_percentage,
                    "Comparison finished"
                );
                Ok(result)
            }
        }
    }
}

/// Run `exchange` to completion and reap `child`.
///
/// Any stderr bytes seen before a successful exit fail the call and kill the
/// child, whether they arrive while stdout is still open or after it closes.
async fn supervise<F>(child: &mut Child, stderr: ChildStderr, exchange: F) -> Result<Vec<u8>>
where
    F: Future<Output = io::Result<Vec<u8>>>,
{
    let stderr_probe = first_chunk(stderr);
    tokio::pin!(stderr_probe);
    tokio::pin!(exchange);
    let mut stderr_open = true;

    let output = loop {
        tokio::select! {
            biased;
            chunk = &mut stderr_probe, if stderr_open => match chunk {
                Some(chunk) => break Err(chunk),
                None => stderr_open = false,
            },
            output = &mut exchange => break Ok(output),
        }
    };
    let output = match output {
        Ok(output) => output.map_err(stream_failure)?,
        Err(chunk) => return Err(stderr_failure(child, &chunk)),
    };

    let status = loop {
        tokio::select! {
            biased;
            chunk = &mut stderr_probe, if stderr_open => match chunk {
                Some(chunk) => break Err(chunk),
                None => stderr_open = false,
            },
            status = child.wait() => break Ok(status),
        }
    };
    let status = match status {
        Ok(status) => {
            status.map_err(|e| PipelineError::EngineFailure(format!("wait failed: {}", e)))?
        }
        Err(chunk) => return Err(stderr_failure(child, &chunk)),
    };

    // Bytes written just before exit may still be buffered in the pipe.
    if stderr_open {
        if let Some(chunk) = (&mut stderr_probe).await {
            return Err(stderr_failure(child, &chunk));
        }
    }

    check_status(status)?;
    Ok(output)
}

async fn feed_stdin(mut stdin: ChildStdin, input: String) -> io::Result<()> {
    match stdin.write_all(input.as_bytes()).await {
        Ok(()) => {}
        // The engine may exit without reading everything; its exit status
        // and output decide the outcome.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("Engine closed stdin early");
            return Ok(());
        }
        Err(e) => return Err(e),
    }
    match stdin.shutdown().await {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(e),
        _ => Ok(()),
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Resolves to the first bytes written, or `None` at EOF.
async fn first_chunk<R: AsyncRead + Unpin>(mut reader: R) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; STDERR_CHUNK];
    match reader.read(&mut buf).await {
        Ok(0) => None,
        Ok(n) => {
            buf.truncate(n);
            Some(buf)
        }
        Err(e) => {
            debug!(error = %e, "Could not read engine stderr");
            None
        }
    }
}

fn check_status(status: ExitStatus) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    warn!(exit_code = ?status.code(), "Feature engine exited unsuccessfully");
    Err(PipelineError::EngineFailure(match status.code() {
        Some(code) => format!("engine exited with code {}", code),
        None => "engine terminated by signal".to_string(),
    }))
}

fn stderr_failure(child: &mut Child, chunk: &[u8]) -> PipelineError {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Engine already exited");
    }
    let message = String::from_utf8_lossy(chunk).trim().to_string();
    warn!(stderr = %message, "Feature engine reported an error");
    PipelineError::EngineFailure(format!("engine wrote to stderr: {}", message))
}

fn stream_failure(e: io::Error) -> PipelineError {
    PipelineError::EngineFailure(format!("engine stream error: {}", e))
}

fn spawn_failure(command: &EngineCommand, e: io::Error) -> PipelineError {
    PipelineError::EngineFailure(format!("failed to spawn `{}`: {}", command, e))
}

fn missing_pipe(name: &str) -> PipelineError {
    PipelineError::EngineFailure(format!("engine {} pipe unavailable", name))
}
