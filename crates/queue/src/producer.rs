//! Artifact producer abstraction and subprocess runner.
//!
//! The producer is an opaque external executable invoked with a target
//! identifier and an output directory: it either deposits one or more files
//! there and exits 0, or fails. [`CommandProducer`] is the production
//! implementation; tests inject their own [`Producer`].

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stderr size captured from the producer (10 MiB).
///
/// Diagnostic output beyond this limit is truncated to prevent memory
/// exhaustion from extremely verbose downloaders.
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Placeholder in a configured argument replaced with the identifier.
pub const ARG_PLACEHOLDER_URL: &str = "{url}";
/// Placeholder in a configured argument replaced with the output directory.
pub const ARG_PLACEHOLDER_DIR: &str = "{dir}";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from one producer invocation. All of these mark the job failed;
/// none of them are cached.
#[derive(Debug, thiserror::Error)]
pub enum ProducerError {
    /// The process exceeded the hard wall-clock timeout and was killed.
    #[error("Producer timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The process ran but exited with a non-zero exit code.
    #[error("Producer failed with exit code {exit_code}: {stderr}")]
    ExecutionFailed { exit_code: i32, stderr: String },

    /// The process exited 0 but deposited no files (success without output
    /// is invalid).
    #[error("Producer exited successfully but produced no output files")]
    NoOutput,

    /// An I/O error occurred while spawning or communicating with the
    /// process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Producer trait
// ---------------------------------------------------------------------------

/// Seam between the worker pool and the external executable.
///
/// Implementations write all output files under `output_dir` and return
/// once the process has exited; enumeration of what was produced is the
/// caller's job.
#[async_trait::async_trait]
pub trait Producer: Send + Sync {
    async fn execute(
        &self,
        identifier: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> Result<(), ProducerError>;
}

// ---------------------------------------------------------------------------
// CommandProducer
// ---------------------------------------------------------------------------

/// Runs a configured external command as the artifact producer.
///
/// Each configured argument may contain the [`ARG_PLACEHOLDER_URL`] and
/// [`ARG_PLACEHOLDER_DIR`] placeholders; if no argument mentions either
/// placeholder, the identifier and output directory are appended in that
/// order.
pub struct CommandProducer {
    program: String,
    args: Vec<String>,
}

impl CommandProducer {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Resolve the final argument list for one invocation.
    fn resolve_args(&self, identifier: &str, output_dir: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| {
                if a.contains(ARG_PLACEHOLDER_URL) || a.contains(ARG_PLACEHOLDER_DIR) {
                    substituted = true;
                }
                a.replace(ARG_PLACEHOLDER_URL, identifier)
                    .replace(ARG_PLACEHOLDER_DIR, output_dir)
            })
            .collect();

        if !substituted {
            args.push(identifier.to_string());
            args.push(output_dir.to_string());
        }
        args
    }
}

#[async_trait::async_trait]
impl Producer for CommandProducer {
    async fn execute(
        &self,
        identifier: &str,
        output_dir: &Path,
        timeout: Duration,
    ) -> Result<(), ProducerError> {
        let out = output_dir.to_string_lossy();
        let args = self.resolve_args(identifier, &out);

        let mut cmd = Command::new(&self.program);
        // `kill_on_drop(true)` ensures the child is killed when dropped
        // (e.g. on timeout or job cancellation).
        cmd.args(&args)
            .current_dir(output_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn()?;

        // Read stderr in a spawned task so we can still call `child.wait()`.
        let stderr_handle = child.stderr.take();
        let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

        let wait_result = tokio::time::timeout(timeout, child.wait()).await;

        match wait_result {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => {
                let stderr_bytes = stderr_task.await.unwrap_or_default();
                Err(ProducerError::ExecutionFailed {
                    exit_code: status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
                })
            }
            Ok(Err(e)) => Err(ProducerError::Io(e)),
            Err(_elapsed) => {
                // Timeout expired. `child` is dropped here, which kills the
                // process because we set `kill_on_drop(true)`.
                Err(ProducerError::Timeout {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                })
            }
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at
/// [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
