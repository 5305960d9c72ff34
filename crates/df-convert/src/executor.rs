//! Runs one conversion against the engine and classifies the result.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use df_core::{Error, Job, Result};

use crate::command::{EngineCommand, SubprocessOutcome};
use crate::engine::ConversionEngine;

/// Flags that keep LibreOffice headless and non-interactive.
const HEADLESS_FLAGS: &[&str] = &[
    "--headless",
    "--nologo",
    "--nodefault",
    "--nofirststartwizard",
];

/// Longest engine diagnostic carried in an error.
const MAX_DIAGNOSTIC_LEN: usize = 2000;

/// Invokes the engine for a job and verifies the output.
///
/// The executor imposes no concurrency control; callers hold a
/// [`JobSlot`](crate::JobSlot) while calling [`execute`](Self::execute).
#[derive(Debug, Clone)]
pub struct ConversionExecutor {
    engine: ConversionEngine,
    timeout: Duration,
}

impl ConversionExecutor {
    pub fn new(engine: ConversionEngine, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn engine(&self) -> &ConversionEngine {
        &self.engine
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build the engine invocation for `job`.
    pub fn command(&self, engine: &Path, job: &Job) -> EngineCommand {
        let mut cmd = EngineCommand::new(engine.to_path_buf());
        cmd.args(HEADLESS_FLAGS.iter().copied())
            .arg("--convert-to")
            .arg(job.format.as_str())
            .arg("--outdir")
            .arg(job.output_dir.to_string_lossy())
            .arg(job.input.to_string_lossy())
            .timeout(self.timeout);
        cmd
    }

    /// Convert `job.input`, returning the path of the produced output.
    ///
    /// # Errors
    ///
    /// - [`Error::EngineUnavailable`] if the engine is missing or cannot be
    ///   spawned.
    /// - [`Error::EngineNonZeroExit`] / [`Error::EngineCrashed`] if the
    ///   engine fails.
    /// - [`Error::EngineTimeout`] if the deadline expires.
    /// - [`Error::NoOutputProduced`] if the engine exits 0 but the expected
    ///   file is absent.
    pub async fn execute(&self, job: &Job) -> Result<PathBuf> {
        let engine = self.engine.require()?;
        let cmd = self.command(engine, job);

        tracing::info!(
            job_id = %job.id,
            input = %job.input.display(),
            format = %job.format,
            "Starting conversion"
        );
        let started = Instant::now();
        let outcome = cmd.run().await;
        let elapsed = started.elapsed();

        let result = classify(outcome, engine, &job.output);
        match result {
            Ok(ref path) => {
                tracing::info!(
                    job_id = %job.id,
                    output = %path.display(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Conversion succeeded"
                );
            }
            Err(ref e) => {
                tracing::warn!(
                    job_id = %job.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Conversion failed"
                );
            }
        }
        result
    }
}

/// Map a subprocess outcome to the job's result.
fn classify(outcome: SubprocessOutcome, engine: &Path, expected: &Path) -> Result<PathBuf> {
    match outcome {
        SubprocessOutcome::Success { .. } => {
            // LibreOffice can exit 0 without writing anything.
            if expected.is_file() {
                Ok(expected.to_path_buf())
            } else {
                Err(Error::NoOutputProduced {
                    expected: expected.to_path_buf(),
                })
            }
        }
        SubprocessOutcome::NonZeroExit {
            code,
            stdout,
            stderr,
        } => {
            let output = if stderr.trim().is_empty() { stdout } else { stderr };
            Err(Error::EngineNonZeroExit {
                code,
                output: truncate(output.trim()),
            })
        }
        SubprocessOutcome::TimedOut { after } => Err(Error::EngineTimeout { timeout: after }),
        SubprocessOutcome::Crashed(e)
            if matches!(
                e.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            Err(Error::engine_unavailable(
                engine.display().to_string(),
                format!("failed to spawn: {e}"),
            ))
        }
        SubprocessOutcome::Crashed(e) => Err(Error::EngineCrashed {
            message: e.to_string(),
        }),
    }
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_DIAGNOSTIC_LEN {
        return s.to_string();
    }
    let mut end = MAX_DIAGNOSTIC_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
