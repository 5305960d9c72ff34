//! The conversion job record and its lifecycle state machine.
//!
//! ```text
//! Created -> Admitted -> Converting -> {Succeeded | Failed | TimedOut} -> Delivered -> Cleaned
//! ```
//!
//! Every non-terminal state may also jump straight to `Cleaned`, which is the
//! only terminal state.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Created,
    Admitted,
    Converting,
    Succeeded,
    Failed,
    TimedOut,
    Delivered,
    Cleaned,
}

impl JobState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;

        if self == Cleaned {
            return false;
        }
        if next == Cleaned {
            return true;
        }

        matches!(
            (self, next),
            (Created, Admitted)
                | (Created, Failed)
                | (Admitted, Converting)
                | (Converting, Succeeded)
                | (Converting, Failed)
                | (Converting, TimedOut)
                | (Succeeded, Delivered)
                | (Failed, Delivered)
                | (TimedOut, Delivered)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Created => "created",
            JobState::Admitted => "admitted",
            JobState::Converting => "converting",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
            JobState::Delivered => "delivered",
            JobState::Cleaned => "cleaned",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document-conversion request from admission to cleanup.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Stored upload. Owned by the job until cleanup.
    pub input: PathBuf,
    /// Where the engine is expected to write its result.
    pub output: PathBuf,
    /// Output directory handed to the engine.
    pub output_dir: PathBuf,
    /// Target format (file extension without the dot).
    pub format: String,
    /// File name suggested to the caller for the converted document.
    pub download_name: String,
    /// When the upload was handed to the core; queue time is measured from here.
    pub submitted_at: DateTime<Utc>,
    /// Set when the job is admitted past the limiter.
    pub deadline: Option<DateTime<Utc>>,
    state: JobState,
}

impl Job {
    /// Create a job for a stored upload.
    ///
    /// `original_name` is the client-supplied file name and only feeds the
    /// download name. The expected output keeps the stored input's stem.
    pub fn new(input: PathBuf, original_name: &str, output_dir: &Path, format: &str) -> Self {
        let output = expected_output(&input, output_dir, format);
        let download_name = download_name(original_name, format);

        Self {
            id: JobId::new(),
            input,
            output,
            output_dir: output_dir.to_path_buf(),
            format: format.to_string(),
            download_name,
            submitted_at: Utc::now(),
            deadline: None,
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: JobState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(Error::Internal(format!(
                "job {}: invalid transition {} -> {}",
                self.id, self.state, next
            )));
        }
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        Ok(())
    }

    /// Mark the job as admitted and start its deadline clock.
    ///
    /// Returns how long the job waited between submission and admission.
    pub fn admit(&mut self, timeout: Duration) -> Result<Duration> {
        self.transition(JobState::Admitted)?;
        let now = Utc::now();
        self.deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|t| now.checked_add_signed(t));
        Ok((now - self.submitted_at).to_std().unwrap_or_default())
    }
}

/// `<output_dir>/<input stem>.<format>`
pub fn expected_output(input: &Path, output_dir: &Path, format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}.{format}"))
}

/// `<original stem>.<format>`, falling back to `document` for empty names.
pub fn download_name(original_name: &str, format: &str) -> String {
    // Browsers on Windows may send a full path.
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let stem = Path::new(base)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}.{format}")
}
