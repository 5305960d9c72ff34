//! Transient file lifecycle for a conversion job.
//!
//! A [`JobArtifacts`] guard owns the job's stored upload and its expected
//! output. Both are deleted when the guard is dropped, whichever way the job
//! ends. Deletion is best-effort: failures are logged, never returned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use df_core::{Job, JobId};

/// Scoped ownership of a job's input and output files.
///
/// # Example
///
/// ```no_run
/// use df_convert::JobArtifacts;
/// use df_core::Job;
/// use std::path::{Path, PathBuf};
///
/// let job = Job::new(
///     PathBuf::from("/tmp/uploads/1700000000-abc.docx"),
///     "report.docx",
///     Path::new("/tmp/uploads/out"),
///     "pdf",
/// );
/// let artifacts = JobArtifacts::new(&job);
/// // ... run the conversion, stream artifacts.output() back ...
/// drop(artifacts); // both files are gone now
/// ```
#[derive(Debug)]
pub struct JobArtifacts {
    job_id: JobId,
    input: PathBuf,
    output: PathBuf,
    cleaned: bool,
}

impl JobArtifacts {
    /// Take ownership of the files belonging to `job`.
    pub fn new(job: &Job) -> Self {
        Self {
            job_id: job.id,
            input: job.input.clone(),
            output: job.output.clone(),
            cleaned: false,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn is_cleaned(&self) -> bool {
        self.cleaned
    }

    /// Delete the input and output files now. Later calls do nothing.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;

        remove_best_effort(self.job_id, &self.input, "input");
        if self.output != self.input {
            remove_best_effort(self.job_id, &self.output, "output");
        }
        tracing::debug!(job_id = %self.job_id, "Job artifacts cleaned");
    }
}

impl Drop for JobArtifacts {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn remove_best_effort(job_id: JobId, path: &Path, kind: &str) {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::trace!(job_id = %job_id, path = %path.display(), "Removed {kind} file");
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                path = %path.display(),
                "Failed to remove {kind} file: {e}"
            );
        }
    }
}
