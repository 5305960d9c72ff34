//! End-to-end conversion of one stored upload.
//!
//! [`ConversionService::convert`] creates the [`Job`], takes ownership of its
//! files, waits for a limiter slot, runs the executor and classifies the
//! outcome. On success the caller receives a [`ConvertedDocument`] that keeps
//! the files alive until it is dropped; on failure the files are already gone
//! when the error is returned.

use std::path::{Path, PathBuf};

use df_core::{Error, Job, JobState, Result};

use crate::artifacts::JobArtifacts;
use crate::executor::ConversionExecutor;
use crate::limiter::JobLimiter;

/// A stored upload handed to the core.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// Absolute path of the stored upload. Ownership passes to the job.
    pub input: PathBuf,
    /// File name as sent by the client.
    pub original_name: String,
    /// Directory the engine writes into.
    pub output_dir: PathBuf,
}

/// Conversion pipeline shared by all requests.
///
/// Cheap to clone; clones share the same limiter.
#[derive(Debug, Clone)]
pub struct ConversionService {
    limiter: JobLimiter,
    executor: ConversionExecutor,
    format: String,
}

impl ConversionService {
    pub fn new(limiter: JobLimiter, executor: ConversionExecutor, format: impl Into<String>) -> Self {
        Self {
            limiter,
            executor,
            format: format.into(),
        }
    }

    pub fn limiter(&self) -> &JobLimiter {
        &self.limiter
    }

    pub fn executor(&self) -> &ConversionExecutor {
        &self.executor
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    /// Convert one stored upload.
    ///
    /// Waits (without bound) for a limiter slot, then runs the engine under
    /// the executor's deadline, which starts at admission. The slot is
    /// released as soon as the engine is done.
    pub async fn convert(&self, request: ConversionRequest) -> Result<ConvertedDocument> {
        let mut job = Job::new(
            request.input,
            &request.original_name,
            &request.output_dir,
            &self.format,
        );
        let mut artifacts = JobArtifacts::new(&job);

        tracing::info!(
            job_id = %job.id,
            input = %job.input.display(),
            original_name = %request.original_name,
            "Job created"
        );

        // Fail fast instead of queueing behind other jobs for nothing.
        if let Err(e) = self.executor.engine().require() {
            return Err(fail(&mut job, &mut artifacts, e));
        }

        if self.limiter.active() >= self.limiter.capacity() {
            tracing::info!(
                job_id = %job.id,
                waiting = self.limiter.waiting() + 1,
                "All conversion slots busy; job queued"
            );
        }

        let result = {
            let _slot = self.limiter.acquire().await?;
            let queued = job.admit(self.executor.timeout())?;
            tracing::info!(
                job_id = %job.id,
                queued_ms = queued.as_millis() as u64,
                "Job admitted"
            );
            job.transition(JobState::Converting)?;
            self.executor.execute(&job).await
        };

        match result {
            Ok(_) => {
                job.transition(JobState::Succeeded)?;
                Ok(ConvertedDocument {
                    job,
                    artifacts,
                    delivered: false,
                })
            }
            Err(e) => Err(fail(&mut job, &mut artifacts, e)),
        }
    }
}

/// Record the failure, delete the job's files and hand the error back.
fn fail(job: &mut Job, artifacts: &mut JobArtifacts, err: Error) -> Error {
    let state = match err {
        Error::EngineTimeout { .. } => JobState::TimedOut,
        _ => JobState::Failed,
    };
    if let Err(e) = job.transition(state) {
        tracing::warn!("{e}");
    }
    artifacts.cleanup();
    if let Err(e) = job.transition(JobState::Cleaned) {
        tracing::warn!("{e}");
    }
    err
}

/// A successfully converted document, ready for delivery.
///
/// Holds the job's files; they are deleted when this value is dropped, so
/// keep it alive until the output has been fully read.
#[derive(Debug)]
pub struct ConvertedDocument {
    job: Job,
    artifacts: JobArtifacts,
    delivered: bool,
}

impl ConvertedDocument {
    pub fn job(&self) -> &Job {
        &self.job
    }

    /// Path of the converted file.
    pub fn path(&self) -> &Path {
        self.artifacts.output()
    }

    /// File name suggested to the caller.
    pub fn download_name(&self) -> &str {
        &self.job.download_name
    }

    /// MIME type for the target format.
    pub fn content_type(&self) -> String {
        mime_guess::from_ext(&self.job.format)
            .first_or_octet_stream()
            .to_string()
    }

    /// Record that the output reached the caller.
    pub fn mark_delivered(&mut self) {
        if self.delivered {
            return;
        }
        match self.job.transition(JobState::Delivered) {
            Ok(()) => self.delivered = true,
            Err(e) => tracing::warn!("{e}"),
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }
}

impl Drop for ConvertedDocument {
    fn drop(&mut self) {
        self.artifacts.cleanup();
        let _ = self.job.transition(JobState::Cleaned);
        tracing::info!(
            job_id = %self.job.id,
            delivered = self.delivered,
            "Job finished"
        );
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::ConversionEngine;
    use crate::test_support::{stub_engine, touch, FAILS, HANGS, NO_OUTPUT, WRITES_OUTPUT};
    use std::time::{Duration, Instant};

    struct Fixture {
        dir: tempfile::TempDir,
        service: ConversionService,
    }

    impl Fixture {
        fn new(body: &str, capacity: usize, timeout: Duration) -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("out")).unwrap();
            let engine = stub_engine(dir.path(), body);
            let executor = ConversionExecutor::new(ConversionEngine::at(engine), timeout);
            let service = ConversionService::new(JobLimiter::new(capacity), executor, "pdf");
            Self { dir, service }
        }

        fn request(&self, stored_name: &str, original_name: &str) -> ConversionRequest {
            ConversionRequest {
                input: touch(self.dir.path(), stored_name),
                original_name: original_name.into(),
                output_dir: self.dir.path().join("out"),
            }
        }
    }

    #[tokio::test]
    async fn success_keeps_files_until_dropped() {
        let fx = Fixture::new(WRITES_OUTPUT, 1, Duration::from_secs(10));
        let request = fx.request("1-a.docx", "Budget 2024.xlsx");
        let input = request.input.clone();

        let mut doc = fx.service.convert(request).await.unwrap();
        assert_eq!(doc.job().state(), JobState::Succeeded);
        assert_eq!(doc.download_name(), "Budget 2024.pdf");
        assert_eq!(doc.content_type(), "application/pdf");
        assert!(doc.path().exists());
        assert!(input.exists());

        doc.mark_delivered();
        assert!(doc.is_delivered());
        let output = doc.path().to_path_buf();
        drop(doc);

        assert!(!input.exists());
        assert!(!output.exists());
        assert_eq!(fx.service.limiter().active(), 0);
    }

    #[tokio::test]
    async fn no_output_fails_and_cleans() {
        let fx = Fixture::new(NO_OUTPUT, 1, Duration::from_secs(10));
        let request = fx.request("2-a.docx", "a.docx");
        let input = request.input.clone();

        let err = fx.service.convert(request).await.unwrap_err();
        assert!(matches!(err, Error::NoOutputProduced { .. }));
        assert!(!input.exists());
        assert!(!fx.dir.path().join("out/2-a.pdf").exists());
    }

    #[tokio::test]
    async fn engine_failure_cleans() {
        let fx = Fixture::new(FAILS, 1, Duration::from_secs(10));
        let request = fx.request("3-a.docx", "a.docx");
        let input = request.input.clone();

        let err = fx.service.convert(request).await.unwrap_err();
        assert!(matches!(err, Error::EngineNonZeroExit { code: Some(81), .. }));
        assert!(!input.exists());
        assert_eq!(fx.service.limiter().active(), 0);
    }

    #[tokio::test]
    async fn timeout_removes_partial_output() {
        let fx = Fixture::new(HANGS, 1, Duration::from_millis(100));
        let request = fx.request("4-a.docx", "a.docx");
        let input = request.input.clone();

        let started = Instant::now();
        let err = fx.service.convert(request).await.unwrap_err();
        assert!(matches!(err, Error::EngineTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!input.exists());
        assert!(!fx.dir.path().join("out/4-a.pdf").exists());
        assert_eq!(fx.service.limiter().active(), 0);
    }

    #[tokio::test]
    async fn missing_engine_cleans_without_taking_a_slot() {
        let dir = tempfile::tempdir().unwrap();
        let executor =
            ConversionExecutor::new(ConversionEngine::missing(), Duration::from_secs(1));
        let service = ConversionService::new(JobLimiter::new(1), executor, "pdf");
        let _held = service.limiter().acquire().await.unwrap();

        let request = ConversionRequest {
            input: touch(dir.path(), "5-a.docx"),
            original_name: "a.docx".into(),
            output_dir: dir.path().to_path_buf(),
        };
        let input = request.input.clone();

        // Returns even though the only slot is held.
        let err = service.convert(request).await.unwrap_err();
        assert!(matches!(err, Error::EngineUnavailable { .. }));
        assert!(!input.exists());
    }

    #[tokio::test]
    async fn second_job_waits_for_first() {
        // Each run logs its start and end, then writes the output.
        let body = r#"echo "start $name" >> "$outdir/events.log"
sleep 0.3
echo "end $name" >> "$outdir/events.log"
echo ok > "$out""#;
        let fx = Fixture::new(body, 1, Duration::from_secs(10));

        let a = fx.request("a.docx", "a.docx");
        let b = fx.request("b.docx", "b.docx");

        let service = fx.service.clone();
        let first = tokio::spawn(async move { service.convert(a).await.map(drop) });
        let l = fx.service.limiter().clone();
        while l.active() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let service = fx.service.clone();
        let second = tokio::spawn(async move { service.convert(b).await.map(drop) });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let log = std::fs::read_to_string(fx.dir.path().join("out/events.log")).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            ["start a.docx", "end a.docx", "start b.docx", "end b.docx"]
        );
        assert_eq!(fx.service.limiter().active(), 0);
    }

    #[tokio::test]
    async fn queued_job_deadline_starts_at_admission() {
        // Each run takes ~300ms; the deadline is 500ms. The third job waits
        // ~600ms in the queue and must still succeed.
        let body = r#"sleep 0.3
echo ok > "$out""#;
        let fx = Fixture::new(body, 1, Duration::from_millis(500));

        let mut handles = Vec::new();
        for i in 0..3 {
            let service = fx.service.clone();
            let request = fx.request(&format!("q{i}.docx"), "q.docx");
            handles.push(tokio::spawn(async move {
                service.convert(request).await.map(drop)
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
    }
}
