//! Conversion engine discovery.
//!
//! [`ConversionEngine`] locates the LibreOffice executable, either from an
//! explicit configured path or by searching `PATH`, and reports its version
//! for diagnostics.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use df_core::config::ConversionConfig;
use df_core::{Error, Result};

use crate::command::{EngineCommand, SubprocessOutcome};

/// Executable names tried on `PATH`, in order.
const ENGINE_CANDIDATES: &[&str] = &["soffice", "libreoffice"];

/// Deadline for `<engine> --version`.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// Availability information, returned by [`ConversionEngine::check`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Engine name.
    pub name: String,
    /// Whether the engine was found.
    pub available: bool,
    /// Version string (first line of `--version` output), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// The resolved conversion engine, if any.
#[derive(Debug, Clone)]
pub struct ConversionEngine {
    path: Option<PathBuf>,
}

impl ConversionEngine {
    /// Discover the engine.
    ///
    /// If the config supplies an `engine_path` **and** that path exists, it
    /// is used directly. Otherwise [`which::which`] is tried for each known
    /// executable name. A missing engine is not an error here; it surfaces
    /// per job through [`require`](Self::require).
    pub fn discover(config: &ConversionConfig) -> Self {
        let custom = config.engine_path.as_deref().filter(|p| p.exists());
        if let (Some(configured), None) = (config.engine_path.as_deref(), custom) {
            tracing::warn!(
                "Configured engine path {} does not exist; searching PATH",
                configured.display()
            );
        }

        let path = custom
            .map(Path::to_path_buf)
            .or_else(|| ENGINE_CANDIDATES.iter().find_map(|n| which::which(n).ok()));

        Self { path }
    }

    /// Use `path` as the engine without checking that it exists.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// An engine that was not found.
    pub fn missing() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.path.is_some()
    }

    /// Return the engine path, or [`Error::EngineUnavailable`] if discovery
    /// found nothing.
    pub fn require(&self) -> Result<&Path> {
        self.path.as_deref().ok_or_else(|| {
            Error::engine_unavailable(
                ENGINE_CANDIDATES[0],
                format!(
                    "none of {} found; is LibreOffice installed and in PATH?",
                    ENGINE_CANDIDATES.join(", ")
                ),
            )
        })
    }

    /// Report availability without running the engine.
    pub fn describe(&self) -> EngineInfo {
        match self.path {
            Some(ref path) => EngineInfo {
                name: engine_name(path),
                available: true,
                version: None,
                path: Some(path.clone()),
            },
            None => EngineInfo {
                name: ENGINE_CANDIDATES[0].to_string(),
                available: false,
                version: None,
                path: None,
            },
        }
    }

    /// Report availability and version.
    ///
    /// Runs `<engine> --version`, killed after a few seconds if it hangs
    /// (an unresponsive profile lock, for instance). The version is then
    /// left unknown.
    pub async fn check(&self) -> EngineInfo {
        self.check_with_timeout(VERSION_TIMEOUT).await
    }

    /// [`check`](Self::check) with an explicit deadline for the version run.
    pub async fn check_with_timeout(&self, timeout: Duration) -> EngineInfo {
        let mut info = self.describe();
        if let Some(path) = self.path.as_deref() {
            info.version = detect_version(path, timeout).await;
        }
        info
    }
}

fn engine_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Run `<engine> --version` and return the first line of stdout.
async fn detect_version(path: &Path, timeout: Duration) -> Option<String> {
    let mut cmd = EngineCommand::new(path.to_path_buf());
    cmd.arg("--version").timeout(timeout);

    let stdout = match cmd.run().await {
        SubprocessOutcome::Success { stdout, .. } => stdout,
        SubprocessOutcome::TimedOut { after } => {
            tracing::warn!(engine = %path.display(), ?after, "Engine version check timed out");
            return None;
        }
        other => {
            tracing::debug!(engine = %path.display(), "Engine version check failed: {other:?}");
            return None;
        }
    };

    stdout
        .lines()
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
