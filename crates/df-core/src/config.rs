//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON and carries the
//! server, upload and conversion sections. Every section defaults sensibly so
//! a completely empty `{}` file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::Error;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub uploads: UploadConfig,
    pub conversion: ConversionConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("config parse error: {e}")))
    }

    /// Read and parse the config file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.server.port == 0 {
            warnings.push("server.port is 0; a random port will be assigned".into());
        }

        if self.uploads.max_file_size == 0 {
            warnings.push("uploads.max_file_size is 0; every upload will be rejected".into());
        }

        if self.conversion.concurrency == 0 {
            warnings.push("conversion.concurrency is 0; it will be clamped to 1".into());
        }

        if self.conversion.timeout_ms == 0 {
            warnings.push("conversion.timeout_ms is 0; every conversion will time out".into());
        }

        if self.conversion.format.trim().is_empty() {
            warnings.push(format!(
                "conversion.format is empty; '{DEFAULT_FORMAT}' will be used"
            ));
        }

        if let Some(ref p) = self.conversion.engine_path {
            if !p.exists() {
                warnings.push(format!(
                    "conversion.engine_path {} does not exist; falling back to PATH",
                    p.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

/// Upload storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory where uploads are stored while a job runs.
    pub dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("uploads"),
            max_file_size: 25 * 1024 * 1024,
        }
    }
}

impl UploadConfig {
    /// Directory the engine writes converted documents into.
    pub fn output_dir(&self) -> PathBuf {
        self.dir.join("out")
    }
}

/// Default target format.
pub const DEFAULT_FORMAT: &str = "pdf";

/// Conversion engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Number of conversions allowed to run at once.
    pub concurrency: usize,
    /// Hard limit for one engine run, in milliseconds.
    pub timeout_ms: u64,
    /// Target format passed to `--convert-to`.
    pub format: String,
    /// Explicit engine executable; `None` searches `PATH`.
    pub engine_path: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            timeout_ms: 180_000,
            format: DEFAULT_FORMAT.into(),
            engine_path: None,
        }
    }
}

impl ConversionConfig {
    /// The conversion deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Target format, lowercased, with a leading dot stripped.
    pub fn target_format(&self) -> String {
        let f = self.format.trim().trim_start_matches('.').to_ascii_lowercase();
        if f.is_empty() {
            DEFAULT_FORMAT.to_string()
        } else {
            f
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_valid() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.uploads.max_file_size, 26_214_400);
        assert_eq!(config.conversion.concurrency, 1);
        assert_eq!(config.conversion.timeout_ms, 180_000);
        assert_eq!(config.conversion.format, "pdf");
        assert!(config.conversion.engine_path.is_none());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = Config::from_json(
            r#"{"conversion": {"concurrency": 3}, "uploads": {"dir": "/srv/uploads"}}"#,
        )
        .unwrap();
        assert_eq!(config.conversion.concurrency, 3);
        assert_eq!(config.conversion.timeout_ms, 180_000);
        assert_eq!(config.uploads.dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.uploads.output_dir(), PathBuf::from("/srv/uploads/out"));
    }

    #[test]
    fn invalid_json_is_validation_error() {
        let err = Config::from_json("{not json").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(Some(&dir.path().join("missing.json")));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docforge.json");
        std::fs::write(&path, r#"{"server": {"port": 9000}}"#).unwrap();
        let config = Config::load_or_default(Some(&path));
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn strict_load_surfaces_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Config::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, Error::Io { .. }));

        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();
        let broken = Config::load(&path).unwrap_err();
        assert!(matches!(broken, Error::Validation(_)));
    }

    #[test]
    fn timeout_converts_to_duration() {
        let conv = ConversionConfig {
            timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(conv.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn target_format_is_normalized() {
        let mut conv = ConversionConfig::default();
        conv.format = ".PDF".into();
        assert_eq!(conv.target_format(), "pdf");
        conv.format = "  ".into();
        assert_eq!(conv.target_format(), "pdf");
    }

    #[test]
    fn validate_default_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_flags_zero_values() {
        let mut config = Config::default();
        config.conversion.concurrency = 0;
        config.conversion.timeout_ms = 0;
        config.conversion.engine_path = Some(PathBuf::from("/nonexistent/soffice"));
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("clamped to 1")));
    }
}
