//! Unified error type for docforge.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`]
//! and a stable caller-facing message via [`Error::public_message`].

use std::path::PathBuf;
use std::time::Duration;

/// Unified error type covering all failure modes of a conversion job.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request carried no uploaded file.
    #[error("No input file provided")]
    NoInputProvided,

    /// Request data failed validation (malformed multipart body, etc.).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The upload exceeded the configured size limit.
    #[error("Upload exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes.
        limit: u64,
    },

    /// The conversion engine cannot be invoked at all.
    #[error("Engine unavailable [{engine}]: {message}")]
    EngineUnavailable {
        /// Engine name or path that was tried.
        engine: String,
        /// Human-readable error description.
        message: String,
    },

    /// The engine ran but exited with a non-zero status.
    #[error("Engine exited with {}: {output}", exit_code_display(.code))]
    EngineNonZeroExit {
        /// Exit code, or `None` when the process was terminated by a signal.
        code: Option<i32>,
        /// Captured stderr (or stdout when stderr is empty), trimmed.
        output: String,
    },

    /// Waiting on the engine failed after it was spawned.
    #[error("Engine crashed: {message}")]
    EngineCrashed {
        /// Underlying OS error.
        message: String,
    },

    /// The engine exceeded the conversion deadline and was killed.
    #[error("Engine timed out after {timeout:?}")]
    EngineTimeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The engine exited successfully but the output file is missing.
    #[error("No output produced at {}", .expected.display())]
    NoOutputProduced {
        /// Where the output file was expected.
        expected: PathBuf,
    },

    /// Streaming the result back to the caller failed.
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NoInputProvided => 400,
            Error::Validation(_) => 400,
            Error::PayloadTooLarge { .. } => 413,
            Error::EngineUnavailable { .. } => 500,
            Error::EngineNonZeroExit { .. } => 500,
            Error::EngineCrashed { .. } => 500,
            Error::EngineTimeout { .. } => 500,
            Error::NoOutputProduced { .. } => 500,
            Error::Delivery(_) => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NoInputProvided => "no_input",
            Error::Validation(_) => "validation_error",
            Error::PayloadTooLarge { .. } => "payload_too_large",
            Error::EngineUnavailable { .. } => "engine_unavailable",
            Error::EngineNonZeroExit { .. } => "engine_failed",
            Error::EngineCrashed { .. } => "engine_crashed",
            Error::EngineTimeout { .. } => "engine_timeout",
            Error::NoOutputProduced { .. } => "no_output",
            Error::Delivery(_) => "delivery_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Stable message shown to callers.
    ///
    /// Engine diagnostics and filesystem paths stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::NoInputProvided => "No file was uploaded.".to_string(),
            Error::Validation(msg) => format!("Invalid upload: {msg}"),
            Error::PayloadTooLarge { limit } => {
                format!("The uploaded file exceeds the limit of {limit} bytes.")
            }
            Error::EngineUnavailable { .. } => "The conversion engine is not available.".to_string(),
            Error::EngineTimeout { .. } => "The conversion timed out.".to_string(),
            Error::EngineNonZeroExit { .. }
            | Error::EngineCrashed { .. }
            | Error::NoOutputProduced { .. } => "The conversion failed.".to_string(),
            Error::Delivery(_) | Error::Io { .. } | Error::Internal(_) => {
                "Internal server error.".to_string()
            }
        }
    }

    /// Whether this error represents a failed conversion attempt (as opposed
    /// to a caller error or infrastructure failure).
    pub fn is_conversion_failure(&self) -> bool {
        matches!(
            self,
            Error::EngineNonZeroExit { .. }
                | Error::EngineCrashed { .. }
                | Error::EngineTimeout { .. }
                | Error::NoOutputProduced { .. }
        )
    }

    /// Convenience constructor for [`Error::EngineUnavailable`].
    pub fn engine_unavailable(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Error::EngineUnavailable {
            engine: engine.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
