//! Application context shared across route handlers.
//!
//! [`AppContext`] is handed to every handler via Axum state. It owns the
//! single [`ConversionService`] for the process, so all requests share one
//! job limiter.

use std::path::PathBuf;
use std::sync::Arc;

use df_convert::{ConversionEngine, ConversionExecutor, ConversionService, EngineInfo, JobLimiter};
use df_core::config::Config;

/// Central application context.
#[derive(Clone)]
pub struct AppContext {
    /// Configuration snapshot taken at startup.
    pub config: Arc<Config>,
    /// Conversion pipeline; clones share the limiter.
    pub conversions: ConversionService,
    /// Engine availability as reported by `/api/status`.
    pub engine: Arc<EngineInfo>,
}

impl AppContext {
    /// Build the context from `config` and a discovered `engine`.
    pub fn new(config: Config, engine: ConversionEngine) -> Self {
        let limiter = JobLimiter::new(config.conversion.concurrency);
        let info = engine.describe();
        let executor = ConversionExecutor::new(engine, config.conversion.timeout());
        let conversions =
            ConversionService::new(limiter, executor, config.conversion.target_format());

        Self {
            config: Arc::new(config),
            conversions,
            engine: Arc::new(info),
        }
    }

    /// Directory where stored uploads land.
    pub fn uploads_dir(&self) -> PathBuf {
        self.config.uploads.dir.clone()
    }

    /// Directory the engine writes into.
    pub fn output_dir(&self) -> PathBuf {
        self.config.uploads.output_dir()
    }
}
