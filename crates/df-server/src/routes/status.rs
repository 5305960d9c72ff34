//! Runtime status of the conversion service.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use df_convert::EngineInfo;

use crate::context::AppContext;

/// Status response for `/api/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub version: &'static str,
    pub format: String,
    pub timeout_ms: u64,
    pub max_file_size: u64,
    pub jobs: JobCounts,
    pub engine: EngineInfo,
}

/// Limiter occupancy.
#[derive(Debug, Serialize)]
pub struct JobCounts {
    pub capacity: usize,
    pub active: usize,
    pub waiting: usize,
}

/// GET /api/status
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    let limiter = ctx.conversions.limiter();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        format: ctx.conversions.format().to_string(),
        timeout_ms: ctx.config.conversion.timeout_ms,
        max_file_size: ctx.config.uploads.max_file_size,
        jobs: JobCounts {
            capacity: limiter.capacity(),
            active: limiter.active(),
            waiting: limiter.waiting(),
        },
        engine: (*ctx.engine).clone(),
    })
}
