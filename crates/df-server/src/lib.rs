//! df-server: HTTP front end for the conversion core.
//!
//! This crate wires the df-convert pipeline into an Axum application:
//!
//! - `POST /convert` stores a multipart upload, runs it through the
//!   [`ConversionService`](df_convert::ConversionService) and streams the
//!   result back, deleting the job's files once the response body is done
//! - `GET /health` and `GET /api/status` for liveness checks and diagnostics
//! - Directory bootstrap and graceful shutdown via signal handling

pub mod context;
pub mod delivery;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod upload;

use std::net::SocketAddr;
use std::sync::Arc;

use df_convert::ConversionEngine;
use df_core::config::Config;

use crate::context::AppContext;

/// Start the docforge server.
///
/// Creates the upload directories, discovers the engine, builds the
/// [`AppContext`] and serves until a shutdown signal is received.
pub async fn start(config: Config) -> df_core::Result<()> {
    // Validate configuration.
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    prepare_dirs(&config)?;

    // Discover the conversion engine.
    let engine = ConversionEngine::discover(&config.conversion);
    let info = engine.check().await;
    if info.available {
        tracing::info!(
            "Engine found: {} ({})",
            info.path.as_deref().map(|p| p.display().to_string()).unwrap_or_default(),
            info.version.as_deref().unwrap_or("unknown version")
        );
    } else {
        tracing::warn!("Engine not found; conversions will fail until LibreOffice is installed");
    }

    let mut ctx = AppContext::new(config.clone(), engine);
    ctx.engine = Arc::new(info);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| df_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| df_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Conversion service listening on {addr}");
    tracing::info!(
        "Uploads in {} | Concurrency: {} | Timeout: {}ms",
        config.uploads.dir.display(),
        config.conversion.concurrency.max(1),
        config.conversion.timeout_ms
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Create the upload and output directories if they are missing.
pub fn prepare_dirs(config: &Config) -> df_core::Result<()> {
    for dir in [config.uploads.dir.clone(), config.uploads.output_dir()] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
            tracing::info!("Created directory {}", dir.display());
        }
    }
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
