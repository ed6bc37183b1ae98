//! Ridgeline Server - REST API for fingerprint enrollment and identification
//!
//! Endpoints:
//! - POST /upload - Enroll a fingerprint sample (multipart)
//! - POST /validatefingerprint - Identify a fingerprint (JSON)
//! - GET /health, GET /ready - Monitoring
//! - GET /docs - Swagger UI

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ridgeline_server::{build_state, create_router, Config};

const DEFAULT_LOG_FILTER: &str = "ridgeline_server=info,ridgeline_core=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .init();

    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    }

    let config = Config::from_env();
    let addr = config.socket_addr();

    tracing::info!(
        extract = %config.engine.extract,
        compare = %config.engine.compare,
        engine_timeout_secs = config.engine.timeout.as_secs(),
        feature_mode = config.pipeline.feature_mode.as_str(),
        threshold = config.pipeline.threshold.value(),
        "Feature engine configured"
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.body_limit_mb
    );

    let state = build_state(config)
        .await
        .context("failed to open the sample store")?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Ridgeline server listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Shutdown signal handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
