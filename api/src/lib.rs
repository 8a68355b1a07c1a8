//! Beacon API Server
//!
//! This crate provides the HTTP side of Beacon: it accepts client telemetry
//! events, turns each one into a span, a counter increment and a log record,
//! and serves the counters for Prometheus to scrape.
//!
//! # Architecture
//!
//! The server is built on Axum and Tokio and runs two listeners that share one
//! [`AppState`]:
//! - the ingestion listener (`POST /send-telemetry`, `GET /health`)
//! - the metrics listener (`GET /metrics`, `GET /health`)
//!
//! Spans leave the request path through a bounded queue and are exported to an
//! OTLP/HTTP collector by a background [`OtlpExportWorker`].
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod export;
mod logging;
mod routes;
mod state;

pub use config::{Config, LogFormat};
pub use export::{span_export_pipeline, ExportConfig, OtlpExportWorker};
pub use logging::init_logging;
pub use routes::{Listener, TelemetryResponse};
pub use state::AppState;

use anyhow::Result;
use axum::Router;
use shared::metrics::CounterRegistry;
use shared::pipeline::{EventTranslator, Tracer, TracingLogSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

/// Extra time the export worker gets after its own request budget on shutdown.
const FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Runs the Beacon API server.
///
/// This function initializes the server with configuration from environment variables
/// and starts listening for incoming connections. It handles graceful shutdown on
/// SIGTERM/SIGINT signals.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The server fails to bind to the configured addresses
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    run_server_with_config(config).await
}

/// Runs the Beacon API server with the provided configuration.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - The counters cannot be registered
/// - Either listener fails to bind
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config) -> Result<()> {
    config.validate_config()?;
    let addr = config.socket_addr()?;
    let metrics_addr = config.metrics_socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        metrics_port = %config.metrics_port,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("<none>"),
        max_series_per_counter = ?config.max_series_per_counter,
        "Beacon API server starting"
    );

    let export_config = config.export_config();
    let flush_budget = export_config.timeout * 3 + FLUSH_GRACE;
    let (exporter, worker) = span_export_pipeline(export_config)?;
    let worker = tokio::spawn(worker.run());

    let registry =
        Arc::new(CounterRegistry::new().with_series_limit(config.max_series_per_counter));
    let translator = EventTranslator::new(
        registry,
        Arc::new(Tracer::new(Arc::new(exporter))),
        Arc::new(TracingLogSink::new()),
        config.translator_config(),
    )?;
    let state = AppState::new(Arc::new(translator));

    let listener = TcpListener::bind(addr).await?;
    let metrics_listener = TcpListener::bind(metrics_addr).await?;

    tracing::info!(%addr, %metrics_addr, "Listening for connections");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let ingest = axum::serve(listener, create_router(state.clone()))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let scrape = axum::serve(metrics_listener, create_metrics_router(state))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    // Both routers own the last state clones; once they are dropped the span
    // queue closes and the worker drains what is left.
    tokio::try_join!(async { ingest.await }, async { scrape.await })?;

    match tokio::time::timeout(flush_budget, worker).await {
        Ok(Ok(stats)) => tracing::info!(
            exported = stats.exported,
            dropped = stats.dropped,
            skipped = stats.skipped,
            "Span queue flushed"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "Span export worker failed"),
        Err(_) => tracing::warn!("Timed out flushing span queue"),
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the ingestion router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(Listener::Ingest))
        .merge(routes::telemetry_routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Creates the metrics scrape router.
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes(Listener::Metrics))
        .merge(routes::metrics_routes(state))
        .layer(TraceLayer::new_for_http())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    // An error means the sender is gone, which only happens after it fired.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
