//! Health check endpoint.
//!
//! Mounted on both listeners. The response names the listener that answered,
//! so a check against the wrong port is visible in the body.

use axum::{routing::get, Json, Router};
use serde::Serialize;

/// Which of the two listeners serves a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Listener {
    /// The ingestion listener (`POST /send-telemetry`).
    Ingest,
    /// The scrape listener (`GET /metrics`).
    Metrics,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" if reachable.
    pub status: &'static str,
    /// Service name.
    pub service: &'static str,
    /// Listener that answered.
    pub listener: Listener,
    /// Service version.
    pub version: &'static str,
}

/// Creates the health route for one listener.
pub fn health_routes(listener: Listener) -> Router {
    Router::new().route("/health", get(move || health_check(listener)))
}

async fn health_check(listener: Listener) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "beacon-api",
        listener,
        version: env!("CARGO_PKG_VERSION"),
    })
}
