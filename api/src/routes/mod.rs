//! API route definitions.
//!
//! Ingestion and health routes go on the main listener; the scrape route and
//! a second health route go on the metrics listener.

mod health;
mod metrics;
mod telemetry;

pub use health::{health_routes, Listener};
pub use metrics::metrics_routes;
pub use telemetry::{telemetry_routes, TelemetryResponse};
