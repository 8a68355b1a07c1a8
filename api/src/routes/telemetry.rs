//! Telemetry ingestion endpoint.
//!
//! Accepts one client event per request and acknowledges it unconditionally.
//! The body is read as raw bytes so that malformed JSON is translated as an
//! unclassified event instead of being rejected by the extractor. Bodies over
//! [`MAX_EVENT_BYTES`] are not buffered; they are acknowledged as an event with
//! no fields.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::models::Event;
use shared::pipeline::TranslationStatus;

/// Response body for telemetry ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct TelemetryResponse {
    /// Confirmation message.
    pub message: String,
}

/// Largest event body that is buffered and decoded.
pub const MAX_EVENT_BYTES: usize = 64 * 1024;

/// Creates the telemetry routes.
pub fn telemetry_routes(state: AppState) -> Router {
    Router::new()
        .route("/send-telemetry", post(send_telemetry))
        .layer(DefaultBodyLimit::max(MAX_EVENT_BYTES))
        .with_state(state)
}

async fn send_telemetry(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<TelemetryResponse> {
    let event = match body {
        Ok(bytes) => Event::from_json_slice(&bytes),
        Err(rejection) => {
            tracing::warn!(
                status = %rejection.status(),
                reason = %rejection.body_text(),
                "Event body unreadable, recording as unclassified"
            );
            Event::default()
        }
    };
    let result = state.translator().translate(&event);

    if result.status == TranslationStatus::Degraded {
        tracing::warn!(
            kind = %event.kind(),
            failures = ?result.failures,
            "Event acknowledged with degraded telemetry"
        );
    }

    Json(TelemetryResponse {
        message: result.response_message.to_string(),
    })
}
