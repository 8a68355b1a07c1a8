//! Prometheus scrape endpoint.

use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use shared::metrics::{render, CONTENT_TYPE};

/// Creates the metrics routes.
pub fn metrics_routes(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(scrape_metrics))
        .with_state(state)
}

/// Renders every registered counter in the text exposition format.
///
/// Render failures surface as 500 with a plain-text body.
async fn scrape_metrics(State(state): State<AppState>) -> Response {
    match render(state.registry()) {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                format!("failed to render metrics: {e}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use shared::metrics::LabelSet;
    use shared::models::Event;
    use shared::pipeline::{InMemoryLogSink, InMemorySpanExporter};
    use tower::ServiceExt;

    fn state() -> AppState {
        AppState::with_in_memory_sinks(InMemorySpanExporter::new(), InMemoryLogSink::new())
            .unwrap()
    }

    async fn scrape(app: Router) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_scrape_fresh_registry() {
        let (status, content_type, body) = scrape(metrics_routes(state())).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(CONTENT_TYPE));
        assert!(body.contains("# TYPE add_button_clicks_total counter"));
        assert!(body.contains("add_button_clicks_total{service=\"ReactNativeApp\"} 0"));
        assert!(body.contains("button_clicks{service=\"ReactNativeApp\"} 0"));
    }

    #[tokio::test]
    async fn test_scrape_reflects_ingested_events() {
        let state = state();
        state.translator().translate(&Event::new("delete_button_click"));
        state
            .translator()
            .translate(&Event::new("delete_button_click").with_service_name("WebApp"));

        let (_, _, body) = scrape(metrics_routes(state)).await;

        assert!(body.contains("delete_button_clicks_total{service=\"ReactNativeApp\"} 1"));
        assert!(body.contains("delete_button_clicks_total{service=\"WebApp\"} 1"));
    }

    #[tokio::test]
    async fn test_scrape_includes_counters_registered_elsewhere() {
        let state = state();
        let handle = state
            .registry()
            .register("sync_retries_total", "Counts sync retries")
            .unwrap();
        state
            .registry()
            .increment(handle, &LabelSet::service("ReactNativeApp"), 3)
            .unwrap();

        let (status, _, body) = scrape(metrics_routes(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# HELP sync_retries_total Counts sync retries"));
        assert!(body.contains("sync_retries_total{service=\"ReactNativeApp\"} 3"));
    }

    #[tokio::test]
    async fn test_scrape_invalid_label_name_returns_500() {
        let state = state();
        let handle = state
            .registry()
            .register("sync_retries_total", "Counts sync retries")
            .unwrap();
        state
            .registry()
            .seed(handle, &LabelSet::new().with("bad-label", "x"))
            .unwrap();

        let (status, content_type, body) = scrape(metrics_routes(state)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(content_type.as_deref(), Some("text/plain; charset=utf-8"));
        assert!(!body.is_empty());
        assert!(body.contains("bad-label"));
    }
}
