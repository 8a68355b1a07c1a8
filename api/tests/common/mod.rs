//! Helpers shared by the integration test crates.

#![allow(dead_code)]

use api::{create_metrics_router, create_router, AppState};
use axum::body::Body;
use axum::extract::State;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use shared::otlp::{decode_request, ExportTraceServiceRequest, PROTOBUF_CONTENT_TYPE};
use shared::pipeline::{InMemoryLogSink, InMemorySpanExporter};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// Both routers over one state, plus the sinks the state writes to.
pub struct TestApp {
    pub state: AppState,
    pub spans: InMemorySpanExporter,
    pub logs: InMemoryLogSink,
}

impl TestApp {
    pub fn new() -> Self {
        let spans = InMemorySpanExporter::new();
        let logs = InMemoryLogSink::new();
        let state = AppState::with_in_memory_sinks(spans.clone(), logs.clone()).unwrap();
        Self { state, spans, logs }
    }

    pub fn ingest(&self) -> Router {
        create_router(self.state.clone())
    }

    pub fn scrape(&self) -> Router {
        create_metrics_router(self.state.clone())
    }
}

/// Helper to make a POST request with a raw body.
pub async fn post_raw(app: Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a POST request with JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, serde_json::to_string(&body).unwrap()).await
}

/// Helper to make a GET request returning the body as text.
pub async fn get_text(app: Router, uri: &str) -> (StatusCode, String) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    (status, String::from_utf8(body_bytes.to_vec()).unwrap())
}

/// Finds the value of a sample line such as `name{service="x"} 3`.
pub fn sample_value(exposition: &str, series: &str) -> Option<u64> {
    exposition
        .lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (head, value) = line.rsplit_once(' ')?;
            (head == series).then(|| value.parse().ok())?
        })
}

#[derive(Default)]
struct CollectorInner {
    responses: VecDeque<StatusCode>,
    received: Vec<ExportTraceServiceRequest>,
}

/// A local OTLP/HTTP trace collector bound to an ephemeral port.
///
/// Answers with the queued statuses in order, then 200.
#[derive(Clone, Default)]
pub struct Collector {
    inner: Arc<Mutex<CollectorInner>>,
}

impl Collector {
    /// Starts a collector and returns it with its base URL.
    pub async fn start(responses: impl IntoIterator<Item = StatusCode>) -> (Self, String) {
        let collector = Self::default();
        collector
            .inner
            .lock()
            .unwrap()
            .responses
            .extend(responses);

        let app = Router::new()
            .route("/v1/traces", post(collect))
            .with_state(collector.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (collector, format!("http://{addr}"))
    }

    /// Requests received so far, including those answered with an error.
    pub fn received(&self) -> Vec<ExportTraceServiceRequest> {
        self.inner.lock().unwrap().received.clone()
    }
}

async fn collect(
    State(collector): State<Collector>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let is_protobuf = headers
        .get(header::CONTENT_TYPE)
        .is_some_and(|ct| ct == PROTOBUF_CONTENT_TYPE);
    let Ok(request) = decode_request(&body) else {
        return StatusCode::BAD_REQUEST;
    };
    if !is_protobuf {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }

    let mut inner = collector.inner.lock().unwrap();
    inner.received.push(request);
    inner.responses.pop_front().unwrap_or(StatusCode::OK)
}
