//! OTLP/HTTP protobuf trace exporter with batching and retry.

use reqwest::Client;
use shared::models::Span;
use shared::otlp::conversions::spans_to_export_request;
use shared::otlp::{encode_request, PROTOBUF_CONTENT_TYPE, TRACES_PATH};
use shared::pipeline::{EmitError, SpanExporter};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(50);

/// Span export settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    /// Collector base URL; spans are discarded when unset.
    pub endpoint: Option<String>,
    /// `service.name` resource attribute.
    pub service_name: String,
    /// Capacity of the span queue.
    pub queue_size: usize,
    /// Maximum spans per request.
    pub batch_size: usize,
    /// How long to wait for a batch to fill.
    pub interval: Duration,
    /// Timeout of one HTTP request.
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            service_name: "beacon".to_string(),
            queue_size: 2048,
            batch_size: 512,
            interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Error during export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// HTTP request failed.
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Collector returned an error status.
    #[error("collector returned {status}: {body}")]
    Status {
        /// HTTP status code returned by the collector.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// Counters describing what a worker did over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    /// Spans accepted by the collector.
    pub exported: u64,
    /// Spans dropped after failed export attempts.
    pub dropped: u64,
    /// Spans discarded because no endpoint is configured.
    pub skipped: u64,
    /// Export requests attempted, including retries.
    pub requests: u64,
}

/// [`SpanExporter`] that enqueues spans for the export worker.
///
/// Never blocks: a full queue sheds the span.
#[derive(Debug, Clone)]
pub struct ChannelSpanExporter {
    sender: mpsc::Sender<Span>,
}

impl SpanExporter for ChannelSpanExporter {
    fn export(&self, span: Span) -> Result<(), EmitError> {
        self.sender.try_send(span).map_err(|e| match e {
            TrySendError::Full(_) => EmitError::QueueFull,
            TrySendError::Closed(_) => EmitError::Closed,
        })
    }
}

/// Background task draining the span queue.
#[derive(Debug)]
pub struct OtlpExportWorker {
    receiver: mpsc::Receiver<Span>,
    client: Client,
    config: ExportConfig,
}

/// Creates a connected exporter/worker pair.
///
/// Spawn [`OtlpExportWorker::run`] and hand the exporter to the tracer. The
/// worker exits after every exporter clone is dropped and the queue is
/// drained.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be created.
pub fn span_export_pipeline(
    config: ExportConfig,
) -> Result<(ChannelSpanExporter, OtlpExportWorker), ExportError> {
    let client = Client::builder().timeout(config.timeout).build()?;
    let (sender, receiver) = mpsc::channel(config.queue_size.max(1));

    Ok((
        ChannelSpanExporter { sender },
        OtlpExportWorker {
            receiver,
            client,
            config,
        },
    ))
}

impl OtlpExportWorker {
    /// Exports batches until the queue is closed and empty.
    pub async fn run(mut self) -> ExportStats {
        let mut stats = ExportStats::default();
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);

        tracing::info!(
            endpoint = self.config.endpoint.as_deref().unwrap_or("<none>"),
            batch_size,
            "Span export worker started"
        );

        while let Some(first) = self.receiver.recv().await {
            batch.push(first);
            let deadline = Instant::now() + self.config.interval;

            while batch.len() < batch_size {
                match tokio::time::timeout_at(deadline, self.receiver.recv()).await {
                    Ok(Some(span)) => batch.push(span),
                    Ok(None) | Err(_) => break,
                }
            }

            self.flush(&mut batch, &mut stats).await;
        }

        tracing::info!(
            exported = stats.exported,
            dropped = stats.dropped,
            skipped = stats.skipped,
            "Span export worker stopped"
        );
        stats
    }

    async fn flush(&self, batch: &mut Vec<Span>, stats: &mut ExportStats) {
        let spans = std::mem::take(batch);
        let count = spans.len() as u64;

        let Some(endpoint) = self.config.endpoint.as_deref() else {
            tracing::debug!(count, "No endpoint configured, discarding spans");
            stats.skipped += count;
            return;
        };

        match self.export_with_retry(endpoint, &spans, stats).await {
            Ok(()) => {
                tracing::debug!(count, "Exported spans");
                stats.exported += count;
            }
            Err(e) => {
                tracing::warn!(error = %e, count, "Span export failed after retries, dropping batch");
                stats.dropped += count;
            }
        }
    }

    async fn export_with_retry(
        &self,
        endpoint: &str,
        spans: &[Span],
        stats: &mut ExportStats,
    ) -> Result<(), ExportError> {
        let url = format!("{}{TRACES_PATH}", endpoint.trim_end_matches('/'));
        let body = encode_request(&spans_to_export_request(spans, &self.config.service_name));
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            attempt += 1;
            stats.requests += 1;

            let request = self
                .client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, PROTOBUF_CONTENT_TYPE)
                .body(body.clone());

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    let error = ExportError::Status { status, body };
                    if !is_retryable(status) {
                        tracing::error!(status, "Received non-retryable status code, not retrying");
                        return Err(error);
                    }
                    error
                }
                Err(e) => ExportError::Http(e),
            };

            if attempt >= MAX_RETRIES {
                return Err(error);
            }

            tracing::warn!(
                attempt,
                max_retries = MAX_RETRIES,
                error = %error,
                "Export attempt failed"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
}

/// Determines if a status code is retryable per the OTLP specification.
///
/// Retryable: 408, 429 and 5xx.
fn is_retryable(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chrono::Utc;
    use shared::models::{SpanId, TraceId};
    use std::collections::BTreeMap;

    fn span(name: &str) -> Span {
        let now = Utc::now();
        Span {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            name: name.to_string(),
            start_time: now,
            end_time: now,
            attributes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(408));
        assert!(is_retryable(429));
        assert!(is_retryable(500));
        assert!(is_retryable(503));
        assert!(!is_retryable(400));
        assert!(!is_retryable(401));
        assert!(!is_retryable(404));
    }

    #[tokio::test]
    async fn test_full_queue_sheds_spans() {
        let (exporter, _worker) = span_export_pipeline(ExportConfig {
            queue_size: 1,
            ..ExportConfig::default()
        })
        .unwrap();

        assert_eq!(exporter.export(span("a")), Ok(()));
        assert_eq!(exporter.export(span("b")), Err(EmitError::QueueFull));
    }

    #[tokio::test]
    async fn test_closed_queue_reports_closed() {
        let (exporter, worker) = span_export_pipeline(ExportConfig::default()).unwrap();
        drop(worker);

        assert_eq!(exporter.export(span("a")), Err(EmitError::Closed));
    }

    #[tokio::test]
    async fn test_worker_without_endpoint_skips_and_exits() {
        let (exporter, worker) = span_export_pipeline(ExportConfig {
            batch_size: 2,
            interval: Duration::from_millis(10),
            ..ExportConfig::default()
        })
        .unwrap();

        for name in ["a", "b", "c"] {
            exporter.export(span(name)).unwrap();
        }
        drop(exporter);

        let stats = worker.run().await;
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.exported, 0);
        assert_eq!(stats.requests, 0);
    }

    #[tokio::test]
    async fn test_unreachable_collector_drops_after_retries() {
        let (exporter, worker) = span_export_pipeline(ExportConfig {
            // Port 9 (discard) on localhost is not expected to accept connections.
            endpoint: Some("http://127.0.0.1:9".to_string()),
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(500),
            ..ExportConfig::default()
        })
        .unwrap();

        exporter.export(span("a")).unwrap();
        drop(exporter);

        let stats = worker.run().await;
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.requests, u64::from(MAX_RETRIES));
    }
}
