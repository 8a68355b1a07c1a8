//! Conversions from internal Beacon types to OTLP protobuf types.

use super::proto::common::v1::{any_value, AnyValue, InstrumentationScope, KeyValue};
use super::proto::resource::v1::Resource;
use super::proto::trace::v1::{span, ResourceSpans, ScopeSpans, Span as ProtoSpan};
use super::ExportTraceServiceRequest;
use crate::models::{Span, SpanEvent};
use chrono::{DateTime, Utc};

/// Instrumentation scope name reported for every exported span.
pub const SCOPE_NAME: &str = "beacon";

/// Converts a `DateTime<Utc>` to OTLP nanoseconds since epoch.
///
/// Times before the epoch or beyond the `i64` nanosecond range map to 0.
fn datetime_to_unix_nanos(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

/// Creates a string-valued OTLP attribute.
#[must_use]
pub fn string_attribute(key: impl Into<String>, value: impl Into<String>) -> KeyValue {
    KeyValue {
        key: key.into(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.into())),
        }),
    }
}

fn span_event_to_otlp(event: &SpanEvent) -> span::Event {
    span::Event {
        time_unix_nano: datetime_to_unix_nanos(event.timestamp),
        name: event.name.clone(),
        ..Default::default()
    }
}

/// Converts a finished span to its OTLP protobuf form.
#[must_use]
pub fn span_to_otlp(span: &Span) -> ProtoSpan {
    ProtoSpan {
        trace_id: span.trace_id.to_bytes().to_vec(),
        span_id: span.span_id.to_bytes().to_vec(),
        name: span.name.clone(),
        kind: span::SpanKind::Internal as i32,
        start_time_unix_nano: datetime_to_unix_nanos(span.start_time),
        end_time_unix_nano: datetime_to_unix_nanos(span.end_time),
        attributes: span
            .attributes
            .iter()
            .map(|(k, v)| string_attribute(k.as_str(), v.as_str()))
            .collect(),
        events: span.events.iter().map(span_event_to_otlp).collect(),
        ..Default::default()
    }
}

/// Builds an export request for a batch of spans emitted by `service_name`.
///
/// All spans share one resource and one scope.
#[must_use]
pub fn spans_to_export_request(spans: &[Span], service_name: &str) -> ExportTraceServiceRequest {
    ExportTraceServiceRequest {
        resource_spans: vec![ResourceSpans {
            resource: Some(Resource {
                attributes: vec![string_attribute("service.name", service_name)],
                ..Default::default()
            }),
            scope_spans: vec![ScopeSpans {
                scope: Some(InstrumentationScope {
                    name: SCOPE_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    ..Default::default()
                }),
                spans: spans.iter().map(span_to_otlp).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

#[cfg(test)]
#[path = "conversions_test.rs"]
mod conversions_test;
