//! OpenTelemetry Protocol (OTLP) support.
//!
//! Finished [`crate::models::Span`]s are converted into the generated OTLP
//! protobuf messages and encoded for the OTLP/HTTP binary transport.
//!
//! # Example
//!
//! ```
//! use shared::otlp::{conversions::spans_to_export_request, decode_request, encode_request};
//!
//! let request = spans_to_export_request(&[], "beacon");
//! let decoded = decode_request(&encode_request(&request)).unwrap();
//! assert_eq!(decoded, request);
//! ```

pub mod conversions;

use prost::Message;

/// Generated OTLP protobuf types.
pub use opentelemetry_proto::tonic as proto;

pub use proto::collector::trace::v1::ExportTraceServiceRequest;

/// Path of the trace export endpoint relative to the collector base URL.
pub const TRACES_PATH: &str = "/v1/traces";

/// Content type of an OTLP/HTTP binary protobuf body.
pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

/// Encodes an export request as protobuf.
#[must_use]
pub fn encode_request(request: &ExportTraceServiceRequest) -> Vec<u8> {
    request.encode_to_vec()
}

/// Decodes a protobuf export request.
///
/// # Errors
///
/// Returns an error if `bytes` is not a valid `ExportTraceServiceRequest`.
pub fn decode_request(bytes: &[u8]) -> Result<ExportTraceServiceRequest, prost::DecodeError> {
    ExportTraceServiceRequest::decode(bytes)
}

/// Total number of spans in an export request.
#[must_use]
pub fn span_count(request: &ExportTraceServiceRequest) -> usize {
    request
        .resource_spans
        .iter()
        .flat_map(|r| &r.scope_spans)
        .map(|s| s.spans.len())
        .sum()
}
