//! Data models for the Beacon telemetry service.
//!
//! This module contains the transient values that flow through one ingestion
//! call: the inbound event, the span it produces and its log record.

pub mod event;
pub mod log;
pub mod span;

pub use event::{Event, EventKind, DEFAULT_SERVICE_NAME};
pub use log::{LogLevel, LogRecord};
pub use span::{Span, SpanEvent, SpanId, TraceId};
