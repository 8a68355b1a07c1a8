//! Beacon Shared Library
//!
//! This crate contains the event-to-signal translation engine of the Beacon
//! telemetry service: every inbound event becomes a trace span, a counter
//! increment and a structured log record.
//!
//! # Modules
//!
//! - [`models`] - Events, spans and log records
//! - [`metrics`] - Counter registry and Prometheus text exposition
//! - [`pipeline`] - Span emitter, log sink and the event translator
//! - [`otlp`] - OTLP protobuf encoding of finished spans
//!
//! # Example
//!
//! ```
//! use shared::metrics::{render, CounterRegistry};
//! use shared::models::Event;
//! use shared::pipeline::{
//!     EventTranslator, InMemorySpanExporter, TracingLogSink, Tracer, TranslatorConfig,
//! };
//! use std::sync::Arc;
//!
//! let registry = CounterRegistry::new_shared();
//! let translator = EventTranslator::new(
//!     registry.clone(),
//!     Arc::new(Tracer::new(Arc::new(InMemorySpanExporter::new()))),
//!     Arc::new(TracingLogSink::new()),
//!     TranslatorConfig::default(),
//! )
//! .unwrap();
//!
//! translator.translate(&Event::new("list_update"));
//!
//! let text = render(&registry).unwrap();
//! assert!(text.contains("list_updates_total{service=\"ReactNativeApp\"} 1"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod metrics;
pub mod models;
pub mod otlp;
pub mod pipeline;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
