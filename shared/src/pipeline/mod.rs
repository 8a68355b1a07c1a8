//! Event-to-signal pipeline.
//!
//! The [`EventTranslator`] turns one [`crate::models::Event`] into a span, a
//! counter increment and a log record. Spans leave through a [`SpanEmitter`],
//! log records through a [`LogSink`]; both are injected so tests can swap in
//! the in-memory implementations.

pub mod log_sink;
pub mod span_emitter;
pub mod translator;

pub use log_sink::{InMemoryLogSink, LogSink, TracingLogSink};
pub use span_emitter::{ActiveSpan, InMemorySpanExporter, SpanEmitter, SpanExporter, Tracer};
pub use translator::{
    CounterDefinition, EventTranslator, Stage, TranslationResult, TranslationStatus,
    TranslatorConfig, CONFIRMATION_MESSAGE, COUNTER_DEFINITIONS, FALLBACK_SPAN_NAME,
};

use thiserror::Error;

/// Errors raised by span emitters, span exporters and log sinks.
///
/// None of these ever reach a client: the translator records them and
/// completes the request anyway.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The export queue has no free slot.
    #[error("export queue is full")]
    QueueFull,

    /// The export queue is closed.
    #[error("export queue is closed")]
    Closed,

    /// The sink rejected the signal.
    #[error("sink error: {0}")]
    Sink(String),

    /// Failed to acquire a lock on the sink.
    #[error("failed to acquire lock on sink")]
    LockError,

    /// The sink panicked.
    #[error("{stage} panicked: {message}")]
    Panicked {
        /// Stage of the translation that panicked.
        stage: &'static str,
        /// The panic payload, if it was a string.
        message: String,
    },
}
