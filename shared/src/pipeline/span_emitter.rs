//! Span creation and hand-off.
//!
//! An [`ActiveSpan`] is owned by the translation call that started it. Ending
//! it consumes the value and passes the finished [`Span`] to a
//! [`SpanExporter`], so a span can neither be ended twice nor touched after
//! the hand-off.

use super::EmitError;
use crate::models::{Span, SpanEvent, SpanId, TraceId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// A span between start and end.
#[derive(Debug)]
pub struct ActiveSpan {
    trace_id: TraceId,
    span_id: SpanId,
    name: String,
    start_time: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
    events: Vec<SpanEvent>,
}

impl ActiveSpan {
    /// Starts a span now with fresh random ids.
    #[must_use]
    pub fn start(name: impl Into<String>, attributes: BTreeMap<String, String>) -> Self {
        Self {
            trace_id: TraceId::random(),
            span_id: SpanId::random(),
            name: name.into(),
            start_time: Utc::now(),
            attributes,
            events: Vec::new(),
        }
    }

    /// The trace id, assigned at start.
    #[must_use]
    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    /// The span id, assigned at start.
    #[must_use]
    pub fn span_id(&self) -> SpanId {
        self.span_id
    }

    /// The span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sets an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Appends a timestamped event.
    pub fn add_event(&mut self, name: impl Into<String>) {
        self.events.push(SpanEvent {
            name: name.into(),
            timestamp: Utc::now(),
        });
    }

    /// Ends the span now. The end time is clamped to the start time if the
    /// wall clock moved backwards.
    #[must_use]
    pub fn finish(self) -> Span {
        let end_time = Utc::now().max(self.start_time);
        Span {
            trace_id: self.trace_id,
            span_id: self.span_id,
            name: self.name,
            start_time: self.start_time,
            end_time,
            attributes: self.attributes,
            events: self.events,
        }
    }
}

/// Receives finished spans for export.
///
/// Implementations must not block the caller on network I/O.
pub trait SpanExporter: Send + Sync {
    /// Takes ownership of a finished span.
    ///
    /// # Errors
    ///
    /// Returns an error if the span cannot be accepted.
    fn export(&self, span: Span) -> Result<(), EmitError>;
}

/// Creates spans and hands finished ones to an exporter.
pub trait SpanEmitter: Send + Sync {
    /// Starts a span.
    ///
    /// # Errors
    ///
    /// Returns an error if the span cannot be started.
    fn start(
        &self,
        name: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<ActiveSpan, EmitError>;

    /// Adds a named event to a running span.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be recorded.
    fn add_event(&self, span: &mut ActiveSpan, name: &str) -> Result<(), EmitError>;

    /// Ends a span and hands it off for export.
    ///
    /// # Errors
    ///
    /// Returns an error if the export sink rejects the span.
    fn end(&self, span: ActiveSpan) -> Result<(), EmitError>;
}

/// The default [`SpanEmitter`]: random ids, wall-clock timestamps and an
/// injected exporter.
#[derive(Clone)]
pub struct Tracer {
    exporter: Arc<dyn SpanExporter>,
}

impl Tracer {
    /// Creates a tracer exporting through `exporter`.
    #[must_use]
    pub fn new(exporter: Arc<dyn SpanExporter>) -> Self {
        Self { exporter }
    }
}

impl std::fmt::Debug for Tracer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl SpanEmitter for Tracer {
    fn start(
        &self,
        name: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<ActiveSpan, EmitError> {
        Ok(ActiveSpan::start(name, attributes))
    }

    fn add_event(&self, span: &mut ActiveSpan, name: &str) -> Result<(), EmitError> {
        span.add_event(name);
        Ok(())
    }

    fn end(&self, span: ActiveSpan) -> Result<(), EmitError> {
        self.exporter.export(span.finish())
    }
}

/// Span exporter that keeps finished spans in memory.
///
/// This is useful for development and testing.
#[derive(Debug, Default, Clone)]
pub struct InMemorySpanExporter {
    spans: Arc<RwLock<Vec<Span>>>,
}

impl InMemorySpanExporter {
    /// Creates an empty exporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all exported spans in export order.
    #[must_use]
    pub fn spans(&self) -> Vec<Span> {
        self.spans.read().map(|s| s.clone()).unwrap_or_default()
    }

    /// Returns the number of exported spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.read().map(|s| s.len()).unwrap_or_default()
    }

    /// Returns true if nothing was exported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpanExporter for InMemorySpanExporter {
    fn export(&self, span: Span) -> Result<(), EmitError> {
        self.spans
            .write()
            .map_err(|_| EmitError::LockError)?
            .push(span);
        Ok(())
    }
}
