//! Event translation.
//!
//! Every event goes through the same fixed sequence:
//!
//! 1. classify the kind
//! 2. start a span and add one event named after the kind
//! 3. write the log record, carrying the span's trace id
//! 4. increment the kind's counter with `{service="<name>"}`
//! 5. end the span
//! 6. acknowledge
//!
//! Steps 2, 3 and 5 run inside a boundary that captures both errors and
//! panics. A failing sink is logged and recorded in the result, and the
//! request is still acknowledged.

use super::log_sink::LogSink;
use super::span_emitter::{ActiveSpan, SpanEmitter};
use super::EmitError;
use crate::metrics::{CounterHandle, CounterRegistry, LabelSet, RegistryError};
use crate::models::{Event, EventKind, LogLevel, LogRecord, TraceId, DEFAULT_SERVICE_NAME};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Message returned to clients for every accepted event.
pub const CONFIRMATION_MESSAGE: &str = "Telemetry data sent successfully";

/// Span name used when an event carries no kind.
pub const FALLBACK_SPAN_NAME: &str = "unclassified_event";

/// A counter the translator registers at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDefinition {
    /// The event kind counted.
    pub kind: EventKind,
    /// Metric name.
    pub name: &'static str,
    /// Metric description.
    pub description: &'static str,
}

/// One counter per known kind, plus the generic counter.
pub const COUNTER_DEFINITIONS: [CounterDefinition; 4] = [
    CounterDefinition {
        kind: EventKind::AddButtonClick,
        name: "add_button_clicks_total",
        description: "Counts Add button clicks",
    },
    CounterDefinition {
        kind: EventKind::DeleteButtonClick,
        name: "delete_button_clicks_total",
        description: "Counts Delete button clicks",
    },
    CounterDefinition {
        kind: EventKind::ListUpdate,
        name: "list_updates_total",
        description: "Counts task list updates",
    },
    CounterDefinition {
        kind: EventKind::Unclassified,
        name: "button_clicks",
        description: "Counts button clicks",
    },
];

/// Translator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorConfig {
    /// Service name used when an event has none.
    pub default_service_name: String,
    /// Count unclassified events on the generic counter.
    pub count_unclassified: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            default_service_name: DEFAULT_SERVICE_NAME.to_string(),
            count_unclassified: false,
        }
    }
}

/// A translation step that can fail without failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Starting the span.
    SpanStart,
    /// Adding the span event.
    SpanEvent,
    /// Writing the log record.
    Log,
    /// Incrementing the counter.
    Counter,
    /// Ending and handing off the span.
    SpanEnd,
}

impl Stage {
    /// Returns the stage name used in diagnostics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpanStart => "span_start",
            Self::SpanEvent => "span_event",
            Self::Log => "log",
            Self::Counter => "counter",
            Self::SpanEnd => "span_end",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether every signal was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationStatus {
    /// All stages succeeded.
    Complete,
    /// At least one stage failed; the event was still acknowledged.
    Degraded,
}

/// Outcome of translating one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    /// Overall status.
    pub status: TranslationStatus,
    /// Message for the client.
    pub response_message: &'static str,
    /// The kind whose counter was incremented, if any.
    pub counted: Option<EventKind>,
    /// Trace id of the span, if one was started.
    pub trace_id: Option<TraceId>,
    /// Stages that failed, in execution order.
    pub failures: Vec<Stage>,
}

/// Translates events into spans, counter increments and log records.
///
/// # Example
///
/// ```
/// use shared::metrics::{CounterRegistry, LabelSet};
/// use shared::models::Event;
/// use shared::pipeline::{
///     EventTranslator, InMemoryLogSink, InMemorySpanExporter, Tracer, TranslatorConfig,
/// };
/// use std::sync::Arc;
///
/// let registry = CounterRegistry::new_shared();
/// let spans = InMemorySpanExporter::new();
/// let logs = InMemoryLogSink::new();
/// let translator = EventTranslator::new(
///     registry.clone(),
///     Arc::new(Tracer::new(Arc::new(spans.clone()))),
///     Arc::new(logs.clone()),
///     TranslatorConfig::default(),
/// )
/// .unwrap();
///
/// translator.translate(&Event::new("add_button_click"));
///
/// let snapshot = registry.snapshot().unwrap();
/// let labels = LabelSet::service("ReactNativeApp");
/// assert_eq!(snapshot.value("add_button_clicks_total", &labels), Some(1));
/// assert_eq!(spans.len(), 1);
/// assert_eq!(logs.len(), 1);
/// ```
pub struct EventTranslator {
    registry: Arc<CounterRegistry>,
    emitter: Arc<dyn SpanEmitter>,
    log_sink: Arc<dyn LogSink>,
    counters: HashMap<EventKind, CounterHandle>,
    config: TranslatorConfig,
}

impl std::fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTranslator")
            .field("counters", &self.counters)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EventTranslator {
    /// Creates a translator, registering its counters and seeding each with
    /// the default service label so they render at zero before any event.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter conflicts with one already registered
    /// under the same name.
    pub fn new(
        registry: Arc<CounterRegistry>,
        emitter: Arc<dyn SpanEmitter>,
        log_sink: Arc<dyn LogSink>,
        config: TranslatorConfig,
    ) -> Result<Self, RegistryError> {
        let seed_labels = LabelSet::service(config.default_service_name.as_str());
        let mut counters = HashMap::new();

        for definition in COUNTER_DEFINITIONS {
            let handle = registry.register(definition.name, definition.description)?;
            registry.seed(handle, &seed_labels)?;
            counters.insert(definition.kind, handle);
        }

        Ok(Self {
            registry,
            emitter,
            log_sink,
            counters,
            config,
        })
    }

    /// Returns the registry this translator counts into.
    #[must_use]
    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    /// Returns the translator settings.
    #[must_use]
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Returns the counter an event kind increments, if any.
    #[must_use]
    pub fn counter_for(&self, kind: EventKind) -> Option<CounterHandle> {
        if !kind.is_known() && !self.config.count_unclassified {
            return None;
        }
        self.counters.get(&kind).copied()
    }

    /// Translates one event. Never fails.
    pub fn translate(&self, event: &Event) -> TranslationResult {
        let mut failures = Vec::new();

        let kind = event.kind();
        let service = event
            .service_name_or(&self.config.default_service_name)
            .to_string();
        let span_name = event
            .raw_kind
            .clone()
            .unwrap_or_else(|| FALLBACK_SPAN_NAME.to_string());

        let mut attributes = BTreeMap::from([("service.name".to_string(), service.clone())]);
        if let Some(raw) = &event.raw_kind {
            attributes.insert("event.type".to_string(), raw.clone());
        }

        let mut span: Option<ActiveSpan> = best_effort(Stage::SpanStart, &mut failures, || {
            self.emitter.start(&span_name, attributes)
        });
        if let Some(active) = span.as_mut() {
            best_effort(Stage::SpanEvent, &mut failures, || {
                self.emitter.add_event(active, &span_name)
            });
        }
        let trace_id = span.as_ref().map(ActiveSpan::trace_id);

        let mut record = LogRecord::new(
            LogLevel::Info,
            format!("Event received: {span_name}"),
            service.as_str(),
        )
        .with_field("event_type", span_name.as_str())
        .with_field("kind", kind.as_str());
        if let Some(message) = &event.message {
            record = record.with_field("message", message.as_str());
        }
        if let Some(active) = span.as_ref() {
            record = record.with_span_context(active.trace_id(), active.span_id());
        }
        best_effort(Stage::Log, &mut failures, || self.log_sink.write(record));

        let counted = self.counter_for(kind).and_then(|handle| {
            match self.registry.inc(handle, &LabelSet::service(service.as_str())) {
                Ok(_) => Some(kind),
                Err(e) => {
                    tracing::warn!(stage = %Stage::Counter, error = %e, "Counter increment failed");
                    failures.push(Stage::Counter);
                    None
                }
            }
        });

        if let Some(active) = span {
            best_effort(Stage::SpanEnd, &mut failures, || self.emitter.end(active));
        }

        let trace_hex = trace_id.map(|id| id.to_string());
        tracing::debug!(
            kind = %kind,
            service = %service,
            trace_id = trace_hex.as_deref(),
            failed_stages = failures.len(),
            "Event translated"
        );

        TranslationResult {
            status: if failures.is_empty() {
                TranslationStatus::Complete
            } else {
                TranslationStatus::Degraded
            },
            response_message: CONFIRMATION_MESSAGE,
            counted,
            trace_id,
            failures,
        }
    }
}

/// Runs one sink call, converting errors and panics into a recorded failure.
fn best_effort<T>(
    stage: Stage,
    failures: &mut Vec<Stage>,
    f: impl FnOnce() -> Result<T, EmitError>,
) -> Option<T> {
    let result = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(EmitError::Panicked {
            stage: stage.as_str(),
            message: panic_message(payload.as_ref()),
        })
    });

    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(stage = %stage, error = %e, "Telemetry stage failed, continuing");
            failures.push(stage);
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
