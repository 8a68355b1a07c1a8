//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use shared::metrics::{CounterRegistry, RegistryError};
use shared::pipeline::{
    EventTranslator, InMemoryLogSink, InMemorySpanExporter, Tracer, TranslatorConfig,
};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Both listeners hold a clone; the ingestion side writes counters through
/// the translator and the scrape side reads them from the same registry.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The event translator.
    translator: Arc<EventTranslator>,
    /// The counter registry the translator writes into.
    registry: Arc<CounterRegistry>,
}

impl AppState {
    /// Creates a new application state around a translator.
    #[must_use]
    pub fn new(translator: Arc<EventTranslator>) -> Self {
        let registry = Arc::clone(translator.registry());
        Self {
            translator,
            registry,
        }
    }

    /// Creates a state whose spans and logs land in the given in-memory sinks.
    ///
    /// This is useful for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the counters cannot be registered.
    pub fn with_in_memory_sinks(
        spans: InMemorySpanExporter,
        logs: InMemoryLogSink,
    ) -> Result<Self, RegistryError> {
        let translator = EventTranslator::new(
            CounterRegistry::new_shared(),
            Arc::new(Tracer::new(Arc::new(spans))),
            Arc::new(logs),
            TranslatorConfig::default(),
        )?;
        Ok(Self::new(Arc::new(translator)))
    }

    /// Returns the event translator.
    #[must_use]
    pub fn translator(&self) -> &EventTranslator {
        self.translator.as_ref()
    }

    /// Returns the counter registry.
    #[must_use]
    pub fn registry(&self) -> &CounterRegistry {
        self.registry.as_ref()
    }
}
