//! Structured log output for translated events.

use super::EmitError;
use crate::models::{LogLevel, LogRecord};
use std::sync::{Arc, RwLock};

/// Target used for per-event log records, so they can be filtered
/// separately from service diagnostics (`RUST_LOG=telemetry=info`).
pub const LOG_TARGET: &str = "telemetry";

/// Receives one log record per translated event.
pub trait LogSink: Send + Sync {
    /// Takes ownership of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn write(&self, record: LogRecord) -> Result<(), EmitError>;
}

/// Log sink that emits records as `tracing` events.
///
/// Formatting and destinations are up to the installed subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    /// Creates the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn write(&self, record: LogRecord) -> Result<(), EmitError> {
        let trace_id = record.trace_id.map(|id| id.to_string());
        let span_id = record.span_id.map(|id| id.to_string());
        let fields = serde_json::to_string(&record.fields)
            .map_err(|e| EmitError::Sink(e.to_string()))?;

        macro_rules! emit {
            ($macro:ident) => {
                tracing::$macro!(
                    target: LOG_TARGET,
                    service = %record.service,
                    trace_id = trace_id.as_deref(),
                    span_id = span_id.as_deref(),
                    fields = %fields,
                    "{}",
                    record.message
                )
            };
        }

        match record.level {
            LogLevel::Debug => emit!(debug),
            LogLevel::Info => emit!(info),
            LogLevel::Warn => emit!(warn),
            LogLevel::Error => emit!(error),
        }
        Ok(())
    }
}

/// Log sink that keeps records in memory.
///
/// This is useful for development and testing.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLogSink {
    records: Arc<RwLock<Vec<LogRecord>>>,
}

impl InMemoryLogSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all records in write order.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Returns the number of records written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or_default()
    }

    /// Returns true if nothing was written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LogSink for InMemoryLogSink {
    fn write(&self, record: LogRecord) -> Result<(), EmitError> {
        self.records
            .write()
            .map_err(|_| EmitError::LockError)?
            .push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SpanId, TraceId};

    #[test]
    fn test_in_memory_sink_keeps_order() {
        let sink = InMemoryLogSink::new();
        sink.write(LogRecord::new(LogLevel::Info, "first", "svc"))
            .unwrap();
        sink.write(LogRecord::new(LogLevel::Info, "second", "svc"))
            .unwrap();

        let messages: Vec<String> = sink.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[test]
    fn test_in_memory_sink_clones_share_records() {
        let sink = InMemoryLogSink::new();
        let other = sink.clone();
        sink.write(LogRecord::new(LogLevel::Info, "m", "svc")).unwrap();
        assert_eq!(other.len(), 1);
    }

    #[test]
    fn test_tracing_sink_accepts_every_level() {
        let sink = TracingLogSink::new();
        for level in [
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
        ] {
            let record = LogRecord::new(level, "Event received: list_update", "svc")
                .with_span_context(TraceId::random(), SpanId::random())
                .with_field("message", "hello");
            assert!(sink.write(record).is_ok());
        }
    }
}
