//! Span export to an OTLP/HTTP trace collector.
//!
//! Ingestion requests hand finished spans to a [`ChannelSpanExporter`], which
//! only ever does a non-blocking `try_send` into a bounded queue. The
//! [`OtlpExportWorker`] drains that queue in batches on its own task and
//! POSTs them to the collector.

pub mod otlp;

pub use otlp::{
    span_export_pipeline, ChannelSpanExporter, ExportConfig, ExportError, ExportStats,
    OtlpExportWorker,
};
