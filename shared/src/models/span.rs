//! Span data model.
//!
//! A finished [`Span`] is the value handed to a span exporter once the span
//! ends. The in-flight form lives in [`crate::pipeline::ActiveSpan`].

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// A 16-byte trace identifier, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId([u8; 16]);

/// An 8-byte span identifier, rendered as 16 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanId([u8; 8]);

impl TraceId {
    /// Generates a random, non-zero trace id.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 16];
        let mut rng = rand::thread_rng();
        while bytes == [0u8; 16] {
            rng.fill_bytes(&mut bytes);
        }
        Self(bytes)
    }

    /// Creates a trace id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }
}

impl SpanId {
    /// Generates a random, non-zero span id.
    #[must_use]
    pub fn random() -> Self {
        let mut bytes = [0u8; 8];
        let mut rng = rand::thread_rng();
        while bytes == [0u8; 8] {
            rng.fill_bytes(&mut bytes);
        }
        Self(bytes)
    }

    /// Creates a span id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 8] {
        self.0
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::fmt::Display for SpanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for TraceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Serialize for SpanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A named, timestamped marker inside a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanEvent {
    /// The name of the event.
    pub name: String,
    /// When the event was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A finished span.
///
/// `end_time` is never earlier than `start_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Span {
    /// The trace this span belongs to.
    pub trace_id: TraceId,
    /// Identifier of this span.
    pub span_id: SpanId,
    /// Operation name.
    pub name: String,
    /// When the span started.
    pub start_time: DateTime<Utc>,
    /// When the span ended.
    pub end_time: DateTime<Utc>,
    /// String attributes, ordered by key.
    pub attributes: BTreeMap<String, String>,
    /// Events in the order they were added.
    pub events: Vec<SpanEvent>,
}

impl Span {
    /// Returns the value of an attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns the span duration.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}
