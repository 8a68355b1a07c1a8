//! Inbound telemetry event model.
//!
//! Client applications submit discrete named events ("button clicked", "list
//! updated"). An [`Event`] is created per ingestion call, translated into
//! signals and then dropped.

use serde::{Deserialize, Serialize};

/// Service name used when an event does not carry one.
pub const DEFAULT_SERVICE_NAME: &str = "ReactNativeApp";

/// The closed vocabulary of event kinds the service counts.
///
/// Anything outside the known kinds classifies as [`EventKind::Unclassified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The "add" button was pressed.
    AddButtonClick,
    /// The "delete" button was pressed.
    DeleteButtonClick,
    /// The task list changed.
    ListUpdate,
    /// Any kind outside the known vocabulary, including a missing kind.
    Unclassified,
}

impl EventKind {
    /// All kinds that map to a dedicated counter.
    pub const KNOWN: [Self; 3] = [Self::AddButtonClick, Self::DeleteButtonClick, Self::ListUpdate];

    /// Classifies a raw kind string. Matching is exact.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match raw {
            "add_button_click" => Self::AddButtonClick,
            "delete_button_click" => Self::DeleteButtonClick,
            "list_update" => Self::ListUpdate,
            _ => Self::Unclassified,
        }
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddButtonClick => "add_button_click",
            Self::DeleteButtonClick => "delete_button_click",
            Self::ListUpdate => "list_update",
            Self::Unclassified => "unclassified",
        }
    }

    /// Returns true unless the kind is [`EventKind::Unclassified`].
    #[must_use]
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unclassified)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single telemetry event as submitted by a client.
///
/// # Example
///
/// ```
/// use shared::models::{Event, EventKind};
///
/// let event = Event::new("add_button_click")
///     .with_message("Added a task")
///     .with_service_name("ReactNativeApp");
///
/// assert_eq!(event.kind(), EventKind::AddButtonClick);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Event {
    /// The raw kind string, if the client sent a usable one.
    pub raw_kind: Option<String>,
    /// Free-form message payload.
    pub message: Option<String>,
    /// Name of the emitting service, if the client sent one.
    pub service_name: Option<String>,
}

/// Wire shape of an event body.
///
/// Every field is optional and loosely typed so that decoding never rejects a
/// body; fields of the wrong type are ignored. `kind` is a separate field
/// rather than an alias so that bodies carrying both names still decode.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventBody {
    #[serde(default)]
    event_type: Option<serde_json::Value>,
    #[serde(default)]
    kind: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    service_name: Option<serde_json::Value>,
}

fn non_empty_string(value: Option<serde_json::Value>) -> Option<String> {
    match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

impl Event {
    /// Creates an event with the given raw kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            raw_kind: (!kind.trim().is_empty()).then_some(kind),
            message: None,
            service_name: None,
        }
    }

    /// Sets the message payload.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets the emitting service name.
    #[must_use]
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Decodes an event from a request body.
    ///
    /// The kind is read from `eventType`, falling back to `kind` when
    /// `eventType` is missing or not a non-empty string. Never fails: bodies that are not JSON objects, or fields that are not
    /// strings, yield an event without the corresponding value.
    #[must_use]
    pub fn from_json_slice(body: &[u8]) -> Self {
        let parsed = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .filter(serde_json::Value::is_object)
            .and_then(|value| serde_json::from_value::<EventBody>(value).ok())
            .unwrap_or_default();

        Self {
            raw_kind: non_empty_string(parsed.event_type)
                .or_else(|| non_empty_string(parsed.kind)),
            message: match parsed.message {
                Some(serde_json::Value::String(s)) => Some(s),
                _ => None,
            },
            service_name: non_empty_string(parsed.service_name),
        }
    }

    /// Encodes the event in the wire form accepted by `POST /send-telemetry`.
    ///
    /// Absent fields are omitted.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        if let Some(kind) = &self.raw_kind {
            body.insert("eventType".to_string(), kind.clone().into());
        }
        if let Some(message) = &self.message {
            body.insert("message".to_string(), message.clone().into());
        }
        if let Some(service) = &self.service_name {
            body.insert("serviceName".to_string(), service.clone().into());
        }
        serde_json::Value::Object(body)
    }

    /// Classifies the event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.raw_kind
            .as_deref()
            .map_or(EventKind::Unclassified, EventKind::classify)
    }

    /// Returns the service name, falling back to `default`.
    #[must_use]
    pub fn service_name_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.service_name.as_deref().unwrap_or(default)
    }
}
