// Typed agent-event schema and the persistence sanitizer.
//
// The runtime's wire format is camelCase JSON. Decoding goes through this
// schema, so only the fields listed here survive a round trip; runtime
// bookkeeping (`actions`, `usageMetadata`) is carried in memory for the
// duration of an exchange and cleared before anything reaches storage.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_complete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Execution-action bookkeeping, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Value>,
    /// Token accounting, never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<Value>,
}

impl Content {
    pub fn user_text(text: &str) -> Self {
        Self {
            role: Some("user".to_string()),
            parts: vec![Part {
                text: Some(text.to_string()),
                ..Part::default()
            }],
        }
    }

    /// Shapes the `message` field of an agent request into runtime content.
    /// Strings become a single-part user turn; objects must already be
    /// content-shaped. Anything else is not a usable message.
    pub fn from_message(message: &Value) -> Option<Self> {
        match message {
            Value::String(text) => Some(Self::user_text(text)),
            Value::Object(_) => serde_json::from_value(message.clone()).ok(),
            _ => None,
        }
    }
}

/// Drops internal marker events (empty `parts`) and clears runtime
/// bookkeeping from the rest. Pure and idempotent.
pub fn sanitize(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| !is_marker(event))
        .map(|mut event| {
            event.actions = None;
            event.usage_metadata = None;
            event
        })
        .collect()
}

fn is_marker(event: &Event) -> bool {
    event
        .content
        .as_ref()
        .map(|content| content.parts.is_empty())
        .unwrap_or(false)
}

/// Parses a stored event blob. A corrupt blob degrades to an empty
/// sequence instead of failing the request.
pub fn decode_events(raw: &str) -> Vec<Event> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<Event>>(raw) {
        Ok(events) => events,
        Err(err) => {
            warn!("failed to decode stored event log, treating as empty: {err}");
            Vec::new()
        }
    }
}

pub fn encode_events(events: &[Event]) -> String {
    serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string())
}
