use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

// ---------------------------------------------------------------------------
// Well-known event names
// ---------------------------------------------------------------------------

pub const CHANGES_UPDATE: &str = "changes:update";
pub const MESSAGES_NEW: &str = "messages:new";
pub const SESSION_UPDATE: &str = "session:update";
pub const LOG_APPEND: &str = "log:append";
pub const TODO_UPDATED: &str = "todo.updated";

/// Emitted by the client itself after the stream re-opens following a
/// failure. Never sent by the server.
pub const RECONNECTED: &str = "sse:reconnected";

/// SSE `event:` field value used when the server sends no explicit name.
const DEFAULT_SSE_EVENT: &str = "message";

/// Keys owned by the envelope; a payload may not supply them.
const ENVELOPE_KEYS: &[&str] = &["name", "workspace"];

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A named notification from the backend, optionally scoped to a workspace.
///
/// The payload is opaque: receivers treat an event as a signal to re-fetch
/// authoritative state over REST, not as the state itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, workspace: Option<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            workspace,
            payload,
        }
    }

    /// An event with no workspace and an empty payload.
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, None, Value::Object(Map::new()))
    }

    /// An event scoped to `workspace` with an empty payload.
    pub fn scoped(name: impl Into<String>, workspace: impl Into<String>) -> Self {
        Self::new(name, Some(workspace.into()), Value::Object(Map::new()))
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn is_global(&self) -> bool {
        self.workspace.is_none()
    }

    pub fn scope(&self) -> Scope {
        Scope::from(self.workspace.as_deref())
    }

    /// Decode one SSE frame into an [`Event`].
    ///
    /// `data` must be a JSON object. The name comes from its `name` field,
    /// falling back to the SSE `event:` field when that is set to something
    /// other than the protocol default `message`. A `null`, empty or absent
    /// `workspace` makes the event global. Everything else in the object is
    /// kept as the payload.
    pub fn from_sse(event_field: &str, data: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(data)
            .map_err(|e| CoreError::MalformedEvent(format!("data is not JSON: {e}")))?;
        let Value::Object(mut obj) = value else {
            return Err(CoreError::MalformedEvent(
                "data is not a JSON object".to_string(),
            ));
        };

        let name = match obj.remove("name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::String(_)) | Some(Value::Null) | None => match event_field.trim() {
                "" | DEFAULT_SSE_EVENT => {
                    return Err(CoreError::MalformedEvent("missing event name".to_string()))
                }
                other => other.to_string(),
            },
            Some(other) => {
                return Err(CoreError::MalformedEvent(format!(
                    "name must be a string, got {other}"
                )))
            }
        };
        validate_name(&name).map_err(|e| CoreError::MalformedEvent(e.to_string()))?;

        let workspace = match obj.remove("workspace") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                return Err(CoreError::MalformedEvent(format!(
                    "workspace must be a string or null, got {other}"
                )))
            }
        };

        Ok(Self {
            name,
            workspace,
            payload: Value::Object(obj),
        })
    }

    /// Encode the event as the JSON object carried in an SSE `data:` field.
    ///
    /// Object payloads are flattened next to `name` and `workspace`. Any
    /// other payload, or an object that carries its own `name` or
    /// `workspace` key, is nested under a `payload` key so the envelope
    /// always describes the event itself.
    pub fn to_sse_data(&self) -> Value {
        let mut obj = match &self.payload {
            Value::Object(m) if !ENVELOPE_KEYS.iter().any(|k| m.contains_key(*k)) => m.clone(),
            Value::Null => Map::new(),
            other => {
                let mut m = Map::new();
                m.insert("payload".to_string(), other.clone());
                m
            }
        };
        obj.insert("name".to_string(), Value::String(self.name.clone()));
        if let Some(ws) = &self.workspace {
            obj.insert("workspace".to_string(), Value::String(ws.clone()));
        }
        Value::Object(obj)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.workspace {
            Some(ws) => write!(f, "{}@{}", self.name, ws),
            None => f.write_str(&self.name),
        }
    }
}

/// Event names are non-empty and contain no whitespace.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(CoreError::InvalidEventName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The workspace half of a subscription key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Receives the event name from every workspace, and global events.
    Global,
    /// Receives the event name only when it is scoped to this workspace.
    Workspace(String),
}

impl Scope {
    pub fn workspace(name: impl Into<String>) -> Self {
        Scope::Workspace(name.into())
    }

    pub fn as_workspace(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::Workspace(ws) => Some(ws),
        }
    }
}

impl From<Option<&str>> for Scope {
    fn from(ws: Option<&str>) -> Self {
        match ws {
            Some(ws) => Scope::Workspace(ws.to_string()),
            None => Scope::Global,
        }
    }
}

impl From<Option<String>> for Scope {
    fn from(ws: Option<String>) -> Self {
        match ws {
            Some(ws) => Scope::Workspace(ws),
            None => Scope::Global,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("*"),
            Scope::Workspace(ws) => f.write_str(ws),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_sse_reads_name_and_workspace_from_data() {
        let ev = Event::from_sse(
            "message",
            r#"{"name":"changes:update","workspace":"proj-a","files":3}"#,
        )
        .unwrap();
        assert_eq!(ev.name, CHANGES_UPDATE);
        assert_eq!(ev.workspace.as_deref(), Some("proj-a"));
        assert_eq!(ev.payload, json!({"files": 3}));
    }

    #[test]
    fn from_sse_falls_back_to_sse_event_field() {
        let ev = Event::from_sse("log:append", r#"{"workspace":"proj-a"}"#).unwrap();
        assert_eq!(ev.name, LOG_APPEND);
        assert_eq!(ev.scope(), Scope::workspace("proj-a"));
    }

    #[test]
    fn from_sse_data_name_wins_over_event_field() {
        let ev = Event::from_sse("other", r#"{"name":"todo.updated"}"#).unwrap();
        assert_eq!(ev.name, TODO_UPDATED);
    }

    #[test]
    fn from_sse_null_or_empty_workspace_is_global() {
        let a = Event::from_sse("", r#"{"name":"session:update","workspace":null}"#).unwrap();
        let b = Event::from_sse("", r#"{"name":"session:update","workspace":""}"#).unwrap();
        assert!(a.is_global());
        assert!(b.is_global());
        assert_eq!(a.scope(), Scope::Global);
    }

    #[test]
    fn from_sse_rejects_missing_name() {
        let err = Event::from_sse("message", r#"{"workspace":"proj-a"}"#).unwrap_err();
        assert!(matches!(err, CoreError::MalformedEvent(_)));
        assert!(Event::from_sse("", "{}").is_err());
    }

    #[test]
    fn from_sse_rejects_non_object_data() {
        assert!(Event::from_sse("changes:update", "not json").is_err());
        assert!(Event::from_sse("changes:update", "[1,2]").is_err());
        assert!(Event::from_sse("changes:update", "\"update\"").is_err());
    }

    #[test]
    fn from_sse_rejects_wrongly_typed_fields() {
        assert!(Event::from_sse("", r#"{"name":42}"#).is_err());
        assert!(Event::from_sse("", r#"{"name":"x","workspace":7}"#).is_err());
        assert!(Event::from_sse("", r#"{"name":"has space"}"#).is_err());
    }

    #[test]
    fn to_sse_data_flattens_object_payload() {
        let ev = Event::scoped(MESSAGES_NEW, "proj-b").with_payload(json!({"count": 2}));
        assert_eq!(
            ev.to_sse_data(),
            json!({"name": "messages:new", "workspace": "proj-b", "count": 2})
        );
    }

    #[test]
    fn to_sse_data_nests_scalar_payload() {
        let ev = Event::global(LOG_APPEND).with_payload(json!("line"));
        let data = ev.to_sse_data();
        assert_eq!(data, json!({"name": "log:append", "payload": "line"}));
        assert!(data.get("workspace").is_none());
    }

    #[test]
    fn encoded_event_decodes_to_itself() {
        let ev = Event::scoped(CHANGES_UPDATE, "proj-a").with_payload(json!({"rev": "abc"}));
        let data = serde_json::to_string(&ev.to_sse_data()).unwrap();
        assert_eq!(Event::from_sse("changes:update", &data).unwrap(), ev);
    }

    #[test]
    fn global_event_keeps_scope_when_payload_names_a_workspace() {
        let ev = Event::global(CHANGES_UPDATE).with_payload(json!({"workspace": "proj-b", "n": 1}));
        let data = ev.to_sse_data();
        assert!(data.get("workspace").is_none());

        let decoded = Event::from_sse(CHANGES_UPDATE, &data.to_string()).unwrap();
        assert_eq!(decoded.workspace, None);
        assert_eq!(decoded.payload["payload"]["workspace"], "proj-b");
        assert_eq!(decoded.payload["payload"]["n"], 1);
    }

    #[test]
    fn payload_name_never_replaces_event_name() {
        let ev = Event::scoped(SESSION_UPDATE, "proj-a").with_payload(json!({"name": "other"}));
        let decoded = Event::from_sse("message", &ev.to_sse_data().to_string()).unwrap();
        assert_eq!(decoded.name, SESSION_UPDATE);
        assert_eq!(decoded.workspace.as_deref(), Some("proj-a"));
        assert_eq!(decoded.payload, json!({"payload": {"name": "other"}}));
    }

    #[test]
    fn display_includes_workspace() {
        assert_eq!(Event::scoped("a", "w").to_string(), "a@w");
        assert_eq!(Event::global("a").to_string(), "a");
        assert_eq!(Scope::Global.to_string(), "*");
    }

    #[test]
    fn validate_name_rules() {
        assert!(validate_name("changes:update").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a b").is_err());
    }
}
