//! Canonical wire envelope and the outbound message formatter.
//!
//! Callers hand the connection a loosely-typed request: a raw string, a
//! typed `{type, content}` object, a legacy `{action, ...}` object, or
//! arbitrary data. [`format_message`] turns every one of those into
//! either a raw frame or a [`WireMessage`], the only envelope the
//! tracker expects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::Error;

/// Source tag stamped on every message this client originates.
pub const CLIENT_SOURCE: &str = "web-client";

/// Legacy action names that map onto dedicated wire shapes.
pub mod action {
    pub const TEST: &str = "test";
    pub const REFRESH_SERVICE: &str = "refresh_service";
    pub const START_INSTANCE: &str = "startInstance";
    pub const STOP_INSTANCE: &str = "stopInstance";
}

/// Wire `type` tags produced by the formatter itself.
pub mod kind {
    pub const CLIENT_DATA: &str = "CLIENT_DATA";
    pub const CLIENT_REQUEST: &str = "CLIENT_REQUEST";
    pub const PING: &str = "PING";
}

// ── WireMessage ──────────────────────────────────────────────────────

/// The canonical envelope exchanged with the tracker.
///
/// `action` and `service` are only present on the legacy
/// `refresh_service` / `CLIENT_REQUEST` shapes, which the tracker still
/// reads at the top level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Seconds since the Unix epoch.
    pub timestamp: i64,

    pub source: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<Value>,

    #[serde(default)]
    pub content: Value,
}

impl WireMessage {
    /// Build a client-originated message stamped with `now`.
    pub fn new(kind: impl Into<String>, content: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: request_id(now),
            kind: kind.into(),
            timestamp: now.timestamp(),
            source: CLIENT_SOURCE.to_owned(),
            action: None,
            service: None,
            content,
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_frame(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Formatted ────────────────────────────────────────────────────────

/// Output of [`format_message`].
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    /// Caller-controlled frame, sent byte-for-byte.
    Raw(String),
    /// Canonical envelope, serialized as JSON before sending.
    Wire(WireMessage),
}

impl Formatted {
    /// Render as the text frame that goes on the socket.
    pub fn into_frame(self) -> Result<String, Error> {
        match self {
            Self::Raw(text) => Ok(text),
            Self::Wire(msg) => msg.to_frame(),
        }
    }

    pub fn as_wire(&self) -> Option<&WireMessage> {
        match self {
            Self::Wire(msg) => Some(msg),
            Self::Raw(_) => None,
        }
    }
}

// ── Formatter ────────────────────────────────────────────────────────

/// Canonicalize an outbound request using the current clock.
pub fn format_message(input: &Value) -> Formatted {
    format_message_at(input, Utc::now())
}

/// Canonicalize an outbound request against an explicit clock reading.
///
/// Pure: the same `input` and `now` always produce the same output.
pub fn format_message_at(input: &Value, now: DateTime<Utc>) -> Formatted {
    let obj = match input {
        Value::String(text) => return Formatted::Raw(text.clone()),
        Value::Object(obj) => obj,
        Value::Array(_) => {
            return Formatted::Wire(WireMessage::new(kind::CLIENT_DATA, input.clone(), now));
        }
        // Primitives and null
        _ => {
            return Formatted::Wire(WireMessage::new(
                kind::CLIENT_DATA,
                json!({ "value": input }),
                now,
            ));
        }
    };

    if let Some(kind) = non_empty_str(obj, "type") {
        return Formatted::Wire(typed_message(obj, kind, now));
    }

    if let Some(action) = non_empty_str(obj, "action") {
        return Formatted::Wire(action_message(obj, action, now));
    }

    Formatted::Wire(WireMessage::new(kind::CLIENT_DATA, input.clone(), now))
}

/// `{type, content}` style request: keep whatever the caller supplied,
/// default the rest.
fn typed_message(obj: &Map<String, Value>, kind: &str, now: DateTime<Utc>) -> WireMessage {
    let id = non_empty_str(obj, "id").map_or_else(|| request_id(now), str::to_owned);

    let timestamp = obj
        .get("timestamp")
        .filter(|v| is_truthy(v))
        .and_then(epoch_seconds)
        .unwrap_or_else(|| now.timestamp());

    let source = non_empty_str(obj, "source").unwrap_or(CLIENT_SOURCE).to_owned();

    let content = obj
        .get("content")
        .filter(|v| is_truthy(v))
        .cloned()
        .unwrap_or_else(|| Value::Object(Map::new()));

    WireMessage {
        id,
        kind: kind.to_owned(),
        timestamp,
        source,
        action: None,
        service: None,
        content,
    }
}

/// Legacy `{action, ...}` request.
fn action_message(obj: &Map<String, Value>, action: &str, now: DateTime<Utc>) -> WireMessage {
    match action {
        action::TEST => WireMessage::new("test", Value::Object(Map::new()), now),
        action::REFRESH_SERVICE => {
            let service = obj.get("service").cloned().unwrap_or(Value::Null);
            let region = obj.get("region").cloned().unwrap_or(Value::Null);
            WireMessage {
                action: Some(action::REFRESH_SERVICE.to_owned()),
                service: Some(service.clone()),
                ..WireMessage::new(
                    action::REFRESH_SERVICE,
                    json!({ "service": service, "region": region }),
                    now,
                )
            }
        }
        other => WireMessage {
            action: Some(other.to_owned()),
            ..WireMessage::new(kind::CLIENT_REQUEST, Value::Object(obj.clone()), now)
        },
    }
}

fn request_id(now: DateTime<Utc>) -> String {
    format!("req-{}", now.timestamp_millis())
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn epoch_seconds(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| {
        v.as_f64().filter(|f| f.is_finite()).map(|f| {
            #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
            let whole = f.trunc() as i64;
            whole
        })
    })
}

/// Loose truthiness: null, false, 0 and "" count as absent.
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;

    fn clock() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_760_000_000_123).unwrap()
    }

    fn wire(input: &Value) -> WireMessage {
        match format_message_at(input, clock()) {
            Formatted::Wire(msg) => msg,
            Formatted::Raw(raw) => panic!("expected wire message, got raw {raw:?}"),
        }
    }

    #[test]
    fn raw_string_passes_through() {
        assert_eq!(
            format_message(&json!("raw")),
            Formatted::Raw("raw".into())
        );
    }

    #[test]
    fn typed_message_gets_defaults() {
        let msg = wire(&json!({ "type": "X", "content": { "a": 1 } }));
        assert_eq!(msg.kind, "X");
        assert_eq!(msg.content["a"], 1);
        assert_eq!(msg.id, "req-1760000000123");
        assert_eq!(msg.timestamp, 1_760_000_000);
        assert_eq!(msg.source, CLIENT_SOURCE);
    }

    #[test]
    fn typed_message_keeps_caller_fields() {
        let msg = wire(&json!({
            "type": "VERIFY_PASSWORD",
            "id": "abc",
            "timestamp": 42,
            "source": "cli",
        }));
        assert_eq!(msg.id, "abc");
        assert_eq!(msg.timestamp, 42);
        assert_eq!(msg.source, "cli");
        assert_eq!(msg.content, json!({}));
    }

    #[test]
    fn fractional_timestamp_is_truncated_to_seconds() {
        let msg = wire(&json!({ "type": "X", "timestamp": 1_700_000_000.9 }));
        assert_eq!(msg.timestamp, 1_700_000_000);
    }

    #[test]
    fn empty_type_is_not_a_typed_message() {
        let msg = wire(&json!({ "type": "", "x": 1 }));
        assert_eq!(msg.kind, kind::CLIENT_DATA);
        assert_eq!(msg.content["x"], 1);
    }

    #[test]
    fn test_action_maps_to_test_probe() {
        let msg = wire(&json!({ "action": "test" }));
        assert_eq!(msg.kind, "test");
        assert_eq!(msg.action, None);
        assert_eq!(msg.content, json!({}));
    }

    #[test]
    fn refresh_service_action_carries_service_and_region() {
        let msg = wire(&json!({
            "action": "refresh_service",
            "service": "ec2",
            "region": "ap-northeast-2",
        }));
        assert_eq!(msg.kind, "refresh_service");
        assert_eq!(msg.action.as_deref(), Some("refresh_service"));
        assert_eq!(msg.service, Some(json!("ec2")));
        assert_eq!(
            msg.content,
            json!({ "service": "ec2", "region": "ap-northeast-2" })
        );
    }

    #[test]
    fn unknown_action_wraps_whole_request() {
        let input = json!({ "action": "startInstance", "instanceId": "i-1" });
        let msg = wire(&input);
        assert_eq!(msg.kind, kind::CLIENT_REQUEST);
        assert_eq!(msg.action.as_deref(), Some("startInstance"));
        assert_eq!(msg.content, input);
    }

    #[test]
    fn plain_object_is_client_data() {
        let msg = wire(&json!({ "hello": "world" }));
        assert_eq!(msg.kind, kind::CLIENT_DATA);
        assert_eq!(msg.content, json!({ "hello": "world" }));
    }

    #[test]
    fn primitives_are_wrapped_under_value() {
        assert_eq!(wire(&json!(7)).content, json!({ "value": 7 }));
        assert_eq!(wire(&json!(true)).content, json!({ "value": true }));
        assert_eq!(wire(&Value::Null).content, json!({ "value": null }));
    }

    #[test]
    fn formatting_is_deterministic_for_a_clock_reading() {
        let input = json!({ "type": "PING" });
        assert_eq!(
            format_message_at(&input, clock()),
            format_message_at(&input, clock())
        );
    }

    #[test]
    fn legacy_fields_are_omitted_from_typed_frames() {
        let frame = wire(&json!({ "type": "X" })).to_frame().unwrap();
        let parsed: Value = serde_json::from_str(&frame).unwrap();
        assert!(parsed.get("action").is_none());
        assert!(parsed.get("service").is_none());
        assert_eq!(parsed["type"], "X");
        assert_eq!(parsed["source"], CLIENT_SOURCE);
    }
}
