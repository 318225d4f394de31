//! Event envelope shared by every subscriber of one trigger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{WebhookError, WebhookResult};

/// The payload posted to subscribers.
///
/// One envelope, with one delivery id, is built per trigger call and sent
/// to every matching subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Delivery identifier, also sent as `X-Webhook-Delivery`.
    pub id: Uuid,
    /// Event name.
    pub event: String,
    /// When the event was triggered.
    pub timestamp: DateTime<Utc>,
    /// Organization context of the event.
    pub organization_id: Option<Uuid>,
    /// Event data.
    pub data: Map<String, Value>,
}

impl EventEnvelope {
    /// Creates an envelope with a fresh delivery id.
    pub fn new(event: impl Into<String>, organization_id: Option<Uuid>, data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: event.into(),
            timestamp: Utc::now(),
            organization_id,
            data,
        }
    }

    /// Creates an envelope from arbitrary JSON data.
    ///
    /// `null` becomes an empty object; any other non-object is rejected.
    pub fn from_value(event: impl Into<String>, organization_id: Option<Uuid>, data: Value) -> WebhookResult<Self> {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(WebhookError::InvalidPayload(format!(
                    "event data must be a JSON object, got {}",
                    json_kind(&other)
                )));
            }
        };
        Ok(Self::new(event, organization_id, data))
    }

    /// Serializes the envelope to its canonical JSON form.
    ///
    /// Canonical JSON is compact with object keys sorted at every level, so
    /// re-serializing a stored copy of the body reproduces the signed bytes.
    pub fn to_canonical_json(&self) -> WebhookResult<String> {
        canonical_json(&serde_json::to_value(self)?)
    }
}

/// Serializes a JSON value canonically.
pub fn canonical_json(value: &Value) -> WebhookResult<String> {
    Ok(serde_json::to_string(&sort_keys(value))?)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_keys(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_keys() {
        let mut data = Map::new();
        data.insert("zeta".to_string(), json!(1));
        data.insert("alpha".to_string(), json!({"b": 2, "a": 1}));

        let envelope = EventEnvelope::new("user.created", None, data);
        let canonical = envelope.to_canonical_json().unwrap();

        assert!(canonical.starts_with(r#"{"data":{"alpha":{"a":1,"b":2},"zeta":1},"event":"user.created","id":""#));
        assert!(canonical.contains(r#""organization_id":null"#));
        assert!(!canonical.contains(' '));
    }

    #[test]
    fn test_canonical_json_is_stable_across_round_trip() {
        let org = Uuid::new_v4();
        let envelope = EventEnvelope::from_value(
            "member.added",
            Some(org),
            json!({"user_id": "u-1", "roles": ["admin", "viewer"]}),
        )
        .unwrap();

        let canonical = envelope.to_canonical_json().unwrap();
        let stored: Value = serde_json::from_str(&canonical).unwrap();
        assert_eq!(canonical_json(&stored).unwrap(), canonical);

        let parsed: EventEnvelope = serde_json::from_str(&canonical).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert!(EventEnvelope::from_value("user.created", None, json!(null)).is_ok());
        assert!(EventEnvelope::from_value("user.created", None, json!([1, 2])).is_err());
        assert!(EventEnvelope::from_value("user.created", None, json!("text")).is_err());
    }
}
