// Copyright (C) 2026 The Shard Authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General
// Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program. If not, see <https://www.gnu.org/licenses/>.
//

use crate::error::SessionError;
use serde_json::{Map, Value};

/// A deserialized client frame (spec §4.1/§6): "an object with string
/// `type` and optional `msg_id`". The core never defines the schema
/// beyond those two fields (spec §1 Non-goals "does not define the client
/// wire schema beyond framing") — everything else rides through as an
/// opaque JSON map.
#[derive(Clone, Debug)]
pub struct WireMessage(Map<String, Value>);

impl WireMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, SessionError> {
        let value: Value = serde_json::from_slice(payload)
            .map_err(|e| SessionError::Protocol(format!("undeserializable body: {e}")))?;
        let map = value
            .as_object()
            .cloned()
            .ok_or_else(|| SessionError::Protocol("message is not a JSON object".to_string()))?;
        if !map.contains_key("type") {
            return Err(SessionError::Protocol("message has no 'type' field".to_string()));
        }
        Ok(Self(map))
    }

    pub fn msg_type(&self) -> &str {
        self.0.get("type").and_then(Value::as_str).unwrap_or("")
    }

    pub fn msg_id(&self) -> Option<Value> {
        self.0.get("msg_id").cloned()
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

/// Bypasses the request queue entirely (spec §4.1 "answered synchronously
/// with `{type:'ping', msg_id, success:true, ts}`"). `ts` is seconds,
/// supplied by the caller rather than read from the system clock here so
/// callers can keep this function pure and deterministic in tests.
pub fn ping_response(msg_id: Option<Value>, ts_seconds: i64) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String("ping".to_string()));
    if let Some(id) = msg_id {
        map.insert("msg_id".to_string(), id);
    }
    map.insert("success".to_string(), Value::Bool(true));
    map.insert("ts".to_string(), Value::Number(ts_seconds.into()));
    Value::Object(map)
}

/// Spec §6 "Server-initiated pushes carry `type='server_message'` and an
/// `action` string (`CLOSE`, `PREPARE_TO_RECONNECT`, `TOKEN`, …)."
pub fn server_message(action: &str) -> Value {
    let mut map = Map::new();
    map.insert(
        "type".to_string(),
        Value::String("server_message".to_string()),
    );
    map.insert("action".to_string(), Value::String(action.to_string()));
    Value::Object(map)
}

/// Spec §7 "Malformed request → ... socket close for client wire" and
/// generic message-level failures that still carry a `msg_id` to echo.
pub fn error_response(msg_type: &str, msg_id: Option<Value>, message: &str) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(msg_type.to_string()));
    if let Some(id) = msg_id {
        map.insert("msg_id".to_string(), id);
    }
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("message".to_string(), Value::String(message.to_string()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_rejects_missing_type() {
        let payload = serde_json::to_vec(&json!({"msg_id": 1})).unwrap();
        assert!(matches!(
            WireMessage::parse(&payload),
            Err(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn parse_rejects_non_object() {
        let payload = serde_json::to_vec(&json!([1, 2, 3])).unwrap();
        assert!(matches!(
            WireMessage::parse(&payload),
            Err(SessionError::Protocol(_))
        ));
    }

    #[test]
    fn round_trips_type_and_msg_id() {
        let payload = serde_json::to_vec(&json!({"type": "ping", "msg_id": 12})).unwrap();
        let msg = WireMessage::parse(&payload).unwrap();
        assert_eq!(msg.msg_type(), "ping");
        assert_eq!(msg.msg_id(), Some(json!(12)));
    }

    #[test]
    fn ping_response_echoes_msg_id_and_carries_ts() {
        let resp = ping_response(Some(json!(12)), 1_700_000_000);
        assert_eq!(resp["type"], json!("ping"));
        assert_eq!(resp["msg_id"], json!(12));
        assert_eq!(resp["success"], json!(true));
        assert_eq!(resp["ts"], json!(1_700_000_000));
    }
}
