//! Realtime channel frames: `{topic, event, payload, ref}` JSON text messages.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use edubridge_types::Message;

pub const EVENT_JOIN: &str = "phx_join";
pub const EVENT_LEAVE: &str = "phx_leave";
pub const EVENT_REPLY: &str = "phx_reply";
pub const EVENT_ERROR: &str = "phx_error";
pub const EVENT_CLOSE: &str = "phx_close";
pub const EVENT_HEARTBEAT: &str = "heartbeat";
pub const EVENT_POSTGRES_CHANGES: &str = "postgres_changes";

/// Heartbeats go to this topic, not to the joined channel.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Frame {
    pub fn to_text(&self) -> String {
        // A struct of strings and a Value always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn parse(text: &str) -> Option<Frame> {
        serde_json::from_str(text).ok()
    }

    /// True for a `phx_reply` whose status is "ok".
    pub fn is_ok_reply(&self) -> bool {
        self.event == EVENT_REPLY && self.payload.get("status").and_then(Value::as_str) == Some("ok")
    }
}

/// Topic of the per-recipient message channel.
pub fn messages_topic(recipient_id: Uuid) -> String {
    format!("realtime:messages-for-{}", recipient_id)
}

/// Join the channel and ask for INSERTs on `public.messages` addressed to `recipient_id`.
pub fn join_messages(recipient_id: Uuid, access_token: &str, reference: u64) -> Frame {
    Frame {
        topic: messages_topic(recipient_id),
        event: EVENT_JOIN.into(),
        payload: json!({
            "config": {
                "broadcast": { "ack": false, "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "INSERT",
                    "schema": "public",
                    "table": "messages",
                    "filter": format!("recipient_id=eq.{}", recipient_id),
                }],
            },
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

pub fn leave(topic: &str, reference: u64) -> Frame {
    Frame {
        topic: topic.into(),
        event: EVENT_LEAVE.into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

pub fn heartbeat(reference: u64) -> Frame {
    Frame {
        topic: HEARTBEAT_TOPIC.into(),
        event: EVENT_HEARTBEAT.into(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// The inserted row of a `postgres_changes` INSERT on `messages`.
pub fn decode_message_insert(frame: &Frame) -> Option<Message> {
    if frame.event != EVENT_POSTGRES_CHANGES {
        return None;
    }
    let data = frame.payload.get("data")?;
    if data.get("type").and_then(Value::as_str) != Some("INSERT")
        || data.get("table").and_then(Value::as_str) != Some("messages")
    {
        return None;
    }
    serde_json::from_value(data.get("record")?.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_asks_for_filtered_message_inserts() {
        let id = Uuid::parse_str("0b7a2c1e-2f7c-4c61-8e1d-3c2b9a4d5e02").unwrap();
        let frame = join_messages(id, "token", 1);
        let value: Value = serde_json::from_str(&frame.to_text()).unwrap();

        assert_eq!(value["topic"], "realtime:messages-for-0b7a2c1e-2f7c-4c61-8e1d-3c2b9a4d5e02");
        assert_eq!(value["event"], "phx_join");
        assert_eq!(value["ref"], "1");
        let change = &value["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["filter"], "recipient_id=eq.0b7a2c1e-2f7c-4c61-8e1d-3c2b9a4d5e02");
        assert_eq!(value["payload"]["access_token"], "token");
    }

    #[test]
    fn heartbeat_targets_the_phoenix_topic() {
        let frame = heartbeat(7);
        assert_eq!(frame.topic, "phoenix");
        assert_eq!(frame.event, "heartbeat");
    }

    #[test]
    fn decodes_inserted_message_record() {
        let text = r#"{
            "topic": "realtime:messages-for-x",
            "event": "postgres_changes",
            "ref": null,
            "payload": {
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "schema": "public",
                    "table": "messages",
                    "commit_timestamp": "2025-05-01T10:00:00Z",
                    "record": {
                        "id": "6f1c3f0e-6a55-4d3c-9c41-5d8f0b3b1a01",
                        "sender_id": "0b7a2c1e-2f7c-4c61-8e1d-3c2b9a4d5e02",
                        "recipient_id": "0b7a2c1e-2f7c-4c61-8e1d-3c2b9a4d5e03",
                        "content": "hi",
                        "created_at": "2025-05-01T10:00:00+00:00"
                    }
                }
            }
        }"#;
        let frame = Frame::parse(text).unwrap();
        let message = decode_message_insert(&frame).unwrap();
        assert_eq!(message.content, "hi");
    }

    #[test]
    fn ignores_replies_and_other_tables() {
        let reply = Frame::parse(
            r#"{"topic":"t","event":"phx_reply","ref":"1","payload":{"status":"ok","response":{}}}"#,
        )
        .unwrap();
        assert!(reply.is_ok_reply());
        assert!(decode_message_insert(&reply).is_none());

        let other = Frame::parse(
            r#"{"topic":"t","event":"postgres_changes","payload":{"data":{"type":"INSERT","table":"posts","record":{}}}}"#,
        )
        .unwrap();
        assert!(decode_message_insert(&other).is_none());
    }
}
