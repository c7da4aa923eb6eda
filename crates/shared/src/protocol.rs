use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{EventId, RoomId, UserId};

pub mod event_type {
    pub const ALIASES: &str = "m.room.aliases";
    pub const MEMBER: &str = "m.room.member";
    pub const MESSAGE: &str = "m.room.message";
    pub const TOPIC: &str = "m.room.topic";
    pub const REDACTION: &str = "m.room.redaction";
    pub const POWER_LEVELS: &str = "m.room.power_levels";
    pub const NAME: &str = "m.room.name";
    pub const ENCRYPTION: &str = "m.room.encryption";
    pub const ENCRYPTED: &str = "m.room.encrypted";

    /// State types that carry nothing the client presents.
    pub const IGNORED: &[&str] = &[
        "m.room.create",
        "m.room.join_rules",
        "m.room.history_visibility",
        "m.room.canonical_alias",
        "m.room.guest_access",
        "m.room.third_party_invite",
        ENCRYPTED,
    ];
}

pub mod msgtype {
    pub const TEXT: &str = "m.text";
    pub const NOTICE: &str = "m.notice";
    pub const EMOTE: &str = "m.emote";
}

pub const HTML_FORMAT: &str = "org.matrix.custom.html";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: String,
    pub password: String,
    pub initial_device_display_name: String,
}

impl LoginRequest {
    pub fn password(
        user: impl Into<String>,
        password: impl Into<String>,
        device_name: impl Into<String>,
    ) -> Self {
        Self {
            kind: "m.login.password".to_string(),
            user: user.into(),
            password: password.into(),
            initial_device_display_name: device_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user_id: UserId,
}

/// Filter sent with every sync request to bound the timeline size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncFilter {
    pub room: RoomFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomFilter {
    pub timeline: TimelineFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineFilter {
    pub limit: u32,
}

impl SyncFilter {
    pub fn timeline_limit(limit: u32) -> Self {
        Self {
            room: RoomFilter {
                timeline: TimelineFilter { limit },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    pub next_batch: String,
    #[serde(default)]
    pub rooms: SyncRooms,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRooms {
    #[serde(default)]
    pub join: BTreeMap<RoomId, JoinedRoom>,
    #[serde(default)]
    pub invite: BTreeMap<RoomId, InvitedRoom>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinedRoom {
    #[serde(default)]
    pub state: EventList,
    #[serde(default)]
    pub timeline: Timeline,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<RawEvent>,
    #[serde(default)]
    pub prev_batch: Option<String>,
    #[serde(default)]
    pub limited: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitedRoom {
    #[serde(default)]
    pub invite_state: EventList,
}

/// An event as delivered on the wire; `content` is decoded per type later.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub sender: UserId,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub unsigned: Unsigned,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacts: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Unsigned {
    #[serde(default)]
    pub age: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_by: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_because: Option<Box<RawEvent>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub chunk: Vec<RawEvent>,
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub event_id: EventId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub msgtype: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
}

impl MessageBody {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            msgtype: msgtype::TEXT.to_string(),
            body: body.into(),
            format: None,
            formatted_body: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicBody {
    pub topic: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedactBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteBody {
    pub user_id: UserId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_response_tolerates_missing_sections() {
        let batch: SyncResponse =
            serde_json::from_str(r#"{"next_batch":"s1"}"#).expect("sync body");
        assert_eq!(batch.next_batch, "s1");
        assert!(batch.rooms.join.is_empty());
        assert!(batch.rooms.invite.is_empty());
    }

    #[test]
    fn raw_event_reads_redaction_linkage() {
        let event: RawEvent = serde_json::from_value(serde_json::json!({
            "event_id": "$m1",
            "type": "m.room.message",
            "sender": "@alice:example.org",
            "content": {},
            "unsigned": {
                "age": 1200,
                "redacted_by": "$r1",
                "redacted_because": {
                    "type": "m.room.redaction",
                    "sender": "@mod:example.org",
                    "content": {"reason": "spam"}
                }
            }
        }))
        .expect("event");
        assert_eq!(event.unsigned.redacted_by, Some(EventId::from("$r1")));
        let because = event.unsigned.redacted_because.expect("because");
        assert_eq!(because.sender.as_str(), "@mod:example.org");
    }

    #[test]
    fn login_request_uses_password_flow() {
        let req = LoginRequest::password("alice", "hunter2", "chat_cli");
        let value = serde_json::to_value(&req).expect("login json");
        assert_eq!(value["type"], "m.login.password");
        assert_eq!(value["initial_device_display_name"], "chat_cli");
    }
}
