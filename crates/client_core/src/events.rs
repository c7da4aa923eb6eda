use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::{EventId, UserId},
    protocol::{event_type, RawEvent},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    Join,
    Leave,
    Invite,
    Other(String),
}

impl Membership {
    fn parse(value: &str) -> Self {
        match value {
            "join" => Membership::Join,
            // A ban removes the member just like a leave.
            "leave" | "ban" => Membership::Leave,
            "invite" => Membership::Invite,
            other => Membership::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub msgtype: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub formatted_body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AliasesContent {
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct MemberContent {
    #[serde(default)]
    membership: Option<String>,
    #[serde(default)]
    displayname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopicContent {
    #[serde(default)]
    topic: String,
}

#[derive(Debug, Deserialize)]
struct NameContent {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RedactionContent {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PowerLevelsContent {
    #[serde(default)]
    users: BTreeMap<UserId, i64>,
}

/// A wire event decoded into what the room model acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    Aliases(Option<String>),
    Member {
        user: UserId,
        membership: Membership,
        display_name: Option<String>,
    },
    Message,
    Topic(String),
    Redaction {
        redacts: EventId,
        reason: Option<String>,
    },
    PowerLevels(BTreeMap<UserId, i64>),
    Name(String),
    Encryption,
    Ignored,
    Unknown(String),
}

#[derive(Debug, thiserror::Error)]
pub enum EventDecodeError {
    #[error("malformed {kind} content: {source}")]
    Content {
        kind: String,
        source: serde_json::Error,
    },
    #[error("{kind} event without a target")]
    MissingTarget { kind: String },
}

fn content<T: DeserializeOwned>(raw: &RawEvent) -> Result<T, EventDecodeError> {
    let decoded = if raw.content.is_null() {
        T::deserialize(&serde_json::Value::Object(Default::default()))
    } else {
        T::deserialize(&raw.content)
    };
    decoded.map_err(|source| EventDecodeError::Content {
        kind: raw.kind.clone(),
        source,
    })
}

pub fn decode(raw: &RawEvent) -> Result<RoomEvent, EventDecodeError> {
    let event = match raw.kind.as_str() {
        event_type::ALIASES => {
            let body: AliasesContent = content(raw)?;
            RoomEvent::Aliases(body.aliases.last().cloned())
        }
        event_type::MEMBER => {
            let body: MemberContent = content(raw)?;
            let membership = body
                .membership
                .as_deref()
                .or(raw.membership.as_deref())
                .map(Membership::parse)
                .unwrap_or(Membership::Other(String::new()));
            // The subject is the state key; older servers only set the sender.
            let user = raw
                .state_key
                .as_deref()
                .filter(|key| !key.is_empty())
                .map(UserId::from)
                .unwrap_or_else(|| raw.sender.clone());
            RoomEvent::Member {
                user,
                membership,
                display_name: body.displayname,
            }
        }
        event_type::MESSAGE => RoomEvent::Message,
        event_type::TOPIC => {
            let body: TopicContent = content(raw)?;
            RoomEvent::Topic(body.topic)
        }
        event_type::REDACTION => {
            let body: RedactionContent = content(raw)?;
            let redacts = raw
                .redacts
                .clone()
                .ok_or_else(|| EventDecodeError::MissingTarget {
                    kind: raw.kind.clone(),
                })?;
            RoomEvent::Redaction {
                redacts,
                reason: body.reason,
            }
        }
        event_type::POWER_LEVELS => {
            let body: PowerLevelsContent = content(raw)?;
            RoomEvent::PowerLevels(body.users)
        }
        event_type::NAME => {
            let body: NameContent = content(raw)?;
            RoomEvent::Name(body.name)
        }
        event_type::ENCRYPTION => RoomEvent::Encryption,
        kind if event_type::IGNORED.contains(&kind) => RoomEvent::Ignored,
        other => RoomEvent::Unknown(other.to_string()),
    };
    Ok(event)
}

pub fn message_content(raw: &RawEvent) -> Result<MessageContent, EventDecodeError> {
    content(raw)
}
