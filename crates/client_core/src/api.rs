use serde::Serialize;
use serde_json::json;
use shared::{
    domain::{EventId, RoomId, UserId},
    protocol::{
        event_type, InviteBody, LoginRequest, MessageBody, RedactBody, SyncFilter, TopicBody,
    },
};
use url::{Position, Url};
use uuid::Uuid;

use crate::{
    config::EngineOptions,
    error::EngineError,
    http::HttpRequest,
    request::{LocalEcho, OutgoingRequest, RequestKind},
};

const API_PREFIX: [&str; 3] = ["_matrix", "client", "r0"];

/// Builds client-server API requests against one homeserver.
#[derive(Debug, Clone)]
pub struct ClientApi {
    base: Url,
}

impl ClientApi {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    /// Origin-form request target (`/path?query`) for the given API path.
    pub fn target(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.clear().extend(API_PREFIX).extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url[Position::BeforePath..].to_string()
    }

    pub fn login(
        &self,
        user: &str,
        password: &str,
        device_name: &str,
    ) -> Result<OutgoingRequest, EngineError> {
        let body = LoginRequest::password(user, password, device_name);
        let http = HttpRequest::post_json(self.target(&["login"], &[]), &body)?;
        Ok(OutgoingRequest::new(RequestKind::Login, http))
    }

    pub fn sync(
        &self,
        since: Option<&str>,
        options: &EngineOptions,
    ) -> Result<OutgoingRequest, EngineError> {
        let filter = serde_json::to_string(&SyncFilter::timeline_limit(
            options.max_initial_sync_events,
        ))?;
        let timeout = options.sync_timeout_ms.to_string();
        let mut query = vec![("timeout", timeout.as_str()), ("filter", filter.as_str())];
        if let Some(since) = since {
            query.push(("since", since));
        }
        let http = HttpRequest::get(self.target(&["sync"], &query));
        Ok(OutgoingRequest::new(RequestKind::Sync, http))
    }

    pub fn send_message(
        &self,
        room_id: &RoomId,
        body: &MessageBody,
        echo: LocalEcho,
    ) -> Result<OutgoingRequest, EngineError> {
        let txn = Uuid::new_v4().to_string();
        let target = self.target(
            &["rooms", room_id.as_str(), "send", event_type::MESSAGE, &txn],
            &[],
        );
        let http = HttpRequest::put_json(target, body)?;
        Ok(OutgoingRequest::new(RequestKind::SendMessage, http)
            .with_room(room_id.clone())
            .with_echo(echo))
    }

    pub fn set_state<T: Serialize>(
        &self,
        room_id: &RoomId,
        state_type: &str,
        body: &T,
    ) -> Result<OutgoingRequest, EngineError> {
        let target = self.target(&["rooms", room_id.as_str(), "state", state_type], &[]);
        let http = HttpRequest::put_json(target, body)?;
        Ok(OutgoingRequest::new(RequestKind::StateChange, http).with_room(room_id.clone()))
    }

    pub fn set_topic(&self, room_id: &RoomId, topic: &str) -> Result<OutgoingRequest, EngineError> {
        self.set_state(
            room_id,
            event_type::TOPIC,
            &TopicBody {
                topic: topic.to_string(),
            },
        )
    }

    pub fn redact(
        &self,
        room_id: &RoomId,
        event_id: &EventId,
        reason: Option<&str>,
    ) -> Result<OutgoingRequest, EngineError> {
        let txn = Uuid::new_v4().to_string();
        let target = self.target(
            &["rooms", room_id.as_str(), "redact", event_id.as_str(), &txn],
            &[],
        );
        let body = RedactBody {
            reason: reason.map(str::to_string),
        };
        let http = HttpRequest::put_json(target, &body)?;
        Ok(OutgoingRequest::new(RequestKind::Redact, http)
            .with_room(room_id.clone())
            .with_target(event_id.clone()))
    }

    pub fn room_messages(
        &self,
        room_id: &RoomId,
        from: &str,
        limit: u32,
    ) -> Result<OutgoingRequest, EngineError> {
        let limit = limit.to_string();
        let target = self.target(
            &["rooms", room_id.as_str(), "messages"],
            &[("from", from), ("dir", "b"), ("limit", limit.as_str())],
        );
        Ok(
            OutgoingRequest::new(RequestKind::BacklogFetch, HttpRequest::get(target))
                .with_room(room_id.clone()),
        )
    }

    pub fn join(&self, room: &str) -> Result<OutgoingRequest, EngineError> {
        let http = HttpRequest::post_json(self.target(&["join", room], &[]), &json!({}))?;
        Ok(OutgoingRequest::new(RequestKind::Join, http).with_room(RoomId::from(room)))
    }

    pub fn part(&self, room_id: &RoomId) -> Result<OutgoingRequest, EngineError> {
        let target = self.target(&["rooms", room_id.as_str(), "leave"], &[]);
        let http = HttpRequest::post_json(target, &json!({}))?;
        Ok(OutgoingRequest::new(RequestKind::Part, http).with_room(room_id.clone()))
    }

    pub fn invite(&self, room_id: &RoomId, user: &UserId) -> Result<OutgoingRequest, EngineError> {
        let target = self.target(&["rooms", room_id.as_str(), "invite"], &[]);
        let body = InviteBody {
            user_id: user.clone(),
        };
        let http = HttpRequest::post_json(target, &body)?;
        Ok(OutgoingRequest::new(RequestKind::Invite, http).with_room(room_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    fn api() -> ClientApi {
        ClientApi::new(Url::parse("https://chat.example.org:8448/").expect("url"))
    }

    #[test]
    fn sync_target_carries_cursor_and_filter() {
        let opts = EngineOptions::default();
        let req = api().sync(Some("s42"), &opts).expect("sync");
        assert_eq!(req.kind, RequestKind::Sync);
        assert_eq!(req.http.method, Method::Get);
        let target = &req.http.target;
        assert!(target.starts_with("/_matrix/client/r0/sync?"));
        assert!(target.contains("since=s42"));
        assert!(target.contains("timeout=30000"));
        assert!(target.contains("filter="));
    }

    #[test]
    fn initial_sync_has_no_cursor() {
        let req = api().sync(None, &EngineOptions::default()).expect("sync");
        assert!(!req.http.target.contains("since="));
    }

    #[test]
    fn send_message_targets_room_and_keeps_echo() {
        let room = RoomId::from("!abc:example.org");
        let echo = LocalEcho {
            author: "alice".into(),
            text: "hi".into(),
        };
        let req = api()
            .send_message(&room, &MessageBody::text("hi"), echo.clone())
            .expect("send");
        assert_eq!(req.http.method, Method::Put);
        assert!(req
            .http
            .target
            .starts_with("/_matrix/client/r0/rooms/!abc:example.org/send/m.room.message/"));
        assert_eq!(req.room_id, Some(room));
        assert_eq!(req.echo, Some(echo));
    }

    #[test]
    fn backlog_request_pages_backwards() {
        let room = RoomId::from("!abc:example.org");
        let req = api().room_messages(&room, "t1-2", 10).expect("messages");
        assert_eq!(req.kind, RequestKind::BacklogFetch);
        assert!(req.http.target.contains("from=t1-2"));
        assert!(req.http.target.contains("dir=b"));
        assert!(req.http.target.contains("limit=10"));
    }

    #[test]
    fn alias_is_escaped_in_join_path() {
        let req = api().join("#lobby:example.org").expect("join");
        assert_eq!(req.http.target, "/_matrix/client/r0/join/%23lobby:example.org");
    }

    #[test]
    fn topic_is_a_state_change() {
        let room = RoomId::from("!abc:example.org");
        let req = api().set_topic(&room, "release day").expect("topic");
        assert_eq!(req.kind, RequestKind::StateChange);
        assert!(req.http.target.ends_with("/state/m.room.topic"));
        assert!(req.http.body_text().contains("release day"));
    }
}
