use std::{fmt, time::Instant};

use shared::domain::{EventId, RoomId};

use crate::http::HttpRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Login,
    Sync,
    SendMessage,
    StateChange,
    Redact,
    BacklogFetch,
    Join,
    Part,
    Invite,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Login => "login",
            RequestKind::Sync => "sync",
            RequestKind::SendMessage => "send",
            RequestKind::StateChange => "state",
            RequestKind::Redact => "redact",
            RequestKind::BacklogFetch => "room_messages",
            RequestKind::Join => "join",
            RequestKind::Part => "part",
            RequestKind::Invite => "invite",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the client already knows about a message it is sending, so the
/// confirmation can be rendered without waiting for the sync echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEcho {
    pub author: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy)]
pub struct TimingMarks {
    pub created: Instant,
    pub sent: Option<Instant>,
    pub received: Option<Instant>,
}

impl TimingMarks {
    fn now() -> Self {
        Self {
            created: Instant::now(),
            sent: None,
            received: None,
        }
    }

    /// `(send delay, receive delay, handling, total)` in milliseconds.
    pub fn report(&self, handled: Instant) -> (f64, f64, f64, f64) {
        let sent = self.sent.unwrap_or(self.created);
        let received = self.received.unwrap_or(sent);
        let ms = |from: Instant, to: Instant| to.saturating_duration_since(from).as_secs_f64() * 1000.0;
        (
            ms(self.created, sent),
            ms(sent, received),
            ms(received, handled),
            ms(self.created, handled),
        )
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub seq: u64,
    pub kind: RequestKind,
    pub http: HttpRequest,
    pub room_id: Option<RoomId>,
    pub target: Option<EventId>,
    pub echo: Option<LocalEcho>,
    pub marks: TimingMarks,
}

impl OutgoingRequest {
    pub fn new(kind: RequestKind, http: HttpRequest) -> Self {
        Self {
            seq: 0,
            kind,
            http,
            room_id: None,
            target: None,
            echo: None,
            marks: TimingMarks::now(),
        }
    }

    pub fn with_room(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    pub fn with_target(mut self, target: EventId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_echo(mut self, echo: LocalEcho) -> Self {
        self.echo = Some(echo);
        self
    }

    pub fn mark_sent(&mut self) {
        self.marks.sent = Some(Instant::now());
    }

    pub fn mark_received(&mut self) {
        self.marks.received = Some(Instant::now());
    }
}
