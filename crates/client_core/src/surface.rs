use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use shared::domain::{EventId, RoomId, UserId};

use crate::model::Member;

/// Position of a line within one room surface.
pub type LineId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOrigin {
    Live,
    Backlog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Message,
    Notice,
    Emote,
    Topic,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineTags {
    pub event_id: Option<EventId>,
    pub kind: LineKind,
    pub origin: LineOrigin,
    pub self_message: bool,
    pub redacted: bool,
    pub nick: Option<String>,
    pub nick_color: Option<String>,
}

impl LineTags {
    pub fn new(kind: LineKind, origin: LineOrigin) -> Self {
        Self {
            event_id: None,
            kind,
            origin,
            self_message: false,
            redacted: false,
            nick: None,
            nick_color: None,
        }
    }

    pub fn with_event(mut self, event_id: Option<EventId>) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_nick(mut self, nick: impl Into<String>, color: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self.nick_color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    pub date: DateTime<Utc>,
    pub prefix: String,
    pub message: String,
    pub tags: LineTags,
}

/// What the engine needs from whatever displays rooms.
pub trait Surfaces {
    fn create_room(&mut self, room: &RoomId, name: &str);
    fn destroy_room(&mut self, room: &RoomId);
    fn has_room(&self, room: &RoomId) -> bool;
    fn rename_room(&mut self, room: &RoomId, name: &str);
    fn set_title(&mut self, room: &RoomId, title: &str);
    fn set_highlights(&mut self, room: &RoomId, words: &[String]);
    fn print_line(&mut self, room: &RoomId, line: RenderedLine);
    /// One line of text on the per-server surface.
    fn server_message(&mut self, server: &str, text: &str);
    fn upsert_member(&mut self, room: &RoomId, member: &Member);
    fn remove_member(&mut self, room: &RoomId, user: &UserId);
    /// Newest line tagged with `event_id`, searching from the end.
    fn find_line_by_id(&self, room: &RoomId, event_id: &EventId) -> Option<LineId>;
    fn line(&self, room: &RoomId, line: LineId) -> Option<&RenderedLine>;
    fn update_line(&mut self, room: &RoomId, line: LineId, updated: RenderedLine);
    /// Stable sort by date, so equal timestamps keep arrival order.
    fn sort_lines_by_date(&mut self, room: &RoomId);
}

#[derive(Debug, Clone, Default)]
pub struct RoomSurface {
    pub name: String,
    pub title: String,
    pub highlights: Vec<String>,
    pub lines: Vec<RenderedLine>,
    pub members: BTreeMap<UserId, Member>,
}

/// Surfaces kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemorySurfaces {
    rooms: HashMap<RoomId, RoomSurface>,
    server_lines: Vec<(String, String)>,
}

impl MemorySurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room(&self, room: &RoomId) -> Option<&RoomSurface> {
        self.rooms.get(room)
    }

    pub fn lines(&self, room: &RoomId) -> &[RenderedLine] {
        self.rooms
            .get(room)
            .map(|surface| surface.lines.as_slice())
            .unwrap_or_default()
    }

    pub fn messages(&self, room: &RoomId) -> Vec<&str> {
        self.lines(room).iter().map(|l| l.message.as_str()).collect()
    }

    pub fn server_lines(&self) -> impl Iterator<Item = &str> {
        self.server_lines.iter().map(|(_, text)| text.as_str())
    }

    pub fn take_server_lines(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.server_lines)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Surfaces for MemorySurfaces {
    fn create_room(&mut self, room: &RoomId, name: &str) {
        let surface = self.rooms.entry(room.clone()).or_default();
        surface.name = name.to_string();
    }

    fn destroy_room(&mut self, room: &RoomId) {
        self.rooms.remove(room);
    }

    fn has_room(&self, room: &RoomId) -> bool {
        self.rooms.contains_key(room)
    }

    fn rename_room(&mut self, room: &RoomId, name: &str) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.name = name.to_string();
        }
    }

    fn set_title(&mut self, room: &RoomId, title: &str) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.title = title.to_string();
        }
    }

    fn set_highlights(&mut self, room: &RoomId, words: &[String]) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.highlights = words.to_vec();
        }
    }

    fn print_line(&mut self, room: &RoomId, line: RenderedLine) {
        self.rooms.entry(room.clone()).or_default().lines.push(line);
    }

    fn server_message(&mut self, server: &str, text: &str) {
        self.server_lines.push((server.to_string(), text.to_string()));
    }

    fn upsert_member(&mut self, room: &RoomId, member: &Member) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.members.insert(member.user_id.clone(), member.clone());
        }
    }

    fn remove_member(&mut self, room: &RoomId, user: &UserId) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.members.remove(user);
        }
    }

    fn find_line_by_id(&self, room: &RoomId, event_id: &EventId) -> Option<LineId> {
        self.rooms.get(room)?.lines.iter().rposition(|line| {
            line.tags
                .event_id
                .as_ref()
                .is_some_and(|id| id == event_id)
        })
    }

    fn line(&self, room: &RoomId, line: LineId) -> Option<&RenderedLine> {
        self.rooms.get(room)?.lines.get(line)
    }

    fn update_line(&mut self, room: &RoomId, line: LineId, updated: RenderedLine) {
        if let Some(slot) = self
            .rooms
            .get_mut(room)
            .and_then(|surface| surface.lines.get_mut(line))
        {
            *slot = updated;
        }
    }

    fn sort_lines_by_date(&mut self, room: &RoomId) {
        if let Some(surface) = self.rooms.get_mut(room) {
            surface.lines.sort_by_key(|line| line.date);
        }
    }
}
