use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use shared::domain::{EventId, RoomId, UserId};

/// Color tag used for the local user's own nick.
pub const SELF_COLOR: &str = "self";

const NICK_PALETTE: [&str; 10] = [
    "cyan",
    "magenta",
    "green",
    "brown",
    "lightblue",
    "default",
    "lightcyan",
    "lightmagenta",
    "lightgreen",
    "blue",
];

pub fn rank_prefix(power_level: i64) -> &'static str {
    if power_level >= 100 {
        "&"
    } else if power_level >= 50 {
        "@"
    } else if power_level > 0 {
        "+"
    } else {
        ""
    }
}

/// Stable palette entry for a nick, so a user keeps their color across runs.
pub fn nick_color(name: &str) -> &'static str {
    let hash = name
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    NICK_PALETTE[(hash as usize) % NICK_PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: UserId,
    pub display_name: String,
    pub power_level: i64,
    pub prefix: &'static str,
    pub color: String,
    pub is_self: bool,
}

impl Member {
    /// Falls back to the identifier's localpart when no display name is set.
    pub fn new(user_id: UserId, display_name: Option<&str>, is_self: bool) -> Self {
        let display_name = match display_name {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => user_id.localpart().to_string(),
        };
        let color = if is_self {
            SELF_COLOR.to_string()
        } else {
            nick_color(user_id.localpart()).to_string()
        };
        Self {
            user_id,
            display_name,
            power_level: 0,
            prefix: "",
            color,
            is_self,
        }
    }

    pub fn set_power_level(&mut self, level: i64) {
        self.power_level = level;
        self.prefix = rank_prefix(level);
    }

    /// Words that should highlight a line for the local user.
    pub fn highlight_words(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            self.user_id.localpart().to_string(),
            self.display_name.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub author: UserId,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: RoomId,
    pub alias: String,
    pub topic: Option<Topic>,
    pub prev_batch: Option<String>,
    pub encrypted: bool,
    members: HashMap<UserId, Member>,
}

impl Room {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            alias: room_id.to_string(),
            room_id,
            topic: None,
            prev_batch: None,
            encrypted: false,
            members: HashMap::new(),
        }
    }

    pub fn member(&self, user: &UserId) -> Option<&Member> {
        self.members.get(user)
    }

    pub fn member_mut(&mut self, user: &UserId) -> Option<&mut Member> {
        self.members.get_mut(user)
    }

    /// Inserts or replaces; a re-join keeps the member's power level.
    pub fn upsert_member(&mut self, mut member: Member) -> &Member {
        if let Some(existing) = self.members.get(&member.user_id) {
            member.set_power_level(existing.power_level);
        }
        let user = member.user_id.clone();
        self.members.insert(user.clone(), member);
        &self.members[&user]
    }

    pub fn remove_member(&mut self, user: &UserId) -> Option<Member> {
        self.members.remove(user)
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// All rooms of one server plus the echo-suppression set.
#[derive(Debug, Default)]
pub struct RoomStore {
    rooms: HashMap<RoomId, Room>,
    ignored_events: HashSet<EventId>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Returns the room, creating it on first sight. The flag is true when created.
    pub fn ensure_room(&mut self, room_id: &RoomId) -> (&mut Room, bool) {
        let created = !self.rooms.contains_key(room_id);
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        (room, created)
    }

    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn ignore_event(&mut self, event_id: EventId) {
        self.ignored_events.insert(event_id);
    }

    /// Consumes an ignore entry; true when the event should be skipped.
    pub fn take_ignored(&mut self, event_id: &EventId) -> bool {
        self.ignored_events.remove(event_id)
    }

    pub fn ignored_len(&self) -> usize {
        self.ignored_events.len()
    }
}
