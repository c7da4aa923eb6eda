//! Applies decoded server data to the room model and the display surfaces.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use shared::{
    domain::{strip_server, EventId, RoomId, UserId},
    protocol::{event_type, msgtype, MessagesResponse, RawEvent, SyncRooms, HTML_FORMAT},
};
use tracing::{debug, info, warn};

use crate::{
    config::RedactionMode,
    events::{self, Membership, RoomEvent},
    markup,
    model::{nick_color, Member, Room, RoomStore, Topic, SELF_COLOR},
    request::LocalEcho,
    surface::{LineKind, LineOrigin, LineTags, RenderedLine, Surfaces},
};

pub const ENCRYPTED_ROOM_NOTICE: &str = "This room is encrypted, encryption is currently unsupported. Message sending is disabled for this room.";

/// Per-call inputs that do not live in the room store.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub server: &'a str,
    pub own_user: Option<&'a UserId>,
    pub redactions: RedactionMode,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogOutcome {
    /// The server has no older events.
    Exhausted,
    Applied { lines: usize },
}

/// `now - age`. A missing, negative or out of range age means "now".
pub fn date_from_age(now: DateTime<Utc>, age_ms: Option<i64>) -> DateTime<Utc> {
    Duration::try_milliseconds(age_ms.unwrap_or(0).max(0))
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(now)
}

pub fn redaction_notice(censor: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("<Message redacted by: {censor}, reason: \"{reason}\">"),
        None => format!("<Message redacted by: {censor}>"),
    }
}

fn diagnostic(surfaces: &mut dyn Surfaces, ctx: &ApplyContext<'_>, text: &str) {
    warn!(target: "chat::messaging", "apply: {text} server={}", ctx.server);
    surfaces.server_message(ctx.server, text);
}

/// Applies the joined and invited sections of one sync batch.
pub fn apply_sync_rooms(
    rooms: &mut RoomStore,
    surfaces: &mut dyn Surfaces,
    ctx: &ApplyContext<'_>,
    batch: &SyncRooms,
) {
    for (room_id, joined) in &batch.join {
        if room_id.as_str().is_empty() {
            continue;
        }
        let (room, created) = rooms.ensure_room(room_id);
        if created || !surfaces.has_room(room_id) {
            surfaces.create_room(room_id, strip_server(room_id.as_str()));
            debug!(target: "chat::messaging", "apply: created room room={room_id}");
        }
        if room.prev_batch.is_none() {
            room.prev_batch = joined.timeline.prev_batch.clone();
        }

        apply_room_events(rooms, surfaces, ctx, room_id, &joined.state.events);
        apply_room_events(rooms, surfaces, ctx, room_id, &joined.timeline.events);
    }

    for (room_id, invited) in &batch.invite {
        for event in &invited.invite_state.events {
            if event.kind != event_type::MEMBER {
                continue;
            }
            if let Ok(RoomEvent::Member {
                membership: Membership::Invite,
                ..
            }) = events::decode(event)
            {
                let text = format!("You have been invited to {room_id} by {}", event.sender);
                info!(target: "chat::messaging", "apply: invited room={room_id} by={}", event.sender);
                surfaces.server_message(ctx.server, &text);
            }
        }
    }
}

/// Applies events in order, skipping (and consuming) ones on the ignore list.
pub fn apply_room_events(
    rooms: &mut RoomStore,
    surfaces: &mut dyn Surfaces,
    ctx: &ApplyContext<'_>,
    room_id: &RoomId,
    events: &[RawEvent],
) {
    for event in events {
        if let Some(id) = &event.event_id {
            if rooms.take_ignored(id) {
                debug!(target: "chat::messaging", "apply: skipped own echo event={id}");
                continue;
            }
        }
        apply_event(rooms, surfaces, ctx, room_id, event, LineOrigin::Live);
    }
}

pub fn apply_event(
    rooms: &mut RoomStore,
    surfaces: &mut dyn Surfaces,
    ctx: &ApplyContext<'_>,
    room_id: &RoomId,
    event: &RawEvent,
    origin: LineOrigin,
) {
    let decoded = match events::decode(event) {
        Ok(decoded) => decoded,
        Err(err) => {
            diagnostic(surfaces, ctx, &err.to_string());
            return;
        }
    };
    let Some(room) = rooms.get_mut(room_id) else {
        return;
    };

    match decoded {
        RoomEvent::Aliases(Some(alias)) if !alias.is_empty() => {
            surfaces.rename_room(room_id, &alias);
            room.alias = alias;
        }
        RoomEvent::Aliases(_) => {}
        RoomEvent::Member {
            user,
            membership: Membership::Join,
            display_name,
        } => {
            let is_self = ctx.own_user == Some(&user);
            let member = Member::new(user, display_name.as_deref(), is_self);
            if is_self {
                surfaces.set_highlights(room_id, &member.highlight_words());
            }
            let member = room.upsert_member(member);
            surfaces.upsert_member(room_id, member);
        }
        RoomEvent::Member {
            user,
            membership: Membership::Leave,
            ..
        } => {
            if room.remove_member(&user).is_some() {
                surfaces.remove_member(room_id, &user);
            }
        }
        RoomEvent::Member { .. } => {}
        RoomEvent::Message => render_message(room, surfaces, ctx, room_id, event, origin),
        RoomEvent::Topic(text) => {
            let date = date_from_age(ctx.now, event.unsigned.age);
            surfaces.set_title(room_id, &text);
            let author = room
                .member(&event.sender)
                .map(|m| m.display_name.clone())
                .unwrap_or_else(|| event.sender.to_string());
            let message = format!(
                "{author} has changed the topic for {} to \"{text}\"",
                strip_server(&room.alias)
            );
            room.topic = Some(Topic {
                text,
                author: event.sender.clone(),
                date,
            });
            surfaces.print_line(
                room_id,
                RenderedLine {
                    date,
                    prefix: "--".to_string(),
                    message,
                    tags: LineTags::new(LineKind::Topic, origin).with_event(event.event_id.clone()),
                },
            );
        }
        RoomEvent::Redaction { redacts, reason } => {
            redact_line(
                surfaces,
                ctx.redactions,
                room_id,
                &redacts,
                &event.sender,
                reason.as_deref(),
            );
        }
        RoomEvent::PowerLevels(users) => {
            for (user, level) in users {
                if let Some(member) = room.member_mut(&user) {
                    member.set_power_level(level);
                    surfaces.upsert_member(room_id, member);
                }
            }
        }
        RoomEvent::Name(name) => {
            if !name.is_empty() {
                surfaces.rename_room(room_id, &name);
                room.alias = name;
            }
        }
        RoomEvent::Encryption => {
            room.encrypted = true;
            surfaces.print_line(
                room_id,
                RenderedLine {
                    date: ctx.now,
                    prefix: "=!=".to_string(),
                    message: ENCRYPTED_ROOM_NOTICE.to_string(),
                    tags: LineTags::new(LineKind::Info, origin),
                },
            );
        }
        RoomEvent::Ignored => {}
        RoomEvent::Unknown(kind) => {
            diagnostic(
                surfaces,
                ctx,
                &format!("Handling of room event type {kind} not implemented"),
            );
        }
    }
}

fn render_message(
    room: &Room,
    surfaces: &mut dyn Surfaces,
    ctx: &ApplyContext<'_>,
    room_id: &RoomId,
    event: &RawEvent,
    origin: LineOrigin,
) {
    let date = date_from_age(ctx.now, event.unsigned.age);
    let (author, color) = match room.member(&event.sender) {
        Some(member) => (member.display_name.clone(), member.color.clone()),
        None => {
            let short = event.sender.localpart();
            (short.to_string(), nick_color(short).to_string())
        }
    };
    let mut tags = LineTags::new(LineKind::Message, origin)
        .with_event(event.event_id.clone())
        .with_nick(author.clone(), color);
    tags.self_message = ctx.own_user == Some(&event.sender);

    if event.unsigned.redacted_by.is_some() {
        let because = event.unsigned.redacted_because.as_deref();
        let censor = match because.map(|e| &e.sender) {
            Some(censor) => match room.member(censor) {
                Some(member) => format!("{} ({censor})", member.display_name),
                None => censor.localpart().to_string(),
            },
            None => "unknown".to_string(),
        };
        let reason = because.and_then(|e| e.content.get("reason").and_then(Value::as_str));
        tags.redacted = true;
        surfaces.print_line(
            room_id,
            RenderedLine {
                date,
                prefix: author,
                message: redaction_notice(&censor, reason),
                tags,
            },
        );
        return;
    }

    let content = match events::message_content(event) {
        Ok(content) => content,
        Err(err) => {
            diagnostic(surfaces, ctx, &err.to_string());
            return;
        }
    };
    let text = match (content.format.as_deref(), content.formatted_body.as_deref()) {
        (Some(HTML_FORMAT), Some(html)) => markup::html_to_text(html),
        _ => content.body,
    };

    let (kind, prefix, message) = match content.msgtype.as_deref().unwrap_or_default() {
        msgtype::TEXT => (LineKind::Message, author, text),
        msgtype::NOTICE => (LineKind::Notice, author, text),
        msgtype::EMOTE => (LineKind::Emote, "*".to_string(), format!("{author} {text}")),
        other => {
            diagnostic(
                surfaces,
                ctx,
                &format!("Handling of content type {other} not implemented"),
            );
            return;
        }
    };
    tags.kind = kind;
    surfaces.print_line(
        room_id,
        RenderedLine {
            date,
            prefix,
            message,
            tags,
        },
    );
}

/// Rewrites the newest line carrying `redacts`. Unknown ids and lines that
/// are already redacted are left alone; returns whether a line changed.
pub fn redact_line(
    surfaces: &mut dyn Surfaces,
    mode: RedactionMode,
    room_id: &RoomId,
    redacts: &EventId,
    censor: &UserId,
    reason: Option<&str>,
) -> bool {
    let Some(line_id) = surfaces.find_line_by_id(room_id, redacts) else {
        return false;
    };
    let Some(line) = surfaces.line(room_id, line_id) else {
        return false;
    };
    if line.tags.redacted {
        return false;
    }

    let notice = redaction_notice(censor.localpart(), reason);
    let mut updated = line.clone();
    updated.message = match mode {
        RedactionMode::Strikethrough => {
            format!("{} {notice}", markup::strikethrough(&line.message))
        }
        RedactionMode::Delete => notice,
        RedactionMode::Notice => format!("{} {notice}", line.message),
    };
    updated.tags.redacted = true;
    surfaces.update_line(room_id, line_id, updated);
    true
}

/// Applies one page of older events and merges it into the timeline.
pub fn apply_backlog(
    rooms: &mut RoomStore,
    surfaces: &mut dyn Surfaces,
    ctx: &ApplyContext<'_>,
    room_id: &RoomId,
    page: &MessagesResponse,
) -> BacklogOutcome {
    if page.chunk.is_empty() {
        return BacklogOutcome::Exhausted;
    }

    let (room, created) = rooms.ensure_room(room_id);
    if created || !surfaces.has_room(room_id) {
        surfaces.create_room(room_id, strip_server(room_id.as_str()));
    }

    let mut lines = 0;
    for event in page.chunk.iter().rev() {
        if event.kind == event_type::MESSAGE {
            render_message(room, surfaces, ctx, room_id, event, LineOrigin::Backlog);
            lines += 1;
        }
    }
    surfaces.sort_lines_by_date(room_id);

    if let Some(end) = &page.end {
        room.prev_batch = Some(end.clone());
    }
    BacklogOutcome::Applied { lines }
}

/// Prints a message the local user just sent, tagged with its event id so a
/// later redaction can find it.
pub fn print_local_echo(
    surfaces: &mut dyn Surfaces,
    now: DateTime<Utc>,
    room_id: &RoomId,
    echo: &LocalEcho,
    event_id: EventId,
) {
    let mut tags = LineTags::new(LineKind::Message, LineOrigin::Live)
        .with_event(Some(event_id))
        .with_nick(echo.author.clone(), SELF_COLOR);
    tags.self_message = true;
    surfaces.print_line(
        room_id,
        RenderedLine {
            date: now,
            prefix: echo.author.clone(),
            message: echo.text.clone(),
            tags,
        },
    );
}

#[cfg(test)]
#[path = "tests/apply_tests.rs"]
mod tests;
