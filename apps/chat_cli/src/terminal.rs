use std::io::{self, Write};

use chrono::Local;
use client_core::{
    model::Member,
    surface::{LineId, LineOrigin},
    MemorySurfaces, RenderedLine, Surfaces,
};
use shared::domain::{EventId, RoomId, UserId};

/// Keeps every surface in memory and echoes new or rewritten lines to a
/// writer, one room or server tag per line.
pub struct TerminalSurfaces<W: Write + Send> {
    inner: MemorySurfaces,
    out: W,
}

impl TerminalSurfaces<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSurfaces<W> {
    pub fn new(out: W) -> Self {
        Self {
            inner: MemorySurfaces::new(),
            out,
        }
    }

    #[cfg(test)]
    pub fn into_writer(self) -> W {
        self.out
    }

    fn label(&self, room: &RoomId) -> String {
        self.inner
            .room(room)
            .map(|surface| surface.name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| room.to_string())
    }

    fn emit(&mut self, text: String) {
        // A closed stdout leaves nothing useful to report to.
        let _ = writeln!(self.out, "{text}");
    }

    fn render(&self, room: &RoomId, line: &RenderedLine, marker: &str) -> String {
        let time = line.date.with_timezone(&Local).format("%H:%M:%S");
        let origin = match line.tags.origin {
            LineOrigin::Backlog => "~",
            LineOrigin::Live => "",
        };
        format!(
            "[{}] {time}{origin}{marker} {}\t{}",
            self.label(room),
            line.prefix,
            line.message
        )
    }
}

impl<W: Write + Send> Surfaces for TerminalSurfaces<W> {
    fn create_room(&mut self, room: &RoomId, name: &str) {
        self.inner.create_room(room, name);
        self.emit(format!("[{name}] opened {room}"));
    }

    fn destroy_room(&mut self, room: &RoomId) {
        let label = self.label(room);
        self.inner.destroy_room(room);
        self.emit(format!("[{label}] closed"));
    }

    fn has_room(&self, room: &RoomId) -> bool {
        self.inner.has_room(room)
    }

    fn rename_room(&mut self, room: &RoomId, name: &str) {
        let old = self.label(room);
        self.inner.rename_room(room, name);
        if old != name {
            self.emit(format!("[{old}] is now known as {name}"));
        }
    }

    fn set_title(&mut self, room: &RoomId, title: &str) {
        self.inner.set_title(room, title);
    }

    fn set_highlights(&mut self, room: &RoomId, words: &[String]) {
        self.inner.set_highlights(room, words);
    }

    fn print_line(&mut self, room: &RoomId, line: RenderedLine) {
        let text = self.render(room, &line, "");
        self.inner.print_line(room, line);
        self.emit(text);
    }

    fn server_message(&mut self, server: &str, text: &str) {
        self.inner.server_message(server, text);
        self.emit(format!("[{server}] {text}"));
    }

    fn upsert_member(&mut self, room: &RoomId, member: &Member) {
        self.inner.upsert_member(room, member);
    }

    fn remove_member(&mut self, room: &RoomId, user: &UserId) {
        self.inner.remove_member(room, user);
    }

    fn find_line_by_id(&self, room: &RoomId, event_id: &EventId) -> Option<LineId> {
        self.inner.find_line_by_id(room, event_id)
    }

    fn line(&self, room: &RoomId, line: LineId) -> Option<&RenderedLine> {
        self.inner.line(room, line)
    }

    fn update_line(&mut self, room: &RoomId, line: LineId, updated: RenderedLine) {
        let text = self.render(room, &updated, "*");
        self.inner.update_line(room, line, updated);
        self.emit(text);
    }

    fn sort_lines_by_date(&mut self, room: &RoomId) {
        self.inner.sort_lines_by_date(room);
    }
}
