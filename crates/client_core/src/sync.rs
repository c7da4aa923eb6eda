use shared::protocol::{SyncResponse, SyncRooms};
use tracing::debug;

/// What happened to one sync batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Same cursor as last time; nothing was applied.
    Unchanged,
    Applied,
}

/// The long-poll loop state: the `next_batch` cursor and whether the loop
/// should keep re-issuing.
///
/// The cursor only moves forward after a batch has been applied, so a batch
/// that fails half way is fetched again rather than skipped.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    cursor: Option<String>,
    running: bool,
}

impl SyncEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from a cursor persisted by an earlier session.
    pub fn resume_from(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Applies `batch` through `apply` unless it repeats the stored cursor,
    /// then commits the new cursor.
    pub fn process<F>(&mut self, batch: &SyncResponse, apply: F) -> SyncOutcome
    where
        F: FnOnce(&SyncRooms),
    {
        if self.cursor.as_deref() == Some(batch.next_batch.as_str()) {
            debug!(target: "chat::messaging", "sync: duplicate cursor next_batch={}", batch.next_batch);
            return SyncOutcome::Unchanged;
        }

        apply(&batch.rooms);
        self.cursor = Some(batch.next_batch.clone());
        debug!(
            target: "chat::messaging",
            "sync: applied batch joined={} invited={} next_batch={}",
            batch.rooms.join.len(),
            batch.rooms.invite.len(),
            batch.next_batch
        );
        SyncOutcome::Applied
    }
}
