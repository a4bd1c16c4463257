use crate::models::NoteId;
use chrono::{DateTime, Duration, Utc};

/// Idle window after the last keystroke before content is written back.
pub const DEFAULT_IDLE_WINDOW_MS: i64 = 500;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Unflushed editor content for one note.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSave {
    pub note_id: NoteId,
    pub content: String,
    pub deadline: DateTime<Utc>,
}

/// Debounce state: `Idle` when `pending` is `None`, `PendingSave` otherwise.
///
/// There is at most one pending save per session since only one note is
/// edited at a time. The scheduler owns no timer; the host re-checks
/// [`SaveScheduler::is_due`] when its own timer fires.
#[derive(Debug)]
pub struct SaveScheduler {
    idle_window: Duration,
    pending: Option<PendingSave>,
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_IDLE_WINDOW_MS))
    }
}

impl SaveScheduler {
    pub fn new(idle_window: Duration) -> Self {
        Self {
            idle_window,
            pending: None,
        }
    }

    pub fn idle_window(&self) -> Duration {
        self.idle_window
    }

    /// Re-arms the window with the latest content.
    ///
    /// Returns whatever was pending for a *different* note, which the caller
    /// must write back itself; content for the same note is simply replaced.
    pub fn request(
        &mut self,
        note_id: NoteId,
        content: String,
        now: DateTime<Utc>,
    ) -> Option<PendingSave> {
        let deadline = now + self.idle_window;
        let displaced = self
            .pending
            .take()
            .filter(|p| p.note_id != note_id);
        self.pending = Some(PendingSave {
            note_id,
            content,
            deadline,
        });
        displaced
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.pending.as_ref().is_some_and(|p| now >= p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// The note with unflushed edits, if any.
    pub fn unsaved_id(&self) -> Option<&NoteId> {
        self.pending.as_ref().map(|p| &p.note_id)
    }

    /// Disarms and hands back the pending content for an immediate write-back.
    pub fn take(&mut self) -> Option<PendingSave> {
        self.pending.take()
    }

    /// Disarms and discards the pending content.
    pub fn cancel(&mut self) -> Option<NoteId> {
        self.pending.take().map(|p| p.note_id)
    }
}
