use crate::models::{Note, NoteId, NotePatch, SyncStatus};
use std::collections::HashMap;

/// In-memory notes for the current session plus the active-note cursor.
///
/// Order is presentation order: loads arrive newest-first, creates are
/// prepended, and only title changes trigger a resort.
#[derive(Debug, Default)]
pub struct NoteCollection {
    notes: Vec<Note>,
    active_id: Option<NoteId>,
    status: HashMap<NoteId, SyncStatus>,
}

impl NoteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces everything with a fresh query result.
    ///
    /// Duplicate ids keep their first occurrence. The cursor is cleared.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        let mut seen = std::collections::HashSet::new();
        self.notes = notes
            .into_iter()
            .filter(|n| seen.insert(n.id.clone()))
            .collect();
        self.active_id = None;
        self.status.clear();
    }

    pub fn clear(&mut self) {
        self.replace_all(vec![]);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn first_id(&self) -> Option<&NoteId> {
        self.notes.first().map(|n| &n.id)
    }

    pub fn find_by_id(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.find_by_id(id).is_some()
    }

    pub fn active_id(&self) -> Option<&NoteId> {
        self.active_id.as_ref()
    }

    pub fn get_active(&self) -> Option<&Note> {
        self.active_id.as_ref().and_then(|id| self.find_by_id(id))
    }

    /// Moves the cursor. Returns `false` (and leaves it alone) for unknown ids.
    pub fn set_active(&mut self, id: Option<NoteId>) -> bool {
        match id {
            Some(id) if !self.contains(&id) => false,
            id => {
                self.active_id = id;
                true
            }
        }
    }

    /// Puts a new note at the front regardless of its timestamps.
    pub fn prepend(&mut self, note: Note) {
        self.notes.retain(|n| n.id != note.id);
        self.notes.insert(0, note);
    }

    pub fn remove(&mut self, id: &NoteId) -> Option<Note> {
        let pos = self.notes.iter().position(|n| &n.id == id)?;
        self.status.remove(id);
        if self.active_id.as_ref() == Some(id) {
            self.active_id = None;
        }
        Some(self.notes.remove(pos))
    }

    /// Applies `patch` to the note. Returns `false` if the note is gone.
    pub fn apply(&mut self, id: &NoteId, patch: &NotePatch) -> bool {
        match self.notes.iter_mut().find(|n| &n.id == id) {
            Some(note) => {
                note.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Most recently updated first. Stable, so equal timestamps keep their order.
    pub fn resort_by_updated(&mut self) {
        self.notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }

    pub fn sync_status(&self, id: &NoteId) -> Option<&SyncStatus> {
        self.status.get(id)
    }

    pub fn mark_synced(&mut self, id: &NoteId) {
        if self.contains(id) {
            self.status.insert(id.clone(), SyncStatus::Synced);
        }
    }

    pub fn mark_failed(&mut self, id: &NoteId, message: String) {
        if self.contains(id) {
            self.status.insert(id.clone(), SyncStatus::Failed(message));
        }
    }
}
