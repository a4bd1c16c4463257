pub(crate) mod note_sync;

pub use note_sync::SyncEngine;

use crate::models::{Note, NoteId};
use crate::settings::Settings;
use leptos::prelude::*;

/// Upward notifications from the sync engine to whatever renders it.
///
/// Callbacks run synchronously inside engine operations and must not call
/// back into the engine.
pub trait SyncEvents {
    fn on_unsaved_changed(&self, _id: &NoteId, _unsaved: bool) {}

    /// The collection changed; `notes` is the new presentation order.
    fn on_notes_changed(&self, _notes: &[Note]) {}

    fn on_active_changed(&self, _id: Option<&NoteId>) {}
}

pub struct NoopEvents;

impl SyncEvents for NoopEvents {}

/// Reactive mirror of engine state for the Leptos views. Read-only for them.
#[derive(Clone, Copy)]
pub(crate) struct AppState {
    pub notes: RwSignal<Vec<Note>>,
    pub active_id: RwSignal<Option<NoteId>>,
    pub unsaved_id: RwSignal<Option<NoteId>>,

    /// Blocking notice for failed create/delete.
    pub notice: RwSignal<Option<String>>,

    pub settings: RwSignal<Settings>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            notes: RwSignal::new(vec![]),
            active_id: RwSignal::new(None),
            unsaved_id: RwSignal::new(None),
            notice: RwSignal::new(None),
            settings: RwSignal::new(settings),
        }
    }
}

/// Browser [`SyncEvents`]: pushes every notification into the signals.
pub(crate) struct SignalEvents(pub AppState);

impl SyncEvents for SignalEvents {
    fn on_unsaved_changed(&self, id: &NoteId, unsaved: bool) {
        if unsaved {
            self.0.unsaved_id.set(Some(id.clone()));
        } else if self.0.unsaved_id.get_untracked().as_ref() == Some(id) {
            self.0.unsaved_id.set(None);
        }
    }

    fn on_notes_changed(&self, notes: &[Note]) {
        self.0.notes.set(notes.to_vec());
    }

    fn on_active_changed(&self, id: Option<&NoteId>) {
        self.0.active_id.set(id.cloned());
    }
}
