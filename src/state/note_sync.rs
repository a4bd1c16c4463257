use crate::autosave::{Clock, PendingSave, SaveScheduler};
use crate::editor::strip_transient_markup;
use crate::error::{SyncError, SyncResult};
use crate::models::{
    normalize_title, NewNote, Note, NoteId, NotePatch, Principal, SyncStatus, DEFAULT_NOTE_TITLE,
};
use crate::notes::NoteCollection;
use crate::pins::PinOrder;
use crate::remote::{RemoteResult, RemoteStore};
use crate::state::SyncEvents;
use crate::storage::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use std::cell::RefCell;
use std::rc::Rc;

/// Local-first controller for one authenticated session.
///
/// Responsibilities:
/// - note lifecycle (create, switch, delete, rename, pin, publish)
/// - debounced content autosave with an "unsaved" signal
/// - the local pin-order overlay
///
/// Every mutation lands in the local collection synchronously; remote writes
/// are best-effort. Remote failures are reported and recorded per note but
/// never rolled back. State lives in `RefCell`s that are never borrowed
/// across an `.await`, so other operations may run while one is in flight.
pub struct SyncEngine<R: RemoteStore> {
    remote: R,
    clock: Box<dyn Clock>,
    events: Box<dyn SyncEvents>,

    principal: RefCell<Option<Principal>>,
    notes: RefCell<NoteCollection>,
    pins: RefCell<PinOrder>,
    autosave: RefCell<SaveScheduler>,
}

/// Content staged locally and waiting for its remote write.
struct ContentWrite {
    note_id: NoteId,
    patch: NotePatch,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(
        remote: R,
        store: Rc<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
        events: Box<dyn SyncEvents>,
    ) -> Self {
        Self {
            remote,
            clock,
            events,
            principal: RefCell::new(None),
            notes: RefCell::new(NoteCollection::new()),
            pins: RefCell::new(PinOrder::new(store)),
            autosave: RefCell::new(SaveScheduler::default()),
        }
    }

    pub fn with_idle_window(self, window: Duration) -> Self {
        self.autosave.replace(SaveScheduler::new(window));
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.borrow().clone()
    }

    pub fn set_principal(&self, principal: Option<Principal>) {
        self.principal.replace(principal);
    }

    // ---- read side -------------------------------------------------------

    pub fn notes(&self) -> Vec<Note> {
        self.notes.borrow().notes().to_vec()
    }

    pub fn active_id(&self) -> Option<NoteId> {
        self.notes.borrow().active_id().cloned()
    }

    pub fn get_active(&self) -> Option<Note> {
        self.notes.borrow().get_active().cloned()
    }

    pub fn find_by_id(&self, id: &NoteId) -> Option<Note> {
        self.notes.borrow().find_by_id(id).cloned()
    }

    pub fn unsaved_id(&self) -> Option<NoteId> {
        self.autosave.borrow().unsaved_id().cloned()
    }

    pub fn sync_status(&self, id: &NoteId) -> Option<SyncStatus> {
        self.notes.borrow().sync_status(id).cloned()
    }

    pub fn pin_order(&self) -> Vec<NoteId> {
        self.pins.borrow().ids().to_vec()
    }

    pub fn pin_index(&self, id: &NoteId) -> usize {
        self.pins.borrow().index_of(id)
    }

    /// Pinned notes in manual order; never-ordered ones trail in collection order.
    pub fn pinned_notes(&self) -> Vec<Note> {
        let pins = self.pins.borrow();
        let mut pinned: Vec<Note> = self
            .notes
            .borrow()
            .notes()
            .iter()
            .filter(|n| n.is_pinned)
            .cloned()
            .collect();
        pinned.sort_by_key(|n| pins.index_of(&n.id));
        pinned
    }

    pub fn unpinned_notes(&self) -> Vec<Note> {
        self.notes
            .borrow()
            .notes()
            .iter()
            .filter(|n| !n.is_pinned)
            .cloned()
            .collect()
    }

    /// When the pending autosave becomes due, if one is armed.
    pub fn autosave_deadline(&self) -> Option<DateTime<Utc>> {
        self.autosave.borrow().deadline()
    }

    pub fn idle_window(&self) -> Duration {
        self.autosave.borrow().idle_window()
    }

    // ---- session ---------------------------------------------------------

    /// Attaches `principal`, restores the pin order and loads the notes.
    ///
    /// Activates the most recent note, or creates a default one when the
    /// store has none (or could not be read).
    pub async fn open_session(&self, principal: Principal) -> SyncResult<()> {
        self.set_principal(Some(principal));
        self.pins.borrow_mut().load();

        if let Err(e) = self.load().await {
            log::warn!("starting with an empty collection: {e}");
        }

        let first = self.notes.borrow().first_id().cloned();
        match first {
            Some(id) => {
                // Edits typed while the rows were loading belong to the old cursor.
                let write = self.begin_flush();
                self.activate(id);
                if let Some(write) = write {
                    let _ = self.write_back(write).await;
                }
                Ok(())
            }
            None => self.create_note(DEFAULT_NOTE_TITLE).await.map(|_| ()),
        }
    }

    /// Flushes pending edits, then forgets the principal and every note.
    pub async fn close_session(&self) {
        if let Some(write) = self.begin_flush() {
            // Failure is already recorded and logged.
            let _ = self.write_back(write).await;
        }
        self.set_principal(None);
        self.notes.borrow_mut().clear();
        self.notify_notes_changed();
        self.events.on_active_changed(None);
    }

    /// Replaces the collection with the principal's notes, newest first.
    ///
    /// Fails closed: on any error the collection is left empty.
    pub async fn load(&self) -> SyncResult<usize> {
        if let Some(write) = self.begin_flush() {
            let _ = self.write_back(write).await;
        }

        let owner = self.principal.borrow().as_ref().map(|p| p.id.clone());
        let result = match owner {
            Some(owner) => self
                .remote
                .query_all(&owner)
                .await
                .map_err(SyncError::from),
            None => Err(SyncError::NotAuthenticated),
        };

        let (rows, outcome) = match result {
            Ok(rows) => (rows, Ok(())),
            Err(e) => {
                log::error!("Load notes error: {e}");
                (vec![], Err(e))
            }
        };

        let count = {
            let mut notes = self.notes.borrow_mut();
            notes.replace_all(rows);
            notes.resort_by_updated();
            notes.len()
        };
        self.notify_notes_changed();
        self.events.on_active_changed(None);

        outcome.map(|_| count)
    }

    // ---- lifecycle -------------------------------------------------------

    /// Creates a note remotely and makes it active at the top of the list.
    ///
    /// Pending edits on the current note are written back first.
    pub async fn create_note(&self, title: &str) -> SyncResult<NoteId> {
        if let Some(write) = self.begin_flush() {
            let _ = self.write_back(write).await;
        }

        let owner = self.principal.borrow().as_ref().map(|p| p.id.clone());
        let Some(owner) = owner else {
            log::error!("create note: no principal attached to the session");
            return Err(SyncError::NotAuthenticated);
        };
        if !self.remote.is_available() {
            log::error!("create note: remote store not configured");
            return Err(SyncError::StoreUnavailable);
        }

        let note = match self.remote.insert(NewNote::new(owner, title)).await {
            Ok(note) => note,
            Err(e) => {
                log::error!("Create note error: {e}");
                return Err(e.into());
            }
        };
        let id = note.id.clone();
        log::debug!("created note {id}");

        // Typing may have continued on the old note while the insert was in flight.
        let late = self.begin_flush();

        {
            let mut notes = self.notes.borrow_mut();
            notes.prepend(note);
            notes.mark_synced(&id);
        }
        self.notify_notes_changed();
        self.activate(id.clone());

        if let Some(write) = late {
            let _ = self.write_back(write).await;
        }
        Ok(id)
    }

    /// Makes `id` the active note, flushing the previous note's edits first.
    ///
    /// The local part of the flush happens before the cursor moves; the
    /// remote write is awaited afterwards.
    pub async fn switch_note(&self, id: &NoteId) -> SyncResult<()> {
        if !self.notes.borrow().contains(id) {
            return Err(SyncError::NoteNotFound(id.clone()));
        }
        if self.notes.borrow().active_id() == Some(id) {
            return Ok(());
        }

        let write = self.begin_flush();
        self.activate(id.clone());

        match write {
            Some(write) => self.write_back(write).await,
            None => Ok(()),
        }
    }

    /// Deletes remotely, then locally.
    ///
    /// Deleting the active note activates the first remaining one, or creates
    /// a fresh default note so the session always has something to edit.
    pub async fn delete_note(&self, id: &NoteId) -> SyncResult<()> {
        if let Err(e) = self.remote.delete(id).await {
            log::error!("Delete note error: {e}");
            return Err(e.into());
        }

        let was_active = {
            let mut notes = self.notes.borrow_mut();
            let was_active = notes.active_id() == Some(id);
            notes.remove(id);
            was_active
        };

        // Edits for a deleted note have nowhere to go.
        let discarded = {
            let mut autosave = self.autosave.borrow_mut();
            if autosave.unsaved_id() == Some(id) {
                autosave.cancel()
            } else {
                None
            }
        };
        if let Some(discarded) = discarded {
            self.events.on_unsaved_changed(&discarded, false);
        }

        self.notify_notes_changed();
        if !was_active {
            return Ok(());
        }

        let next = self.notes.borrow().first_id().cloned();
        match next {
            Some(next) => {
                self.activate(next);
                Ok(())
            }
            None => {
                self.events.on_active_changed(None);
                self.create_note(DEFAULT_NOTE_TITLE).await.map(|_| ())
            }
        }
    }

    /// Renames remotely; on success mirrors locally and resorts by recency.
    pub async fn update_title(&self, id: &NoteId, title: &str) -> SyncResult<()> {
        let patch = NotePatch::title(normalize_title(title), self.clock.now());
        let result = self.remote.update(id, patch.clone()).await;
        self.record(id, &result, "Update title");
        result?;

        {
            let mut notes = self.notes.borrow_mut();
            notes.apply(id, &patch);
            notes.resort_by_updated();
        }
        self.notify_notes_changed();
        Ok(())
    }

    /// Sets the remote pinned flag, then the local flag and pin order together.
    ///
    /// On remote failure neither the local flag nor the order changes.
    pub async fn toggle_pin(&self, id: &NoteId, pinned: bool) -> SyncResult<()> {
        self.require_note(id)?;

        let patch = NotePatch::pinned(pinned, self.clock.now());
        let result = self.remote.update(id, patch.clone()).await;
        self.record(id, &result, "Toggle pin");
        result?;

        self.notes.borrow_mut().apply(id, &patch);
        {
            let mut pins = self.pins.borrow_mut();
            if pinned {
                pins.add(id);
            } else {
                pins.remove(id);
            }
        }
        self.notify_notes_changed();
        Ok(())
    }

    /// Sets the remote public flag; mirrors locally only on success.
    pub async fn toggle_public(&self, id: &NoteId, published: bool) -> SyncResult<()> {
        self.require_note(id)?;

        let patch = NotePatch::public(published, self.clock.now());
        let result = self.remote.update(id, patch.clone()).await;
        self.record(id, &result, "Toggle public");
        result?;

        self.notes.borrow_mut().apply(id, &patch);
        self.notify_notes_changed();
        Ok(())
    }

    // ---- autosave --------------------------------------------------------

    /// Records the active note's latest content and re-arms the idle window.
    ///
    /// Called on every content-mutating input event. No-op without an active note.
    pub fn request_save(&self, content: impl Into<String>) {
        let active = self.notes.borrow().active_id().cloned();
        let Some(active) = active else {
            log::debug!("ignoring edit: no active note");
            return;
        };

        let was_unsaved = self.autosave.borrow().unsaved_id() == Some(&active);
        let displaced =
            self.autosave
                .borrow_mut()
                .request(active.clone(), content.into(), self.clock.now());

        if let Some(displaced) = displaced {
            // Only reachable if the cursor moved without a flush.
            log::warn!(
                "edits for {} were displaced before write-back",
                displaced.note_id
            );
            let note_id = displaced.note_id.clone();
            if self.stage_content(displaced).is_some() {
                self.notes
                    .borrow_mut()
                    .mark_failed(&note_id, "edits were not written back".to_string());
            }
            self.events.on_unsaved_changed(&note_id, false);
        }

        if !was_unsaved {
            self.events.on_unsaved_changed(&active, true);
        }
    }

    /// Flushes if the idle window has elapsed. Returns whether a write happened.
    ///
    /// For hosts that poll on a tick. Early or repeated calls are harmless. A host
    /// whose own timer already measures the idle window calls [`Self::flush`].
    pub async fn poll_autosave(&self) -> SyncResult<bool> {
        let due = self.autosave.borrow().is_due(self.clock.now());
        if !due {
            return Ok(false);
        }
        self.flush().await
    }

    /// Writes pending content back immediately. Returns `false` if nothing was pending.
    ///
    /// The unsaved flag clears and the local note updates before the remote
    /// call is issued; a remote failure does not revert either.
    pub async fn flush(&self) -> SyncResult<bool> {
        let Some(write) = self.begin_flush() else {
            return Ok(false);
        };
        self.write_back(write).await?;
        Ok(true)
    }

    /// Drops pending content without writing it.
    pub fn cancel_save(&self) {
        let cancelled = self.autosave.borrow_mut().cancel();
        if let Some(id) = cancelled {
            log::debug!("autosave for {id} cancelled");
            self.events.on_unsaved_changed(&id, false);
        }
    }

    // ---- internals -------------------------------------------------------

    /// Synchronous half of a flush: disarm, clear the unsaved flag, sanitize,
    /// and apply to the local note.
    fn begin_flush(&self) -> Option<ContentWrite> {
        let pending = self.autosave.borrow_mut().take()?;
        self.events.on_unsaved_changed(&pending.note_id, false);
        self.stage_content(pending)
    }

    fn stage_content(&self, pending: PendingSave) -> Option<ContentWrite> {
        let content = strip_transient_markup(&pending.content).into_owned();
        let patch = NotePatch::content(content, self.clock.now());

        let applied = self.notes.borrow_mut().apply(&pending.note_id, &patch);
        if !applied {
            log::debug!("dropping edits for {}: note is gone", pending.note_id);
            return None;
        }
        // No resort: the note being edited must not jump around.
        self.notify_notes_changed();

        Some(ContentWrite {
            note_id: pending.note_id,
            patch,
        })
    }

    async fn write_back(&self, write: ContentWrite) -> SyncResult<()> {
        log::debug!("saving {}", write.note_id);
        let result = self.remote.update(&write.note_id, write.patch).await;
        self.record(&write.note_id, &result, "Save");
        result.map_err(SyncError::from)
    }

    fn record<T>(&self, id: &NoteId, result: &RemoteResult<T>, what: &str) {
        let before = self.notes.borrow().sync_status(id).cloned();
        match result {
            Ok(_) => self.notes.borrow_mut().mark_synced(id),
            Err(e) => {
                log::error!("{what} error for {id}: {e}");
                self.notes.borrow_mut().mark_failed(id, e.message.clone());
            }
        }
        if self.notes.borrow().sync_status(id) != before.as_ref() {
            self.notify_notes_changed();
        }
    }

    fn require_note(&self, id: &NoteId) -> SyncResult<()> {
        if self.notes.borrow().contains(id) {
            Ok(())
        } else {
            Err(SyncError::NoteNotFound(id.clone()))
        }
    }

    fn activate(&self, id: NoteId) {
        let changed = self.notes.borrow_mut().set_active(Some(id.clone()));
        if changed {
            log::debug!("active note is now {id}");
            self.events.on_active_changed(Some(&id));
        }
    }

    fn notify_notes_changed(&self) {
        let snapshot = self.notes.borrow().notes().to_vec();
        self.events.on_notes_changed(&snapshot);
    }
}
