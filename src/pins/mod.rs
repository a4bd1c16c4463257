use crate::models::NoteId;
use crate::storage::{load_json, save_json, KeyValueStore, PIN_ORDER_KEY};
use std::rc::Rc;

/// Index reported for ids that were never manually ordered.
///
/// Larger than any real position, so unordered pinned notes sort last.
pub const UNORDERED_PIN_INDEX: usize = usize::MAX;

/// User-defined order among pinned notes, kept in local storage only.
///
/// The remote store knows whether a note is pinned; it does not know the
/// order. Entries for deleted notes are tolerated and left in place.
pub struct PinOrder {
    store: Rc<dyn KeyValueStore>,
    ids: Vec<NoteId>,
}

impl PinOrder {
    pub fn new(store: Rc<dyn KeyValueStore>) -> Self {
        Self { store, ids: vec![] }
    }

    /// Reads the persisted order. A missing or malformed value starts empty.
    pub fn load(&mut self) {
        let mut ids = load_json::<Vec<NoteId>>(self.store.as_ref(), PIN_ORDER_KEY)
            .unwrap_or_default();

        // Older writes may carry duplicates; keep the first position.
        let mut seen = std::collections::HashSet::new();
        ids.retain(|id| seen.insert(id.clone()));

        self.ids = ids;
    }

    pub fn index_of(&self, id: &NoteId) -> usize {
        self.ids
            .iter()
            .position(|x| x == id)
            .unwrap_or(UNORDERED_PIN_INDEX)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.ids.contains(id)
    }

    /// Appends `id` if absent. Persists immediately.
    pub fn add(&mut self, id: &NoteId) {
        if self.contains(id) {
            return;
        }
        self.ids.push(id.clone());
        self.persist();
    }

    /// Drops every occurrence of `id`. Persists immediately.
    pub fn remove(&mut self, id: &NoteId) {
        self.ids.retain(|x| x != id);
        self.persist();
    }

    pub fn ids(&self) -> &[NoteId] {
        &self.ids
    }

    fn persist(&self) {
        save_json(self.store.as_ref(), PIN_ORDER_KEY, &self.ids);
    }
}
