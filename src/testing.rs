//! Test doubles shared by the unit tests.

use crate::autosave::Clock;
use crate::models::{NewNote, Note, NoteId, NotePatch};
use crate::remote::{RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use crate::state::SyncEvents;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const EPOCH_SECS: i64 = 1_700_000_000;

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    at_ms(secs * 1000)
}

pub(crate) fn at_ms(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(EPOCH_SECS * 1000 + ms)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn note(id: &str, title: &str, updated_secs: i64) -> Note {
    Note {
        id: id.into(),
        owner: "u-1".to_string(),
        title: title.to_string(),
        content: String::new(),
        is_pinned: false,
        is_public: false,
        created_at: at(0),
        updated_at: at(updated_secs),
    }
}

/// Ordered record of remote calls and upward notifications.
pub(crate) type Trace = Rc<RefCell<Vec<String>>>;

#[derive(Clone)]
pub(crate) struct ManualClock(Rc<Cell<DateTime<Utc>>>);

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(Rc::new(Cell::new(start)))
    }

    pub fn advance_ms(&self, ms: i64) {
        self.0.set(self.0.get() + Duration::milliseconds(ms));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.get()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    QueryAll(String),
    Insert(NewNote),
    Update(NoteId, NotePatch),
    Delete(NoteId),
}

pub(crate) struct MockRemote {
    pub rows: RefCell<Vec<Note>>,
    pub calls: RefCell<Vec<Call>>,
    pub fail_with: Cell<Option<RemoteErrorKind>>,
    pub available: Cell<bool>,
    next_id: Cell<u32>,
    clock: ManualClock,
    trace: Trace,
}

impl MockRemote {
    pub fn new(rows: Vec<Note>, clock: ManualClock, trace: Trace) -> Self {
        let next_id = rows
            .iter()
            .filter_map(|n| n.id.as_str().parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            rows: RefCell::new(rows),
            calls: RefCell::new(vec![]),
            fail_with: Cell::new(None),
            available: Cell::new(true),
            next_id: Cell::new(next_id),
            clock,
            trace,
        }
    }

    pub fn updates(&self) -> Vec<(NoteId, NotePatch)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|c| match c {
                Call::Update(id, p) => Some((id.clone(), p.clone())),
                _ => None,
            })
            .collect()
    }

    fn begin(&self, call: Call, label: String) -> RemoteResult<()> {
        self.calls.borrow_mut().push(call);
        self.trace.borrow_mut().push(label);
        match self.fail_with.get() {
            Some(kind) => Err(RemoteError::new(kind, "injected failure")),
            None => Ok(()),
        }
    }
}

impl RemoteStore for MockRemote {
    fn is_available(&self) -> bool {
        self.available.get()
    }

    async fn query_all(&self, owner: &str) -> RemoteResult<Vec<Note>> {
        tokio::task::yield_now().await;
        self.begin(Call::QueryAll(owner.to_string()), format!("query {owner}"))?;
        let mut rows: Vec<Note> = self
            .rows
            .borrow()
            .iter()
            .filter(|n| n.owner == owner)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn insert(&self, new: NewNote) -> RemoteResult<Note> {
        tokio::task::yield_now().await;
        self.begin(Call::Insert(new.clone()), format!("insert {}", new.title))?;
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let now = self.clock.now();
        let note = Note {
            id: NoteId::new(id.to_string()),
            owner: new.owner,
            title: new.title,
            content: new.content,
            is_pinned: new.is_pinned,
            is_public: new.is_public,
            created_at: now,
            updated_at: now,
        };
        self.rows.borrow_mut().push(note.clone());
        Ok(note)
    }

    async fn update(&self, id: &NoteId, patch: NotePatch) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        self.begin(Call::Update(id.clone(), patch.clone()), format!("update {id}"))?;
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| RemoteError::not_found(id))?;
        row.apply(&patch);
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> RemoteResult<()> {
        tokio::task::yield_now().await;
        self.begin(Call::Delete(id.clone()), format!("delete {id}"))?;
        self.rows.borrow_mut().retain(|n| &n.id != id);
        Ok(())
    }
}

/// Writes every notification into the shared trace.
pub(crate) struct RecordingEvents(pub Trace);

impl SyncEvents for RecordingEvents {
    fn on_unsaved_changed(&self, id: &NoteId, unsaved: bool) {
        self.0.borrow_mut().push(format!("unsaved {id} {unsaved}"));
    }

    fn on_notes_changed(&self, notes: &[Note]) {
        self.0.borrow_mut().push(format!("notes {}", notes.len()));
    }

    fn on_active_changed(&self, id: Option<&NoteId>) {
        let id = id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string());
        self.0.borrow_mut().push(format!("active {id}"));
    }
}
