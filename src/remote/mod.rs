use crate::models::{NewNote, Note, NoteId, NotePatch};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Unauthorized,
    Network,
    NotFound,
    Validation,
    Http,
    Parse,
}

/// Failure reported by a [`RemoteStore`] call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(e: impl std::fmt::Display) -> Self {
        Self::new(RemoteErrorKind::Network, e.to_string())
    }

    pub fn parse(e: impl std::fmt::Display) -> Self {
        Self::new(RemoteErrorKind::Parse, e.to_string())
    }

    pub fn unauthorized() -> Self {
        Self::new(RemoteErrorKind::Unauthorized, "Unauthorized")
    }

    pub fn not_found(id: &NoteId) -> Self {
        Self::new(RemoteErrorKind::NotFound, format!("Note not found: {id}"))
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The authoritative, network-backed note collection.
///
/// Every call is a suspension point. Implementations are driven from a single
/// thread, so the futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Whether the store is configured at all. A `false` here fails creates
    /// early instead of attempting a request.
    fn is_available(&self) -> bool {
        true
    }

    /// All notes owned by `owner`, most recently updated first.
    async fn query_all(&self, owner: &str) -> RemoteResult<Vec<Note>>;

    async fn insert(&self, note: NewNote) -> RemoteResult<Note>;

    async fn update(&self, id: &NoteId, patch: NotePatch) -> RemoteResult<()>;

    async fn delete(&self, id: &NoteId) -> RemoteResult<()>;
}
