//! Errors surfaced at the sync engine boundary.

use crate::models::NoteId;
use crate::remote::{RemoteError, RemoteErrorKind};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No principal is attached to the session.
    #[error("Not logged in")]
    NotAuthenticated,

    /// The remote store is not configured or not reachable at all.
    #[error("Remote store unavailable")]
    StoreUnavailable,

    /// The note is not part of the local collection.
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    /// A remote call failed. Includes not-found and validation failures.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl SyncError {
    /// Short message for a blocking notice.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Error: Not logged in. Please refresh the page.".to_string(),
            Self::StoreUnavailable => {
                "Error: Database connection failed. Please refresh the page.".to_string()
            }
            Self::NoteNotFound(_) => "Note no longer exists".to_string(),
            Self::Remote(e) if e.kind == RemoteErrorKind::Unauthorized => {
                "Your session has expired. Please log in again.".to_string()
            }
            Self::Remote(e) => format!("Error: {}", e.message),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        match self {
            Self::NotAuthenticated => true,
            Self::Remote(e) => e.kind == RemoteErrorKind::Unauthorized,
            _ => false,
        }
    }
}

/// Local storage failures. Always absorbed into a default by the caller.
#[derive(Debug, Error)]
pub enum LocalPersistenceError {
    #[error("local storage unavailable")]
    Unavailable,

    #[error("malformed value under {key}: {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
