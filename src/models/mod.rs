use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

/// Opaque note identifier assigned by the remote store.
///
/// The store hands out uuids today, but nothing here relies on that.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The authenticated user a session belongs to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }
}

/// A note row as the remote store returns it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub id: NoteId,

    /// Set once at creation.
    #[serde(rename = "user_id")]
    pub owner: String,

    #[serde(default = "default_title", deserialize_with = "title_or_default")]
    pub title: String,

    /// Sanitized rich-text markup.
    #[serde(default, deserialize_with = "string_or_empty")]
    pub content: String,

    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_pinned: bool,
    #[serde(default, deserialize_with = "bool_or_false")]
    pub is_public: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload: a note before the store has assigned it an id.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct NewNote {
    #[serde(rename = "user_id")]
    pub owner: String,
    pub title: String,
    pub content: String,
    pub is_pinned: bool,
    pub is_public: bool,
}

impl NewNote {
    pub fn new(owner: impl Into<String>, title: &str) -> Self {
        Self {
            owner: owner.into(),
            title: normalize_title(title),
            content: String::new(),
            is_pinned: false,
            is_public: false,
        }
    }
}

/// Partial update sent to the remote store. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NotePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_pinned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl NotePatch {
    pub fn title(title: String, at: DateTime<Utc>) -> Self {
        Self {
            title: Some(title),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    pub fn content(content: String, at: DateTime<Utc>) -> Self {
        Self {
            content: Some(content),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    pub fn pinned(pinned: bool, at: DateTime<Utc>) -> Self {
        Self {
            is_pinned: Some(pinned),
            updated_at: Some(at),
            ..Default::default()
        }
    }

    pub fn public(public: bool, at: DateTime<Utc>) -> Self {
        Self {
            is_public: Some(public),
            updated_at: Some(at),
            ..Default::default()
        }
    }
}

impl Note {
    /// Mirrors an acknowledged (or optimistic) patch into the local record.
    ///
    /// `updated_at` never moves backwards.
    pub fn apply(&mut self, patch: &NotePatch) {
        if let Some(t) = &patch.title {
            self.title = t.clone();
        }
        if let Some(c) = &patch.content {
            self.content = c.clone();
        }
        if let Some(p) = patch.is_pinned {
            self.is_pinned = p;
        }
        if let Some(p) = patch.is_public {
            self.is_public = p;
        }
        if let Some(at) = patch.updated_at {
            self.updated_at = self.updated_at.max(at);
        }
    }
}

/// Outcome of the most recent remote write for a note.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Failed(String),
}

impl SyncStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SyncStatus::Failed(_))
    }
}

/// Blank titles become [`DEFAULT_NOTE_TITLE`]; anything else is kept as typed.
pub fn normalize_title(title: &str) -> String {
    if title.trim().is_empty() {
        DEFAULT_NOTE_TITLE.to_string()
    } else {
        title.to_string()
    }
}

fn default_title() -> String {
    DEFAULT_NOTE_TITLE.to_string()
}

// Nullable text columns: one null row must not fail the whole batch.
fn string_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn bool_or_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or_default())
}

fn title_or_default<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn test_note_row_contract_deserialize() {
        let json = r#"{
            "id": "6f1c",
            "user_id": "u-1",
            "title": "Groceries",
            "content": "<p>milk</p>",
            "is_pinned": true,
            "is_public": false,
            "created_at": "2024-03-01T10:00:00+00:00",
            "updated_at": "2024-03-02T11:30:00.123456+00:00"
        }"#;
        let note: Note = serde_json::from_str(json).expect("note row should parse");
        assert_eq!(note.id, NoteId::from("6f1c"));
        assert_eq!(note.owner, "u-1");
        assert!(note.is_pinned);
        assert!(note.updated_at > note.created_at);
    }

    #[test]
    fn test_note_row_tolerates_missing_flags() {
        let json = r#"{
            "id": "a",
            "user_id": "u",
            "title": "t",
            "content": null,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).expect("null content tolerated");
        assert!(!note.is_pinned);
        assert!(!note.is_public);
        assert_eq!(note.content, "");

        let json = json.replace("\"content\": null,", "");
        let note: Note = serde_json::from_str(&json).expect("missing content tolerated");
        assert_eq!(note.content, "");
    }

    #[test]
    fn test_note_row_null_title_defaults() {
        let json = r#"{
            "id": "a",
            "user_id": "u",
            "title": null,
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z"
        }"#;
        let note: Note = serde_json::from_str(json).expect("null title tolerated");
        assert_eq!(note.title, DEFAULT_NOTE_TITLE);
    }

    #[test]
    fn test_normalize_title_only_replaces_blank() {
        assert_eq!(normalize_title(""), DEFAULT_NOTE_TITLE);
        assert_eq!(normalize_title(" \t "), DEFAULT_NOTE_TITLE);
        assert_eq!(normalize_title(" A "), " A ");
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let v = serde_json::to_value(NotePatch::pinned(true, at(5))).expect("serialize");
        let obj = v.as_object().expect("object");
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["is_pinned"], true);
        assert!(obj.contains_key("updated_at"));
    }

    #[test]
    fn test_new_note_uses_user_id_key_and_default_title() {
        let v = serde_json::to_value(NewNote::new("u-9", "   ")).expect("serialize");
        assert_eq!(v["user_id"], "u-9");
        assert_eq!(v["title"], DEFAULT_NOTE_TITLE);
        assert_eq!(v["content"], "");
        assert_eq!(v["is_public"], false);
    }

    #[test]
    fn test_apply_keeps_updated_at_monotonic() {
        let mut note = Note {
            id: "1".into(),
            owner: "u".into(),
            title: "A".into(),
            content: String::new(),
            is_pinned: false,
            is_public: false,
            created_at: at(0),
            updated_at: at(100),
        };

        note.apply(&NotePatch::title("B".into(), at(50)));
        assert_eq!(note.title, "B");
        assert_eq!(note.updated_at, at(100));

        note.apply(&NotePatch::content("x".into(), at(200)));
        assert_eq!(note.updated_at, at(200));
    }
}
