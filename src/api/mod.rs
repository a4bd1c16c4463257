use crate::models::{NewNote, Note, NoteId, NotePatch};
use crate::remote::{RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use crate::storage::{KeyValueStore, TOKEN_KEY};
use serde::{Deserialize, Serialize};

const NOTES_PATH: &str = "/rest/v1/notes";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct EnvConfig {
    pub api_url: String,
    pub api_key: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        let default_api_url = "http://localhost:54321".to_string();

        // We support BOTH `window.ENV.API_URL` (documented in README) and
        // `window.ENV.api_url` for compatibility. Same for the key.
        let env = web_sys::window()
            .and_then(|w| w.get("ENV"))
            .filter(|env| !env.is_undefined() && env.is_object());

        let read = |upper: &str, lower: &str| -> Option<String> {
            let env = env.as_ref()?;
            [upper, lower].iter().find_map(|k| {
                js_sys::Reflect::get(env, &(*k).into())
                    .ok()
                    .and_then(|v| v.as_string())
            })
        };

        Self {
            api_url: read("API_URL", "api_url").unwrap_or(default_api_url),
            api_key: read("API_KEY", "api_key").unwrap_or_default(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// PostgREST-style client for the `notes` table.
#[derive(Clone)]
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            token: None,
        }
    }

    pub fn from_env(env: &EnvConfig) -> Self {
        Self::new(env.api_url.clone(), env.api_key.clone())
    }

    pub fn load_token(&mut self, store: &dyn KeyValueStore) {
        self.token = store.get(TOKEN_KEY).filter(|t| !t.trim().is_empty());
    }

    pub fn save_token(&self, store: &dyn KeyValueStore) {
        if let Some(token) = &self.token {
            store.set(TOKEN_KEY, token);
        }
    }

    pub fn clear_token(&mut self, store: &dyn KeyValueStore) {
        self.token = None;
        store.remove(TOKEN_KEY);
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn get_token(&self) -> Option<&String> {
        self.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn get_auth_header(&self) -> Option<String> {
        let bearer = self
            .token
            .as_deref()
            .or(Some(self.api_key.as_str()).filter(|k| !k.is_empty()))?;
        Some(format!("Bearer {bearer}"))
    }

    pub(crate) fn notes_url(&self, query: &str) -> String {
        format!("{}{}?{}", self.base_url, NOTES_PATH, query)
    }

    pub(crate) fn owner_query(owner: &str) -> String {
        format!("select=*&user_id=eq.{owner}&order=updated_at.desc")
    }

    pub(crate) fn id_query(id: &NoteId) -> String {
        format!("id=eq.{id}")
    }

    fn with_auth_headers(&self, mut req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if !self.api_key.is_empty() {
            req = req.header("apikey", self.api_key.clone());
        }
        if let Some(auth) = self.get_auth_header() {
            req = req.header("Authorization", auth);
        }
        req
    }

    async fn send(&self, req: reqwest::RequestBuilder, ctx: &str) -> RemoteResult<reqwest::Response> {
        let res = self
            .with_auth_headers(req)
            .send()
            .await
            .map_err(RemoteError::network)?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let body = res.text().await.unwrap_or_default();
        Err(Self::status_error(status, body, ctx))
    }

    pub(crate) fn status_error(status: reqwest::StatusCode, body: String, ctx: &str) -> RemoteError {
        let kind = match status.as_u16() {
            401 | 403 => return RemoteError::unauthorized(),
            404 => RemoteErrorKind::NotFound,
            400 | 409 | 422 => RemoteErrorKind::Validation,
            _ => RemoteErrorKind::Http,
        };
        RemoteError::new(kind, format!("{ctx} ({status}): {body}"))
    }

    /// Rows returned with `Prefer: return=representation`.
    pub(crate) fn parse_rows(data: serde_json::Value) -> RemoteResult<Vec<Note>> {
        serde_json::from_value(data).map_err(RemoteError::parse)
    }
}

impl RemoteStore for ApiClient {
    fn is_available(&self) -> bool {
        !self.base_url.is_empty()
    }

    async fn query_all(&self, owner: &str) -> RemoteResult<Vec<Note>> {
        let client = reqwest::Client::new();
        let req = client.get(self.notes_url(&Self::owner_query(owner)));
        let res = self.send(req, "Load notes failed").await?;
        let data: serde_json::Value = res.json().await.map_err(RemoteError::parse)?;
        Self::parse_rows(data)
    }

    async fn insert(&self, note: NewNote) -> RemoteResult<Note> {
        let client = reqwest::Client::new();
        let req = client
            .post(self.notes_url("select=*"))
            .header("Prefer", "return=representation")
            .json(&[note]);
        let res = self.send(req, "Create note failed").await?;
        let data: serde_json::Value = res.json().await.map_err(RemoteError::parse)?;

        Self::parse_rows(data)?.into_iter().next().ok_or_else(|| {
            RemoteError::parse("Create note succeeded but response is missing the row")
        })
    }

    async fn update(&self, id: &NoteId, patch: NotePatch) -> RemoteResult<()> {
        let client = reqwest::Client::new();
        let req = client
            .patch(self.notes_url(&Self::id_query(id)))
            .header("Prefer", "return=representation")
            .json(&patch);
        let res = self.send(req, "Update note failed").await?;
        let data: serde_json::Value = res.json().await.map_err(RemoteError::parse)?;

        // PostgREST answers 200 with no rows when the filter matched nothing.
        if data.as_array().is_some_and(|rows| rows.is_empty()) {
            return Err(RemoteError::not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, id: &NoteId) -> RemoteResult<()> {
        let client = reqwest::Client::new();
        let req = client.delete(self.notes_url(&Self::id_query(id)));
        self.send(req, "Delete note failed").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn client() -> ApiClient {
        ApiClient::new("http://localhost:54321/".to_string(), "anon".to_string())
    }

    #[test]
    fn test_api_client_new_trims_trailing_slash() {
        let c = client();
        assert_eq!(c.base_url, "http://localhost:54321");
        assert!(c.token.is_none());
        assert!(c.is_available());
    }

    #[test]
    fn test_empty_base_url_is_unavailable() {
        let c = ApiClient::new(String::new(), String::new());
        assert!(!c.is_available());
    }

    #[test]
    fn test_auth_header_falls_back_to_api_key() {
        let mut c = client();
        assert_eq!(c.get_auth_header().as_deref(), Some("Bearer anon"));
        c.set_token("jwt".to_string());
        assert_eq!(c.get_auth_header().as_deref(), Some("Bearer jwt"));

        let bare = ApiClient::new("http://x".to_string(), String::new());
        assert!(bare.get_auth_header().is_none());
    }

    #[test]
    fn test_query_urls() {
        let c = client();
        assert_eq!(
            c.notes_url(&ApiClient::owner_query("u-1")),
            "http://localhost:54321/rest/v1/notes?select=*&user_id=eq.u-1&order=updated_at.desc"
        );
        assert_eq!(
            c.notes_url(&ApiClient::id_query(&"abc".into())),
            "http://localhost:54321/rest/v1/notes?id=eq.abc"
        );
    }

    #[test]
    fn test_status_mapping() {
        let e = ApiClient::status_error(reqwest::StatusCode::UNAUTHORIZED, String::new(), "x");
        assert_eq!(e.kind, RemoteErrorKind::Unauthorized);

        let e = ApiClient::status_error(reqwest::StatusCode::NOT_FOUND, "gone".into(), "Update");
        assert_eq!(e.kind, RemoteErrorKind::NotFound);
        assert!(e.message.contains("gone"));

        let e = ApiClient::status_error(
            reqwest::StatusCode::UNPROCESSABLE_ENTITY,
            String::new(),
            "x",
        );
        assert_eq!(e.kind, RemoteErrorKind::Validation);

        let e = ApiClient::status_error(reqwest::StatusCode::BAD_GATEWAY, String::new(), "x");
        assert_eq!(e.kind, RemoteErrorKind::Http);
    }

    #[test]
    fn test_parse_rows_contract() {
        let data = serde_json::json!([{
            "id": "n1",
            "user_id": "u-1",
            "title": "T",
            "content": "<p>x</p>",
            "is_pinned": false,
            "is_public": true,
            "created_at": "2024-03-01T10:00:00+00:00",
            "updated_at": "2024-03-01T10:00:00+00:00"
        }]);
        let rows = ApiClient::parse_rows(data).expect("rows parse");
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_public);

        let err = ApiClient::parse_rows(serde_json::json!({"message": "nope"}))
            .expect_err("not an array");
        assert_eq!(err.kind, RemoteErrorKind::Parse);
    }

    #[test]
    fn test_parse_rows_keeps_batch_with_null_columns() {
        let data = serde_json::json!([
            {
                "id": "n1",
                "user_id": "u-1",
                "title": "Kept",
                "content": "<p>x</p>",
                "created_at": "2024-03-01T10:00:00+00:00",
                "updated_at": "2024-03-01T10:00:00+00:00"
            },
            {
                "id": "n2",
                "user_id": "u-1",
                "title": null,
                "content": null,
                "is_pinned": null,
                "created_at": "2024-03-01T09:00:00+00:00",
                "updated_at": "2024-03-01T09:00:00+00:00"
            }
        ]);
        let rows = ApiClient::parse_rows(data).expect("rows parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title, "Kept");
        assert_eq!(rows[1].title, crate::models::DEFAULT_NOTE_TITLE);
        assert_eq!(rows[1].content, "");
    }

    #[test]
    fn test_token_storage_roundtrip() {
        let store = MemoryStore::new();
        let mut c = client();
        c.load_token(&store);
        assert!(!c.is_authenticated());

        c.set_token("t1".to_string());
        c.save_token(&store);

        let mut c2 = client();
        c2.load_token(&store);
        assert_eq!(c2.get_token().map(|s| s.as_str()), Some("t1"));

        c2.clear_token(&store);
        let mut c3 = client();
        c3.load_token(&store);
        assert!(c3.get_token().is_none());
    }
}
