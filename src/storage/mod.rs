use crate::error::LocalPersistenceError;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

pub const TOKEN_KEY: &str = "padnote_token";
/// Principal written by the sign-in flow.
pub const USER_KEY: &str = "padnote_user";
pub const PIN_ORDER_KEY: &str = "padnote_pin_order";
pub const SETTINGS_KEY: &str = "padnote_settings";

/// Small synchronous key/value store that survives reloads.
///
/// Never fails observably: any underlying error reads back as "absent" and
/// writes are best-effort.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Browser `localStorage`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WebStorage;

impl WebStorage {
    fn storage() -> Option<web_sys::Storage> {
        web_sys::window().and_then(|w| w.local_storage().ok().flatten())
    }
}

impl KeyValueStore for WebStorage {
    fn get(&self, key: &str) -> Option<String> {
        Self::storage()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) {
        match Self::storage() {
            Some(storage) => {
                if storage.set_item(key, value).is_err() {
                    log::warn!("localStorage rejected write to {key}");
                }
            }
            None => log::warn!("{}", LocalPersistenceError::Unavailable),
        }
    }

    fn remove(&self, key: &str) {
        if let Some(storage) = Self::storage() {
            let _ = storage.remove_item(key);
        }
    }
}

/// Process-local store, used natively and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }
}

pub(crate) fn try_load_json<T: for<'de> Deserialize<'de>>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, LocalPersistenceError> {
    let Some(json) = store.get(key) else {
        return Ok(None);
    };
    serde_json::from_str(&json)
        .map(Some)
        .map_err(|source| LocalPersistenceError::Malformed {
            key: key.to_string(),
            source,
        })
}

/// Reads a JSON blob, degrading a malformed value to "absent".
pub(crate) fn load_json<T: for<'de> Deserialize<'de>>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Option<T> {
    match try_load_json(store, key) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("ignoring stored value: {e}");
            None
        }
    }
}

pub(crate) fn save_json<T: Serialize>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(json) => store.set(key, &json),
        Err(e) => log::warn!("could not serialize {key}: {e}"),
    }
}
