use crate::storage::{load_json, save_json, KeyValueStore, SETTINGS_KEY};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// Editor preferences. Non-essential: a bad stored value falls back to defaults.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: String,
    pub editor_font: String,
    pub editor_font_size: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            editor_font: "Playpen Sans".to_string(),
            editor_font_size: "18".to_string(),
        }
    }
}

/// Sole writer of the settings key for the session.
pub struct SettingsStore {
    store: Rc<dyn KeyValueStore>,
    current: Settings,
}

impl SettingsStore {
    pub fn load(store: Rc<dyn KeyValueStore>) -> Self {
        let current = load_json::<Settings>(store.as_ref(), SETTINGS_KEY).unwrap_or_default();
        Self { store, current }
    }

    pub fn current(&self) -> &Settings {
        &self.current
    }

    pub fn update(&mut self, f: impl FnOnce(&mut Settings)) {
        f(&mut self.current);
        save_json(self.store.as_ref(), SETTINGS_KEY, &self.current);
    }

    pub fn reset(&mut self) {
        self.update(|s| *s = Settings::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_defaults_when_absent_or_malformed() {
        let store = Rc::new(MemoryStore::new());
        assert_eq!(SettingsStore::load(store.clone()).current(), &Settings::default());

        store.set(SETTINGS_KEY, "nope");
        assert_eq!(SettingsStore::load(store).current(), &Settings::default());
    }

    #[test]
    fn test_partial_blob_fills_missing_fields() {
        let store = Rc::new(MemoryStore::new());
        store.set(SETTINGS_KEY, r#"{"theme":"light","autoSave":true}"#);
        let s = SettingsStore::load(store);
        assert_eq!(s.current().theme, "light");
        assert_eq!(s.current().editor_font_size, "18");
    }

    #[test]
    fn test_update_persists() {
        let store = Rc::new(MemoryStore::new());
        let mut s = SettingsStore::load(store.clone());
        s.update(|s| s.editor_font_size = "20".into());

        let reloaded = SettingsStore::load(store.clone());
        assert_eq!(reloaded.current().editor_font_size, "20");

        s.reset();
        assert_eq!(SettingsStore::load(store).current(), &Settings::default());
    }
}
