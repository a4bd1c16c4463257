use crate::api::{ApiClient, EnvConfig};
use crate::autosave::SystemClock;
use crate::error::SyncError;
use crate::models::{Note, NoteId, Principal, DEFAULT_NOTE_TITLE};
use crate::settings::SettingsStore;
use crate::state::{AppState, SignalEvents, SyncEngine};
use crate::storage::{load_json, KeyValueStore, WebStorage, USER_KEY};
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::rc::Rc;
use wasm_bindgen::JsCast;

type Engine = SyncEngine<ApiClient>;

/// Everything the views need: read-only signals plus a handle to the engine.
#[derive(Clone, Copy)]
pub(crate) struct AppContext {
    pub state: AppState,
    engine: StoredValue<Rc<Engine>, LocalStorage>,
    settings: StoredValue<SettingsStore, LocalStorage>,
    autosave_timer: StoredValue<Option<i32>>,
}

impl AppContext {
    fn engine(&self) -> Rc<Engine> {
        self.engine.get_value()
    }

    /// Failed creates surface a blocking notice.
    fn create_note(self, title: &'static str) {
        let engine = self.engine();
        spawn_local(async move {
            if let Err(e) = engine.create_note(title).await {
                self.state.notice.set(Some(e.user_message()));
            }
        });
    }

    fn delete_note(self, id: NoteId) {
        let engine = self.engine();
        spawn_local(async move {
            if let Err(e) = engine.delete_note(&id).await {
                self.state.notice.set(Some(e.user_message()));
            }
        });
    }

    fn switch_note(self, id: NoteId) {
        let engine = self.engine();
        spawn_local(async move {
            // Save failures are recorded per note; the UI already shows local state.
            let _ = engine.switch_note(&id).await;
        });
    }

    fn rename(self, id: NoteId, title: String) {
        let engine = self.engine();
        spawn_local(async move {
            let _ = engine.update_title(&id, &title).await;
        });
    }

    fn toggle_pin(self, id: NoteId, pinned: bool) {
        let engine = self.engine();
        spawn_local(async move {
            let _ = engine.toggle_pin(&id, pinned).await;
        });
    }

    fn toggle_public(self, id: NoteId, published: bool) {
        let engine = self.engine();
        spawn_local(async move {
            let _ = engine.toggle_public(&id, published).await;
        });
    }

    fn toggle_theme(self) {
        self.settings.update_value(|store| {
            store.update(|s| {
                s.theme = if s.theme == "dark" { "light" } else { "dark" }.to_string();
            });
            self.state.settings.set(store.current().clone());
        });
    }

    fn edit(self, content: String) {
        self.engine().request_save(content);
        self.arm_autosave_timer();
    }

    /// One browser timer per session, re-armed on every input.
    fn arm_autosave_timer(self) {
        let Some(win) = web_sys::window() else {
            return;
        };

        if let Some(tid) = self.autosave_timer.get_value() {
            win.clear_timeout_with_handle(tid);
        }

        let delay = self.engine().idle_window().num_milliseconds() as i32;
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            self.autosave_timer.set_value(None);
            let engine = self.engine();
            // The browser timer is the idle window; write back unconditionally.
            spawn_local(async move {
                let _ = engine.flush().await;
            });
        });

        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                delay,
            )
            .ok();
        self.autosave_timer.set_value(tid);
    }
}

#[component]
pub fn App() -> impl IntoView {
    let store: Rc<dyn KeyValueStore> = Rc::new(WebStorage);
    let settings = SettingsStore::load(store.clone());
    let state = AppState::new(settings.current().clone());

    let mut api = ApiClient::from_env(&EnvConfig::new());
    api.load_token(store.as_ref());

    let engine = SyncEngine::new(
        api,
        store.clone(),
        Box::new(SystemClock),
        Box::new(SignalEvents(state)),
    );
    let ctx = AppContext {
        state,
        engine: StoredValue::new_local(Rc::new(engine)),
        settings: StoredValue::new_local(settings),
        autosave_timer: StoredValue::new(None),
    };
    provide_context(ctx);

    match load_json::<Principal>(store.as_ref(), USER_KEY) {
        Some(principal) => {
            let engine = ctx.engine();
            spawn_local(async move {
                if let Err(e) = engine.open_session(principal).await {
                    state.notice.set(Some(e.user_message()));
                }
            });
        }
        None => state
            .notice
            .set(Some(SyncError::NotAuthenticated.user_message())),
    }

    let theme = move || state.settings.with(|s| s.theme.clone());
    let font = move || state.settings.with(|s| s.editor_font.clone());
    let font_size = move || state.settings.with(|s| format!("{}px", s.editor_font_size));

    view! {
        <div class="app" data-theme=theme>
            <aside class="sidebar">
                <button class="new-note" on:click=move |_| ctx.create_note(DEFAULT_NOTE_TITLE)>
                    "New note"
                </button>
                <button class="theme-toggle" on:click=move |_| ctx.toggle_theme()>
                    "Toggle theme"
                </button>
                <NoteList heading="Pinned" pinned=true />
                <NoteList heading="Notes" pinned=false />
            </aside>
            <main class="editor-pane" style:font-family=font style:font-size=font_size>
                <Notice />
                <Editor />
            </main>
        </div>
    }
}

#[component]
fn Notice() -> impl IntoView {
    let state = expect_context::<AppContext>().state;

    view! {
        <Show when=move || state.notice.with(|n| n.is_some())>
            <div class="notice" role="alert">
                <span>{move || state.notice.get().unwrap_or_default()}</span>
                <button on:click=move |_| state.notice.set(None)>"Dismiss"</button>
            </div>
        </Show>
    }
}

#[component]
fn NoteList(heading: &'static str, pinned: bool) -> impl IntoView {
    let ctx = expect_context::<AppContext>();

    // Pin order lives in the engine; re-read it whenever the collection changes.
    let notes = move || {
        ctx.state.notes.track();
        let engine = ctx.engine();
        if pinned {
            engine.pinned_notes()
        } else {
            engine.unpinned_notes()
        }
    };

    view! {
        <section class="note-list">
            <h3>{heading}</h3>
            <ul>
                {move || {
                    notes()
                        .into_iter()
                        .map(|note| view! { <NoteChip note=note /> })
                        .collect_view()
                }}
            </ul>
        </section>
    }
}

#[component]
fn NoteChip(note: Note) -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let state = ctx.state;

    let id = note.id.clone();
    let is_active = {
        let id = id.clone();
        move || state.active_id.with(|a| a.as_ref() == Some(&id))
    };
    let is_unsaved = {
        let id = id.clone();
        move || state.unsaved_id.with(|u| u.as_ref() == Some(&id))
    };
    let failed = {
        let id = id.clone();
        move || {
            state.notes.track();
            ctx.engine().sync_status(&id).is_some_and(|s| s.is_failed())
        }
    };

    let (open_id, pin_id, public_id, delete_id) = (id.clone(), id.clone(), id.clone(), id);
    let pinned = note.is_pinned;
    let public = note.is_public;

    view! {
        <li class="chip" class:active=is_active class:unsaved=is_unsaved class:sync-failed=failed>
            <span class="chip-title" on:click=move |_| ctx.switch_note(open_id.clone())>
                {note.title.clone()}
            </span>
            <button on:click=move |_| ctx.toggle_pin(pin_id.clone(), !pinned)>
                {if pinned { "Unpin" } else { "Pin" }}
            </button>
            <button on:click=move |_| ctx.toggle_public(public_id.clone(), !public)>
                {if public { "Unpublish" } else { "Publish" }}
            </button>
            <button class="danger" on:click=move |_| ctx.delete_note(delete_id.clone())>
                "Delete"
            </button>
        </li>
    }
}

#[component]
fn Editor() -> impl IntoView {
    let ctx = expect_context::<AppContext>();
    let state = ctx.state;

    // Reload editor fields only when the cursor moves, never on autosave.
    let active = Memo::new(move |_| state.active_id.get());
    let active_field = move |f: fn(&Note) -> String| {
        let id = active.get();
        state.notes.with_untracked(|notes| {
            id.and_then(|id| notes.iter().find(|n| n.id == id).map(f))
                .unwrap_or_default()
        })
    };

    let title = move || active_field(|n| n.title.clone());
    let content = move || active_field(|n| n.content.clone());

    let on_title_change = move |ev: web_sys::Event| {
        let value = event_target::<web_sys::HtmlInputElement>(&ev).value();
        if let Some(id) = state.active_id.get_untracked() {
            ctx.rename(id, value);
        }
    };

    let on_input = move |ev: web_sys::Event| {
        let value = event_target::<web_sys::HtmlTextAreaElement>(&ev).value();
        ctx.edit(value);
    };

    view! {
        <input class="note-title" type="text" prop:value=title on:change=on_title_change />
        <textarea class="note-content" prop:value=content on:input=on_input></textarea>
    }
}
