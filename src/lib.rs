pub mod api;
mod app;
pub mod autosave;
pub mod editor;
pub mod error;
pub mod logging;
pub mod models;
pub mod notes;
pub mod pins;
pub mod remote;
pub mod settings;
pub mod state;
pub mod storage;

#[cfg(test)]
mod testing;

pub use app::App;
pub use error::{SyncError, SyncResult};
pub use models::{Note, NoteId, Principal, SyncStatus};
pub use remote::{RemoteError, RemoteErrorKind, RemoteStore};
pub use state::{SyncEngine, SyncEvents};
pub use storage::KeyValueStore;

use leptos::prelude::*;

// Needed for `#[wasm_bindgen(start)]` on the wasm entrypoint.
#[cfg(all(target_arch = "wasm32", not(test)))]
use wasm_bindgen::prelude::wasm_bindgen;

// Only register the WASM start function for normal builds (not for tests),
// otherwise wasm-bindgen-test will end up with multiple entry symbols.
#[cfg_attr(all(target_arch = "wasm32", not(test)), wasm_bindgen(start))]
pub fn main() {
    console_error_panic_hook::set_once();
    logging::init(log::LevelFilter::Debug);
    mount_to_body(App);
}
