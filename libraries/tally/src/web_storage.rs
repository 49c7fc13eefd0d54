//! `localStorage` as a [`KeyValueStore`].
use wasm_bindgen::JsValue;

use crate::storage::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct WebStorage {
    storage: Option<web_sys::Storage>,
}

impl WebStorage {
    /// The window's `localStorage`. If the browser refuses access (private mode, sandboxed iframe) every
    /// operation reports [`StorageError::Unavailable`] instead.
    pub fn local() -> Self {
        let storage = web_sys::window()
            .and_then(|window| {
                window
                    .local_storage()
                    .inspect_err(|e| log::warn!("localStorage is not accessible: {e:?}"))
                    .ok()
                    .flatten()
            });

        if storage.is_none() {
            log::warn!("No localStorage available, history will not survive a reload");
        }

        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StorageError> {
        self.storage.as_ref().ok_or(StorageError::Unavailable)
    }
}

fn js_error(e: JsValue) -> StorageError {
    StorageError::Backend(e.as_string().unwrap_or_else(|| format!("{e:?}")))
}

impl KeyValueStore for WebStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?.get_item(key).map_err(js_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?.set_item(key, value).map_err(js_error)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?.remove_item(key).map_err(js_error)
    }
}
