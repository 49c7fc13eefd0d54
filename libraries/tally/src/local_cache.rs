//! The device-local copy of the history, the device's identity, and the usage counters.
//!
//! Nothing here fails observably. Write faults are logged and swallowed; missing or corrupt data reads as empty.

use serde::{Serialize, de::DeserializeOwned};

use crate::data_model::{HistoryLog, SessionIdentity, UsageMap};
use crate::storage::{KeyValueStore, StorageError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageKeys {
    pub identity: String,
    pub history: String,
    pub usage: String,
}

impl StorageKeys {
    pub fn namespaced(namespace: &str, identity_name: &str) -> Self {
        Self {
            identity: format!("{namespace}_{identity_name}"),
            history: format!("{namespace}_history"),
            usage: format!("{namespace}_usage"),
        }
    }
}

#[derive(Debug)]
pub struct LocalCache<S> {
    storage: S,
    keys: StorageKeys,
}

impl<S: KeyValueStore> LocalCache<S> {
    pub fn new(storage: S, keys: StorageKeys) -> Self {
        Self { storage, keys }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn save(&self, history: &HistoryLog) {
        let _ = self
            .write_json(&self.keys.history, history)
            .inspect_err(|e| log::error!("Failed to save history locally: {e:?}"));
    }

    /// The stored history, or an empty log if there is none or it can't be parsed.
    pub fn load(&self) -> HistoryLog {
        self.read_json(&self.keys.history).unwrap_or_default()
    }

    pub fn clear(&self) {
        let _ = self
            .storage
            .remove(&self.keys.history)
            .inspect_err(|e| log::error!("Failed to clear local history: {e:?}"));
    }

    pub fn stored_identity(&self) -> Option<SessionIdentity> {
        self.storage
            .get(&self.keys.identity)
            .inspect_err(|e| log::warn!("Failed to read device identity: {e:?}"))
            .ok()
            .flatten()
            .and_then(SessionIdentity::new)
    }

    pub fn store_identity(&self, identity: &SessionIdentity) {
        let _ = self
            .storage
            .set(&self.keys.identity, identity.as_str())
            .inspect_err(|e| log::error!("Failed to persist device identity {identity}: {e:?}"));
    }

    pub fn clear_identity(&self) {
        let _ = self
            .storage
            .remove(&self.keys.identity)
            .inspect_err(|e| log::error!("Failed to clear device identity: {e:?}"));
    }

    pub fn load_usage(&self) -> UsageMap {
        self.read_json(&self.keys.usage).unwrap_or_default()
    }

    pub fn save_usage(&self, usage: &UsageMap) {
        let _ = self
            .write_json(&self.keys.usage, usage)
            .inspect_err(|e| log::error!("Failed to save usage counters: {e:?}"));
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self
            .storage
            .get(key)
            .inspect_err(|e| log::warn!("Failed to read `{key}` from local storage: {e:?}"))
            .ok()
            .flatten()?;

        serde_json::from_str(&text)
            .inspect_err(|e| log::warn!("Ignoring malformed `{key}` in local storage: {e}"))
            .ok()
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(StorageError::Encode)?;
        self.storage.set(key, &text)
    }
}
