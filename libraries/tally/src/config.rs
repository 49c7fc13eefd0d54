//! Settings that follow from which kind of remote backend is in use.

use crate::local_cache::StorageKeys;

const STORAGE_NAMESPACE: &str = "calculator";

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// No remote store; everything stays on the device.
    Disabled,
    /// A push store: writes replace the record, and changes can be watched live.
    Realtime,
    /// A request/response document store that issues record ids on creation.
    Document,
}

impl BackendKind {
    /// The query parameter a shareable link carries the identity in.
    pub fn link_parameter(self) -> &'static str {
        match self {
            BackendKind::Disabled | BackendKind::Realtime => "session",
            BackendKind::Document => "bin",
        }
    }

    fn identity_key_name(self) -> &'static str {
        match self {
            BackendKind::Disabled | BackendKind::Realtime => "session_id",
            BackendKind::Document => "bin_id",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub keys: StorageKeys,
    pub link_parameter: String,
}

impl SyncConfig {
    pub fn for_backend(kind: BackendKind) -> Self {
        Self {
            keys: StorageKeys::namespaced(STORAGE_NAMESPACE, kind.identity_key_name()),
            link_parameter: kind.link_parameter().to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::for_backend(BackendKind::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_per_backend() {
        let realtime = SyncConfig::for_backend(BackendKind::Realtime);
        assert_eq!(realtime.link_parameter, "session");
        assert_eq!(realtime.keys.identity, "calculator_session_id");
        assert_eq!(realtime.keys.history, "calculator_history");
        assert_eq!(realtime.keys.usage, "calculator_usage");

        let document = SyncConfig::for_backend(BackendKind::Document);
        assert_eq!(document.link_parameter, "bin");
        assert_eq!(document.keys.identity, "calculator_bin_id");
        assert_eq!(document.keys.history, "calculator_history");
    }
}
