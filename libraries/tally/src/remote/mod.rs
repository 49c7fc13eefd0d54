//! The shared remote copy of a history log.
//!
//! Every backend exposes the same capabilities: read a log, write (replace) a log, and optionally watch for
//! changes. None of them ever report failure to the caller as an error. A read that fails for any reason yields an
//! empty log, and a write reports [`WriteOutcome::Failed`]. "No backend configured" behaves exactly like "backend
//! empty".

use std::rc::Rc;

use crate::config::BackendKind;
use crate::data_model::{HistoryLog, SessionIdentity};

#[cfg(feature = "document")]
pub mod document;
mod memory;
#[cfg(feature = "realtime")]
pub mod realtime;

pub use memory::{MemoryMode, MemoryRemote};

#[cfg(feature = "document")]
use document::DocumentStore;
#[cfg(feature = "realtime")]
use realtime::RealtimeStore;

/// Why a remote operation didn't succeed. Only used inside backends and in log messages.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote store is unavailable")]
    Unavailable,

    #[error("request failed: {0}")]
    Request(String),

    #[error("server responded with status {0}")]
    Status(String),

    #[error("malformed remote payload")]
    Payload(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was replaced.
    Stored,
    /// A new record was created; it is addressed by the returned identity from now on.
    Created(SessionIdentity),
    /// No remote backend is configured.
    Skipped,
    Failed(String),
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WriteOutcome::Stored | WriteOutcome::Created(_))
    }
}

pub type ChangeCallback = Rc<dyn Fn(HistoryLog)>;

/// A live watch on a remote record. Delivery stops when this is dropped or [`Subscription::unsubscribe`]d.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

// Futures here are driven on a single thread (the browser's event loop), so they don't need to be `Send`.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    fn kind(&self) -> BackendKind;

    /// The remote log for `identity`, or an empty log if it doesn't exist or can't be fetched.
    async fn read(&self, identity: &SessionIdentity) -> HistoryLog;

    /// Replace the remote log for `identity` with `history`.
    async fn write(&self, identity: &SessionIdentity, history: &HistoryLog) -> WriteOutcome;

    /// Call `on_change` whenever the remote record changes. Backends without push support return `None`.
    fn watch(&self, identity: &SessionIdentity, on_change: ChangeCallback) -> Option<Subscription> {
        let _ = (identity, on_change);
        None
    }
}

/// Which remote backend to talk to, as supplied by the embedding page.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum RemoteConfig {
    #[default]
    Disabled,
    Realtime {
        database_url: String,
        #[serde(default)]
        auth_token: Option<String>,
    },
    Document {
        #[serde(default = "default_document_api_url")]
        api_url: String,
        #[serde(default)]
        api_key: Option<String>,
    },
    /// An in-process store, for demos and tests.
    Memory,
}

fn default_document_api_url() -> String {
    "https://api.jsonbin.io/v3".to_string()
}

/// The backend chosen at construction time.
pub enum RemoteBackend {
    Disabled,
    #[cfg(feature = "realtime")]
    Realtime(RealtimeStore),
    #[cfg(feature = "document")]
    Document(DocumentStore),
    Memory(MemoryRemote),
}

impl RemoteBackend {
    /// Build the configured backend. A configuration that can't be honored (a blank endpoint, or a backend that
    /// wasn't compiled in) degrades to [`RemoteBackend::Disabled`].
    pub fn from_config(config: &RemoteConfig) -> Self {
        match config {
            RemoteConfig::Disabled => RemoteBackend::Disabled,
            RemoteConfig::Memory => RemoteBackend::Memory(MemoryRemote::push_store()),
            #[cfg(feature = "realtime")]
            RemoteConfig::Realtime {
                database_url,
                auth_token,
            } => RealtimeStore::new(database_url, auth_token.clone())
                .map(RemoteBackend::Realtime)
                .unwrap_or_else(|| {
                    log::warn!("Realtime store has no database URL, saving locally only");
                    RemoteBackend::Disabled
                }),
            #[cfg(feature = "document")]
            RemoteConfig::Document { api_url, api_key } => {
                DocumentStore::new(api_url, api_key.clone())
                    .map(RemoteBackend::Document)
                    .unwrap_or_else(|| {
                        log::warn!("Document store has no API URL, saving locally only");
                        RemoteBackend::Disabled
                    })
            }
            #[allow(unreachable_patterns)]
            other => {
                log::warn!("Remote backend {other:?} is not compiled in, saving locally only");
                RemoteBackend::Disabled
            }
        }
    }
}

impl RemoteStore for RemoteBackend {
    fn kind(&self) -> BackendKind {
        match self {
            RemoteBackend::Disabled => BackendKind::Disabled,
            #[cfg(feature = "realtime")]
            RemoteBackend::Realtime(store) => store.kind(),
            #[cfg(feature = "document")]
            RemoteBackend::Document(store) => store.kind(),
            RemoteBackend::Memory(store) => store.kind(),
        }
    }

    async fn read(&self, identity: &SessionIdentity) -> HistoryLog {
        match self {
            RemoteBackend::Disabled => {
                log::debug!("No remote store configured, nothing to read");
                HistoryLog::new()
            }
            #[cfg(feature = "realtime")]
            RemoteBackend::Realtime(store) => store.read(identity).await,
            #[cfg(feature = "document")]
            RemoteBackend::Document(store) => store.read(identity).await,
            RemoteBackend::Memory(store) => store.read(identity).await,
        }
    }

    async fn write(&self, identity: &SessionIdentity, history: &HistoryLog) -> WriteOutcome {
        match self {
            RemoteBackend::Disabled => WriteOutcome::Skipped,
            #[cfg(feature = "realtime")]
            RemoteBackend::Realtime(store) => store.write(identity, history).await,
            #[cfg(feature = "document")]
            RemoteBackend::Document(store) => store.write(identity, history).await,
            RemoteBackend::Memory(store) => store.write(identity, history).await,
        }
    }

    fn watch(&self, identity: &SessionIdentity, on_change: ChangeCallback) -> Option<Subscription> {
        match self {
            RemoteBackend::Disabled => None,
            #[cfg(feature = "realtime")]
            RemoteBackend::Realtime(store) => store.watch(identity, on_change),
            #[cfg(feature = "document")]
            RemoteBackend::Document(store) => store.watch(identity, on_change),
            RemoteBackend::Memory(store) => store.watch(identity, on_change),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn config_from_json() {
        let config: RemoteConfig = serde_json::from_str(
            r#"{"backend":"realtime","database_url":"https://calc.firebaseio.com"}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            RemoteConfig::Realtime {
                database_url: "https://calc.firebaseio.com".to_string(),
                auth_token: None,
            }
        );

        let config: RemoteConfig = serde_json::from_str(r#"{"backend":"document"}"#).unwrap();
        assert_eq!(
            config,
            RemoteConfig::Document {
                api_url: "https://api.jsonbin.io/v3".to_string(),
                api_key: None,
            }
        );
    }

    #[test]
    fn disabled_backend_behaves_like_empty() {
        let backend = RemoteBackend::from_config(&RemoteConfig::Disabled);
        let identity = SessionIdentity::new("calc_a_b").unwrap();
        let history = HistoryLog::new();

        assert_eq!(backend.kind(), BackendKind::Disabled);
        assert!(block_on(backend.read(&identity)).is_empty());
        assert_eq!(
            block_on(backend.write(&identity, &history)),
            WriteOutcome::Skipped
        );
        assert!(backend.watch(&identity, Rc::new(|_| {})).is_none());
    }

    #[cfg(feature = "realtime")]
    #[test]
    fn blank_endpoint_degrades_to_disabled() {
        let backend = RemoteBackend::from_config(&RemoteConfig::Realtime {
            database_url: "  ".to_string(),
            auth_token: None,
        });
        assert_eq!(backend.kind(), BackendKind::Disabled);
    }

    #[test]
    fn subscription_cancels_once() {
        let cancelled = Rc::new(std::cell::Cell::new(0));
        let counter = Rc::clone(&cancelled);
        let subscription = Subscription::new(move || counter.set(counter.get() + 1));
        subscription.unsubscribe();
        assert_eq!(cancelled.get(), 1);

        let counter = Rc::clone(&cancelled);
        drop(Subscription::new(move || counter.set(counter.get() + 1)));
        assert_eq!(cancelled.get(), 2);
    }
}
