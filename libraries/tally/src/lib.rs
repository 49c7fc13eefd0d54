//! This is a library for keeping a calculator's history in sync between a device and a shared remote record.
//! It was created for a browser calculator, so it doesn't include much that was not needed for that project.
//!
//! Syncing strategy:
//! 1. Each device gets a session identity. A shareable link can carry someone else's identity, which lets another
//!    browser load the same history.
//! 2. The history is a newest-first log of completed calculations. The in-memory log, owned by the
//!    [`HistorySyncEngine`], is authoritative during a session.
//! 3. Every change is written to the device's local storage synchronously, then the *whole* log is written to the
//!    remote store in the background. Remote failures never touch the local copy.
//! 4. On startup, the remote record wins if it has anything in it; otherwise the local copy is used.
//!
//! Last writer wins. There is no merging of concurrent edits, and overlapping remote writes are not reordered: every
//! write carries the full log, so the next successful write repairs whatever an earlier one left behind.

pub mod calculator;
pub mod config;
pub mod data_model;
pub mod engine;
pub mod export;
pub mod identity;
pub mod local_cache;
pub mod remote;
pub mod storage;
pub mod usage;

#[cfg(target_arch = "wasm32")]
#[cfg(feature = "web")]
pub mod web_storage;

pub use calculator::{CalculatorEngine, Operator};
pub use config::{BackendKind, SyncConfig};
pub use data_model::{HistoryEntry, HistoryLog, SessionIdentity, UsageDay, UsageMap};
pub use engine::{HistorySyncEngine, ListenerKey, SyncStatus};
pub use export::{ExportDocument, ImportError};
pub use identity::{IdentityProvider, IdentitySource, ResolvedIdentity};
pub use local_cache::{LocalCache, StorageKeys};
pub use remote::{
    MemoryRemote, RemoteBackend, RemoteConfig, RemoteError, RemoteStore, Subscription,
    WriteOutcome,
};
pub use storage::{KeyValueStore, MemoryStorage, StorageError};
pub use usage::{Intensity, UsageTracker, UsageWindow, usage_window};

#[cfg(target_arch = "wasm32")]
#[cfg(feature = "web")]
pub use web_storage::WebStorage;
