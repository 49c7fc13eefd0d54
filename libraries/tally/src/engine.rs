//! # HistorySyncEngine
//! Owns the session's history log and identity, and keeps the local and remote copies up to date.
//!
//! Every mutation follows the same order: update the in-memory log, save it locally (synchronously, before the
//! mutating call returns), then hand back a future that writes the full log to the remote store. The caller is
//! expected to spawn that future; nothing is retried and nothing is cancelled.
//!
//! Each remote write is numbered. Only the completion of the most recently issued write returns the status to
//! [`SyncStatus::Idle`], so an older write finishing late can't report "synced" while a newer one is in flight.
//! Writes are *not* reordered on the wire though: if an older write lands last, the remote record shows the older
//! log until the next write replaces it.
//!
//! Watched remote changes are adopted only when they are news. The engine remembers the snapshots it recently wrote
//! and ignores them when they echo back, and it never adopts a log that its own log grew out of.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use chrono::{DateTime, Utc};
use futures::{FutureExt, future::LocalBoxFuture};
use slotmap::SlotMap;

use crate::data_model::{HistoryEntry, HistoryLog, SessionIdentity};
use crate::identity::{IdentityProvider, IdentitySource};
use crate::local_cache::LocalCache;
use crate::remote::{RemoteStore, Subscription, WriteOutcome};
use crate::storage::KeyValueStore;

slotmap::new_key_type! {
    pub struct ListenerKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SyncStatus {
    Idle,
    Syncing,
}

type Listener = Rc<dyn Fn(&HistoryLog)>;

// how many of our own write snapshots to recognize when they echo back
const REMEMBERED_WRITES: usize = 16;

pub struct HistorySyncEngine<R, S> {
    remote: R,
    cache: LocalCache<S>,
    provider: IdentityProvider,
    identity: RefCell<SessionIdentity>,
    history: RefCell<HistoryLog>,
    status: Cell<SyncStatus>,
    // sequence number of the most recently issued remote write
    issued_writes: Cell<u64>,
    writes_in_flight: Cell<usize>,
    recent_writes: RefCell<VecDeque<HistoryLog>>,
    last_outcome: RefCell<Option<WriteOutcome>>,
    listeners: RefCell<SlotMap<ListenerKey, Listener>>,
}

impl<R: RemoteStore + 'static, S: KeyValueStore + 'static> HistorySyncEngine<R, S> {
    /// Resolve the identity and load the starting history: the remote log if it has anything in it, otherwise the
    /// local copy, otherwise nothing. Never fails.
    ///
    /// A link identity whose remote log is non-empty becomes this device's identity from now on. A link identity
    /// with nothing behind it is dropped, and the session carries on under the device's own identity.
    pub async fn initialize(
        remote: R,
        cache: LocalCache<S>,
        provider: IdentityProvider,
        now: DateTime<Utc>,
    ) -> Rc<Self> {
        let (identity, history) = Self::load_initial(&remote, &cache, &provider, now).await;
        log::info!(
            "History engine ready: {} entries, identity {identity}",
            history.len()
        );

        Rc::new(Self {
            remote,
            cache,
            provider,
            identity: RefCell::new(identity),
            history: RefCell::new(history),
            status: Cell::new(SyncStatus::Idle),
            issued_writes: Cell::new(0),
            writes_in_flight: Cell::new(0),
            recent_writes: RefCell::new(VecDeque::with_capacity(REMEMBERED_WRITES)),
            last_outcome: RefCell::new(None),
            listeners: RefCell::new(SlotMap::with_key()),
        })
    }

    async fn load_initial(
        remote: &R,
        cache: &LocalCache<S>,
        provider: &IdentityProvider,
        now: DateTime<Utc>,
    ) -> (SessionIdentity, HistoryLog) {
        let resolved = provider.resolve(cache, now);
        let identity = resolved.identity;
        let remote_history = remote.read(&identity).await;

        if resolved.source == IdentitySource::Link {
            if remote_history.is_empty() {
                log::info!("Nothing stored under shared identity {identity}, using local history");
                let device = provider.device_identity(cache, now);
                return (device.identity, cache.load());
            }

            log::info!(
                "Loaded {} entries shared under {identity}",
                remote_history.len()
            );
            if cache.stored_identity().as_ref() != Some(&identity) {
                log::info!("Adopting {identity} as this device's identity");
                cache.store_identity(&identity);
            }
        } else if remote_history.is_empty() {
            return (identity, cache.load());
        }

        cache.save(&remote_history);
        (identity, remote_history)
    }

    /// Add `entry` as the newest item. The local copy is saved before this returns; the returned future performs
    /// the remote write.
    pub fn append(self: &Rc<Self>, entry: HistoryEntry) -> LocalBoxFuture<'static, WriteOutcome> {
        let snapshot = {
            let mut history = self.history.borrow_mut();
            history.prepend(entry);
            history.clone()
        };
        self.cache.save(&snapshot);
        self.notify_listeners(&snapshot);
        self.push_remote(snapshot)
    }

    /// Replace the whole log, e.g. with an imported file. Same ordering guarantees as [`Self::append`].
    pub fn replace_history(
        self: &Rc<Self>,
        history: HistoryLog,
    ) -> LocalBoxFuture<'static, WriteOutcome> {
        *self.history.borrow_mut() = history.clone();
        self.cache.save(&history);
        self.notify_listeners(&history);
        self.push_remote(history)
    }

    /// Empty the log and the local copy. The remote record is left as it is until the next write replaces it.
    pub fn clear(&self) {
        let empty = HistoryLog::new();
        *self.history.borrow_mut() = empty.clone();
        self.cache.clear();
        self.notify_listeners(&empty);
    }

    /// Follow remote changes to the session's record, if the backend can push them.
    pub fn watch_remote(self: &Rc<Self>) -> Option<Subscription> {
        let engine = Rc::downgrade(self);
        let identity = self.identity();
        self.remote.watch(
            &identity,
            Rc::new(move |remote_history| {
                if let Some(engine) = engine.upgrade() {
                    engine.adopt_remote(remote_history);
                }
            }),
        )
    }

    fn push_remote(self: &Rc<Self>, snapshot: HistoryLog) -> LocalBoxFuture<'static, WriteOutcome> {
        let sequence = self.issued_writes.get() + 1;
        self.issued_writes.set(sequence);
        self.writes_in_flight.set(self.writes_in_flight.get() + 1);
        self.status.set(SyncStatus::Syncing);
        {
            let mut recent = self.recent_writes.borrow_mut();
            if recent.len() == REMEMBERED_WRITES {
                recent.pop_front();
            }
            recent.push_back(snapshot.clone());
        }

        let identity = self.identity();
        let engine = Rc::clone(self);
        async move {
            let outcome = engine.remote.write(&identity, &snapshot).await;
            engine.finish_write(sequence, &outcome);
            outcome
        }
        .boxed_local()
    }

    fn finish_write(&self, sequence: u64, outcome: &WriteOutcome) {
        self.writes_in_flight
            .set(self.writes_in_flight.get().saturating_sub(1));

        match outcome {
            WriteOutcome::Created(issued) => self.adopt_issued_identity(issued),
            WriteOutcome::Failed(reason) => {
                log::warn!("Remote write #{sequence} failed, history is only saved locally: {reason}")
            }
            WriteOutcome::Stored | WriteOutcome::Skipped => {}
        }
        *self.last_outcome.borrow_mut() = Some(outcome.clone());

        let latest = self.issued_writes.get();
        if sequence == latest {
            self.status.set(SyncStatus::Idle);
        } else {
            log::debug!("Remote write #{sequence} finished after #{latest} was issued");
        }
    }

    fn adopt_issued_identity(&self, issued: &SessionIdentity) {
        let mut identity = self.identity.borrow_mut();
        if identity.server_id().is_some() {
            log::warn!("Ignoring newly issued {issued}, session is already stored as {identity}");
            return;
        }
        log::info!("Remote store issued {issued} for {identity}");
        *identity = issued.clone();
        self.cache.store_identity(issued);
    }

    fn adopt_remote(&self, remote_history: HistoryLog) {
        // our own writes echo back; while any are outstanding the newest local state wins
        if self.writes_in_flight.get() > 0 {
            return;
        }
        if remote_history.is_empty() {
            log::debug!("Ignoring empty remote snapshot");
            return;
        }
        {
            let history = self.history.borrow();
            if *history == remote_history {
                return;
            }
            if history.strictly_extends(&remote_history) {
                log::debug!(
                    "Ignoring stale remote snapshot of {} entries",
                    remote_history.len()
                );
                return;
            }
        }
        if self.recent_writes.borrow().contains(&remote_history) {
            log::debug!("Ignoring echo of an earlier write");
            return;
        }

        log::info!(
            "Remote history changed, now {} entries",
            remote_history.len()
        );
        *self.history.borrow_mut() = remote_history.clone();
        self.cache.save(&remote_history);
        self.notify_listeners(&remote_history);
    }

    pub fn register_listener(&self, listener: impl Fn(&HistoryLog) + 'static) -> ListenerKey {
        self.listeners.borrow_mut().insert(Rc::new(listener))
    }

    pub fn unregister_listener(&self, key: ListenerKey) {
        self.listeners.borrow_mut().remove(key);
    }

    fn notify_listeners(&self, history: &HistoryLog) {
        let listeners: Vec<Listener> = self.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener(history);
        }
    }

    pub fn history(&self) -> HistoryLog {
        self.history.borrow().clone()
    }

    pub fn identity(&self) -> SessionIdentity {
        self.identity.borrow().clone()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.status.get()
    }

    pub fn last_outcome(&self) -> Option<WriteOutcome> {
        self.last_outcome.borrow().clone()
    }

    pub fn shareable_url(&self, origin: &str) -> String {
        self.provider.shareable_url(origin, &self.identity.borrow())
    }

    pub fn cache(&self) -> &LocalCache<S> {
        &self.cache
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}
