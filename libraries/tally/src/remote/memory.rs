//! An in-process remote store. Clones share state, so two engines built on clones of one `MemoryRemote` behave
//! like two devices talking to the same server.
//!
//! It can be switched off to simulate an outage, and writes can be held back and released in any order to simulate
//! a slow network. Change notifications can also be deferred and flushed later, the way a real push channel delivers
//! them some time after the write has been acknowledged.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    rc::{Rc, Weak},
};

use futures::channel::oneshot;
use slotmap::SlotMap;

use crate::config::BackendKind;
use crate::data_model::{HistoryLog, SessionIdentity};
use crate::remote::{ChangeCallback, RemoteStore, Subscription, WriteOutcome};

slotmap::new_key_type! {
    struct WatchKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemoryMode {
    /// Writes replace the record under the given identity; watching is supported.
    PushStore,
    /// Writes under a client-generated identity create a record with a newly issued identity; no watching.
    DocumentStore,
}

#[derive(Clone)]
pub struct MemoryRemote {
    inner: Rc<RefCell<MemoryInner>>,
}

struct MemoryInner {
    mode: MemoryMode,
    records: BTreeMap<SessionIdentity, HistoryLog>,
    available: bool,
    holding: bool,
    held: Vec<oneshot::Sender<()>>,
    issued: u64,
    reads: usize,
    writes: usize,
    watchers: SlotMap<WatchKey, (SessionIdentity, ChangeCallback)>,
    deferring: bool,
    pending: Vec<(SessionIdentity, HistoryLog)>,
}

impl MemoryRemote {
    pub fn new(mode: MemoryMode) -> Self {
        Self {
            inner: Rc::new(RefCell::new(MemoryInner {
                mode,
                records: BTreeMap::new(),
                available: true,
                holding: false,
                held: Vec::new(),
                issued: 0,
                reads: 0,
                writes: 0,
                watchers: SlotMap::with_key(),
                deferring: false,
                pending: Vec::new(),
            })),
        }
    }

    pub fn push_store() -> Self {
        Self::new(MemoryMode::PushStore)
    }

    pub fn document_store() -> Self {
        Self::new(MemoryMode::DocumentStore)
    }

    /// While unavailable, reads come back empty and writes fail.
    pub fn set_available(&self, available: bool) {
        self.inner.borrow_mut().available = available;
    }

    /// While holding, writes wait until released.
    pub fn hold_writes(&self, holding: bool) {
        self.inner.borrow_mut().holding = holding;
    }

    pub fn held_writes(&self) -> usize {
        self.inner.borrow().held.len()
    }

    /// Let the oldest held write land. Returns `false` if none was waiting.
    pub fn release_oldest(&self) -> bool {
        let sender = {
            let mut inner = self.inner.borrow_mut();
            if inner.held.is_empty() {
                return false;
            }
            inner.held.remove(0)
        };
        sender.send(()).is_ok()
    }

    /// Let the most recently held write land.
    pub fn release_newest(&self) -> bool {
        let Some(sender) = self.inner.borrow_mut().held.pop() else {
            return false;
        };
        sender.send(()).is_ok()
    }

    /// While deferring, change notifications are queued instead of delivered. Turning it off leaves the queue alone.
    pub fn defer_notifications(&self, deferring: bool) {
        self.inner.borrow_mut().deferring = deferring;
    }

    pub fn pending_notifications(&self) -> usize {
        self.inner.borrow().pending.len()
    }

    /// Deliver every queued notification in the order the records changed. Returns how many were delivered.
    pub fn flush_notifications(&self) -> usize {
        let pending = std::mem::take(&mut self.inner.borrow_mut().pending);
        let delivered = pending.len();
        for (identity, history) in pending {
            self.deliver(&identity, &history);
        }
        delivered
    }

    pub fn record(&self, identity: &SessionIdentity) -> Option<HistoryLog> {
        self.inner.borrow().records.get(identity).cloned()
    }

    /// Put a record in place as if another device had written it.
    pub fn insert_record(&self, identity: SessionIdentity, history: HistoryLog) {
        self.inner
            .borrow_mut()
            .records
            .insert(identity.clone(), history.clone());
        self.notify(&identity, &history);
    }

    pub fn reads(&self) -> usize {
        self.inner.borrow().reads
    }

    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }

    pub fn watchers(&self) -> usize {
        self.inner.borrow().watchers.len()
    }

    fn notify(&self, identity: &SessionIdentity, history: &HistoryLog) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.deferring {
                inner.pending.push((identity.clone(), history.clone()));
                return;
            }
        }
        self.deliver(identity, history);
    }

    fn deliver(&self, identity: &SessionIdentity, history: &HistoryLog) {
        // collect first so callbacks are free to touch the store
        let callbacks: Vec<ChangeCallback> = self
            .inner
            .borrow()
            .watchers
            .values()
            .filter(|(watched, _)| watched == identity)
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(history.clone());
        }
    }
}

impl RemoteStore for MemoryRemote {
    fn kind(&self) -> BackendKind {
        match self.inner.borrow().mode {
            MemoryMode::PushStore => BackendKind::Realtime,
            MemoryMode::DocumentStore => BackendKind::Document,
        }
    }

    async fn read(&self, identity: &SessionIdentity) -> HistoryLog {
        let mut inner = self.inner.borrow_mut();
        inner.reads += 1;
        if !inner.available {
            log::warn!("Memory remote unavailable, reading nothing for {identity}");
            return HistoryLog::new();
        }
        inner.records.get(identity).cloned().unwrap_or_default()
    }

    async fn write(&self, identity: &SessionIdentity, history: &HistoryLog) -> WriteOutcome {
        let held = {
            let mut inner = self.inner.borrow_mut();
            inner.writes += 1;
            if inner.holding {
                let (sender, receiver) = oneshot::channel();
                inner.held.push(sender);
                Some(receiver)
            } else {
                None
            }
        };

        if let Some(receiver) = held {
            if receiver.await.is_err() {
                return WriteOutcome::Failed("write was abandoned".to_string());
            }
        }

        let (target, outcome) = {
            let mut inner = self.inner.borrow_mut();
            if !inner.available {
                return WriteOutcome::Failed("memory remote unavailable".to_string());
            }

            let (target, outcome) = match inner.mode {
                MemoryMode::DocumentStore if identity.server_id().is_none() => {
                    inner.issued += 1;
                    let issued = SessionIdentity::issued(&format!("mem{}", inner.issued));
                    (issued.clone(), WriteOutcome::Created(issued))
                }
                _ => (identity.clone(), WriteOutcome::Stored),
            };
            inner.records.insert(target.clone(), history.clone());
            (target, outcome)
        };

        self.notify(&target, history);
        outcome
    }

    fn watch(&self, identity: &SessionIdentity, on_change: ChangeCallback) -> Option<Subscription> {
        let mut inner = self.inner.borrow_mut();
        if inner.mode != MemoryMode::PushStore {
            return None;
        }

        let key = inner.watchers.insert((identity.clone(), on_change));
        let weak: Weak<RefCell<MemoryInner>> = Rc::downgrade(&self.inner);
        Some(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().watchers.remove(key);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::HistoryEntry;
    use futures::executor::{LocalPool, block_on};
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;

    fn log(n: usize) -> HistoryLog {
        (0..n)
            .map(|i| HistoryEntry::new(format!("{i} + 0"), i as f64, "t"))
            .collect()
    }

    #[test]
    fn push_store_replaces_and_notifies() {
        let remote = MemoryRemote::push_store();
        let identity = SessionIdentity::new("calc_a_1").unwrap();

        let seen = Rc::new(Cell::new(0));
        let seen_in_callback = Rc::clone(&seen);
        let subscription = remote
            .watch(
                &identity,
                Rc::new(move |history: HistoryLog| seen_in_callback.set(history.len())),
            )
            .unwrap();

        assert_eq!(
            block_on(remote.write(&identity, &log(2))),
            WriteOutcome::Stored
        );
        assert_eq!(seen.get(), 2);
        assert_eq!(block_on(remote.read(&identity)), log(2));

        subscription.unsubscribe();
        assert_eq!(remote.watchers(), 0);
        block_on(remote.write(&identity, &log(3)));
        assert_eq!(seen.get(), 2);
    }

    #[test]
    fn document_store_issues_identities() {
        let remote = MemoryRemote::document_store();
        let local = SessionIdentity::new("calc_a_1").unwrap();

        let WriteOutcome::Created(issued) = block_on(remote.write(&local, &log(1))) else {
            panic!("expected a created record");
        };
        assert_eq!(issued.as_str(), "b-mem1");
        assert_eq!(remote.record(&local), None);
        assert_eq!(remote.record(&issued), Some(log(1)));

        assert_eq!(
            block_on(remote.write(&issued, &log(2))),
            WriteOutcome::Stored
        );
        assert!(remote.watch(&issued, Rc::new(|_| {})).is_none());
    }

    #[test]
    fn outage() {
        let remote = MemoryRemote::push_store();
        let identity = SessionIdentity::new("calc_a_1").unwrap();
        remote.insert_record(identity.clone(), log(1));

        remote.set_available(false);
        assert!(block_on(remote.read(&identity)).is_empty());
        assert!(matches!(
            block_on(remote.write(&identity, &log(2))),
            WriteOutcome::Failed(_)
        ));
        assert_eq!(remote.record(&identity), Some(log(1)));
    }

    #[test]
    fn held_writes_land_in_release_order() {
        let remote = MemoryRemote::push_store();
        let identity = SessionIdentity::new("calc_a_1").unwrap();
        remote.hold_writes(true);

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        for n in [1, 2] {
            let remote = remote.clone();
            let identity = identity.clone();
            spawner
                .spawn_local(async move {
                    remote.write(&identity, &log(n)).await;
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert_eq!(remote.held_writes(), 2);

        assert!(remote.release_newest());
        pool.run_until_stalled();
        assert_eq!(remote.record(&identity), Some(log(2)));

        assert!(remote.release_oldest());
        pool.run_until_stalled();
        assert_eq!(remote.record(&identity), Some(log(1)));
        assert!(!remote.release_oldest());
    }

    #[test]
    fn deferred_notifications_arrive_on_flush() {
        let remote = MemoryRemote::push_store();
        let identity = SessionIdentity::new("calc_a_1").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_in_callback = Rc::clone(&seen);
        let _subscription = remote
            .watch(
                &identity,
                Rc::new(move |history: HistoryLog| seen_in_callback.borrow_mut().push(history.len())),
            )
            .unwrap();

        remote.defer_notifications(true);
        block_on(remote.write(&identity, &log(2)));
        block_on(remote.write(&identity, &log(1)));
        assert!(seen.borrow().is_empty());
        assert_eq!(remote.pending_notifications(), 2);
        assert_eq!(remote.record(&identity), Some(log(1)));

        assert_eq!(remote.flush_notifications(), 2);
        assert_eq!(*seen.borrow(), [2, 1]);
        assert_eq!(remote.flush_notifications(), 0);

        remote.defer_notifications(false);
        block_on(remote.write(&identity, &log(3)));
        assert_eq!(*seen.borrow(), [2, 1, 3]);
    }
}
