//! # HistoryLog
//! The newest-first sequence of [`HistoryEntry`]s. Insertion order is authoritative: entries are never reordered or
//! deduplicated.
//!
//! Backed by a persistent vector so that handing a snapshot of the complete log to a remote write is cheap.

use crate::data_model::HistoryEntry;

#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    entries: im::Vector<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from entries that are already ordered newest-first.
    pub fn from_newest_first(entries: impl IntoIterator<Item = HistoryEntry>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn prepend(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
    }

    /// The most recent entry.
    pub fn head(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Whether `older` is this log with some of the newest entries missing, i.e. a state this log grew out of.
    pub fn strictly_extends(&self, older: &HistoryLog) -> bool {
        older.len() < self.len() && self.entries.skip(self.len() - older.len()) == older.entries
    }
}

impl FromIterator<HistoryEntry> for HistoryLog {
    fn from_iter<T: IntoIterator<Item = HistoryEntry>>(iter: T) -> Self {
        Self::from_newest_first(iter)
    }
}
