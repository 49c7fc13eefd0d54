//! Types that are persisted locally or sent over the wire.
//!
//! The files are numbered in dependency order: an entry, the log of entries, the identity that addresses a log
//! remotely, the usage counters, and finally the record shapes each remote backend stores.

#[path = "1-history-entry.rs"]
mod history_entry;
#[path = "2-history-log.rs"]
mod history_log;
#[path = "3-session-identity.rs"]
mod session_identity;
#[path = "4-usage-map.rs"]
mod usage_map;
#[path = "5-remote-records.rs"]
mod remote_records;

pub use history_entry::{HistoryEntry, format_number, parse_number};
pub use history_log::HistoryLog;
pub use remote_records::{
    DOCUMENT_VERSION, DocumentCreated, DocumentEnvelope, DocumentRecord, RealtimeRecord,
    StreamChange, iso_timestamp, parse_stream_event,
};
pub use session_identity::{IdentityOrigin, SessionIdentity};
pub use usage_map::{UsageDay, UsageMap};
