//! Record shapes stored by the two remote backends, and the change events the push store streams.
//!
//! Reads are lenient: a record without a `history` field is treated as empty rather than malformed.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::data_model::HistoryLog;

pub const DOCUMENT_VERSION: &str = "1.0";

/// ISO 8601 with millisecond precision, e.g. `2026-10-16T09:30:00.000Z`.
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `{ history, lastUpdated }`, stored at `history/<identity>` in the push store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeRecord {
    #[serde(default)]
    pub history: HistoryLog,
    #[serde(default)]
    pub last_updated: String,
}

impl RealtimeRecord {
    pub fn new(history: HistoryLog, now: DateTime<Utc>) -> Self {
        Self {
            history,
            last_updated: iso_timestamp(now),
        }
    }
}

/// `{ history, lastUpdated, version }`, stored by the document store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    #[serde(default)]
    pub history: HistoryLog,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default = "document_version")]
    pub version: String,
}

fn document_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl DocumentRecord {
    pub fn new(history: HistoryLog, now: DateTime<Utc>) -> Self {
        Self {
            history,
            last_updated: iso_timestamp(now),
            version: document_version(),
        }
    }
}

/// Response to reading the latest version of a document: `{ record: { .. } }`.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentEnvelope {
    pub record: Option<DocumentRecord>,
}

/// Response to creating a document: `{ metadata: { id } }`.
#[derive(Clone, Debug, Deserialize)]
pub struct DocumentCreated {
    pub metadata: DocumentMetadata,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DocumentMetadata {
    pub id: String,
}

/// What a single server-sent event from the push store means for the watched record.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamChange {
    /// The whole record was replaced.
    Replaced(HistoryLog),
    /// The record no longer exists.
    Removed,
    /// Part of the record changed; read it again to get the full log.
    Refetch,
    /// Keep-alives and anything else that doesn't touch the data.
    Ignore,
}

#[derive(Deserialize)]
struct StreamPayload {
    path: String,
    data: serde_json::Value,
}

/// Interpret a push-store event (`put`/`patch` carry `{ path, data }`).
pub fn parse_stream_event(event: &str, data: &str) -> Result<StreamChange, serde_json::Error> {
    match event {
        "put" => {
            let payload: StreamPayload = serde_json::from_str(data)?;
            if payload.path != "/" {
                return Ok(StreamChange::Refetch);
            }
            if payload.data.is_null() {
                return Ok(StreamChange::Removed);
            }
            let record: RealtimeRecord = serde_json::from_value(payload.data)?;
            Ok(StreamChange::Replaced(record.history))
        }
        "patch" => Ok(StreamChange::Refetch),
        _ => Ok(StreamChange::Ignore),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::HistoryEntry;

    #[test]
    fn realtime_record_shape() {
        let now = DateTime::<Utc>::from_timestamp_millis(1_760_607_000_000).unwrap();
        let record = RealtimeRecord::new(
            HistoryLog::from_newest_first([HistoryEntry::new("1 + 2", 3.0, "t")]),
            now,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["lastUpdated"], "2025-10-16T09:30:00.000Z");
        assert_eq!(json["history"][0]["result"], 3.0);
    }

    #[test]
    fn document_record_defaults() {
        let record: DocumentRecord = serde_json::from_str("{}").unwrap();
        assert!(record.history.is_empty());
        assert_eq!(record.version, DOCUMENT_VERSION);

        let envelope: DocumentEnvelope = serde_json::from_str(r#"{"record":null}"#).unwrap();
        assert!(envelope.record.is_none());
    }

    #[test]
    fn stream_events() {
        let put = r#"{"path":"/","data":{"history":[{"expression":"2 × 2","result":4,"timestamp":"t"}],"lastUpdated":"x"}}"#;
        match parse_stream_event("put", put).unwrap() {
            StreamChange::Replaced(log) => assert_eq!(log.len(), 1),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            parse_stream_event("put", r#"{"path":"/","data":null}"#).unwrap(),
            StreamChange::Removed
        );
        assert_eq!(
            parse_stream_event("put", r#"{"path":"/history/0","data":{}}"#).unwrap(),
            StreamChange::Refetch
        );
        assert_eq!(
            parse_stream_event("patch", "{}").unwrap(),
            StreamChange::Refetch
        );
        assert_eq!(
            parse_stream_event("keep-alive", "null").unwrap(),
            StreamChange::Ignore
        );
        assert!(parse_stream_event("put", "not json").is_err());
    }
}
