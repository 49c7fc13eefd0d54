//! History export and import files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data_model::{DOCUMENT_VERSION, HistoryLog, iso_timestamp};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid JSON file")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid file format: no history found")]
    MissingHistory,
}

/// `{ history, exportedAt, version }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub history: HistoryLog,
    pub exported_at: String,
    pub version: String,
}

impl ExportDocument {
    pub fn new(history: HistoryLog, now: DateTime<Utc>) -> Self {
        Self {
            history,
            exported_at: iso_timestamp(now),
            version: DOCUMENT_VERSION.to_string(),
        }
    }
}

pub fn export_file_name(now: DateTime<Utc>) -> String {
    format!("calculator-history-{}.json", now.format("%Y-%m-%d"))
}

pub fn export_json(history: &HistoryLog, now: DateTime<Utc>) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExportDocument::new(history.clone(), now))
}

/// Reads an exported file, or anything else with a top-level `history` array.
pub fn import_json(text: &str) -> Result<HistoryLog, ImportError> {
    let mut value: serde_json::Value = serde_json::from_str(text)?;
    let history = match value.get_mut("history") {
        Some(history) if history.is_array() => history.take(),
        _ => return Err(ImportError::MissingHistory),
    };
    Ok(serde_json::from_value(history)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_model::HistoryEntry;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(1_792_144_800_000).unwrap()
    }

    #[test]
    fn export_then_import_reproduces_the_log() {
        let history: HistoryLog = vec![
            HistoryEntry::new("0 ÷ 0", f64::NAN, "9:02:11 AM"),
            HistoryEntry::new("5 ÷ 0", f64::INFINITY, "9:01:40 AM"),
            HistoryEntry::new("0.1 + 0.2", 0.1 + 0.2, "9:00:05 AM"),
        ]
        .into_iter()
        .collect();

        let json = export_json(&history, now()).unwrap();
        assert!(json.contains("\"exportedAt\""));
        assert!(json.contains("\"version\": \"1.0\""));
        assert_eq!(import_json(&json).unwrap(), history);
    }

    #[test]
    fn bare_history_object_is_accepted() {
        let imported =
            import_json(r#"{"history":[{"expression":"1 + 1","result":2,"timestamp":"t"}]}"#)
                .unwrap();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported.head().map(|entry| entry.result), Some(2.0));
    }

    #[test]
    fn malformed_files_are_errors() {
        assert!(matches!(
            import_json("{not json"),
            Err(ImportError::Malformed(_))
        ));
        assert!(matches!(
            import_json(r#"{"entries":[]}"#),
            Err(ImportError::MissingHistory)
        ));
        assert!(matches!(
            import_json(r#"[{"expression":"1 + 1","result":2,"timestamp":"t"}]"#),
            Err(ImportError::MissingHistory)
        ));
        assert!(matches!(
            import_json(r#"{"history":[{"expression":"1 + 1"}]}"#),
            Err(ImportError::Malformed(_))
        ));
    }

    #[test]
    fn file_name_uses_the_export_date() {
        assert_eq!(
            export_file_name(now()),
            format!("calculator-history-{}.json", now().format("%Y-%m-%d"))
        );
        let date = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        assert_eq!(export_file_name(date), "calculator-history-1970-01-01.json");
    }
}
