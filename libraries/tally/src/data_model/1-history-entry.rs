//! # HistoryEntry
//! One completed calculation. Entries are immutable once created.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Human-readable `a op b`, e.g. `5 ÷ 0`.
    pub expression: String,
    /// Raw outcome. May be `NaN` or infinite; see [`non_finite`].
    #[serde(with = "non_finite")]
    pub result: f64,
    /// Locale-formatted time of day. Display only, never used for ordering.
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn new(expression: impl Into<String>, result: f64, timestamp: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            result,
            timestamp: timestamp.into(),
        }
    }
}

// `NaN` results have to compare equal, otherwise a log containing `0 ÷ 0` never equals its own export.
impl PartialEq for HistoryEntry {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
            && self.timestamp == other.timestamp
            && (self.result == other.result || (self.result.is_nan() && other.result.is_nan()))
    }
}

/// Renders a number the way the calculator display shows it.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        // also covers negative zero
        return "0".to_string();
    }

    let magnitude = value.abs();
    if !(1e-6..1e21).contains(&magnitude) {
        let formatted = format!("{value:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }

    value.to_string()
}

/// Parses a display string back into a number. `Infinity`, `-Infinity` and `NaN` are accepted.
pub fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok()
}

/// JSON has no representation for non-finite numbers, so they are stored as strings.
/// A `null` (what JavaScript's `JSON.stringify` writes for them) reads back as `NaN`.
mod non_finite {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&super::format_number(*value))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(number) => number
                .as_f64()
                .ok_or_else(|| D::Error::custom(format!("result {number} is not an f64"))),
            serde_json::Value::Null => Ok(f64::NAN),
            serde_json::Value::String(text) => super::parse_number(&text)
                .ok_or_else(|| D::Error::custom(format!("result `{text}` is not a number"))),
            other => Err(D::Error::custom(format!(
                "Expected a number, null, or numeric string, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_like_the_display() {
        assert_eq!(format_number(5.0), "5");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(0.1 + 0.2), "0.30000000000000004");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
        assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(1e21), "1e+21");
        assert_eq!(format_number(1e-7), "1e-7");
    }

    #[test]
    fn non_finite_results_survive_json() {
        let entries = vec![
            HistoryEntry::new("5 ÷ 0", f64::INFINITY, "10:00:00 AM"),
            HistoryEntry::new("0 ÷ 0", f64::NAN, "10:00:01 AM"),
            HistoryEntry::new("2 + 3", 5.0, "10:00:02 AM"),
        ];

        let json = serde_json::to_string(&entries).unwrap();
        assert!(json.contains("\"Infinity\""));
        assert!(json.contains("\"NaN\""));
        assert!(json.contains("\"result\":5.0"));

        let parsed: Vec<HistoryEntry> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, entries);
    }

    #[test]
    fn null_result_reads_as_nan() {
        let parsed: HistoryEntry =
            serde_json::from_str(r#"{"expression":"0 ÷ 0","result":null,"timestamp":"t"}"#)
                .unwrap();
        assert!(parsed.result.is_nan());
    }

    #[test]
    fn rejects_non_numeric_result() {
        let parsed = serde_json::from_str::<HistoryEntry>(
            r#"{"expression":"x","result":"banana","timestamp":"t"}"#,
        );
        assert!(parsed.is_err());
    }
}
