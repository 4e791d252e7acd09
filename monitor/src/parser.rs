//! Parsing of the game's progress files into generic JSON trees.
//!
//! The reconciler only ever addresses snapshot documents by key, so every
//! source is normalized to a [`serde_json::Value`]. The one format that needs
//! reshaping is the legacy statistics file.
//!
//! # Legacy Statistics Format
//!
//! Versions up to 1.6.4 write `stats/stats_<user>_unsent.dat` as a list of
//! counter deltas; the same ID may appear more than once:
//!
//! ```json
//! { "stats-change": [ { "1100": 7200 }, { "2000": 5 }, { "2000": 1 } ], "checksum": "..." }
//! ```
//!
//! [`parse_legacy_stats`] folds this into one flat object `{"1100": 7200, "2000": 6}`.
//!
//! # Example
//!
//! ```
//! use waypost_monitor::parser::parse_legacy_stats;
//!
//! let doc = parse_legacy_stats(r#"{"stats-change":[{"2000":5},{"2000":1}]}"#).unwrap();
//! assert_eq!(doc["2000"], 6);
//! ```

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::trace;

/// Key of the delta list in a legacy statistics file.
pub const LEGACY_STATS_CHANGE_KEY: &str = "stats-change";

/// Errors that can occur while parsing a snapshot document.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The content is not valid JSON (often a file caught mid-write).
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The document is valid JSON but not an object.
    #[error("snapshot document must be a JSON object")]
    NotAnObject,

    /// A legacy statistics file without a `stats-change` list.
    #[error("legacy stats file missing '{LEGACY_STATS_CHANGE_KEY}' list")]
    MissingStatsChange,
}

/// Parses a JSON snapshot document, requiring a top-level object.
///
/// # Errors
///
/// Returns a [`ParseError`] when the content is not a JSON object.
pub fn parse_document(content: &str) -> Result<Value, ParseError> {
    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(ParseError::NotAnObject);
    }
    Ok(value)
}

/// Parses a legacy statistics file into a flat `{ "<id>": total }` object.
///
/// Entries that are not integer counters are skipped.
///
/// # Errors
///
/// Returns a [`ParseError`] when the file is not JSON or lacks the delta list.
pub fn parse_legacy_stats(content: &str) -> Result<Value, ParseError> {
    let value = parse_document(content)?;
    let changes = value
        .get(LEGACY_STATS_CHANGE_KEY)
        .and_then(Value::as_array)
        .ok_or(ParseError::MissingStatsChange)?;

    let mut totals: Map<String, Value> = Map::new();
    for change in changes {
        let Some(entry) = change.as_object() else {
            trace!(?change, "Skipping non-object legacy stat entry");
            continue;
        };
        for (id, amount) in entry {
            let Some(amount) = amount.as_i64() else {
                trace!(id = %id, "Skipping non-integer legacy stat value");
                continue;
            };
            let total = totals.get(id).and_then(Value::as_i64).unwrap_or(0);
            totals.insert(id.clone(), Value::from(total.saturating_add(amount)));
        }
    }

    Ok(Value::Object(totals))
}

/// Reads an integer counter from a JSON value, accepting integral floats.
#[must_use]
pub fn as_counter(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

/// Truthiness used for "obtained"/"done" style flags: `true`, non-zero numbers,
/// and any object or string count as set.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(_) => as_counter(value).is_some_and(|n| n != 0),
        Value::String(_) | Value::Object(_) => true,
        Value::Array(items) => !items.is_empty(),
        Value::Null => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_document_accepts_objects() {
        let doc = parse_document(r#"{"a": 1}"#).unwrap();
        assert_eq!(doc["a"], 1);
    }

    #[test]
    fn parse_document_rejects_truncated_content() {
        let err = parse_document(r#"{"minecraft:story/root": {"criteria": {"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidJson(_)));
    }

    #[test]
    fn parse_document_rejects_non_objects() {
        assert!(matches!(
            parse_document("[1, 2]"),
            Err(ParseError::NotAnObject)
        ));
    }

    #[test]
    fn legacy_stats_sum_repeated_ids() {
        let doc = parse_legacy_stats(
            r#"{"stats-change":[{"1100":7200},{"2000":5},{"2000":1},{"5242880":1}],"checksum":"abc"}"#,
        )
        .unwrap();
        assert_eq!(doc, json!({"1100": 7200, "2000": 6, "5242880": 1}));
    }

    #[test]
    fn legacy_stats_skip_malformed_entries() {
        let doc = parse_legacy_stats(
            r#"{"stats-change":[3, {"2000":"x"}, {"2001":2, "2002":1.0}]}"#,
        )
        .unwrap();
        assert_eq!(doc, json!({"2001": 2}));
    }

    #[test]
    fn legacy_stats_require_change_list() {
        assert!(matches!(
            parse_legacy_stats(r#"{"checksum":"abc"}"#),
            Err(ParseError::MissingStatsChange)
        ));
    }

    #[test]
    fn counters_accept_integral_floats() {
        assert_eq!(as_counter(&json!(4)), Some(4));
        assert_eq!(as_counter(&json!(4.0)), Some(4));
        assert_eq!(as_counter(&json!(4.5)), None);
        assert_eq!(as_counter(&json!("4")), None);
    }

    #[test]
    fn truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!(1)));
        assert!(is_truthy(&json!("2026-01-01")));
        assert!(is_truthy(&json!({})));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!([])));
    }
}
