//! Common types used throughout dynamo-pager
//!
//! This module contains the record, page and continuation token types
//! shared by the pagination, store and service modules.

use crate::error::{Error, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// One stored item: attribute name to value, treated as opaque payload
pub type Record = serde_json::Map<String, JsonValue>;

/// Default partition key attribute name
pub const PARTITION_KEY: &str = "PK";

/// Default sort key attribute name
pub const SORT_KEY: &str = "SK";

// ============================================================================
// Continuation Token
// ============================================================================

/// Opaque cursor returned by a paginated fetch.
///
/// Wraps the store's structured last-evaluated key. The iterator never looks
/// inside; it hands the token back to the fetcher verbatim. Conversions to
/// text go through serde so attribute values containing quotes survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationToken(Record);

impl ContinuationToken {
    /// Wrap a last-evaluated key
    pub fn new(key: Record) -> Self {
        Self(key)
    }

    /// Borrow the key attributes
    pub fn key(&self) -> &Record {
        &self.0
    }

    /// Unwrap into the key attributes
    pub fn into_key(self) -> Record {
        self.0
    }

    /// Serialize to JSON text
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    /// Parse from JSON text produced by [`ContinuationToken::to_json`]
    pub fn from_json(json: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(json)
            .map_err(|e| Error::invalid_token(format!("not valid JSON: {e}")))?;
        match value {
            JsonValue::Object(key) => Ok(Self(key)),
            other => Err(Error::invalid_token(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Encode as URL-safe base64, suitable for handing to external callers
    pub fn encode(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_json()?))
    }

    /// Decode a value produced by [`ContinuationToken::encode`]
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| Error::invalid_token(format!("not valid base64: {e}")))?;
        let json = String::from_utf8(bytes)
            .map_err(|e| Error::invalid_token(format!("not valid UTF-8: {e}")))?;
        Self::from_json(&json)
    }
}

impl From<Record> for ContinuationToken {
    fn from(key: Record) -> Self {
        Self(key)
    }
}

// ============================================================================
// Page
// ============================================================================

/// Result of one fetch: records plus an optional cursor for the next page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Records in the order the store returned them
    pub records: Vec<Record>,
    /// Cursor for the next page; `None` when the store has no more pages
    pub next_token: Option<ContinuationToken>,
}

impl Page {
    /// Create a page
    pub fn new(records: Vec<Record>, next_token: Option<ContinuationToken>) -> Self {
        Self {
            records,
            next_token,
        }
    }

    /// Create a final page (no continuation)
    pub fn last(records: Vec<Record>) -> Self {
        Self::new(records, None)
    }

    /// An empty final page
    pub fn empty() -> Self {
        Self::default()
    }

    /// Does the store have more pages after this one?
    pub fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Build a record from a JSON value, failing if it is not an object
pub fn record_from_value(value: JsonValue) -> Result<Record> {
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(Error::validation(format!(
            "expected a JSON object for a record, got {other}"
        ))),
    }
}

/// Extract the given key attributes from a record
pub fn extract_key(record: &Record, attributes: &[&str]) -> Result<Record> {
    let mut key = Record::new();
    for attribute in attributes {
        let value = record
            .get(*attribute)
            .ok_or_else(|| Error::missing_key(*attribute))?;
        key.insert((*attribute).to_string(), value.clone());
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(value: JsonValue) -> Record {
        record_from_value(value).unwrap()
    }

    #[test]
    fn test_token_json_round_trip_keeps_quotes() {
        let token = ContinuationToken::new(key(json!({"PK": "o'brien", "SK": "say \"hi\""})));
        let json = token.to_json().unwrap();
        assert_eq!(ContinuationToken::from_json(&json).unwrap(), token);
    }

    #[test]
    fn test_token_encode_decode() {
        let token = ContinuationToken::new(key(json!({"PK": "user#1", "SK": 42})));
        let encoded = token.encode().unwrap();
        assert!(!encoded.contains('='));
        assert_eq!(ContinuationToken::decode(&encoded).unwrap(), token);
    }

    #[test]
    fn test_token_decode_rejects_garbage() {
        let err = ContinuationToken::decode("***").unwrap_err();
        assert!(matches!(err, Error::InvalidToken { .. }));

        let err = ContinuationToken::from_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[test]
    fn test_page_has_more() {
        assert!(!Page::empty().has_more());
        let page = Page::new(vec![], Some(ContinuationToken::new(key(json!({"PK": "a"})))));
        assert!(page.has_more());
    }

    #[test]
    fn test_extract_key() {
        let record = key(json!({"PK": "a", "SK": "b", "name": "x"}));
        let k = extract_key(&record, &[PARTITION_KEY, SORT_KEY]).unwrap();
        assert_eq!(JsonValue::Object(k), json!({"PK": "a", "SK": "b"}));

        let err = extract_key(&record, &["GSI1PK"]).unwrap_err();
        assert!(matches!(err, Error::MissingKeyAttribute { attribute } if attribute == "GSI1PK"));
    }

    #[test]
    fn test_record_from_value_rejects_non_object() {
        assert!(record_from_value(json!("nope")).is_err());
    }
}
