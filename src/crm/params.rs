//! Shared query-parameter builder for the resource endpoints
//!
//! One declarative builder replaces per-endpoint ad-hoc query assembly: each
//! endpoint states which logical filters map to which vendor keys and the
//! builder handles coercion, timestamp parsing, and the vendor's page-size
//! ceiling.

use crate::error::{ProxyError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// The vendor rejects page sizes above this
pub const VENDOR_PAGE_LIMIT: u64 = 250;

/// Parse a filter timestamp into Unix seconds
///
/// Accepts raw Unix seconds (number or numeric string), RFC 3339 (a trailing
/// `Z` is UTC), a bare `YYYY-MM-DDTHH:MM:SS` (UTC assumed), or a bare date
/// (midnight UTC). `2025-09-15` and `2025-09-15T00:00:00Z` parse equal.
pub fn parse_timestamp(value: &Value) -> Result<i64> {
    if let Some(seconds) = value.as_i64() {
        return Ok(seconds);
    }
    let Some(text) = value.as_str() else {
        return Err(ProxyError::validation(format!(
            "Invalid timestamp: {}",
            value
        )));
    };
    let text = text.trim();
    if let Ok(seconds) = text.parse::<i64>() {
        return Ok(seconds);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(parsed.timestamp());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
        return Ok(parsed.and_utc().timestamp());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc().timestamp());
        }
    }
    Err(ProxyError::validation(format!(
        "Invalid timestamp: {} (expected Unix seconds or ISO-8601)",
        text
    )))
}

/// Declarative query builder shared by all resource-specific endpoints
#[derive(Debug, Default)]
pub struct FilterParams {
    map: Map<String, Value>,
}

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key unconditionally
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.map.insert(key.to_string(), value.into());
        self
    }

    /// Set a key when the value is present
    pub fn opt(mut self, key: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(value) = value {
            self.map.insert(key.to_string(), value.into());
        }
        self
    }

    /// Parse and set a timestamp filter key when the value is present
    pub fn timestamp_opt(mut self, key: &str, value: Option<&Value>) -> Result<Self> {
        if let Some(value) = value {
            let seconds = parse_timestamp(value)?;
            self.map.insert(key.to_string(), Value::from(seconds));
        }
        Ok(self)
    }

    /// Expand a comma-separated list into the vendor's indexed bracket keys:
    /// `filter[type][0]`, `filter[type][1]`, ...
    pub fn indexed_list_opt(mut self, key_prefix: &str, csv: Option<&str>) -> Self {
        if let Some(csv) = csv {
            for (index, item) in csv
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .enumerate()
            {
                self.map
                    .insert(format!("{}[{}]", key_prefix, index), Value::from(item));
            }
        }
        self
    }

    /// Set `limit`, clamped to the vendor's page-size ceiling
    pub fn limit(mut self, requested: Option<u64>) -> Self {
        let limit = requested.unwrap_or(VENDOR_PAGE_LIMIT).min(VENDOR_PAGE_LIMIT);
        self.map.insert("limit".to_string(), Value::from(limit));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn build(self) -> Map<String, Value> {
        self.map
    }
}
