//! Query-string encoding for the vendor's bracket filter syntax
//!
//! The vendor's list filters use literal square brackets in parameter names
//! (`filter[type][]`, `filter[statuses][0][pipeline_id]`). Encoders that
//! percent-escape brackets break upstream filtering, so keys are encoded with
//! brackets restored while values stay fully percent-encoded.

use serde_json::{Map, Value};

/// Percent-encode a parameter name, keeping `[` and `]` literal
pub fn encode_key(key: &str) -> String {
    urlencoding::encode(key)
        .replace("%5B", "[")
        .replace("%5D", "]")
}

/// Render a JSON value as a query parameter value
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Build a query string from a JSON object, preserving bracket keys
///
/// Array values expand to repeated indexless keys; scalar values are
/// percent-encoded. Key order follows the map's iteration order.
pub fn encode_query(params: &Map<String, Value>) -> String {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        match value {
            Value::Array(items) => {
                for item in items {
                    pairs.push(format!(
                        "{}={}",
                        encode_key(key),
                        urlencoding::encode(&render_value(item))
                    ));
                }
            }
            _ => pairs.push(format!(
                "{}={}",
                encode_key(key),
                urlencoding::encode(&render_value(value))
            )),
        }
    }
    pairs.join("&")
}

/// Append an encoded query string to a URL when params are present
pub fn append_query(url: &str, params: Option<&Map<String, Value>>) -> String {
    match params {
        Some(map) if !map.is_empty() => format!("{}?{}", url, encode_query(map)),
        _ => url.to_string(),
    }
}
