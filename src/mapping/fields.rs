//! Lenient field readers for loosely typed API records.
//!
//! ERP records mix numbers and numeric strings for the same field, and use
//! empty strings for "no value"; these helpers normalize both.

use serde_json::{Map, Value};

pub(crate) fn int(record: &Value, key: &str) -> Option<i64> {
    match record.get(key)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn text(record: &Value, key: &str) -> Option<String> {
    match record.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-empty text among `keys`.
pub(crate) fn text_any(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(record, key))
}

/// Decimal kept as its exact source representation.
pub(crate) fn decimal(record: &Value, key: &str) -> Option<String> {
    text(record, key)
}

pub(crate) fn flag(record: &Value, key: &str) -> bool {
    match record.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim(), "1" | "true"),
        _ => false,
    }
}

/// Nested object, `None` unless it holds at least one key.
pub(crate) fn object<'a>(record: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    record
        .get(key)
        .and_then(Value::as_object)
        .filter(|map| !map.is_empty())
}

/// Raw JSON for nested blocks, `None` for null or missing.
pub(crate) fn raw(record: &Value, key: &str) -> Option<Value> {
    record.get(key).filter(|v| !v.is_null()).cloned()
}
