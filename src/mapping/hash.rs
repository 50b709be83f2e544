use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Keys that never contribute to a content hash.
const OPERATIONAL_FIELDS: [&str; 7] = [
    "content_hash",
    "sync_status",
    "last_error",
    "fetched_at",
    "created_at",
    "updated_at",
    "deleted_at",
];

/// Hex SHA-256 over the canonical JSON form of `attrs`.
pub fn content_hash<T: Serialize>(attrs: &T) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(attrs)?;
    if let Value::Object(map) = &mut value {
        for field in OPERATIONAL_FIELDS {
            map.remove(field);
        }
    }

    let digest = Sha256::digest(canonical_json(&value).as_bytes());
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
