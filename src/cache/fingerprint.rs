use serde_json::Value;
use sha2::{Digest, Sha256};

/// Deterministic cache key for one invocation of a named action.
///
/// The key is the SHA-256 of the canonical JSON encoding of
/// `{"action", "version", "args"}`. Object keys are sorted at every depth, so
/// two argument values that differ only in key order share a fingerprint.
pub fn fingerprint(action: &str, version: &str, args: &Value) -> String {
    let envelope = serde_json::json!({
        "action": action,
        "version": version,
        "args": args,
    });

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&envelope).as_bytes());
    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys in lexicographic order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(v) = map.get(*key) {
                    write_canonical(v, out);
                }
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
