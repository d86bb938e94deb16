//! Hashing utilities for cache keys

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialize a JSON value with object keys sorted at every depth
///
/// The output does not depend on insertion order or on whether serde_json's
/// `preserve_order` feature is enabled somewhere in the dependency graph.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
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
        Value::Object(obj) => {
            out.push('{');
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a string Value yields the escaped, quoted form
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                if let Some(v) = obj.get(key) {
                    write_canonical(v, out);
                }
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// SHA-256 of `input`, hex encoded and truncated to `len` characters (max 64)
pub fn digest_hex(input: &[u8], len: usize) -> String {
    let hash = Sha256::digest(input);
    let mut hex: String = hash.iter().map(|b| format!("{:02x}", b)).collect();
    hex.truncate(len);
    hex
}
