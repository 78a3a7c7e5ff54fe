//! Snapshot Hasher.
//!
//! Canonical serialization: compact JSON with object keys sorted
//! lexicographically at every depth, so two snapshots holding the same
//! field/value pairs hash identically whatever order they were built in.
//! Digests are lowercase hex SHA-256.

use serde_json::Value;
use sha2::{Digest, Sha256};

use docledger_storage::DocumentSnapshot;

/// Stand-in for the previous chain hash when hashing version 1.
pub const GENESIS_CHAIN_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Human-readable description of the chain construction, embedded in proofs.
pub const CHAIN_ALGORITHM: &str =
    "chain_hash = sha256_hex(snapshot_hash_hex || previous_chain_hash_hex); \
     snapshot_hash = sha256_hex(canonical_json(snapshot))";

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
                write_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
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
        Value::String(s) => write_string(s, out),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => out.push_str("null"),
    }
}

fn write_string(s: &str, out: &mut String) {
    // Serializing a str cannot fail.
    out.push_str(&serde_json::to_string(s).unwrap_or_default());
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn canonical_snapshot(snapshot: &DocumentSnapshot) -> String {
    let mut out = String::from("{");
    // BTreeMap iteration is already key-sorted.
    for (i, (key, value)) in snapshot.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(key, &mut out);
        out.push(':');
        write_canonical(value, &mut out);
    }
    out.push('}');
    out
}

/// Digest of the canonical serialization of a snapshot.
pub fn hash_snapshot(snapshot: &DocumentSnapshot) -> String {
    sha256_hex(canonical_snapshot(snapshot).as_bytes())
}

/// Digest of a domain event payload.
pub fn hash_payload(payload: &Value) -> String {
    sha256_hex(canonical_json(payload).as_bytes())
}

/// `H(snapshot_hash || previous_chain_hash)`, with the genesis constant
/// standing in for a missing predecessor.
pub fn chain_hash(snapshot_hash: &str, previous_chain_hash: Option<&str>) -> String {
    let previous = previous_chain_hash.unwrap_or(GENESIS_CHAIN_HASH);
    let mut hasher = Sha256::new();
    hasher.update(snapshot_hash.as_bytes());
    hasher.update(previous.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(pairs: &[(&str, Value)]) -> DocumentSnapshot {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let v = json!({"b": 1, "a": {"z": [ {"y": 1, "x": 2} ], "c": null}});
        assert_eq!(
            canonical_json(&v),
            r#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn insertion_order_does_not_change_hash() {
        let a = snapshot(&[("amount", json!(100)), ("notes", json!("hi"))]);
        let b = snapshot(&[("notes", json!("hi")), ("amount", json!(100))]);
        assert_eq!(hash_snapshot(&a), hash_snapshot(&b));
    }

    #[test]
    fn nested_key_order_does_not_change_hash() {
        let a = snapshot(&[(
            "line_items",
            serde_json::from_str(r#"[{"qty": 1, "sku": "A"}]"#).unwrap(),
        )]);
        let b = snapshot(&[(
            "line_items",
            serde_json::from_str(r#"[{"sku": "A", "qty": 1}]"#).unwrap(),
        )]);
        assert_eq!(hash_snapshot(&a), hash_snapshot(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = snapshot(&[("amount", json!(100))]);
        let b = snapshot(&[("amount", json!(150))]);
        assert_ne!(hash_snapshot(&a), hash_snapshot(&b));
    }

    #[test]
    fn snapshot_hash_matches_canonical_json_of_object() {
        let s = snapshot(&[("b", json!(2)), ("a", json!({"k": "v"}))]);
        let as_value = serde_json::to_value(&s).unwrap();
        assert_eq!(hash_snapshot(&s), sha256_hex(canonical_json(&as_value).as_bytes()));
    }

    #[test]
    fn hash_is_256_bit_hex() {
        let h = hash_snapshot(&DocumentSnapshot::new());
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn chain_hash_uses_genesis_for_first_version() {
        let sh = hash_snapshot(&snapshot(&[("amount", json!(1))]));
        assert_eq!(chain_hash(&sh, None), chain_hash(&sh, Some(GENESIS_CHAIN_HASH)));
        assert_ne!(chain_hash(&sh, None), chain_hash(&sh, Some(&sh)));
    }

    #[test]
    fn chain_hash_is_concatenation_digest() {
        let expected = sha256_hex(format!("{}{}", "ab", GENESIS_CHAIN_HASH).as_bytes());
        assert_eq!(chain_hash("ab", None), expected);
    }
}
