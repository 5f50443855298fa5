//! Row representation and content hashing shared by every table.
//!
//! Rows are JSON objects keyed by column name. Identity hashes are SHA-512
//! digests rendered as the decimal string of the 512-bit integer, which is
//! also the form stored in the `hash` column.

use ruint::aliases::U512;
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};

/// A single table row: column name to value.
pub type Row = Map<String, Value>;

/// Maximum length of a generated `CO_`, `PO_` or `DS_` identifier.
pub const MAX_ID_LEN: usize = 28;

/// Hashes the values stored under `keys`, visiting keys in sorted order.
///
/// Missing keys, `null`, empty arrays and the literal string `"[]"` do not
/// contribute to the digest, so adding an empty column never changes an id.
pub fn row_hash<S: AsRef<str>>(row: &Row, keys: &[S]) -> String {
    let mut sorted: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut hasher = Sha512::new();
    for key in sorted {
        let Some(value) = row.get(key) else {
            continue;
        };
        if is_blank(value) {
            continue;
        }
        feed(&mut hasher, value);
    }
    digest_to_decimal(&hasher.finalize())
}

/// Decimal SHA-512 of a plain string.
pub fn string_hash(s: &str) -> String {
    let digest = Sha512::digest(s.as_bytes());
    digest_to_decimal(&digest)
}

/// Builds `<prefix><hash>`, cut to [`MAX_ID_LEN`] characters.
pub fn prefixed_id(prefix: &str, hash: &str) -> String {
    let mut id = format!("{prefix}{hash}");
    id.truncate(MAX_ID_LEN);
    id
}

/// Current UTC time at whole-second precision, RFC 3339 with a `Z` suffix.
pub fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s == "[]",
        _ => false,
    }
}

fn feed(hasher: &mut Sha512, value: &Value) {
    match value {
        Value::Null => {}
        Value::Bool(b) => hasher.update([u8::from(*b)]),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                hasher.update(i.to_le_bytes());
            } else if let Some(u) = n.as_u64() {
                hasher.update(u.to_le_bytes());
            } else if let Some(f) = n.as_f64() {
                hasher.update(f.to_le_bytes());
            }
        }
        Value::String(s) => hasher.update(s.as_bytes()),
        Value::Array(items) => {
            for item in items {
                feed(hasher, item);
            }
        }
        Value::Object(_) => hasher.update(value.to_string().as_bytes()),
    }
}

/// Renders a big-endian unsigned integer of at most 64 bytes in base 10.
fn digest_to_decimal(bytes: &[u8]) -> String {
    U512::try_from_be_slice(bytes).map_or_else(String::new, |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn decimal_rendering() {
        assert_eq!(digest_to_decimal(&[]), "0");
        assert_eq!(digest_to_decimal(&[0]), "0");
        assert_eq!(digest_to_decimal(&[0xff]), "255");
        assert_eq!(digest_to_decimal(&[0x01, 0x00]), "256");
        assert_eq!(
            digest_to_decimal(&[0xff; 8]),
            u64::MAX.to_string()
        );
        assert_eq!(
            digest_to_decimal(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0]),
            "18446744073709551616"
        );
    }

    #[test]
    fn decimal_rendering_covers_full_digest_width() {
        assert_eq!(
            digest_to_decimal(&[0xff; 64]),
            "13407807929942597099574024998205846127479365820592393377723561443721764030073546976801874298166903427690031858186486050853753882811946569946433649006084095"
        );
        assert_eq!(digest_to_decimal(&[0x01; 65]), "");
    }

    #[test]
    fn hash_ignores_key_order_and_blank_values() {
        let a = row(json!({"x": [1.0, 2.0], "y": "abc", "z": null}));
        let b = row(json!({"y": "abc", "x": [1.0, 2.0], "w": []}));
        assert_eq!(row_hash(&a, &["x", "y", "z"]), row_hash(&b, &["y", "x", "w"]));
    }

    #[test]
    fn hash_changes_with_values() {
        let a = row(json!({"energy": -1.0}));
        let b = row(json!({"energy": -1.5}));
        assert_ne!(row_hash(&a, &["energy"]), row_hash(&b, &["energy"]));
    }

    #[test]
    fn hash_distinguishes_int_from_float() {
        let a = row(json!({"n": 1}));
        let b = row(json!({"n": 1.0}));
        assert_ne!(row_hash(&a, &["n"]), row_hash(&b, &["n"]));
    }

    #[test]
    fn string_hash_is_decimal_sha512() {
        let h = string_hash("CS_bulk_DS_1");
        assert!(h.chars().all(|c| c.is_ascii_digit()));
        assert!(h.len() > 100);
        assert_eq!(h, string_hash("CS_bulk_DS_1"));
    }

    #[test]
    fn prefixed_id_truncates() {
        let id = prefixed_id("PO_", &"9".repeat(150));
        assert_eq!(id.len(), MAX_ID_LEN);
        assert!(id.starts_with("PO_999"));
        assert_eq!(prefixed_id("CO_", "12"), "CO_12");
    }

    #[test]
    fn timestamp_shape() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }
}
