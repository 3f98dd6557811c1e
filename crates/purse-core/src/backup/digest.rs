//! Integrity digest over the canonical serialization of a payload.
//!
//! Corruption detection only. The digest is not authenticated, so anyone who
//! can rewrite the document can also rewrite the digest.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest as _, Sha256};

/// Prefix of digests produced when the payload could not be canonicalized
pub const FALLBACK_DIGEST_PREFIX: &str = "fallback:";

/// Outcome of comparing a stored digest against a recomputed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestCheck {
    Match,
    Mismatch { stored: String, computed: String },
    /// Stored digest is a fallback marker or the payload cannot be canonicalized
    Unverifiable,
}

impl DigestCheck {
    #[must_use]
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

fn write_canonical(value: &Value, out: &mut String) -> serde_json::Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => out.push_str(&serde_json::to_string(s)?),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(key)?);
                out.push(':');
                write_canonical(&map[*key], out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Serialize `value` with recursively sorted object keys and no whitespace.
pub fn canonical_json(value: &Value) -> serde_json::Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

/// SHA-256 of `serialized`, lowercase hex.
#[must_use]
pub fn digest(serialized: &str) -> String {
    hex::encode(Sha256::digest(serialized.as_bytes()))
}

/// Timestamp-derived marker used when no real digest can be produced
#[must_use]
pub fn fallback_digest(unix_millis: i64) -> String {
    format!("{FALLBACK_DIGEST_PREFIX}{unix_millis}")
}

/// Digest of any serializable value, falling back to a timestamp marker
/// instead of failing when the value has no JSON form.
pub fn digest_serializable<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_value(value).and_then(|value| canonical_json(&value)) {
        Ok(canonical) => digest(&canonical),
        Err(error) => {
            tracing::warn!("Using fallback digest, payload has no canonical form: {error}");
            fallback_digest(crate::util::unix_millis_now())
        }
    }
}

/// Recompute the digest of `payload` and compare it with `stored`.
pub fn verify_digest(stored: &str, payload: &Value) -> DigestCheck {
    if stored.starts_with(FALLBACK_DIGEST_PREFIX) {
        return DigestCheck::Unverifiable;
    }
    let Ok(canonical) = canonical_json(payload) else {
        return DigestCheck::Unverifiable;
    };
    let computed = digest(&canonical);
    if computed.eq_ignore_ascii_case(stored.trim()) {
        DigestCheck::Match
    } else {
        DigestCheck::Mismatch {
            stored: stored.to_string(),
            computed,
        }
    }
}
