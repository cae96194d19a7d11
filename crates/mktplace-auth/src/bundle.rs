//! Metadata bundle signature verification.
//!
//! A seller publishes a dataset by submitting a transient `MetadataBundle`
//! (version, table path, schema, anchor columns, PII summary, timestamp)
//! signed with an HMAC over its canonical JSON form. The signature is
//! checked once at dataset-creation time; the bundle itself is never
//! persisted past that request.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Canonicalize a JSON value by recursively sorting object keys, then
/// serialize. Two semantically identical objects with differently ordered
/// keys must hash to the same signature.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compute the HMAC-SHA256 signature (as lowercase hex) over a bundle's
/// canonical JSON form.
#[must_use]
pub fn sign_bundle(bundle: &Value, secret: &[u8]) -> String {
    let canonical = canonicalize(bundle).to_string();
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a bundle's signature before trusting its contents to create a
/// dataset.
///
/// # Errors
///
/// Returns [`AuthError::InvalidBundleSignature`] if the signature does not
/// match the bundle's canonical JSON form.
pub fn verify_bundle_signature(bundle: &Value, signature: &str, secret: &[u8]) -> Result<(), AuthError> {
    let expected = sign_bundle(bundle, secret);
    if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidBundleSignature)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_the_signature() {
        let a = json!({"version": 1, "table_path": "s3://x"});
        let b = json!({"table_path": "s3://x", "version": 1});
        assert_eq!(sign_bundle(&a, b"secret"), sign_bundle(&b, b"secret"));
    }

    #[test]
    fn tampering_with_the_bundle_invalidates_the_signature() {
        let bundle = json!({"version": 1, "table_path": "s3://x"});
        let sig = sign_bundle(&bundle, b"secret");
        let tampered = json!({"version": 2, "table_path": "s3://x"});
        assert!(verify_bundle_signature(&tampered, &sig, b"secret").is_err());
    }

    #[test]
    fn valid_signature_verifies() {
        let bundle = json!({"version": 1, "table_path": "s3://x"});
        let sig = sign_bundle(&bundle, b"secret");
        assert!(verify_bundle_signature(&bundle, &sig, b"secret").is_ok());
    }
}
