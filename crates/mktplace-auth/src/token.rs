//! Delta-Sharing bearer-token shape: an opaque, URL-safe token handed to
//! the buyer, and the salted HMAC hash of it stored in the catalog.
//!
//! Only the hash is ever persisted — [`hash_token`] is a one-way function
//! of the salt, not something that can be inverted back to the token.

use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh share token: 32 bytes of randomness, URL-safe-base64
/// encoded, with an 8-hex-char checksum suffix so a truncated/corrupted
/// token is rejected before it ever reaches the database.
#[must_use]
pub fn generate_share_token() -> String {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let token_string = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(raw);
    let checksum = hex::encode(Sha256::digest(token_string.as_bytes()));
    format!("{token_string}-{}", &checksum[..8])
}

/// HMAC-SHA256 of the token, keyed by `TOKEN_SALT`. This is what the
/// catalog stores as `shares.token_hash`.
#[must_use]
pub fn hash_token(token: &str, salt: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(salt).expect("HMAC accepts keys of any length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a freshly computed hash against the stored
/// one — the comparison itself must not leak timing information about
/// where the mismatch occurred.
#[must_use]
pub fn verify_token_hash(token: &str, stored_hash: &str, salt: &[u8]) -> bool {
    let computed = hash_token(token, salt);
    constant_time_eq(computed.as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Whether a token created at `created_at` is due for rotation.
#[must_use]
pub fn should_rotate_token(created_at: DateTime<Utc>, rotation_days: i64, now: DateTime<Utc>) -> bool {
    if rotation_days <= 0 {
        return false;
    }
    (now - created_at).num_days() >= rotation_days
}

/// Whether a token/share's expiry has passed.
#[must_use]
pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    expires_at.is_some_and(|exp| now > exp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn generated_tokens_carry_a_valid_checksum_suffix() {
        let token = generate_share_token();
        assert!(token.contains('-'));
        let (body, checksum) = token.rsplit_once('-').unwrap();
        let expected = hex::encode(Sha256::digest(body.as_bytes()));
        assert_eq!(&expected[..8], checksum);
    }

    #[test]
    fn hash_round_trips_through_verify() {
        let token = generate_share_token();
        let hash = hash_token(&token, b"salt");
        assert!(verify_token_hash(&token, &hash, b"salt"));
        assert!(!verify_token_hash("wrong-token", &hash, b"salt"));
    }

    #[test]
    fn rotation_respects_the_configured_window() {
        let now = Utc::now();
        let created = now - Duration::days(100);
        assert!(should_rotate_token(created, 90, now));
        assert!(!should_rotate_token(created, 0, now));
        assert!(!should_rotate_token(now, 90, now));
    }

    #[test]
    fn expiry_check_compares_against_now() {
        let now = Utc::now();
        assert!(is_expired(Some(now - Duration::seconds(1)), now));
        assert!(!is_expired(Some(now + Duration::seconds(1)), now));
        assert!(!is_expired(None, now));
    }
}
