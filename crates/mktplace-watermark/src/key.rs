//! Deterministic per-(buyer, share) watermark key derivation.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// The HMAC-derived key material for one (buyer, share) pair.
///
/// `seed` and the byte table `bytes` are both sliced from the same 16-byte
/// digest prefix — they are not independent secrets, just two views of it
/// the embedding formula happens to need.
#[derive(Clone, Copy, Debug)]
pub struct WatermarkKey {
    /// First 8 bytes of the HMAC digest, as a big-endian u32 (low 4 bytes).
    pub seed: u32,
    /// First 8 bytes of the HMAC digest, indexed by `anchor mod 8`.
    pub bytes: [u8; 8],
}

impl WatermarkKey {
    /// Derive the key for one `(buyer_id, share_id)` pair.
    ///
    /// `watermark = HMAC_SHA256(secret, "{buyer_id}:{share_id}")[:16 bytes]`;
    /// `seed = u32(wm[0:4])`; `bytes = wm[0:8]`.
    #[must_use]
    pub fn derive(secret: &[u8], buyer_id: i64, share_id: i64) -> Self {
        let message = format!("{buyer_id}:{share_id}");
        let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts keys of any length");
        mac.update(message.as_bytes());
        let digest = mac.finalize().into_bytes();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        let seed = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);

        Self { seed, bytes }
    }

    /// The byte selected for a given row anchor, `B[anchor mod len(B)]`.
    #[must_use]
    pub fn byte_for_anchor(&self, anchor: u64) -> u8 {
        self.bytes[(anchor % self.bytes.len() as u64) as usize]
    }

    /// `target_μs = (byte * 12_500 + seed mod 10_000) mod 1_000_000`, per §4.5.
    #[must_use]
    pub fn target_micros(&self, anchor: u64) -> u32 {
        let byte = u32::from(self.byte_for_anchor(anchor));
        (byte * 12_500 + self.seed % 10_000) % 1_000_000
    }

    /// `_watermark_id` for one row: `SHA256("{key}:{anchor}")[:8 hex chars] mod 1_000_000`.
    ///
    /// The key bytes are mixed into the hash, not just the anchor — two
    /// different `(buyer, share)` keys must disagree on the same row, or the
    /// channel carries no attribution signal at all.
    #[must_use]
    pub fn watermark_id(&self, anchor: u64) -> i64 {
        let message = format!("{}:{anchor}", hex::encode(self.bytes));
        let digest = Sha256::digest(message.as_bytes());
        let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        i64::from(prefix % 1_000_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = WatermarkKey::derive(b"secret", 1, 2);
        let b = WatermarkKey::derive(b"secret", 1, 2);
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn different_buyer_or_share_changes_the_key() {
        let a = WatermarkKey::derive(b"secret", 1, 2);
        let b = WatermarkKey::derive(b"secret", 1, 3);
        assert_ne!(a.bytes, b.bytes);
    }

    #[test]
    fn target_micros_is_within_range() {
        let key = WatermarkKey::derive(b"secret", 42, 7);
        for anchor in [0u64, 1, 1_000_000, u64::MAX] {
            assert!(key.target_micros(anchor) < 1_000_000);
        }
    }

    #[test]
    fn watermark_id_is_within_range() {
        let key = WatermarkKey::derive(b"secret", 42, 7);
        for anchor in [0u64, 1, 1_000_000, u64::MAX] {
            let id = key.watermark_id(anchor);
            assert!((0..1_000_000).contains(&id));
        }
    }

    #[test]
    fn watermark_id_depends_on_the_key_not_just_the_anchor() {
        let a = WatermarkKey::derive(b"secret", 1, 2);
        let b = WatermarkKey::derive(b"secret", 9, 9);
        assert_ne!(a.watermark_id(42), b.watermark_id(42));
    }
}
