//! Digest Primitives
//!
//! SHA-256 helpers shared by the leaf encoder, the Merkle builder and the
//! verifier. Every digest that crosses the commit/verify boundary is built
//! here so both sides hash byte-for-byte the same input.

use sha2::{Sha256, Digest as _};

/// Hash output type (256 bits / 32 bytes).
pub type Digest = [u8; 32];

/// Incremental hasher for commitment inputs.
///
/// Wraps SHA-256 with fixed-width helpers. Order of updates is part of the
/// encoding and must never change between commit and verify.
pub struct DigestHasher {
    hasher: Sha256,
}

impl Default for DigestHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl DigestHasher {
    /// Create a fresh hasher.
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a single byte.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a 32-byte digest or salt.
    #[inline]
    pub fn update_digest(&mut self, digest: &Digest) {
        self.hasher.update(digest);
    }

    /// Finalize and return the digest.
    pub fn finalize(self) -> Digest {
        self.hasher.finalize().into()
    }
}

/// Compute a plain SHA-256 digest of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest {
    let mut hasher = DigestHasher::new();
    hasher.update_bytes(data);
    hasher.finalize()
}

/// Hash two child digests under the canonical pair rule.
///
/// The smaller digest (byte-wise) is always hashed first, so
/// `hash_pair(a, b) == hash_pair(b, a)`.
pub fn hash_pair(a: &Digest, b: &Digest) -> Digest {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = DigestHasher::new();
    hasher.update_digest(low);
    hasher.update_digest(high);
    hasher.finalize()
}

/// Short hex prefix of a digest for log lines.
pub fn short_hex(digest: &Digest) -> String {
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_matches_one_shot() {
        let mut hasher = DigestHasher::new();
        hasher.update_u8(7);
        hasher.update_bytes(&[1, 2, 3]);
        let incremental = hasher.finalize();

        assert_eq!(incremental, hash_bytes(&[7, 1, 2, 3]));
    }

    #[test]
    fn test_hash_order_matters() {
        assert_ne!(hash_bytes(&[1, 2]), hash_bytes(&[2, 1]));
    }

    #[test]
    fn test_pair_hash_is_symmetric() {
        let a = hash_bytes(b"left");
        let b = hash_bytes(b"right");

        assert_eq!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_pair_hash_sorts_before_concatenation() {
        let low = [0x00; 32];
        let high = [0xFF; 32];

        let mut expected = Vec::with_capacity(64);
        expected.extend_from_slice(&low);
        expected.extend_from_slice(&high);

        assert_eq!(hash_pair(&high, &low), hash_bytes(&expected));
    }

    #[test]
    fn test_short_hex() {
        let digest = [0xAB; 32];
        assert_eq!(short_hex(&digest), "abababab");
    }
}
