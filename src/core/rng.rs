//! Salt Generation
//!
//! Every ship leaf is blinded by its own 256-bit salt. The occupied-cell
//! pattern space is tiny (a few hundred placements per ship), so without a
//! salt any leaf could be brute-forced from the published root.

use std::fmt;

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Serialize, Deserialize};

/// Salt length in bytes.
pub const SALT_LEN: usize = 32;

/// Per-ship secret salt.
///
/// `Debug` never prints the bytes; use [`Salt::as_bytes`] when the salt is
/// deliberately disclosed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(pub [u8; SALT_LEN]);

impl Salt {
    /// Wrap raw bytes.
    pub const fn new(bytes: [u8; SALT_LEN]) -> Self {
        Self(bytes)
    }

    /// Draw a salt from the operating system CSPRNG.
    pub fn random() -> Self {
        Self::from_rng(&mut OsRng)
    }

    /// Draw a salt from a caller-supplied cryptographic RNG.
    ///
    /// Tests pass a seeded `StdRng` here to get reproducible boards.
    pub fn from_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; SALT_LEN];
        rng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Raw salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }

    /// Copy of this salt with one bit flipped.
    pub fn with_bit_flipped(&self, bit: usize) -> Self {
        let mut bytes = self.0;
        bytes[(bit / 8) % SALT_LEN] ^= 1 << (bit % 8);
        Self(bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_seeded_salts_are_reproducible() {
        let a = Salt::from_rng(&mut StdRng::seed_from_u64(7));
        let b = Salt::from_rng(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_consecutive_salts_differ() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = Salt::from_rng(&mut rng);
        let b = Salt::from_rng(&mut rng);
        assert_ne!(a, b);
    }

    #[test]
    fn test_os_salts_differ() {
        assert_ne!(Salt::random(), Salt::random());
    }

    #[test]
    fn test_bit_flip() {
        let salt = Salt::new([0; SALT_LEN]);
        let flipped = salt.with_bit_flipped(9);
        assert_eq!(flipped.0[1], 0b10);
        assert_ne!(salt, flipped);
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let salt = Salt::new([0xAA; SALT_LEN]);
        assert_eq!(format!("{:?}", salt), "Salt(..)");
    }
}
