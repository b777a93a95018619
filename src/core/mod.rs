//! Core commitment primitives.
//!
//! Hashing and salt generation. Everything above this layer hashes through
//! these helpers so the commit and verify paths stay bit-exact.

pub mod hash;
pub mod rng;

// Re-export core types
pub use hash::{Digest, DigestHasher, hash_pair};
pub use rng::Salt;
