//! Board Commitment Proof System
//!
//! Provides hidden-but-provable boards through:
//! - Salted per-ship leaf encoding
//! - Merkle tree commitments with canonical pairing
//! - Per-ship inclusion proofs for hit claims
//! - End-of-game reveal audit
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF SYSTEM                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  leaf.rs         - salt ‖ kind ‖ sorted cells → leaf digest │
//! │  merkle.rs       - Sorted-pair Merkle tree and paths        │
//! │  commitment.rs   - Sealed board, disclosures, responses     │
//! │  verify.rs       - Inclusion, hit and reveal verification   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod leaf;
pub mod merkle;
pub mod commitment;
pub mod verify;

// Re-export key types
pub use leaf::leaf_digest;
pub use merkle::{MerkleTree, MerkleProof, ProofStep, Side};
pub use commitment::{
    BoardCommitment, BoardReveal, CommitmentError, CommitmentRoot, Disclosure, ShotResponse,
    commitment_root, inclusion_proof,
};
pub use verify::{
    verify_inclusion, verify_disclosure, verify_hit, verify_response, verify_reveal,
    VerificationRejected,
};
