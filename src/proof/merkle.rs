//! Merkle Tree Commitments
//!
//! Binary Merkle tree over ship leaves using SHA-256 with canonical pairing:
//! every internal node is `H(min(a, b) ‖ max(a, b))`. Leaves are sorted
//! byte-wise before the first round, so the root depends only on the set of
//! leaves and never on the order they were supplied in.
//!
//! Reduction rule: adjacent pairs are hashed, an unpaired last node is carried
//! up unchanged. There is no padding; a single leaf is its own root.

use serde::{Serialize, Deserialize};

use crate::core::hash::{hash_pair, Digest};
use crate::proof::commitment::CommitmentError;

/// Binary Merkle tree for commitment generation.
///
/// Always holds at least one leaf; construction rejects an empty set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleTree {
    /// All tree levels (sorted leaves at index 0, root at last index)
    levels: Vec<Vec<Digest>>,
}

impl MerkleTree {
    /// Build a tree from leaf digests in any order.
    pub fn from_leaves<I>(leaves: I) -> Result<Self, CommitmentError>
    where
        I: IntoIterator<Item = Digest>,
    {
        let mut current_level: Vec<Digest> = leaves.into_iter().collect();
        if current_level.is_empty() {
            return Err(CommitmentError::InvalidCommitment);
        }
        current_level.sort_unstable();

        let mut levels = vec![current_level.clone()];

        // Build up to root
        while current_level.len() > 1 {
            let next_level: Vec<Digest> = current_level
                .chunks(2)
                .map(|chunk| {
                    let left = &chunk[0];
                    if chunk.len() > 1 {
                        hash_pair(left, &chunk[1])
                    } else {
                        *left
                    }
                })
                .collect();

            levels.push(next_level.clone());
            current_level = next_level;
        }

        Ok(Self { levels })
    }

    /// Root digest.
    pub fn root(&self) -> Digest {
        // `from_leaves` guarantees a non-empty final level.
        self.levels[self.levels.len() - 1][0]
    }

    /// Leaves in canonical (sorted) order.
    pub fn leaves(&self) -> &[Digest] {
        &self.levels[0]
    }

    /// Number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels including the leaf level.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Canonical index of a leaf digest, if present.
    pub fn position(&self, leaf: &Digest) -> Option<usize> {
        self.levels[0].binary_search(leaf).ok()
    }

    /// Generate a Merkle inclusion proof for the leaf at `index`
    /// (canonical order).
    ///
    /// Returns None if index is out of bounds.
    pub fn generate_proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }

        let mut steps = Vec::new();
        let mut current_index = index;

        // Walk up the tree, collecting sibling hashes
        for level in &self.levels[..self.levels.len() - 1] {
            if current_index % 2 == 1 {
                steps.push(ProofStep {
                    sibling: level[current_index - 1],
                    side: Side::Left,
                });
            } else if current_index + 1 < level.len() {
                steps.push(ProofStep {
                    sibling: level[current_index + 1],
                    side: Side::Right,
                });
            }
            // else: unpaired, carried up without a step

            current_index /= 2;
        }

        Some(MerkleProof {
            leaf_index: index,
            steps,
        })
    }

    /// Verify a Merkle proof against a root hash.
    pub fn verify_proof(root: &Digest, proof: &MerkleProof, leaf: &Digest) -> bool {
        proof.fold(leaf) == *root
    }
}

/// Which side of the running hash a sibling was consumed from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Sibling was the left child.
    Left,
    /// Sibling was the right child.
    Right,
}

/// One step of an inclusion path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    /// Sibling digest at this level.
    pub sibling: Digest,
    /// Side the sibling sat on.
    pub side: Side,
}

impl ProofStep {
    /// Combine the running hash with this step's sibling.
    #[inline]
    pub fn combine(&self, current: &Digest) -> Digest {
        match self.side {
            Side::Left => hash_pair(&self.sibling, current),
            Side::Right => hash_pair(current, &self.sibling),
        }
    }
}

/// Merkle inclusion proof.
///
/// Contains the path from a leaf to the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Canonical index of the leaf this proof is for.
    pub leaf_index: usize,
    /// Sibling steps from the leaf level upwards.
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Fold the path starting from `leaf`, returning the implied root.
    pub fn fold(&self, leaf: &Digest) -> Digest {
        self.steps.iter().fold(*leaf, |current, step| step.combine(&current))
    }

    /// Estimated size in bytes.
    pub fn size(&self) -> usize {
        8 + self.steps.len() * 33 // index + (hash + side) per step
    }
}
