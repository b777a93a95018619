//! Board Commitment Protocol
//!
//! Seal a fleet before the game starts: every ship gets a fresh salt, the
//! salted leaves are reduced into a Merkle root, and only the root is
//! published. The sealed board stays local and answers challenges one ship
//! at a time.

use std::fmt;

use rand::{CryptoRng, RngCore};
use serde::{Serialize, Deserialize};

use crate::core::hash::{short_hex, Digest};
use crate::core::rng::Salt;
use crate::game::board::{BoardError, Coordinate, Fleet, Placement, ShipKind};
use crate::proof::leaf::leaf_digest;
use crate::proof::merkle::{MerkleProof, MerkleTree};

/// Published commitment to a board.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitmentRoot(pub Digest);

impl CommitmentRoot {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &Digest {
        &self.0
    }

    /// Full lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for CommitmentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for CommitmentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentRoot({}..)", short_hex(&self.0))
    }
}

/// Compute the root over an arbitrary list of salted placements.
///
/// Order of `ships` does not affect the result. One ship yields its own
/// leaf as the root.
pub fn commitment_root(ships: &[(Placement, Salt)]) -> Result<CommitmentRoot, CommitmentError> {
    Ok(CommitmentRoot(build_tree(ships)?.root()))
}

/// Inclusion proof for `ships[index]`, reproducing the reduction that
/// [`commitment_root`] performs over the same list.
pub fn inclusion_proof(
    ships: &[(Placement, Salt)],
    index: usize,
) -> Result<Option<MerkleProof>, CommitmentError> {
    let Some((placement, salt)) = ships.get(index) else {
        return Ok(None);
    };
    let tree = build_tree(ships)?;
    let leaf = leaf_digest(placement, salt)?;
    Ok(tree.position(&leaf).and_then(|pos| tree.generate_proof(pos)))
}

fn build_tree(ships: &[(Placement, Salt)]) -> Result<MerkleTree, CommitmentError> {
    let leaves = ships
        .iter()
        .map(|(placement, salt)| leaf_digest(placement, salt))
        .collect::<Result<Vec<_>, _>>()?;
    MerkleTree::from_leaves(leaves)
}

/// Ship data disclosed when a guess hits it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disclosure {
    /// The full placement of the hit ship.
    pub placement: Placement,
    /// Its salt.
    pub salt: Salt,
    /// Path from its leaf to the committed root.
    pub proof: MerkleProof,
}

/// A defender's answer to a guess.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotResponse {
    /// No ship at the guessed cell. Checked against the full reveal at game end.
    Miss,
    /// A ship covers the guessed cell; the disclosure proves it.
    Hit(Disclosure),
}

impl ShotResponse {
    /// Whether this response claims a hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, ShotResponse::Hit(_))
    }
}

/// Every ship and salt of a board, published after the game for audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardReveal {
    /// Salted placements, any order.
    pub ships: Vec<(Placement, Salt)>,
}

/// A fleet sealed under a commitment root.
///
/// Holds the secrets; never leaves the owner's process except through
/// [`BoardCommitment::disclose`], [`BoardCommitment::reveal`] or local
/// persistence via [`BoardCommitment::to_bytes`].
#[derive(Clone, Debug)]
pub struct BoardCommitment {
    fleet: Fleet,
    /// Salts in tag order.
    salts: Vec<Salt>,
    /// Leaves in tag order.
    leaves: Vec<Digest>,
    tree: MerkleTree,
}

/// Persisted form of a sealed board.
#[derive(Serialize, Deserialize)]
struct SealedBoardRecord {
    fleet: Fleet,
    salts: Vec<Salt>,
}

impl BoardCommitment {
    /// Seal a fleet with salts from the operating system CSPRNG.
    pub fn seal(fleet: Fleet) -> Result<Self, CommitmentError> {
        Self::seal_with_rng(fleet, &mut rand::rngs::OsRng)
    }

    /// Seal a fleet with salts from a caller-supplied RNG.
    pub fn seal_with_rng<R: RngCore + CryptoRng>(
        fleet: Fleet,
        rng: &mut R,
    ) -> Result<Self, CommitmentError> {
        let salts = ShipKind::ALL.iter().map(|_| Salt::from_rng(rng)).collect();
        Self::from_salts(fleet, salts)
    }

    /// Rebuild a sealed board from a fleet and its salts (tag order).
    pub fn from_salts(fleet: Fleet, salts: Vec<Salt>) -> Result<Self, CommitmentError> {
        if salts.len() != ShipKind::ALL.len() {
            return Err(CommitmentError::SaltCount { got: salts.len() });
        }

        let leaves = fleet
            .placements()
            .iter()
            .zip(&salts)
            .map(|(placement, salt)| leaf_digest(placement, salt))
            .collect::<Result<Vec<_>, _>>()?;
        let tree = MerkleTree::from_leaves(leaves.iter().copied())?;

        Ok(Self { fleet, salts, leaves, tree })
    }

    /// Published root.
    pub fn root(&self) -> CommitmentRoot {
        CommitmentRoot(self.tree.root())
    }

    /// The sealed fleet.
    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    /// Salt bound to a ship.
    pub fn salt(&self, kind: ShipKind) -> Salt {
        self.salts[kind.tag() as usize]
    }

    /// Leaf digest of a ship.
    pub fn leaf(&self, kind: ShipKind) -> Digest {
        self.leaves[kind.tag() as usize]
    }

    /// Inclusion proof for one ship.
    pub fn prove(&self, kind: ShipKind) -> Result<MerkleProof, CommitmentError> {
        self.tree
            .position(&self.leaf(kind))
            .and_then(|pos| self.tree.generate_proof(pos))
            .ok_or(CommitmentError::LeafMissing(kind))
    }

    /// Disclose one ship with its proof.
    pub fn disclose(&self, kind: ShipKind) -> Result<Disclosure, CommitmentError> {
        Ok(Disclosure {
            placement: *self.fleet.get(kind),
            salt: self.salt(kind),
            proof: self.prove(kind)?,
        })
    }

    /// Answer a guess against this board.
    pub fn answer(&self, coord: Coordinate) -> Result<ShotResponse, CommitmentError> {
        match self.fleet.ship_at(coord) {
            Some(placement) => Ok(ShotResponse::Hit(self.disclose(placement.kind)?)),
            None => Ok(ShotResponse::Miss),
        }
    }

    /// Publish the whole board for the end-of-game audit.
    pub fn reveal(&self) -> BoardReveal {
        BoardReveal {
            ships: self
                .fleet
                .placements()
                .iter()
                .copied()
                .zip(self.salts.iter().copied())
                .collect(),
        }
    }

    /// Serialize fleet and salts for local persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CommitmentError> {
        let record = SealedBoardRecord {
            fleet: self.fleet.clone(),
            salts: self.salts.clone(),
        };
        bincode::serialize(&record).map_err(|e| CommitmentError::Encoding(e.to_string()))
    }

    /// Restore a sealed board persisted with [`BoardCommitment::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommitmentError> {
        let record: SealedBoardRecord =
            bincode::deserialize(bytes).map_err(|e| CommitmentError::Encoding(e.to_string()))?;
        Self::from_salts(record.fleet, record.salts)
    }
}

/// Errors raised while building a commitment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitmentError {
    /// No leaves to commit to.
    #[error("cannot commit to a board with no ships")]
    InvalidCommitment,

    /// A placement failed validation.
    #[error(transparent)]
    Board(#[from] BoardError),

    /// Salt list does not match the fleet.
    #[error("expected one salt per ship, got {got}")]
    SaltCount {
        /// Number of salts supplied.
        got: usize,
    },

    /// A ship's leaf is not in the tree.
    #[error("no leaf for {0}")]
    LeafMissing(ShipKind),

    /// Persisted board could not be encoded or decoded.
    #[error("sealed board encoding: {0}")]
    Encoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::tests::sample_fleet;
    use crate::game::board::Orientation;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn sealed(seed: u64) -> BoardCommitment {
        BoardCommitment::seal_with_rng(sample_fleet(), &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_seal_is_deterministic_for_fixed_salts() {
        assert_eq!(sealed(1).root(), sealed(1).root());
        assert_ne!(sealed(1).root(), sealed(2).root());
    }

    #[test]
    fn test_root_matches_free_function() {
        let board = sealed(3);
        assert_eq!(commitment_root(&board.reveal().ships).unwrap(), board.root());
    }

    #[test]
    fn test_shuffled_inputs_share_root() {
        let ships = sealed(4).reveal().ships;
        let mut rng = StdRng::seed_from_u64(99);

        let mut first = ships.clone();
        let mut second = ships.clone();
        first.shuffle(&mut rng);
        second.shuffle(&mut rng);
        second.reverse();

        assert_eq!(commitment_root(&first).unwrap(), commitment_root(&second).unwrap());
    }

    #[test]
    fn test_empty_board_rejected() {
        assert_eq!(commitment_root(&[]), Err(CommitmentError::InvalidCommitment));
    }

    #[test]
    fn test_single_ship_root_is_leaf() {
        let ship = Placement::new(ShipKind::Destroyer, Coordinate::new(3, 3), Orientation::Vertical);
        let salt = Salt::new([5; 32]);

        let root = commitment_root(&[(ship, salt)]).unwrap();
        assert_eq!(root.0, leaf_digest(&ship, &salt).unwrap());
    }

    #[test]
    fn test_out_of_bounds_ship_rejected() {
        let ship = Placement::new(ShipKind::Carrier, Coordinate::new(9, 9), Orientation::Horizontal);
        let result = commitment_root(&[(ship, Salt::new([0; 32]))]);
        assert!(matches!(result, Err(CommitmentError::Board(BoardError::InvalidPlacement { .. }))));
    }

    #[test]
    fn test_inclusion_proof_by_input_index() {
        let ships = sealed(5).reveal().ships;
        let root = commitment_root(&ships).unwrap();

        for (i, (placement, salt)) in ships.iter().enumerate() {
            let proof = inclusion_proof(&ships, i).unwrap().unwrap();
            let leaf = leaf_digest(placement, salt).unwrap();
            assert!(MerkleTree::verify_proof(&root.0, &proof, &leaf));
        }
        assert_eq!(inclusion_proof(&ships, 5).unwrap(), None);
    }

    #[test]
    fn test_board_proofs_match_free_function_proofs() {
        let board = sealed(6);
        let ships = board.reveal().ships;
        for (i, (placement, _)) in ships.iter().enumerate() {
            assert_eq!(
                board.prove(placement.kind).unwrap(),
                inclusion_proof(&ships, i).unwrap().unwrap()
            );
        }
    }

    #[test]
    fn test_answer_hit_and_miss() {
        let board = sealed(7);

        match board.answer(Coordinate::new(0, 2)).unwrap() {
            ShotResponse::Hit(disclosure) => {
                assert_eq!(disclosure.placement.kind, ShipKind::Carrier);
                assert_eq!(disclosure.salt, board.salt(ShipKind::Carrier));
            }
            ShotResponse::Miss => panic!("expected a hit"),
        }

        assert_eq!(board.answer(Coordinate::new(5, 5)).unwrap(), ShotResponse::Miss);
    }

    #[test]
    fn test_persistence_roundtrip_keeps_root() {
        let board = sealed(8);
        let bytes = board.to_bytes().unwrap();
        let restored = BoardCommitment::from_bytes(&bytes).unwrap();

        assert_eq!(restored.root(), board.root());
        assert_eq!(restored.fleet(), board.fleet());
    }

    #[test]
    fn test_corrupt_persistence_rejected() {
        assert!(matches!(
            BoardCommitment::from_bytes(&[1, 2, 3]),
            Err(CommitmentError::Encoding(_))
        ));
    }

    #[test]
    fn test_salt_count_checked() {
        let result = BoardCommitment::from_salts(sample_fleet(), vec![Salt::new([0; 32])]);
        assert_eq!(result.unwrap_err(), CommitmentError::SaltCount { got: 1 });
    }

    #[test]
    fn test_root_display() {
        let root = CommitmentRoot([0xAB; 32]);
        assert!(root.to_string().starts_with("0xabab"));
        assert_eq!(root.to_string().len(), 66);
    }
}
