//! Claim Verification
//!
//! Checks the opponent's disclosures against their published root. The
//! verifier never trusts a claimed cell set: it re-derives the leaf from
//! the raw placement and salt, folds the proof, and only then looks at
//! which cells the ship covers.
//!
//! [`verify_inclusion`] is the pure boolean core. The `verify_*` functions
//! returning `Result` attach a reason, because a rejected disclosure is an
//! attempted cheat and has to reach the dispute path.

use crate::core::hash::Digest;
use crate::game::board::{BoardError, Coordinate, Fleet, ShipKind};
use crate::proof::commitment::{commitment_root, BoardReveal, CommitmentRoot, Disclosure, ShotResponse};
use crate::proof::leaf::leaf_digest;
use crate::proof::merkle::MerkleProof;

/// Check that `leaf` is included under `root` via `proof`.
///
/// Total: any malformed input simply yields `false`.
pub fn verify_inclusion(root: &CommitmentRoot, leaf: &Digest, proof: &MerkleProof) -> bool {
    proof.fold(leaf) == root.0
}

/// Check a disclosed ship is part of the committed board.
pub fn verify_disclosure(root: &CommitmentRoot, disclosure: &Disclosure) -> bool {
    match leaf_digest(&disclosure.placement, &disclosure.salt) {
        Ok(leaf) => verify_inclusion(root, &leaf, &disclosure.proof),
        Err(_) => false,
    }
}

/// Check a hit claim at `coord`: the disclosed ship must be committed and
/// must cover the cell.
pub fn verify_hit(
    root: &CommitmentRoot,
    coord: Coordinate,
    disclosure: &Disclosure,
) -> Result<(), VerificationRejected> {
    let placement = &disclosure.placement;
    let cells = placement.cells().map_err(VerificationRejected::InvalidPlacement)?;
    let leaf = leaf_digest(placement, &disclosure.salt).map_err(VerificationRejected::InvalidPlacement)?;

    if !verify_inclusion(root, &leaf, &disclosure.proof) {
        return Err(VerificationRejected::RootMismatch { kind: placement.kind });
    }

    if !cells.contains(&coord) {
        return Err(VerificationRejected::CellNotCovered { kind: placement.kind, coord });
    }

    Ok(())
}

/// Check a defender's response to a guess at `coord`.
///
/// Returns whether the response is a hit. A miss cannot be proven against a
/// per-ship commitment; it is accepted here and audited by [`verify_reveal`].
pub fn verify_response(
    root: &CommitmentRoot,
    coord: Coordinate,
    response: &ShotResponse,
) -> Result<bool, VerificationRejected> {
    match response {
        ShotResponse::Miss => Ok(false),
        ShotResponse::Hit(disclosure) => verify_hit(root, coord, disclosure).map(|()| true),
    }
}

/// End-of-game audit of a fully revealed board.
///
/// The reveal must be a legal fleet, must reproduce the committed root, and
/// none of the cells the owner answered as a miss may hold a ship.
pub fn verify_reveal(
    root: &CommitmentRoot,
    reveal: &BoardReveal,
    claimed_misses: &[Coordinate],
) -> Result<(), VerificationRejected> {
    let fleet = Fleet::new(reveal.ships.iter().map(|(placement, _)| *placement))
        .map_err(VerificationRejected::IllegalBoard)?;

    let recomputed = commitment_root(&reveal.ships).map_err(|_| VerificationRejected::RevealMismatch)?;
    if recomputed != *root {
        return Err(VerificationRejected::RevealMismatch);
    }

    for coord in claimed_misses {
        if let Some(placement) = fleet.ship_at(*coord) {
            return Err(VerificationRejected::MissContradicted {
                kind: placement.kind,
                coord: *coord,
            });
        }
    }

    Ok(())
}

/// Why a disclosure was rejected. Every variant signals a cheat attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerificationRejected {
    /// Disclosed placement leaves the board.
    #[error("disclosed placement is invalid: {0}")]
    InvalidPlacement(BoardError),

    /// Proof does not fold to the committed root.
    #[error("{kind} disclosure does not match the committed root")]
    RootMismatch {
        /// Claimed ship.
        kind: ShipKind,
    },

    /// Ship is committed but does not cover the guessed cell.
    #[error("{kind} does not cover {coord}")]
    CellNotCovered {
        /// Disclosed ship.
        kind: ShipKind,
        /// Guessed cell.
        coord: Coordinate,
    },

    /// Revealed board is not a legal fleet.
    #[error("revealed board is illegal: {0}")]
    IllegalBoard(BoardError),

    /// Revealed board does not reproduce the committed root.
    #[error("revealed board does not match the committed root")]
    RevealMismatch,

    /// A cell answered as a miss actually holds a ship.
    #[error("{coord} was answered as a miss but holds the {kind}")]
    MissContradicted {
        /// Ship found at the cell.
        kind: ShipKind,
        /// Cell answered as a miss.
        coord: Coordinate,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::Salt;
    use crate::game::board::tests::sample_fleet;
    use crate::game::board::{Orientation, Placement};
    use crate::proof::commitment::BoardCommitment;
    use crate::proof::leaf::leaf_digest_from_cells;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sealed(seed: u64) -> BoardCommitment {
        BoardCommitment::seal_with_rng(sample_fleet(), &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_every_ship_discloses_soundly() {
        let board = sealed(1);
        let root = board.root();

        for kind in ShipKind::ALL {
            let disclosure = board.disclose(kind).unwrap();
            assert!(verify_disclosure(&root, &disclosure));

            for cell in disclosure.placement.cells().unwrap() {
                assert_eq!(verify_hit(&root, cell, &disclosure), Ok(()));
            }
        }
    }

    #[test]
    fn test_carrier_scenario() {
        let board = sealed(2);
        let root = board.root();
        let carrier = board.disclose(ShipKind::Carrier).unwrap();
        assert_eq!(carrier.placement.origin, Coordinate::new(0, 0));
        assert_eq!(carrier.placement.orientation, Orientation::Horizontal);

        assert_eq!(verify_hit(&root, Coordinate::new(0, 2), &carrier), Ok(()));
        assert_eq!(
            verify_hit(&root, Coordinate::new(5, 5), &carrier),
            Err(VerificationRejected::CellNotCovered {
                kind: ShipKind::Carrier,
                coord: Coordinate::new(5, 5),
            })
        );
    }

    #[test]
    fn test_moved_ship_rejected() {
        let board = sealed(3);
        let root = board.root();
        let mut forged = board.disclose(ShipKind::Cruiser).unwrap();
        // Slide the cruiser onto a cell the attacker wants to claim.
        forged.placement.origin = Coordinate::new(5, 4);

        assert_eq!(
            verify_hit(&root, Coordinate::new(5, 5), &forged),
            Err(VerificationRejected::RootMismatch { kind: ShipKind::Cruiser })
        );
    }

    #[test]
    fn test_swapped_kind_rejected() {
        let board = sealed(4);
        let mut forged = board.disclose(ShipKind::Submarine).unwrap();
        forged.placement.kind = ShipKind::Cruiser;

        assert!(!verify_disclosure(&board.root(), &forged));
    }

    #[test]
    fn test_off_board_disclosure_rejected_not_panicking() {
        let board = sealed(5);
        let mut forged = board.disclose(ShipKind::Carrier).unwrap();
        forged.placement.origin = Coordinate::new(9, 9);

        assert!(!verify_disclosure(&board.root(), &forged));
        assert!(matches!(
            verify_hit(&board.root(), Coordinate::new(9, 9), &forged),
            Err(VerificationRejected::InvalidPlacement(_))
        ));
    }

    #[test]
    fn test_foreign_root_rejected() {
        let board = sealed(6);
        let other = sealed(7);
        let disclosure = board.disclose(ShipKind::Destroyer).unwrap();

        assert!(!verify_disclosure(&other.root(), &disclosure));
    }

    #[test]
    fn test_truncated_proof_rejected() {
        let board = sealed(8);
        let mut disclosure = board.disclose(ShipKind::Battleship).unwrap();
        disclosure.proof.steps.pop();

        assert!(!verify_disclosure(&board.root(), &disclosure));
    }

    #[test]
    fn test_single_ship_board() {
        let ship = Placement::new(ShipKind::Carrier, Coordinate::new(0, 0), Orientation::Horizontal);
        let salt = Salt::new([7; 32]);
        let root = commitment_root(&[(ship, salt)]).unwrap();

        let disclosure = Disclosure {
            placement: ship,
            salt,
            proof: MerkleProof { leaf_index: 0, steps: Vec::new() },
        };
        assert_eq!(verify_hit(&root, Coordinate::new(0, 4), &disclosure), Ok(()));
    }

    #[test]
    fn test_response_verification() {
        let board = sealed(9);
        let root = board.root();

        let hit = board.answer(Coordinate::new(4, 5)).unwrap();
        assert_eq!(verify_response(&root, Coordinate::new(4, 5), &hit), Ok(true));
        assert_eq!(verify_response(&root, Coordinate::new(1, 1), &ShotResponse::Miss), Ok(false));

        // A hit disclosure replayed for a different cell is rejected.
        assert!(verify_response(&root, Coordinate::new(1, 1), &hit).is_err());
    }

    #[test]
    fn test_honest_reveal_passes_audit() {
        let board = sealed(10);
        let misses = [Coordinate::new(5, 5), Coordinate::new(1, 1)];
        assert_eq!(verify_reveal(&board.root(), &board.reveal(), &misses), Ok(()));
    }

    #[test]
    fn test_audit_catches_false_miss() {
        let board = sealed(11);
        let misses = [Coordinate::new(0, 3)];
        assert_eq!(
            verify_reveal(&board.root(), &board.reveal(), &misses),
            Err(VerificationRejected::MissContradicted {
                kind: ShipKind::Carrier,
                coord: Coordinate::new(0, 3),
            })
        );
    }

    #[test]
    fn test_audit_catches_swapped_board() {
        let board = sealed(12);
        let other = sealed(13);
        assert_eq!(
            verify_reveal(&board.root(), &other.reveal(), &[]),
            Err(VerificationRejected::RevealMismatch)
        );
    }

    #[test]
    fn test_audit_rejects_partial_reveal() {
        let board = sealed(14);
        let mut reveal = board.reveal();
        reveal.ships.pop();
        assert!(matches!(
            verify_reveal(&board.root(), &reveal, &[]),
            Err(VerificationRejected::IllegalBoard(BoardError::MissingKind(_)))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn salt_bit_flip_breaks_inclusion(seed in any::<u64>(), tag in 0u8..5, bit in 0usize..256) {
            let board = sealed(seed);
            let kind = ShipKind::from_tag(tag).unwrap();
            let mut disclosure = board.disclose(kind).unwrap();
            prop_assert!(verify_disclosure(&board.root(), &disclosure));

            disclosure.salt = disclosure.salt.with_bit_flipped(bit);
            prop_assert!(!verify_disclosure(&board.root(), &disclosure));
        }

        #[test]
        fn cell_bit_flip_breaks_inclusion(seed in any::<u64>(), tag in 0u8..5, which in 0usize..5, bit in 0u8..8) {
            let board = sealed(seed);
            let kind = ShipKind::from_tag(tag).unwrap();
            let disclosure = board.disclose(kind).unwrap();
            let mut cells = disclosure.placement.cells().unwrap();
            let idx = which % cells.len();
            cells[idx].col ^= 1 << bit;

            let leaf = leaf_digest_from_cells(&disclosure.salt, kind, &cells);
            prop_assert!(!verify_inclusion(&board.root(), &leaf, &disclosure.proof));
        }

        #[test]
        fn kind_change_breaks_inclusion(seed in any::<u64>(), tag in 0u8..5, other in 0u8..5) {
            prop_assume!(tag != other);
            let board = sealed(seed);
            let kind = ShipKind::from_tag(tag).unwrap();
            let disclosure = board.disclose(kind).unwrap();
            let cells = disclosure.placement.cells().unwrap();

            let leaf = leaf_digest_from_cells(&disclosure.salt, ShipKind::from_tag(other).unwrap(), &cells);
            prop_assert!(!verify_inclusion(&board.root(), &leaf, &disclosure.proof));
        }

        #[test]
        fn root_independent_of_ship_order(seed in any::<u64>(), shuffle_seed in any::<u64>()) {
            use rand::seq::SliceRandom;

            let board = sealed(seed);
            let mut ships = board.reveal().ships;
            ships.shuffle(&mut StdRng::seed_from_u64(shuffle_seed));
            prop_assert_eq!(commitment_root(&ships).unwrap(), board.root());
        }
    }
}
