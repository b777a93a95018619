//! Leaf Encoding
//!
//! One leaf per ship:
//!
//! ```text
//! leaf = SHA-256( salt[32] ‖ kind_tag[1] ‖ (row, col)[2] × length )
//! ```
//!
//! Cells are sorted row-major before encoding, so the digest depends only
//! on the set of occupied cells and never on how the origin or orientation
//! were expressed.

use crate::core::hash::{Digest, DigestHasher};
use crate::core::rng::Salt;
use crate::game::board::{BoardError, Coordinate, Placement, ShipKind};

/// Encode the leaf preimage for a placement.
///
/// Bounds are checked before any bytes are produced.
pub fn encode_leaf(placement: &Placement, salt: &Salt) -> Result<Vec<u8>, BoardError> {
    let cells = placement.cells()?;
    Ok(encode_raw(salt, placement.kind, &cells))
}

/// Hash a placement and its salt into a leaf digest.
pub fn leaf_digest(placement: &Placement, salt: &Salt) -> Result<Digest, BoardError> {
    let cells = placement.cells()?;
    Ok(hash_raw(salt, placement.kind, &cells))
}

/// Leaf digest over an explicit cell list.
///
/// The cells are sorted here, so callers may pass them in any order. Used by
/// tests that tamper with individual cells; production code goes through
/// [`leaf_digest`].
pub fn leaf_digest_from_cells(salt: &Salt, kind: ShipKind, cells: &[Coordinate]) -> Digest {
    let mut sorted = cells.to_vec();
    sorted.sort_unstable();
    hash_raw(salt, kind, &sorted)
}

fn encode_raw(salt: &Salt, kind: ShipKind, cells: &[Coordinate]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(salt.as_bytes().len() + 1 + cells.len() * 2);
    bytes.extend_from_slice(salt.as_bytes());
    bytes.push(kind.tag());
    for cell in cells {
        bytes.push(cell.row);
        bytes.push(cell.col);
    }
    bytes
}

fn hash_raw(salt: &Salt, kind: ShipKind, cells: &[Coordinate]) -> Digest {
    let mut hasher = DigestHasher::new();
    hasher.update_bytes(salt.as_bytes());
    hasher.update_u8(kind.tag());
    for cell in cells {
        hasher.update_u8(cell.row);
        hasher.update_u8(cell.col);
    }
    hasher.finalize()
}
