//! Board Definitions
//!
//! Coordinates, ship kinds and placements. A [`Fleet`] is the only way to
//! obtain a full board, and constructing one checks every board invariant,
//! so downstream code never re-validates a fleet.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::BOARD_SIZE;

// =============================================================================
// COORDINATE
// =============================================================================

/// A cell on the board, ordered row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    /// Row index, `0..BOARD_SIZE`.
    pub row: u8,
    /// Column index, `0..BOARD_SIZE`.
    pub col: u8,
}

impl Coordinate {
    /// Create a coordinate without bounds checking.
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Create a coordinate, returning `None` when off the board.
    pub fn checked(row: u8, col: u8) -> Option<Self> {
        let coord = Self::new(row, col);
        coord.in_bounds().then_some(coord)
    }

    /// Check the coordinate lies on the board.
    #[inline]
    pub fn in_bounds(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// =============================================================================
// SHIP KIND
// =============================================================================

/// The five ship classes. Exactly one of each is placed per board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ShipKind {
    /// Length 5
    Carrier = 0,
    /// Length 4
    Battleship = 1,
    /// Length 3
    Cruiser = 2,
    /// Length 3
    Submarine = 3,
    /// Length 2
    Destroyer = 4,
}

impl ShipKind {
    /// All kinds in tag order.
    pub const ALL: [ShipKind; 5] = [
        ShipKind::Carrier,
        ShipKind::Battleship,
        ShipKind::Cruiser,
        ShipKind::Submarine,
        ShipKind::Destroyer,
    ];

    /// Number of cells this ship occupies.
    #[inline]
    pub fn length(self) -> u8 {
        match self {
            ShipKind::Carrier => 5,
            ShipKind::Battleship => 4,
            ShipKind::Cruiser => 3,
            ShipKind::Submarine => 3,
            ShipKind::Destroyer => 2,
        }
    }

    /// One-byte tag used in the leaf encoding.
    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Get kind from its tag.
    pub fn from_tag(tag: u8) -> Option<ShipKind> {
        match tag {
            0 => Some(ShipKind::Carrier),
            1 => Some(ShipKind::Battleship),
            2 => Some(ShipKind::Cruiser),
            3 => Some(ShipKind::Submarine),
            4 => Some(ShipKind::Destroyer),
            _ => None,
        }
    }
}

impl fmt::Display for ShipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Ship orientation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    /// Cells extend along the row (increasing column).
    Horizontal,
    /// Cells extend down the column (increasing row).
    Vertical,
}

// =============================================================================
// PLACEMENT
// =============================================================================

/// One ship placed on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    /// Ship class.
    pub kind: ShipKind,
    /// First (top-left) cell.
    pub origin: Coordinate,
    /// Direction the remaining cells extend in.
    pub orientation: Orientation,
}

impl Placement {
    /// Create a placement. Bounds are checked by [`Placement::cells`].
    pub const fn new(kind: ShipKind, origin: Coordinate, orientation: Orientation) -> Self {
        Self { kind, origin, orientation }
    }

    /// Occupied cells in row-major order.
    ///
    /// Fails with [`BoardError::InvalidPlacement`] if any cell leaves the board.
    pub fn cells(&self) -> Result<Vec<Coordinate>, BoardError> {
        let mut cells = Vec::with_capacity(self.kind.length() as usize);
        for i in 0..self.kind.length() {
            let (row, col) = match self.orientation {
                Orientation::Horizontal => (self.origin.row as u16, self.origin.col as u16 + i as u16),
                Orientation::Vertical => (self.origin.row as u16 + i as u16, self.origin.col as u16),
            };
            if row >= BOARD_SIZE as u16 || col >= BOARD_SIZE as u16 {
                return Err(BoardError::InvalidPlacement {
                    kind: self.kind,
                    origin: self.origin,
                    orientation: self.orientation,
                });
            }
            cells.push(Coordinate::new(row as u8, col as u8));
        }
        // Leaf encoding requires row-major order.
        cells.sort_unstable();
        Ok(cells)
    }

    /// Check whether this placement covers `coord`.
    ///
    /// Out-of-bounds placements cover nothing.
    pub fn covers(&self, coord: Coordinate) -> bool {
        self.cells().map(|cells| cells.contains(&coord)).unwrap_or(false)
    }
}

// =============================================================================
// FLEET
// =============================================================================

/// A complete, legal board: one placement per [`ShipKind`], all in bounds,
/// none overlapping.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Placement>", into = "Vec<Placement>")]
pub struct Fleet {
    /// Placements in tag order.
    placements: Vec<Placement>,
}

impl Fleet {
    /// Validate a set of placements into a fleet.
    ///
    /// Input order does not matter; placements are stored in tag order.
    pub fn new(placements: impl IntoIterator<Item = Placement>) -> Result<Self, BoardError> {
        let mut by_kind: [Option<Placement>; 5] = [None; 5];
        let mut occupied = [[false; BOARD_SIZE as usize]; BOARD_SIZE as usize];

        for placement in placements {
            let slot = &mut by_kind[placement.kind.tag() as usize];
            if slot.is_some() {
                return Err(BoardError::DuplicateKind(placement.kind));
            }

            for cell in placement.cells()? {
                let taken = &mut occupied[cell.row as usize][cell.col as usize];
                if *taken {
                    return Err(BoardError::Overlap { kind: placement.kind, cell });
                }
                *taken = true;
            }

            *slot = Some(placement);
        }

        let mut ordered = Vec::with_capacity(ShipKind::ALL.len());
        for (kind, slot) in ShipKind::ALL.iter().zip(by_kind) {
            ordered.push(slot.ok_or(BoardError::MissingKind(*kind))?);
        }

        Ok(Self { placements: ordered })
    }

    /// Placements in tag order.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Placement for a given kind.
    pub fn get(&self, kind: ShipKind) -> &Placement {
        // Construction guarantees one placement per kind, stored by tag.
        &self.placements[kind.tag() as usize]
    }

    /// The ship occupying `coord`, if any.
    pub fn ship_at(&self, coord: Coordinate) -> Option<&Placement> {
        self.placements.iter().find(|p| p.covers(coord))
    }
}

impl TryFrom<Vec<Placement>> for Fleet {
    type Error = BoardError;

    fn try_from(placements: Vec<Placement>) -> Result<Self, Self::Error> {
        Fleet::new(placements)
    }
}

impl From<Fleet> for Vec<Placement> {
    fn from(fleet: Fleet) -> Self {
        fleet.placements
    }
}

/// Board validation errors. Raised locally, before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    /// A derived cell falls outside the board.
    #[error("{kind} at {origin} ({orientation:?}) leaves the board")]
    InvalidPlacement {
        /// Ship class.
        kind: ShipKind,
        /// Requested origin.
        origin: Coordinate,
        /// Requested orientation.
        orientation: Orientation,
    },

    /// Two ships share a cell.
    #[error("{kind} overlaps another ship at {cell}")]
    Overlap {
        /// Ship that was placed second.
        kind: ShipKind,
        /// Shared cell.
        cell: Coordinate,
    },

    /// A ship class was placed twice.
    #[error("{0} placed more than once")]
    DuplicateKind(ShipKind),

    /// A ship class is missing from the board.
    #[error("{0} not placed")]
    MissingKind(ShipKind),
}
