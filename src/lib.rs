//! # Hidden Fleet
//!
//! Provable-but-hidden Battleship boards and a ledger-driven turn view.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HIDDEN FLEET                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Commitment primitives                    │
//! │  ├── hash.rs     - SHA-256 digests, sorted pair hashing     │
//! │  └── rng.rs      - Per-ship salts from a CSPRNG             │
//! │                                                             │
//! │  proof/          - Board commitments                        │
//! │  ├── leaf.rs     - Ship leaf encoding                       │
//! │  ├── merkle.rs   - Merkle tree and inclusion paths          │
//! │  ├── commitment.rs - Sealed boards and disclosures          │
//! │  └── verify.rs   - Hit and reveal verification              │
//! │                                                             │
//! │  game/           - Board model and turn logic (no I/O)      │
//! │  ├── board.rs    - Coordinates, ships, validated fleets     │
//! │  ├── state.rs    - Game records and turn snapshots          │
//! │  ├── events.rs   - Decoded ledger events                    │
//! │  ├── deadline.rs - Block deadlines as wall time             │
//! │  └── turn.rs     - Turn state machine                       │
//! │                                                             │
//! │  network/        - Ledger I/O (async)                       │
//! │  ├── ledger.rs   - Ledger trait and errors                  │
//! │  ├── memory.rs   - In-process ledger                        │
//! │  ├── protocol.rs - Raw event payloads                       │
//! │  ├── sync.rs     - Sync controller task                     │
//! │  └── session.rs  - Per-actor game session                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commitment Encoding
//!
//! ```text
//! leaf = SHA-256(salt[32] ‖ kind_tag[1] ‖ (row, col) per cell, row-major)
//! node = SHA-256(min(a, b) ‖ max(a, b))
//! ```
//!
//! Leaves are sorted before the tree is built, so the root does not depend
//! on the order ships were placed in.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

use std::time::Duration;

pub mod core;
pub mod game;
pub mod network;
pub mod proof;

// Re-export commonly used types
pub use core::hash::Digest;
pub use core::rng::Salt;
pub use game::board::{Coordinate, ShipKind, Orientation, Placement, Fleet};
pub use game::state::{ActorId, Amount, GameRecord, TurnPhase, TurnSnapshot};
pub use game::turn::TurnMachine;
pub use proof::commitment::{BoardCommitment, CommitmentRoot, Disclosure, ShotResponse};
pub use network::{InMemoryLedger, Ledger, Session, SessionConfig, SyncHandle};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Board side length.
pub const BOARD_SIZE: u8 = 10;

/// Cells occupied by a full fleet (5 + 4 + 3 + 3 + 2).
pub const FLEET_CELLS: u8 = 17;

/// Stake each player commits (10 units of 10^18).
pub const DEPOSIT: Amount = 10 * 1_000_000_000_000_000_000;

/// Assumed ledger block period, for display only.
pub const BLOCK_PERIOD: Duration = Duration::from_secs(2);

/// Blocks a player has to act once the turn is theirs (5 minutes at
/// [`BLOCK_PERIOD`]).
pub const TURN_TIMEOUT_BLOCKS: u64 = 150;
