//! Game Logic Module
//!
//! Board model and the client-side turn state machine. No I/O.
//!
//! ## Module Structure
//!
//! - `board`: Coordinates, ship kinds, placements, validated fleets
//! - `state`: Ledger game records, actor ids, turn snapshots
//! - `events`: Decoded ledger events with their ledger positions
//! - `deadline`: Block-height deadlines rendered as wall time
//! - `turn`: Turn state machine driven by ledger observations

pub mod board;
pub mod state;
pub mod events;
pub mod deadline;
pub mod turn;

// Re-export key types
pub use board::{Coordinate, ShipKind, Orientation, Placement, Fleet, BoardError};
pub use state::{ActorId, Amount, GameRecord, PendingGuess, TurnPhase, TurnSnapshot};
pub use events::{EventId, LedgerEvent, LedgerEventData};
pub use turn::{TurnMachine, Transition, StaleEvent};
