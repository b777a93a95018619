//! Ledger Events
//!
//! Decoded ledger notifications that drive the turn state machine. Each
//! carries its position in the ledger so re-deliveries can be recognised.

use serde::{Serialize, Deserialize};

use crate::game::state::ActorId;

/// Position of an event in the ledger: block height, then log index.
///
/// Ordered, so the state machine can keep a high-water mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Block the event was emitted in.
    pub block: u64,
    /// Index within the block.
    pub log_index: u32,
}

impl EventId {
    /// Create a new event id.
    pub const fn new(block: u64, log_index: u32) -> Self {
        Self { block, log_index }
    }

    /// Last possible position in `block`. Every event of the block sorts at
    /// or below it.
    pub const fn end_of_block(block: u64) -> Self {
        Self { block, log_index: u32::MAX }
    }
}

/// Event data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEventData {
    /// A defender answered the pending guess.
    ResponseSubmitted {
        /// Defender who answered.
        responder: ActorId,
        /// Whether the guess hit.
        hit: bool,
    },

    /// The game ended.
    GameWon {
        /// Winning actor.
        winner: ActorId,
    },
}

/// A ledger event with its position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Ledger position.
    pub id: EventId,
    /// Event data.
    pub data: LedgerEventData,
}

impl LedgerEvent {
    /// Create a new event.
    pub fn new(id: EventId, data: LedgerEventData) -> Self {
        Self { id, data }
    }

    /// `ResponseSubmitted` shorthand.
    pub fn response(id: EventId, responder: ActorId, hit: bool) -> Self {
        Self::new(id, LedgerEventData::ResponseSubmitted { responder, hit })
    }

    /// `GameWon` shorthand.
    pub fn won(id: EventId, winner: ActorId) -> Self {
        Self::new(id, LedgerEventData::GameWon { winner })
    }

    /// The actor the event names.
    pub fn actor(&self) -> ActorId {
        match self.data {
            LedgerEventData::ResponseSubmitted { responder, .. } => responder,
            LedgerEventData::GameWon { winner } => winner,
        }
    }
}
