//! Game State Definitions
//!
//! Ledger-owned game records and the client-owned turn snapshot.

use std::fmt;
use std::time::Duration;

use serde::{Serialize, Deserialize};

use crate::game::board::Coordinate;
use crate::game::deadline::{format_remaining, is_expired};
use crate::proof::commitment::CommitmentRoot;

/// Stake amount in the ledger's smallest unit.
pub type Amount = u128;

// =============================================================================
// ACTOR ID
// =============================================================================

/// Ledger account address (20 bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ActorId(pub [u8; 20]);

impl ActorId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse a hex address, with or without `0x`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).ok()?;
        let bytes: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Full `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Abbreviated form for display (`0x1234...abcd`).
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.short())
    }
}

// =============================================================================
// GAME RECORD
// =============================================================================

/// A guess waiting for the defender's response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingGuess {
    /// Who guessed.
    pub guesser: ActorId,
    /// Target cell on the defender's board.
    pub coord: Coordinate,
}

/// Game as stored by the ledger. The client only ever reads copies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// Game creator.
    pub player1: ActorId,
    /// Invited opponent.
    pub player2: ActorId,
    /// Creator's board commitment.
    pub commitment_root1: Option<CommitmentRoot>,
    /// Opponent's board commitment, once they join.
    pub commitment_root2: Option<CommitmentRoot>,
    /// Hits scored by player1 on player2's board.
    pub hits1: u8,
    /// Hits scored by player2 on player1's board.
    pub hits2: u8,
    /// Actor whose turn it is to guess, once both boards are in.
    pub turn: Option<ActorId>,
    /// Block height by which the current actor must act.
    pub turn_deadline: Option<u64>,
    /// Total stake held.
    pub deposit: Amount,
    /// Outstanding guess, if any.
    pub pending_guess: Option<PendingGuess>,
    /// Winner, once decided.
    pub winner: Option<ActorId>,
}

impl GameRecord {
    /// Whether `actor` plays in this game.
    pub fn involves(&self, actor: &ActorId) -> bool {
        self.player1 == *actor || self.player2 == *actor
    }

    /// The other player, if `me` plays in this game.
    pub fn opponent_of(&self, me: &ActorId) -> Option<ActorId> {
        if self.player1 == *me {
            Some(self.player2)
        } else if self.player2 == *me {
            Some(self.player1)
        } else {
            None
        }
    }

    /// Commitment root of `actor`.
    pub fn root_of(&self, actor: &ActorId) -> Option<CommitmentRoot> {
        if self.player1 == *actor {
            self.commitment_root1
        } else if self.player2 == *actor {
            self.commitment_root2
        } else {
            None
        }
    }

    /// Hits scored by `actor`.
    pub fn hits_of(&self, actor: &ActorId) -> u8 {
        if self.player1 == *actor {
            self.hits1
        } else if self.player2 == *actor {
            self.hits2
        } else {
            0
        }
    }

    /// Both boards are committed.
    pub fn both_committed(&self) -> bool {
        self.commitment_root1.is_some() && self.commitment_root2.is_some()
    }

    /// Whether the recorded deadline has passed at `block` while a player
    /// still had to act: the guesser to guess, or the defender to answer.
    pub fn turn_lapsed(&self, block: u64) -> bool {
        self.turn.is_some() && is_expired(self.turn_deadline, block)
    }

    /// Outstanding guess at `block`. A guess left unanswered past the
    /// deadline is void.
    pub fn effective_pending(&self, block: u64) -> Option<PendingGuess> {
        self.pending_guess.filter(|_| !self.turn_lapsed(block))
    }

    /// Actor expected to guess at `block`.
    ///
    /// An idle guesser's turn passes to the other player once. A defender
    /// who never answers forfeits its turn, so the guesser moves again. The
    /// ledger sets a fresh deadline when that player acts.
    pub fn effective_turn(&self, block: u64) -> Option<ActorId> {
        let turn = self.turn?;
        if !self.turn_lapsed(block) {
            return Some(turn);
        }
        match self.pending_guess {
            Some(guess) => Some(guess.guesser),
            None => self.opponent_of(&turn),
        }
    }
}

// =============================================================================
// TURN SNAPSHOT
// =============================================================================

/// Client-side game phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// Local board not yet seen on the ledger.
    AwaitingOwnCommit,
    /// Waiting for the opponent's board.
    AwaitingOpponentCommit,
    /// Local actor guesses next (or awaits the answer to its guess).
    ActiveSelfTurn,
    /// Opponent guesses next (or awaits the local answer).
    ActiveOpponentTurn,
    /// Game over.
    Finished {
        /// Winning actor.
        winner: ActorId,
    },
}

impl TurnPhase {
    /// Either active phase.
    pub fn is_active(&self) -> bool {
        matches!(self, TurnPhase::ActiveSelfTurn | TurnPhase::ActiveOpponentTurn)
    }

    /// Terminal phase.
    pub fn is_finished(&self) -> bool {
        matches!(self, TurnPhase::Finished { .. })
    }
}

/// Read-only view of the game, rebuilt on every accepted observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSnapshot {
    /// Current phase.
    pub phase: TurnPhase,
    /// Opponent, once known.
    pub opponent: Option<ActorId>,
    /// Hits the local actor scored.
    pub hits_self: u8,
    /// Hits the opponent scored.
    pub hits_opponent: u8,
    /// Current turn deadline (block height).
    pub turn_deadline: Option<u64>,
    /// Latest ledger height observed.
    pub observed_block: u64,
    /// Advisory time left before the deadline. Display only.
    pub remaining: Option<Duration>,
    /// Outstanding guess, if any.
    pub pending_guess: Option<PendingGuess>,
}

impl TurnSnapshot {
    /// Snapshot at session start.
    pub fn initial() -> Self {
        Self {
            phase: TurnPhase::AwaitingOwnCommit,
            opponent: None,
            hits_self: 0,
            hits_opponent: 0,
            turn_deadline: None,
            observed_block: 0,
            remaining: None,
            pending_guess: None,
        }
    }

    /// `MM:SS` countdown, or `Not Active` without a deadline.
    pub fn remaining_display(&self) -> String {
        format_remaining(self.remaining)
    }

    /// Whether the local actor may submit a guess right now.
    ///
    /// Advisory only; the ledger has the final word.
    pub fn can_guess(&self) -> bool {
        self.phase == TurnPhase::ActiveSelfTurn && self.pending_guess.is_none()
    }

    /// A guess against the local board that needs answering.
    pub fn incoming_guess(&self, me: &ActorId) -> Option<Coordinate> {
        self.pending_guess
            .filter(|guess| guess.guesser != *me)
            .map(|guess| guess.coord)
    }
}

impl Default for TurnSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}
